use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = doppel_worker::Args::parse();
	doppel_worker::run(args).await
}
