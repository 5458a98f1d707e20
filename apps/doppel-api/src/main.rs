use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = doppel_api::Args::parse();
	doppel_api::run(args).await
}
