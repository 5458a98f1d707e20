pub mod worker;

use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use doppel_service::{DoppelService, Providers};
use doppel_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = doppel_cli::VERSION,
	rename_all = "kebab",
	styles = doppel_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = doppel_config::load(&args.config)?;
	let filter = EnvFilter::try_new(&config.service.log_level)
		.unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema(config.providers.embedding.dimensions).await?;

	let service = Arc::new(DoppelService::new(config, db, Providers::live()));

	worker::run_worker(service).await
}
