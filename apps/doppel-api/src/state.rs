use std::sync::Arc;

use doppel_service::{DoppelService, Providers};
use doppel_storage::db::Db;

#[derive(Clone)]
pub struct AppState {
	pub service: Arc<DoppelService>,
}
impl AppState {
	pub async fn new(config: doppel_config::Config) -> color_eyre::Result<Self> {
		let db = Db::connect(&config.storage.postgres).await?;

		db.ensure_schema(config.providers.embedding.dimensions).await?;

		let service = DoppelService::new(config, db, Providers::live());

		Ok(Self { service: Arc::new(service) })
	}
}
