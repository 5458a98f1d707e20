use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub github: Github,
	#[serde(default)]
	pub pipeline: Pipeline,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub judge: JudgeProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct JudgeProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Github {
	#[serde(default = "default_github_api_base")]
	pub api_base: String,
	pub app_id: u64,
	pub installation_id: u64,
	pub private_key_pem: String,
	pub webhook_secret: String,
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pipeline {
	/// Coarse cosine-distance gate. High recall; the judge corrects false positives.
	pub distance_threshold: f32,
	/// Confirmation gate on the judge's 0-100 score.
	pub similarity_threshold: u32,
	pub candidate_k: u32,
	pub max_attempts: i32,
	pub visibility_timeout_secs: i64,
	pub max_body_chars: u32,
	pub poll_interval_ms: i64,
}
impl Default for Pipeline {
	fn default() -> Self {
		Self {
			distance_threshold: 0.4,
			similarity_threshold: 85,
			candidate_k: 3,
			max_attempts: 5,
			visibility_timeout_secs: 30,
			max_body_chars: 8_000,
			poll_interval_ms: 500,
		}
	}
}

fn default_github_api_base() -> String {
	"https://api.github.com".to_string()
}
