mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Github, JudgeProviderConfig, Pipeline, Postgres, Providers,
	Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if !cfg.pipeline.distance_threshold.is_finite()
		|| !(0.0..=2.0).contains(&cfg.pipeline.distance_threshold)
	{
		return Err(Error::Validation {
			message: "pipeline.distance_threshold must be in the range 0.0-2.0.".to_string(),
		});
	}
	if cfg.pipeline.similarity_threshold > 100 {
		return Err(Error::Validation {
			message: "pipeline.similarity_threshold must be in the range 0-100.".to_string(),
		});
	}
	if cfg.pipeline.candidate_k == 0 {
		return Err(Error::Validation {
			message: "pipeline.candidate_k must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.max_attempts <= 0 {
		return Err(Error::Validation {
			message: "pipeline.max_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.visibility_timeout_secs <= 0 {
		return Err(Error::Validation {
			message: "pipeline.visibility_timeout_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.max_body_chars == 0 {
		return Err(Error::Validation {
			message: "pipeline.max_body_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.pipeline.poll_interval_ms <= 0 {
		return Err(Error::Validation {
			message: "pipeline.poll_interval_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.github.app_id == 0 {
		return Err(Error::Validation {
			message: "github.app_id must be greater than zero.".to_string(),
		});
	}
	if cfg.github.installation_id == 0 {
		return Err(Error::Validation {
			message: "github.installation_id must be greater than zero.".to_string(),
		});
	}
	if cfg.github.webhook_secret.trim().is_empty() {
		return Err(Error::Validation {
			message: "github.webhook_secret must be non-empty.".to_string(),
		});
	}
	if cfg.github.private_key_pem.trim().is_empty() {
		return Err(Error::Validation {
			message: "github.private_key_pem must be non-empty.".to_string(),
		});
	}

	for (label, key) in
		[("embedding", &cfg.providers.embedding.api_key), ("judge", &cfg.providers.judge.api_key)]
	{
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.github.api_base.trim().is_empty() {
		cfg.github.api_base = "https://api.github.com".to_string();
	}

	while cfg.github.api_base.ends_with('/') {
		cfg.github.api_base.pop();
	}
}
