pub mod ingest;
pub mod pipeline;
pub mod publish;

mod error;

pub use error::{Error, Result};
pub use ingest::{IngestOutcome, WebhookRequest};
pub use pipeline::PipelineOutcome;
pub use publish::PublishOutcome;

use std::{future::Future, pin::Pin, sync::Arc};

use doppel_config::{Config, EmbeddingProviderConfig, Github, JudgeProviderConfig};
use doppel_providers::judge::Verdict;
use doppel_storage::db::Db;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

type ProviderResult<T> = std::result::Result<T, doppel_providers::Error>;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>>;
}

pub trait JudgeProvider
where
	Self: Send + Sync,
{
	fn compare<'a>(
		&'a self,
		cfg: &'a JudgeProviderConfig,
		issue_text: &'a str,
		candidate_text: &'a str,
	) -> BoxFuture<'a, ProviderResult<Verdict>>;
}

pub trait GithubClient
where
	Self: Send + Sync,
{
	fn installation_token<'a>(&'a self, cfg: &'a Github) -> BoxFuture<'a, ProviderResult<String>>;

	fn post_issue_comment<'a>(
		&'a self,
		cfg: &'a Github,
		token: &'a str,
		repo: &'a str,
		issue_number: i64,
		body: &'a str,
	) -> BoxFuture<'a, ProviderResult<()>>;

	fn list_issue_comments<'a>(
		&'a self,
		cfg: &'a Github,
		token: &'a str,
		repo: &'a str,
		issue_number: i64,
	) -> BoxFuture<'a, ProviderResult<Vec<String>>>;
}

#[derive(Clone)]
pub struct Providers {
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub judge: Arc<dyn JudgeProvider>,
	pub github: Arc<dyn GithubClient>,
}
impl Providers {
	pub fn new(
		embedding: Arc<dyn EmbeddingProvider>,
		judge: Arc<dyn JudgeProvider>,
		github: Arc<dyn GithubClient>,
	) -> Self {
		Self { embedding, judge, github }
	}

	/// Providers backed by real HTTP calls.
	pub fn live() -> Self {
		Self::new(Arc::new(LiveEmbedding), Arc::new(LiveJudge), Arc::new(LiveGithub))
	}
}

struct LiveEmbedding;
impl EmbeddingProvider for LiveEmbedding {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, ProviderResult<Vec<Vec<f32>>>> {
		Box::pin(doppel_providers::embedding::embed(cfg, texts))
	}
}

struct LiveJudge;
impl JudgeProvider for LiveJudge {
	fn compare<'a>(
		&'a self,
		cfg: &'a JudgeProviderConfig,
		issue_text: &'a str,
		candidate_text: &'a str,
	) -> BoxFuture<'a, ProviderResult<Verdict>> {
		Box::pin(doppel_providers::judge::compare(cfg, issue_text, candidate_text))
	}
}

struct LiveGithub;
impl GithubClient for LiveGithub {
	fn installation_token<'a>(&'a self, cfg: &'a Github) -> BoxFuture<'a, ProviderResult<String>> {
		Box::pin(async move {
			let now_unix = time::OffsetDateTime::now_utc().unix_timestamp();
			let jwt = doppel_providers::github::app_jwt(cfg, now_unix)?;

			doppel_providers::github::installation_token(cfg, &jwt).await
		})
	}

	fn post_issue_comment<'a>(
		&'a self,
		cfg: &'a Github,
		token: &'a str,
		repo: &'a str,
		issue_number: i64,
		body: &'a str,
	) -> BoxFuture<'a, ProviderResult<()>> {
		Box::pin(doppel_providers::github::post_issue_comment(cfg, token, repo, issue_number, body))
	}

	fn list_issue_comments<'a>(
		&'a self,
		cfg: &'a Github,
		token: &'a str,
		repo: &'a str,
		issue_number: i64,
	) -> BoxFuture<'a, ProviderResult<Vec<String>>> {
		Box::pin(doppel_providers::github::list_issue_comments(cfg, token, repo, issue_number))
	}
}

pub struct DoppelService {
	pub cfg: Config,
	pub db: Db,
	pub providers: Providers,
}
impl DoppelService {
	pub fn new(cfg: Config, db: Db, providers: Providers) -> Self {
		Self { cfg, db, providers }
	}
}
