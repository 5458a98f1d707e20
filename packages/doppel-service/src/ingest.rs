use serde::Deserialize;
use time::{OffsetDateTime, format_description::well_known::Rfc3339};
use uuid::Uuid;

use doppel_domain::{issue, signature};
use doppel_storage::queue;

use crate::{DoppelService, Error, Result};

/// The raw inbound webhook: header values plus the exact body bytes. The
/// signature must be checked against the bytes as received, before any JSON
/// parsing touches them.
#[derive(Debug)]
pub struct WebhookRequest<'a> {
	pub delivery_id: Option<&'a str>,
	pub event: Option<&'a str>,
	pub signature: Option<&'a str>,
	pub body: &'a [u8],
}

#[derive(Debug, PartialEq, Eq)]
pub enum IngestOutcome {
	/// A processing job was enqueued.
	Queued { job_id: Uuid },
	/// This delivery id was seen before; the original job stands.
	Duplicate,
	/// Valid payload, but not an event this pipeline acts on.
	Ignored { reason: &'static str },
}

#[derive(Debug, Deserialize)]
struct WebhookPayload {
	#[serde(default)]
	action: Option<String>,
	#[serde(default)]
	issue: Option<IssuePayload>,
	#[serde(default)]
	repository: Option<RepositoryPayload>,
}

#[derive(Debug, Deserialize)]
struct IssuePayload {
	number: i64,
	title: String,
	#[serde(default)]
	body: Option<String>,
	created_at: String,
}

#[derive(Debug, Deserialize)]
struct RepositoryPayload {
	full_name: String,
}

#[derive(Debug)]
enum Evaluation {
	Enqueue(queue::NewJob),
	Ignore(&'static str),
}

impl DoppelService {
	/// Validates and enqueues an inbound GitHub webhook. The request path does
	/// no embedding and no outbound network calls; acceptance means exactly
	/// one queue write.
	pub async fn ingest_webhook(&self, request: WebhookRequest<'_>) -> Result<IngestOutcome> {
		let signature = request.signature.ok_or(Error::InvalidSignature)?;

		if !signature::verify(&self.cfg.github.webhook_secret, request.body, signature) {
			return Err(Error::InvalidSignature);
		}

		let delivery_id = request
			.delivery_id
			.map(str::trim)
			.filter(|id| !id.is_empty())
			.ok_or_else(|| malformed("Missing delivery id header."))?;
		let payload: WebhookPayload = serde_json::from_slice(request.body)
			.map_err(|err| malformed(format!("Invalid JSON body: {err}.")))?;

		match evaluate(request.event, payload, delivery_id)? {
			Evaluation::Ignore(reason) => {
				tracing::debug!(delivery_id, reason, "Webhook acknowledged and dropped.");

				Ok(IngestOutcome::Ignored { reason })
			},
			Evaluation::Enqueue(job) => {
				let now = OffsetDateTime::now_utc();

				match queue::enqueue(&self.db, job, now).await? {
					Some(job_id) => {
						tracing::info!(delivery_id, %job_id, "Issue job enqueued.");

						Ok(IngestOutcome::Queued { job_id })
					},
					None => {
						tracing::info!(delivery_id, "Duplicate delivery collapsed.");

						Ok(IngestOutcome::Duplicate)
					},
				}
			},
		}
	}
}

fn evaluate(
	event: Option<&str>,
	payload: WebhookPayload,
	delivery_id: &str,
) -> Result<Evaluation> {
	match event {
		Some("issues") => {},
		Some(_) | None => return Ok(Evaluation::Ignore("unsupported event type")),
	}

	if payload.action.as_deref() != Some("opened") {
		return Ok(Evaluation::Ignore("unsupported action"));
	}

	let issue = payload.issue.ok_or_else(|| malformed("Payload is missing issue."))?;
	let repository = payload.repository.ok_or_else(|| malformed("Payload is missing repository."))?;

	if !issue::is_valid_repo(&repository.full_name) {
		return Err(malformed(format!(
			"Repository {:?} is not an owner/repo slug.",
			repository.full_name
		)));
	}

	let issue_created_at = OffsetDateTime::parse(&issue.created_at, &Rfc3339)
		.map_err(|_| malformed(format!("Invalid issue created_at: {:?}.", issue.created_at)))?;

	Ok(Evaluation::Enqueue(queue::NewJob {
		delivery_id: delivery_id.to_string(),
		repo: repository.full_name,
		issue_number: issue.number,
		title: issue.title,
		body: issue.body.unwrap_or_default(),
		issue_created_at,
	}))
}

fn malformed(message: impl Into<String>) -> Error {
	Error::MalformedPayload { message: message.into() }
}
