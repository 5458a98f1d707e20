use std::{sync::Arc, time::Duration as StdDuration};

use color_eyre::Result;
use time::{Duration, OffsetDateTime};
use tokio::time as tokio_time;

use doppel_service::{DoppelService, PipelineOutcome};
use doppel_storage::queue;

const BASE_BACKOFF_MS: i64 = 500;
const MAX_BACKOFF_MS: i64 = 30_000;
const MAX_ERROR_CHARS: usize = 1_024;

pub async fn run_worker(service: Arc<DoppelService>) -> Result<()> {
	let poll_interval = Duration::milliseconds(service.cfg.pipeline.poll_interval_ms);

	tracing::info!("Worker started.");

	loop {
		match process_once(&service).await {
			// Drain the queue without sleeping while jobs are available.
			Ok(true) => continue,
			Ok(false) => {},
			Err(err) => {
				tracing::error!(error = %err, "Queue processing failed.");
			},
		}

		tokio_time::sleep(to_std_duration(poll_interval)).await;
	}
}

/// Claims and processes at most one job. Returns whether a job was claimed.
async fn process_once(service: &DoppelService) -> doppel_service::Result<bool> {
	let pipeline = &service.cfg.pipeline;
	let now = OffsetDateTime::now_utc();
	let visibility_timeout = Duration::seconds(pipeline.visibility_timeout_secs);
	let Some(job) = queue::claim(&service.db, now, visibility_timeout).await? else {
		return Ok(false);
	};

	tracing::info!(
		job_id = %job.job_id,
		repo = %job.repo,
		issue_number = job.issue_number,
		attempt = job.attempts,
		"Job claimed."
	);

	match service.process_issue(&job).await {
		Ok(outcome) => {
			queue::mark_done(&service.db, job.job_id, OffsetDateTime::now_utc()).await?;

			tracing::info!(job_id = %job.job_id, outcome = outcome_label(&outcome), "Job done.");
		},
		Err(err) => {
			// Terminal errors skip the remaining attempt budget: retrying a
			// malformed or empty issue can never succeed.
			let attempts = if err.is_terminal() { pipeline.max_attempts } else { job.attempts };
			let backoff = backoff_for_attempt(job.attempts);
			let error_text = sanitize_error(&err.to_string());
			let status = queue::mark_failed(
				&service.db,
				job.job_id,
				attempts,
				pipeline.max_attempts,
				backoff,
				&error_text,
				OffsetDateTime::now_utc(),
			)
			.await?;

			if status == queue::STATUS_DEAD {
				tracing::error!(
					job_id = %job.job_id,
					repo = %job.repo,
					issue_number = job.issue_number,
					attempts,
					error = %error_text,
					"Job dead-lettered. Operator intervention required."
				);
			} else {
				tracing::warn!(
					job_id = %job.job_id,
					attempt = job.attempts,
					error = %error_text,
					"Job failed, will retry."
				);
			}
		},
	}

	Ok(true)
}

fn outcome_label(outcome: &PipelineOutcome) -> &'static str {
	match outcome {
		PipelineOutcome::AlreadyActioned => "already_actioned",
		PipelineOutcome::NoCandidates => "no_candidates",
		PipelineOutcome::NoneConfirmed => "none_confirmed",
		PipelineOutcome::Posted { .. } => "posted",
	}
}

fn backoff_for_attempt(attempt: i32) -> Duration {
	let attempts = attempt.max(1) as u32;
	let exp = attempts.saturating_sub(1).min(6);
	let base = BASE_BACKOFF_MS.saturating_mul(1 << exp);
	let capped = base.min(MAX_BACKOFF_MS);

	Duration::milliseconds(capped)
}

/// Scrubs credential-looking fragments out of an error message before it is
/// stored on the job row, then truncates it.
fn sanitize_error(text: &str) -> String {
	let mut parts = Vec::new();
	let mut redact_next = false;

	for raw in text.split_whitespace() {
		let mut word = raw.to_string();

		if redact_next {
			word = "[REDACTED]".to_string();
			redact_next = false;
		}
		if raw.eq_ignore_ascii_case("bearer") {
			redact_next = true;
		}

		let lowered = raw.to_ascii_lowercase();

		for key in ["api_key", "apikey", "password", "secret", "token"] {
			if lowered.contains(key) && (lowered.contains('=') || lowered.contains(':')) {
				let sep = if raw.contains('=') { '=' } else { ':' };
				let prefix = match raw.split(sep).next() {
					Some(prefix) => prefix,
					None => raw,
				};

				word = format!("{prefix}{sep}[REDACTED]");

				break;
			}
		}

		parts.push(word);
	}

	let mut out = parts.join(" ");

	if out.chars().count() > MAX_ERROR_CHARS {
		out = out.chars().take(MAX_ERROR_CHARS).collect();
		out.push_str("...");
	}

	out
}

fn to_std_duration(duration: Duration) -> StdDuration {
	let millis = duration.whole_milliseconds();

	if millis <= 0 {
		return StdDuration::from_millis(0);
	}

	StdDuration::from_millis(millis as u64)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn backoff_doubles_per_attempt_and_caps() {
		assert_eq!(backoff_for_attempt(1), Duration::milliseconds(500));
		assert_eq!(backoff_for_attempt(2), Duration::milliseconds(1_000));
		assert_eq!(backoff_for_attempt(3), Duration::milliseconds(2_000));
		assert_eq!(backoff_for_attempt(10), Duration::milliseconds(30_000));
		assert_eq!(backoff_for_attempt(0), Duration::milliseconds(500));
	}

	#[test]
	fn error_sanitizer_redacts_credentials() {
		let sanitized = sanitize_error("request failed: api_key=sk-12345 Bearer abcdef");

		assert!(sanitized.contains("api_key=[REDACTED]"));
		assert!(sanitized.contains("Bearer [REDACTED]"));
		assert!(!sanitized.contains("sk-12345"));
		assert!(!sanitized.contains("abcdef"));
	}

	#[test]
	fn error_sanitizer_truncates_long_messages() {
		let long = "x".repeat(5_000);
		let sanitized = sanitize_error(&long);

		assert!(sanitized.chars().count() <= MAX_ERROR_CHARS + 3);
		assert!(sanitized.ends_with("..."));
	}
}
