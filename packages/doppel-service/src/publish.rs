use time::OffsetDateTime;

use doppel_domain::{comment, issue::IssueKey, ranking::ConfirmedDuplicate};
use doppel_storage::queries;

use crate::{DoppelService, Result};

#[derive(Debug, PartialEq, Eq)]
pub enum PublishOutcome {
	/// The comment was posted and the publish completed.
	Posted,
	/// A finished publish already existed for this issue; nothing was posted.
	AlreadyPosted,
	/// A marker comment was already on the issue from an earlier attempt that
	/// failed after posting; the publish completed without posting again.
	Healed,
}

impl DoppelService {
	/// Posts the duplicate report at most once per issue.
	///
	/// The action record commits before any GitHub call, so no database lock or
	/// pooled connection is held across network I/O. `processed_at` commits
	/// last and marks the publish as finished; a crash in between leaves the
	/// record without it, and the retry lands back here, where the marker scan
	/// decides whether the comment still needs to be posted.
	pub async fn publish(
		&self,
		key: &IssueKey,
		duplicates: &[ConfirmedDuplicate],
	) -> Result<PublishOutcome> {
		let now = OffsetDateTime::now_utc();
		let inserted =
			queries::insert_action_record(&self.db, key, &serde_json::to_value(duplicates)?, now)
				.await?;

		if !inserted {
			let processed = queries::fetch_issue(&self.db, key)
				.await?
				.is_some_and(|issue| issue.processed_at.is_some());

			if processed {
				tracing::info!(issue = %key, "Publish already finished, skipping post.");

				return Ok(PublishOutcome::AlreadyPosted);
			}

			tracing::warn!(issue = %key, "Resuming interrupted publish.");
		}

		let github = &self.cfg.github;
		let token = self.providers.github.installation_token(github).await?;
		let existing = self
			.providers
			.github
			.list_issue_comments(github, &token, &key.repo, key.issue_number)
			.await?;
		let already_commented = existing.iter().any(|body| comment::is_duplicate_report(body));

		if already_commented {
			tracing::warn!(issue = %key, "Marker comment found, skipping post.");
		} else {
			let body = comment::render(duplicates);

			self.providers
				.github
				.post_issue_comment(github, &token, &key.repo, key.issue_number, &body)
				.await?;
		}

		queries::mark_issue_processed(&self.db, key, OffsetDateTime::now_utc()).await?;

		if already_commented {
			Ok(PublishOutcome::Healed)
		} else {
			tracing::info!(issue = %key, count = duplicates.len(), "Duplicate report posted.");

			Ok(PublishOutcome::Posted)
		}
	}
}
