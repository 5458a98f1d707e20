use doppel_domain::{
	issue::IssueKey,
	normalize,
	ranking::{self, Candidate, ConfirmedDuplicate},
};
use doppel_storage::{models::IssueJob, queries};
use time::OffsetDateTime;

use crate::{DoppelService, Error, PublishOutcome, Result};

#[derive(Debug, PartialEq)]
pub enum PipelineOutcome {
	/// An action record already exists for this issue; nothing was called.
	AlreadyActioned,
	/// No stored issue fell within the distance gate.
	NoCandidates,
	/// Candidates existed, but the judge confirmed none of them.
	NoneConfirmed,
	/// A duplicate report was posted.
	Posted { duplicates: Vec<ConfirmedDuplicate> },
}

impl DoppelService {
	/// Runs the full similarity pipeline for one claimed job. Safe to re-run:
	/// a finished issue short-circuits on its action record before any
	/// provider is called, and the embedding write is write-once.
	pub async fn process_issue(&self, job: &IssueJob) -> Result<PipelineOutcome> {
		let key = IssueKey::new(job.repo.as_str(), job.issue_number);

		if let Some(record) = queries::fetch_action_record(&self.db, &key).await? {
			let processed = queries::fetch_issue(&self.db, &key)
				.await?
				.is_some_and(|issue| issue.processed_at.is_some());

			if processed {
				tracing::info!(issue = %key, "Issue already actioned, short-circuiting.");

				return Ok(PipelineOutcome::AlreadyActioned);
			}

			// A previous attempt committed the record but died before the
			// publish finished. Resume it from the persisted duplicates.
			let duplicates: Vec<ConfirmedDuplicate> =
				serde_json::from_value(record.duplicate_of)?;

			return match self.publish(&key, &duplicates).await? {
				PublishOutcome::AlreadyPosted => Ok(PipelineOutcome::AlreadyActioned),
				PublishOutcome::Posted | PublishOutcome::Healed =>
					Ok(PipelineOutcome::Posted { duplicates }),
			};
		}

		let pipeline = &self.cfg.pipeline;
		let input = normalize::embedding_input(&job.title, &job.body, pipeline.max_body_chars);

		if input.is_empty() {
			return Err(Error::EmptyInput);
		}

		let embedding = self.embed_one(&input).await?;

		queries::insert_issue(
			&self.db,
			&key,
			&job.title,
			&job.body,
			job.issue_created_at,
			&embedding,
		)
		.await?;

		let rows = queries::nearest(
			&self.db,
			&key,
			&embedding,
			pipeline.candidate_k,
			f64::from(pipeline.distance_threshold),
		)
		.await?;
		let candidates = ranking::gate_and_order(
			rows.into_iter()
				.map(|row| Candidate {
					key: IssueKey::new(row.repo, row.issue_number),
					title: row.title,
					body: row.body,
					distance: row.distance as f32,
				})
				.collect(),
			pipeline.distance_threshold,
		);

		if candidates.is_empty() {
			tracing::info!(issue = %key, "No candidates within the distance gate.");
			queries::mark_issue_processed(&self.db, &key, OffsetDateTime::now_utc()).await?;

			return Ok(PipelineOutcome::NoCandidates);
		}

		let mut scored = Vec::with_capacity(candidates.len());

		for candidate in &candidates {
			let candidate_text = normalize::embedding_input(
				&candidate.title,
				&candidate.body,
				pipeline.max_body_chars,
			);
			let verdict = self
				.providers
				.judge
				.compare(&self.cfg.providers.judge, &input, &candidate_text)
				.await?;

			tracing::debug!(
				issue = %key,
				candidate = %candidate.key,
				score = verdict.score,
				"Judge verdict."
			);

			scored.push(ConfirmedDuplicate { key: candidate.key.clone(), score: verdict.score });
		}

		let confirmed = ranking::confirm_and_order(scored, pipeline.similarity_threshold);

		if confirmed.is_empty() {
			tracing::info!(issue = %key, "Judge confirmed no duplicates.");
			queries::mark_issue_processed(&self.db, &key, OffsetDateTime::now_utc()).await?;

			return Ok(PipelineOutcome::NoneConfirmed);
		}

		match self.publish(&key, &confirmed).await? {
			PublishOutcome::AlreadyPosted => Ok(PipelineOutcome::AlreadyActioned),
			PublishOutcome::Posted | PublishOutcome::Healed =>
				Ok(PipelineOutcome::Posted { duplicates: confirmed }),
		}
	}

	async fn embed_one(&self, input: &str) -> Result<Vec<f32>> {
		let texts = [input.to_string()];
		let mut vectors =
			self.providers.embedding.embed(&self.cfg.providers.embedding, &texts).await?;

		if vectors.len() != 1 {
			return Err(doppel_providers::Error::InvalidResponse {
				message: format!("Expected 1 embedding, got {}.", vectors.len()),
			}
			.into());
		}

		// Checked above.
		Ok(vectors.remove(0))
	}
}
