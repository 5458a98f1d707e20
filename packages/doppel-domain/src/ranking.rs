use serde::{Deserialize, Serialize};

use crate::issue::IssueKey;

/// An issue that passed the cheap cosine-distance filter. Ephemeral, never
/// persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct Candidate {
	pub key: IssueKey,
	pub title: String,
	pub body: String,
	pub distance: f32,
}

/// A candidate the judge confirmed as the same underlying issue.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConfirmedDuplicate {
	pub key: IssueKey,
	pub score: u32,
}

/// Drops candidates above `max_distance` and orders the rest by ascending
/// distance, ties broken by lower issue number so the older issue wins as the
/// canonical original.
pub fn gate_and_order(mut candidates: Vec<Candidate>, max_distance: f32) -> Vec<Candidate> {
	candidates.retain(|candidate| candidate.distance <= max_distance);
	candidates.sort_by(|a, b| {
		a.distance
			.total_cmp(&b.distance)
			.then_with(|| a.key.issue_number.cmp(&b.key.issue_number))
	});

	candidates
}

/// Keeps judge results at or above `similarity_threshold`, ordered by
/// descending score (ties: lower issue number first).
pub fn confirm_and_order(
	mut scored: Vec<ConfirmedDuplicate>,
	similarity_threshold: u32,
) -> Vec<ConfirmedDuplicate> {
	scored.retain(|duplicate| duplicate.score >= similarity_threshold);
	scored.sort_by(|a, b| {
		b.score.cmp(&a.score).then_with(|| a.key.issue_number.cmp(&b.key.issue_number))
	});

	scored
}
