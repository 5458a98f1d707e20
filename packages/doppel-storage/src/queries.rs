use serde_json::Value;
use time::OffsetDateTime;

use doppel_domain::issue::IssueKey;

use crate::{
	Result,
	db::Db,
	models::{ActionRecord, CandidateRow, IssueRecord},
};

/// Renders a vector in pgvector's text form for a `$n::text::vector` bind.
pub fn format_vector(vec: &[f32]) -> String {
	let mut out = String::from("[");

	for (index, value) in vec.iter().enumerate() {
		if index > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}

/// Writes an issue record with its embedding. Write-once: a second insert for
/// the same key is a no-op and the stored embedding is never overwritten.
/// Returns whether a row was actually inserted.
pub async fn insert_issue(
	db: &Db,
	key: &IssueKey,
	title: &str,
	body: &str,
	created_at: OffsetDateTime,
	embedding: &[f32],
) -> Result<bool> {
	let result = sqlx::query(
		"\
INSERT INTO issues (repo, issue_number, title, body, created_at, embedding)
VALUES ($1, $2, $3, $4, $5, $6::text::vector)
ON CONFLICT (repo, issue_number) DO NOTHING",
	)
	.bind(key.repo.as_str())
	.bind(key.issue_number)
	.bind(title)
	.bind(body)
	.bind(created_at)
	.bind(format_vector(embedding))
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() > 0)
}

pub async fn fetch_issue(db: &Db, key: &IssueKey) -> Result<Option<IssueRecord>> {
	let row = sqlx::query_as::<_, IssueRecord>(
		"\
SELECT repo, issue_number, title, body, created_at, processed_at
FROM issues
WHERE repo = $1 AND issue_number = $2",
	)
	.bind(key.repo.as_str())
	.bind(key.issue_number)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

pub async fn mark_issue_processed(db: &Db, key: &IssueKey, now: OffsetDateTime) -> Result<()> {
	sqlx::query("UPDATE issues SET processed_at = $1 WHERE repo = $2 AND issue_number = $3")
		.bind(now)
		.bind(key.repo.as_str())
		.bind(key.issue_number)
		.execute(&db.pool)
		.await?;

	Ok(())
}

/// Top-K nearest stored issues by cosine distance, scoped to the issue's own
/// repository and excluding the issue itself. Results come back in ascending
/// distance order with ties broken by the lower (older) issue number, capped
/// at `k` rows, all within `max_distance`.
pub async fn nearest(
	db: &Db,
	key: &IssueKey,
	query_embedding: &[f32],
	k: u32,
	max_distance: f64,
) -> Result<Vec<CandidateRow>> {
	let rows = sqlx::query_as::<_, CandidateRow>(
		"\
SELECT repo, issue_number, title, body, (embedding <=> $3::text::vector)::float8 AS distance
FROM issues
WHERE repo = $1
	AND issue_number <> $2
	AND (embedding <=> $3::text::vector) <= $4
ORDER BY distance ASC, issue_number ASC
LIMIT $5",
	)
	.bind(key.repo.as_str())
	.bind(key.issue_number)
	.bind(format_vector(query_embedding))
	.bind(max_distance)
	.bind(i64::from(k))
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}

pub async fn action_record_exists(db: &Db, key: &IssueKey) -> Result<bool> {
	Ok(fetch_action_record(db, key).await?.is_some())
}

pub async fn fetch_action_record(db: &Db, key: &IssueKey) -> Result<Option<ActionRecord>> {
	let row = sqlx::query_as::<_, ActionRecord>(
		"\
SELECT repo, issue_number, duplicate_of, posted_at
FROM action_records
WHERE repo = $1 AND issue_number = $2",
	)
	.bind(key.repo.as_str())
	.bind(key.issue_number)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

/// Inserts the at-most-one-post guard. Returns false when a record already
/// exists for the key. A single statement, so no lock outlives the call.
pub async fn insert_action_record(
	db: &Db,
	key: &IssueKey,
	duplicate_of: &Value,
	posted_at: OffsetDateTime,
) -> Result<bool> {
	let result = sqlx::query(
		"\
INSERT INTO action_records (repo, issue_number, duplicate_of, posted_at)
VALUES ($1, $2, $3, $4)
ON CONFLICT (repo, issue_number) DO NOTHING",
	)
	.bind(key.repo.as_str())
	.bind(key.issue_number)
	.bind(duplicate_of)
	.bind(posted_at)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected() > 0)
}
