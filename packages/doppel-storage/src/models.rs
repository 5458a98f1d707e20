use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, sqlx::FromRow)]
pub struct IssueRecord {
	pub repo: String,
	pub issue_number: i64,
	pub title: String,
	pub body: String,
	pub created_at: OffsetDateTime,
	pub processed_at: Option<OffsetDateTime>,
}

/// A nearest-neighbor hit, with the cosine distance computed by pgvector.
#[derive(Debug, sqlx::FromRow)]
pub struct CandidateRow {
	pub repo: String,
	pub issue_number: i64,
	pub title: String,
	pub body: String,
	pub distance: f64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IssueJob {
	pub job_id: Uuid,
	pub delivery_id: String,
	pub repo: String,
	pub issue_number: i64,
	pub title: String,
	pub body: String,
	pub issue_created_at: OffsetDateTime,
	pub status: String,
	pub attempts: i32,
	pub last_error: Option<String>,
	pub available_at: OffsetDateTime,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, sqlx::FromRow)]
pub struct ActionRecord {
	pub repo: String,
	pub issue_number: i64,
	pub duplicate_of: Value,
	pub posted_at: OffsetDateTime,
}
