use time::{Duration, OffsetDateTime};
use uuid::Uuid;

use crate::{Result, db::Db, models::IssueJob};

pub const STATUS_QUEUED: &str = "QUEUED";
pub const STATUS_RUNNING: &str = "RUNNING";
pub const STATUS_FAILED: &str = "FAILED";
pub const STATUS_DONE: &str = "DONE";
pub const STATUS_DEAD: &str = "DEAD";

/// A processing job as constructed by the webhook ingress. The delivery id is
/// the idempotency key: a GitHub redelivery carries the same id and collapses
/// into the existing job.
#[derive(Debug)]
pub struct NewJob {
	pub delivery_id: String,
	pub repo: String,
	pub issue_number: i64,
	pub title: String,
	pub body: String,
	pub issue_created_at: OffsetDateTime,
}

/// Enqueues a job, or returns `None` when the delivery id was seen before.
pub async fn enqueue(db: &Db, job: NewJob, now: OffsetDateTime) -> Result<Option<Uuid>> {
	let job_id = Uuid::new_v4();
	let result = sqlx::query(
		"\
INSERT INTO issue_jobs (
	job_id,
	delivery_id,
	repo,
	issue_number,
	title,
	body,
	issue_created_at,
	status,
	attempts,
	available_at,
	created_at,
	updated_at
)
VALUES ($1, $2, $3, $4, $5, $6, $7, 'QUEUED', 0, $8, $8, $8)
ON CONFLICT (delivery_id) DO NOTHING",
	)
	.bind(job_id)
	.bind(job.delivery_id.as_str())
	.bind(job.repo.as_str())
	.bind(job.issue_number)
	.bind(job.title.as_str())
	.bind(job.body.as_str())
	.bind(job.issue_created_at)
	.bind(now)
	.execute(&db.pool)
	.await?;

	Ok((result.rows_affected() > 0).then_some(job_id))
}

/// Claims the next runnable job, if any.
///
/// Claimable: `QUEUED`/`FAILED` jobs whose backoff has elapsed, plus `RUNNING`
/// jobs whose lease expired (a worker crashed mid-processing). A job stays
/// unclaimable while another `RUNNING` job holds an unexpired lease for the
/// same `(repo, issue_number)`: two workers must never process the same issue
/// concurrently, or both could decide "no duplicate" and race toward posting.
/// The claim bumps `attempts` and leases the job for `visibility_timeout`.
pub async fn claim(
	db: &Db,
	now: OffsetDateTime,
	visibility_timeout: Duration,
) -> Result<Option<IssueJob>> {
	let mut tx = db.pool.begin().await?;
	let row = sqlx::query_as::<_, IssueJob>(
		"\
SELECT
	job_id,
	delivery_id,
	repo,
	issue_number,
	title,
	body,
	issue_created_at,
	status,
	attempts,
	last_error,
	available_at,
	created_at,
	updated_at
FROM issue_jobs
WHERE status IN ('QUEUED', 'FAILED', 'RUNNING')
	AND available_at <= $1
	AND NOT EXISTS (
		SELECT 1
		FROM issue_jobs other
		WHERE other.repo = issue_jobs.repo
			AND other.issue_number = issue_jobs.issue_number
			AND other.job_id <> issue_jobs.job_id
			AND other.status = 'RUNNING'
			AND other.available_at > $1
	)
ORDER BY available_at ASC
LIMIT 1
FOR UPDATE SKIP LOCKED",
	)
	.bind(now)
	.fetch_optional(&mut *tx)
	.await?;

	let Some(mut job) = row else {
		tx.commit().await?;

		return Ok(None);
	};

	// The NOT EXISTS filter above runs against a statement snapshot that cannot
	// see a concurrent claimer's uncommitted RUNNING update for the same key.
	// The per-key advisory lock is held until this transaction commits, so once
	// it is acquired a re-check sees every sibling claim that went through.
	let locked: bool = sqlx::query_scalar(
		"SELECT pg_try_advisory_xact_lock(hashtext($1 || '#' || $2::text)::bigint)",
	)
	.bind(job.repo.as_str())
	.bind(job.issue_number)
	.fetch_one(&mut *tx)
	.await?;

	if !locked {
		tx.commit().await?;

		return Ok(None);
	}

	let sibling_running: Option<i32> = sqlx::query_scalar(
		"\
SELECT 1
FROM issue_jobs
WHERE repo = $1
	AND issue_number = $2
	AND job_id <> $3
	AND status = 'RUNNING'
	AND available_at > $4
LIMIT 1",
	)
	.bind(job.repo.as_str())
	.bind(job.issue_number)
	.bind(job.job_id)
	.bind(now)
	.fetch_optional(&mut *tx)
	.await?;

	if sibling_running.is_some() {
		tx.commit().await?;

		return Ok(None);
	}

	let lease_until = now + visibility_timeout;
	let attempts = job.attempts + 1;

	sqlx::query(
		"\
UPDATE issue_jobs
SET status = 'RUNNING', attempts = $1, available_at = $2, updated_at = $3
WHERE job_id = $4",
	)
	.bind(attempts)
	.bind(lease_until)
	.bind(now)
	.bind(job.job_id)
	.execute(&mut *tx)
	.await?;

	job.status = STATUS_RUNNING.to_string();
	job.attempts = attempts;
	job.available_at = lease_until;
	job.updated_at = now;

	tx.commit().await?;

	Ok(Some(job))
}

pub async fn mark_done(db: &Db, job_id: Uuid, now: OffsetDateTime) -> Result<()> {
	sqlx::query(
		"UPDATE issue_jobs SET status = 'DONE', last_error = NULL, updated_at = $1 WHERE job_id = $2",
	)
	.bind(now)
	.bind(job_id)
	.execute(&db.pool)
	.await?;

	Ok(())
}

/// Records a failed attempt. Jobs move to `FAILED` with a backoff delay until
/// the attempt budget is spent, then to `DEAD` where they wait for an
/// operator. Returns the status the job ended up in.
pub async fn mark_failed(
	db: &Db,
	job_id: Uuid,
	attempts: i32,
	max_attempts: i32,
	backoff: Duration,
	error_text: &str,
	now: OffsetDateTime,
) -> Result<&'static str> {
	let status = if attempts >= max_attempts { STATUS_DEAD } else { STATUS_FAILED };
	let available_at = now + backoff;

	sqlx::query(
		"\
UPDATE issue_jobs
SET status = $1, last_error = $2, available_at = $3, updated_at = $4
WHERE job_id = $5",
	)
	.bind(status)
	.bind(error_text)
	.bind(available_at)
	.bind(now)
	.bind(job_id)
	.execute(&db.pool)
	.await?;

	Ok(status)
}

pub async fn fetch_job(db: &Db, job_id: Uuid) -> Result<Option<IssueJob>> {
	let row = sqlx::query_as::<_, IssueJob>(
		"\
SELECT
	job_id,
	delivery_id,
	repo,
	issue_number,
	title,
	body,
	issue_created_at,
	status,
	attempts,
	last_error,
	available_at,
	created_at,
	updated_at
FROM issue_jobs
WHERE job_id = $1",
	)
	.bind(job_id)
	.fetch_optional(&db.pool)
	.await?;

	Ok(row)
}

/// Dead-lettered jobs, oldest first, for operator inspection.
pub async fn list_dead_jobs(db: &Db, limit: i64) -> Result<Vec<IssueJob>> {
	let rows = sqlx::query_as::<_, IssueJob>(
		"\
SELECT
	job_id,
	delivery_id,
	repo,
	issue_number,
	title,
	body,
	issue_created_at,
	status,
	attempts,
	last_error,
	available_at,
	created_at,
	updated_at
FROM issue_jobs
WHERE status = 'DEAD'
ORDER BY updated_at ASC
LIMIT $1",
	)
	.bind(limit)
	.fetch_all(&db.pool)
	.await?;

	Ok(rows)
}
