use time::{Duration, OffsetDateTime};

use doppel_storage::{db::Db, queue};

async fn test_db() -> Option<(doppel_testkit::TestDatabase, Db)> {
	let base_dsn = doppel_testkit::env_dsn()?;
	let test_db = doppel_testkit::TestDatabase::new(&base_dsn)
		.await
		.expect("Failed to create test database.");
	let cfg = doppel_config::Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(3).await.expect("Failed to ensure schema.");

	Some((test_db, db))
}

fn new_job(delivery_id: &str, repo: &str, issue_number: i64) -> queue::NewJob {
	queue::NewJob {
		delivery_id: delivery_id.to_string(),
		repo: repo.to_string(),
		issue_number,
		title: "Crash on startup".to_string(),
		body: "It crashes.".to_string(),
		issue_created_at: OffsetDateTime::now_utc(),
	}
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DOPPEL_PG_DSN to run."]
async fn enqueue_is_idempotent_per_delivery_id() {
	let Some((test_db, db)) = test_db().await else {
		eprintln!("Skipping enqueue_is_idempotent_per_delivery_id; set DOPPEL_PG_DSN to run this test.");

		return;
	};
	let now = OffsetDateTime::now_utc();

	let first = queue::enqueue(&db, new_job("delivery-1", "octo/repo", 42), now)
		.await
		.expect("Failed to enqueue job.");
	let second = queue::enqueue(&db, new_job("delivery-1", "octo/repo", 42), now)
		.await
		.expect("Failed to enqueue job.");

	assert!(first.is_some());
	assert!(second.is_none());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DOPPEL_PG_DSN to run."]
async fn claim_serializes_jobs_for_the_same_issue() {
	let Some((test_db, db)) = test_db().await else {
		eprintln!("Skipping claim_serializes_jobs_for_the_same_issue; set DOPPEL_PG_DSN to run this test.");

		return;
	};
	let now = OffsetDateTime::now_utc();
	let lease = Duration::seconds(30);

	queue::enqueue(&db, new_job("delivery-1", "octo/repo", 42), now)
		.await
		.expect("Failed to enqueue job.");
	queue::enqueue(&db, new_job("delivery-2", "octo/repo", 42), now)
		.await
		.expect("Failed to enqueue job.");
	queue::enqueue(&db, new_job("delivery-3", "octo/repo", 7), now)
		.await
		.expect("Failed to enqueue job.");

	let first = queue::claim(&db, now, lease).await.expect("Failed to claim.").expect("Expected a job.");
	let second = queue::claim(&db, now, lease).await.expect("Failed to claim.").expect("Expected a job.");
	let third = queue::claim(&db, now, lease).await.expect("Failed to claim.");

	// One job per distinct issue key; the second delivery for #42 stays queued
	// while its sibling holds an unexpired lease.
	assert_eq!(first.issue_number, 42);
	assert_eq!(second.issue_number, 7);
	assert!(third.is_none());

	queue::mark_done(&db, first.job_id, now).await.expect("Failed to mark done.");

	let reclaimed = queue::claim(&db, now, lease).await.expect("Failed to claim.");

	assert_eq!(reclaimed.expect("Expected a job.").delivery_id, "delivery-2");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DOPPEL_PG_DSN to run."]
async fn concurrent_claims_never_share_an_issue() {
	let Some((test_db, db)) = test_db().await else {
		eprintln!("Skipping concurrent_claims_never_share_an_issue; set DOPPEL_PG_DSN to run this test.");

		return;
	};
	let now = OffsetDateTime::now_utc();
	let lease = Duration::seconds(30);

	queue::enqueue(&db, new_job("delivery-1", "octo/repo", 42), now)
		.await
		.expect("Failed to enqueue job.");
	queue::enqueue(&db, new_job("delivery-2", "octo/repo", 42), now)
		.await
		.expect("Failed to enqueue job.");

	// Two workers racing on the same key. SKIP LOCKED lets the second claimer
	// bypass the first's locked row, so only the per-key advisory lock stands
	// between this and both deliveries running at once.
	let (first, second) =
		tokio::join!(queue::claim(&db, now, lease), queue::claim(&db, now, lease));
	let first = first.expect("Failed to claim.");
	let second = second.expect("Failed to claim.");

	assert!(first.is_some() != second.is_some());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DOPPEL_PG_DSN to run."]
async fn expired_lease_is_reclaimable() {
	let Some((test_db, db)) = test_db().await else {
		eprintln!("Skipping expired_lease_is_reclaimable; set DOPPEL_PG_DSN to run this test.");

		return;
	};
	let now = OffsetDateTime::now_utc();
	let lease = Duration::seconds(30);

	queue::enqueue(&db, new_job("delivery-1", "octo/repo", 42), now)
		.await
		.expect("Failed to enqueue job.");

	let claimed = queue::claim(&db, now, lease).await.expect("Failed to claim.").expect("Expected a job.");

	assert!(queue::claim(&db, now, lease).await.expect("Failed to claim.").is_none());

	// Simulate a crashed worker: the lease runs out without a mark_done.
	let later = now + Duration::seconds(31);
	let reclaimed =
		queue::claim(&db, later, lease).await.expect("Failed to claim.").expect("Expected a job.");

	assert_eq!(reclaimed.job_id, claimed.job_id);
	assert_eq!(reclaimed.attempts, 2);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set DOPPEL_PG_DSN to run."]
async fn exhausted_attempts_dead_letter_the_job() {
	let Some((test_db, db)) = test_db().await else {
		eprintln!("Skipping exhausted_attempts_dead_letter_the_job; set DOPPEL_PG_DSN to run this test.");

		return;
	};
	let max_attempts = 5;
	let lease = Duration::seconds(30);
	let mut now = OffsetDateTime::now_utc();

	queue::enqueue(&db, new_job("delivery-1", "octo/repo", 42), now)
		.await
		.expect("Failed to enqueue job.");

	let mut last_status = "";

	for _ in 0..max_attempts {
		let job = queue::claim(&db, now, lease).await.expect("Failed to claim.").expect("Expected a job.");

		last_status = queue::mark_failed(
			&db,
			job.job_id,
			job.attempts,
			max_attempts,
			Duration::milliseconds(0),
			"transport error",
			now,
		)
		.await
		.expect("Failed to mark failed.");
		now += Duration::seconds(60);
	}

	assert_eq!(last_status, queue::STATUS_DEAD);
	assert!(queue::claim(&db, now, lease).await.expect("Failed to claim.").is_none());

	let dead = queue::list_dead_jobs(&db, 10).await.expect("Failed to list dead jobs.");

	assert_eq!(dead.len(), 1);
	assert_eq!(dead[0].last_error.as_deref(), Some("transport error"));

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
