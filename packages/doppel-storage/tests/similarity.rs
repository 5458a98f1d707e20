use time::OffsetDateTime;

use doppel_domain::issue::IssueKey;
use doppel_storage::{db::Db, queries};

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

async fn seed_issue(db: &Db, issue_number: i64, embedding: &[f32]) {
	let key = IssueKey::new("octo/repo", issue_number);

	queries::insert_issue(
		db,
		&key,
		&format!("Issue {issue_number}"),
		"body",
		OffsetDateTime::now_utc(),
		embedding,
	)
	.await
	.expect("Failed to insert issue.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set DOPPEL_PG_DSN to run."]
async fn issue_embeddings_are_write_once() {
	let Some((test_db, db)) = test_db().await else {
		eprintln!("Skipping issue_embeddings_are_write_once; set DOPPEL_PG_DSN to run this test.");

		return;
	};
	let key = IssueKey::new("octo/repo", 42);
	let now = OffsetDateTime::now_utc();

	let first = queries::insert_issue(&db, &key, "original", "body", now, &[1.0, 0.0, 0.0])
		.await
		.expect("Failed to insert issue.");
	let second = queries::insert_issue(&db, &key, "edited", "body", now, &[0.0, 1.0, 0.0])
		.await
		.expect("Failed to insert issue.");

	assert!(first);
	assert!(!second);

	let stored = queries::fetch_issue(&db, &key)
		.await
		.expect("Failed to fetch issue.")
		.expect("Issue must exist.");

	assert_eq!(stored.title, "original");

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set DOPPEL_PG_DSN to run."]
async fn nearest_respects_k_distance_and_ordering() {
	let Some((test_db, db)) = test_db().await else {
		eprintln!("Skipping nearest_respects_k_distance_and_ordering; set DOPPEL_PG_DSN to run this test.");

		return;
	};

	// Distances from [1, 0, 0]: #10 is identical (0.0), #20 is close (~0.29),
	// #30 is orthogonal (1.0) and must fall outside max_distance.
	seed_issue(&db, 10, &[1.0, 0.0, 0.0]).await;
	seed_issue(&db, 20, &[1.0, 1.0, 0.0]).await;
	seed_issue(&db, 30, &[0.0, 1.0, 0.0]).await;
	seed_issue(&db, 42, &[1.0, 0.0, 0.0]).await;

	let query_key = IssueKey::new("octo/repo", 42);
	let candidates = queries::nearest(&db, &query_key, &[1.0, 0.0, 0.0], 10, 0.4)
		.await
		.expect("Failed to query nearest.");
	let numbers: Vec<i64> = candidates.iter().map(|c| c.issue_number).collect();

	assert_eq!(numbers, vec![10, 20]);
	assert!(candidates.iter().all(|c| c.distance <= 0.4));
	assert!(candidates.windows(2).all(|pair| pair[0].distance <= pair[1].distance));

	let capped = queries::nearest(&db, &query_key, &[1.0, 0.0, 0.0], 1, 0.4)
		.await
		.expect("Failed to query nearest.");

	assert_eq!(capped.len(), 1);
	assert_eq!(capped[0].issue_number, 10);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set DOPPEL_PG_DSN to run."]
async fn nearest_excludes_the_querying_issue_and_other_repos() {
	let Some((test_db, db)) = test_db().await else {
		eprintln!(
			"Skipping nearest_excludes_the_querying_issue_and_other_repos; set DOPPEL_PG_DSN to run this test."
		);

		return;
	};

	seed_issue(&db, 42, &[1.0, 0.0, 0.0]).await;
	seed_issue(&db, 10, &[1.0, 0.0, 0.0]).await;

	let other_key = IssueKey::new("octo/other", 9);

	queries::insert_issue(&db, &other_key, "other repo", "body", OffsetDateTime::now_utc(), &[
		1.0, 0.0, 0.0,
	])
	.await
	.expect("Failed to insert issue.");

	let query_key = IssueKey::new("octo/repo", 42);
	let candidates = queries::nearest(&db, &query_key, &[1.0, 0.0, 0.0], 10, 1.0)
		.await
		.expect("Failed to query nearest.");
	let numbers: Vec<i64> = candidates.iter().map(|c| c.issue_number).collect();

	assert_eq!(numbers, vec![10]);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres with pgvector. Set DOPPEL_PG_DSN to run."]
async fn distance_ties_break_toward_the_older_issue() {
	let Some((test_db, db)) = test_db().await else {
		eprintln!("Skipping distance_ties_break_toward_the_older_issue; set DOPPEL_PG_DSN to run this test.");

		return;
	};

	seed_issue(&db, 20, &[1.0, 0.0, 0.0]).await;
	seed_issue(&db, 10, &[1.0, 0.0, 0.0]).await;
	seed_issue(&db, 42, &[1.0, 0.0, 0.0]).await;

	let query_key = IssueKey::new("octo/repo", 42);
	let candidates = queries::nearest(&db, &query_key, &[1.0, 0.0, 0.0], 10, 0.5)
		.await
		.expect("Failed to query nearest.");
	let numbers: Vec<i64> = candidates.iter().map(|c| c.issue_number).collect();

	assert_eq!(numbers, vec![10, 20]);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
