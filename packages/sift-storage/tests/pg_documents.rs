//! Document metadata rows against a live database, including the duplicate
//! rejection the submission path relies on.

use sift_storage::{
	Error,
	db::Db,
	queries::{
		DOC_STATUS_PENDING, DOC_STATUS_READY, delete_document, document_by_key, insert_document,
		set_document_status,
	},
};

#[tokio::test]
#[ignore = "Requires external Postgres. Set SIFT_PG_DSN to run."]
async fn rejects_duplicate_document_submissions() {
	let Ok(dsn) = std::env::var("SIFT_PG_DSN") else {
		eprintln!(
			"Skipping rejects_duplicate_document_submissions; set SIFT_PG_DSN to run this test."
		);

		return;
	};
	let cfg = sift_config::Postgres { dsn, pool_max_conns: 4 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema().await.expect("Failed to ensure schema.");

	// A fresh tenant per run keeps reruns from colliding on the unique key.
	let tenant = format!("tenant_test_{}", uuid::Uuid::new_v4().simple());

	insert_document(&db, &tenant, "report.pdf", "pdf").await.expect("Failed to insert document.");

	let doc = document_by_key(&db, &tenant, "report.pdf")
		.await
		.expect("Failed to fetch document.")
		.expect("Document row is missing.");

	assert_eq!(doc.file_type, "pdf");
	assert_eq!(doc.status, DOC_STATUS_PENDING);

	// The same (tenant, file name) submitted again must be rejected, not
	// silently replaced.
	assert!(matches!(
		insert_document(&db, &tenant, "report.pdf", "pdf").await,
		Err(Error::Conflict(_))
	));

	let updated = set_document_status(&db, &tenant, "report.pdf", DOC_STATUS_READY)
		.await
		.expect("Failed to update status.");

	assert_eq!(updated, 1);

	let doc = document_by_key(&db, &tenant, "report.pdf")
		.await
		.expect("Failed to fetch document.")
		.expect("Document row is missing.");

	assert_eq!(doc.status, DOC_STATUS_READY);

	let deleted = delete_document(&db, &tenant, "report.pdf")
		.await
		.expect("Failed to delete document.");

	assert_eq!(deleted, 1);
	assert!(
		document_by_key(&db, &tenant, "report.pdf")
			.await
			.expect("Failed to fetch document.")
			.is_none()
	);
}
