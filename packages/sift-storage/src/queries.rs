use time::OffsetDateTime;

use crate::{Error, Result, db::Db, models::KnowledgeDocument};

pub const DOC_STATUS_PENDING: &str = "pending";
pub const DOC_STATUS_READY: &str = "ready";

pub async fn document_by_key(
	db: &Db,
	tenant: &str,
	file_name: &str,
) -> Result<Option<KnowledgeDocument>> {
	let doc = sqlx::query_as::<_, KnowledgeDocument>(
		"SELECT * FROM knowledge_documents WHERE tenant = $1 AND file_name = $2",
	)
	.bind(tenant)
	.bind(file_name)
	.fetch_optional(&db.pool)
	.await?;

	Ok(doc)
}

/// Inserts the metadata row for a newly submitted document. Rejecting a
/// duplicate (tenant, file name) here is what keeps replayed ingest events
/// from stacking a second copy of the document at submission time.
pub async fn insert_document(db: &Db, tenant: &str, file_name: &str, file_type: &str) -> Result<()> {
	let result = sqlx::query(
		"\
INSERT INTO knowledge_documents (tenant, file_name, file_type, status)
VALUES ($1, $2, $3, $4)
ON CONFLICT (tenant, file_name) DO NOTHING",
	)
	.bind(tenant)
	.bind(file_name)
	.bind(file_type)
	.bind(DOC_STATUS_PENDING)
	.execute(&db.pool)
	.await?;

	if result.rows_affected() == 0 {
		return Err(Error::Conflict(format!(
			"Document {file_name} already exists for tenant {tenant}."
		)));
	}

	Ok(())
}

pub async fn set_document_status(
	db: &Db,
	tenant: &str,
	file_name: &str,
	status: &str,
) -> Result<u64> {
	let result = sqlx::query(
		"\
UPDATE knowledge_documents
SET status = $1, updated_at = $2
WHERE tenant = $3 AND file_name = $4",
	)
	.bind(status)
	.bind(OffsetDateTime::now_utc())
	.bind(tenant)
	.bind(file_name)
	.execute(&db.pool)
	.await?;

	Ok(result.rows_affected())
}

pub async fn delete_document(db: &Db, tenant: &str, file_name: &str) -> Result<u64> {
	let result =
		sqlx::query("DELETE FROM knowledge_documents WHERE tenant = $1 AND file_name = $2")
			.bind(tenant)
			.bind(file_name)
			.execute(&db.pool)
			.await?;

	Ok(result.rows_affected())
}
