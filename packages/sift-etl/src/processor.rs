use std::sync::Arc;

use async_trait::async_trait;
use sift_domain::{events::FileType, identity::ObjectIdentity};
use sift_storage::vector::RowFilter;

use crate::{Pipeline, Result};

/// One document format. Ingest walks the registered processors in order and
/// the first one that claims the file type runs; the rest are ignored.
#[async_trait]
pub trait EtlProcessor: Send + Sync {
	fn can_process(&self, file_type: FileType) -> bool;

	/// Extracts text from `bytes` and indexes it under `identity`. Returns
	/// the number of vector rows written.
	async fn execute(&self, identity: &ObjectIdentity, bytes: &[u8]) -> Result<usize>;

	/// Removes every vector row the document owns. Idempotent.
	async fn delete_vectors(&self, identity: &ObjectIdentity) -> Result<()>;
}

async fn delete_document_rows(pipeline: &Pipeline, identity: &ObjectIdentity) -> Result<()> {
	let filter = RowFilter::document(&identity.tenant, &identity.title);

	tracing::info!(filter = %filter.expression(), "Deleting vector rows.");

	pipeline.index().delete_by_filter(&filter).await?;

	Ok(())
}

pub struct PdfProcessor {
	pipeline: Arc<Pipeline>,
}
impl PdfProcessor {
	pub fn new(pipeline: Arc<Pipeline>) -> Self {
		Self { pipeline }
	}
}
#[async_trait]
impl EtlProcessor for PdfProcessor {
	fn can_process(&self, file_type: FileType) -> bool {
		file_type == FileType::Pdf
	}

	async fn execute(&self, identity: &ObjectIdentity, bytes: &[u8]) -> Result<usize> {
		let text = pdf_extract::extract_text_from_mem(bytes)
			.map_err(|err| crate::Error::Pdf(err.to_string()))?;

		self.pipeline.ingest_text(identity, &text).await
	}

	async fn delete_vectors(&self, identity: &ObjectIdentity) -> Result<()> {
		delete_document_rows(&self.pipeline, identity).await
	}
}

pub struct MarkdownProcessor {
	pipeline: Arc<Pipeline>,
}
impl MarkdownProcessor {
	pub fn new(pipeline: Arc<Pipeline>) -> Self {
		Self { pipeline }
	}
}
#[async_trait]
impl EtlProcessor for MarkdownProcessor {
	fn can_process(&self, file_type: FileType) -> bool {
		file_type == FileType::Markdown
	}

	// Markdown is indexed as-is. Stripping the markup would shift chunk
	// offsets away from what the retrieval side displays.
	async fn execute(&self, identity: &ObjectIdentity, bytes: &[u8]) -> Result<usize> {
		let text = String::from_utf8(bytes.to_vec())?;

		self.pipeline.ingest_text(identity, &text).await
	}

	async fn delete_vectors(&self, identity: &ObjectIdentity) -> Result<()> {
		delete_document_rows(&self.pipeline, identity).await
	}
}
