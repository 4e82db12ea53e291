use std::sync::Arc;

use sift_chunking::ChunkingConfig;
use sift_domain::identity::ObjectIdentity;
use sift_providers::Embedder;
use sift_storage::vector::{VectorIndex, VectorRow};

use crate::{Error, Result};

/// Chunk, embed, and index extracted text. Shared by every processor; the
/// processors differ only in how they turn object bytes into text.
pub struct Pipeline {
	embedder: Arc<dyn Embedder>,
	index: Arc<dyn VectorIndex>,
	chunking: ChunkingConfig,
	embed_batch_size: usize,
	vector_dim: usize,
}
impl Pipeline {
	pub fn new(
		embedder: Arc<dyn Embedder>,
		index: Arc<dyn VectorIndex>,
		chunking: &sift_config::Chunking,
		embedding: &sift_config::EmbeddingProviderConfig,
	) -> Self {
		Self {
			embedder,
			index,
			chunking: ChunkingConfig {
				max_chars: chunking.max_chars,
				overlap_chars: chunking.overlap_chars,
			},
			embed_batch_size: embedding.batch_size,
			vector_dim: embedding.dimensions as usize,
		}
	}

	pub fn index(&self) -> Arc<dyn VectorIndex> {
		self.index.clone()
	}

	/// Indexes `text` under `identity`. Returns the number of rows written.
	/// Empty or whitespace-only text indexes nothing and is not an error.
	pub async fn ingest_text(&self, identity: &ObjectIdentity, text: &str) -> Result<usize> {
		let chunks = sift_chunking::split_text(text, &self.chunking);

		if chunks.is_empty() {
			tracing::warn!(
				tenant = %identity.tenant,
				title = %identity.title,
				"Document produced no chunks.",
			);

			return Ok(0);
		}

		// All rows are collected first and upserted in one call, so an
		// embedding failure anywhere in the document indexes nothing.
		let mut rows = Vec::with_capacity(chunks.len());

		for batch in chunks.chunks(self.embed_batch_size) {
			let texts = batch.iter().map(|c| c.text.clone()).collect::<Vec<_>>();
			let vectors = self.embedder.embed(&texts).await?;

			if vectors.len() != texts.len() {
				return Err(Error::EmbeddingCount { sent: texts.len(), received: vectors.len() });
			}
			if let Some(vector) = vectors.iter().find(|v| v.len() != self.vector_dim) {
				return Err(Error::EmbeddingDimension {
					expected: self.vector_dim,
					received: vector.len(),
				});
			}

			rows.extend(batch.iter().zip(vectors).map(|(chunk, vector)| VectorRow {
				vector,
				text: chunk.text.clone(),
				tenant: identity.tenant.clone(),
				title: identity.title.clone(),
			}));
		}

		let written = rows.len();

		self.index.upsert(rows).await?;

		tracing::info!(
			tenant = %identity.tenant,
			title = %identity.title,
			chunks = written,
			"Indexed document.",
		);

		Ok(written)
	}
}
