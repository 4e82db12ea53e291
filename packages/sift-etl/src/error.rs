pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Domain(#[from] sift_domain::Error),
	#[error(transparent)]
	Providers(#[from] sift_providers::Error),
	#[error(transparent)]
	Storage(#[from] sift_storage::Error),
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error("Failed to extract PDF text: {0}.")]
	Pdf(String),
	#[error("Document is not valid UTF-8: {0}.")]
	InvalidEncoding(#[from] std::string::FromUtf8Error),
	#[error("No processor registered for file type {file_type:?}.")]
	NoProcessor { file_type: &'static str },
	#[error("Embedding count mismatch: sent {sent} texts, received {received} vectors.")]
	EmbeddingCount { sent: usize, received: usize },
	#[error("Embedding dimension mismatch: expected {expected}, received {received}.")]
	EmbeddingDimension { expected: usize, received: usize },
}
