pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error(transparent)]
	Providers(#[from] sift_providers::Error),
	#[error(transparent)]
	Storage(#[from] sift_storage::Error),
}
