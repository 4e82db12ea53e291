pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Config(#[from] sift_config::Error),
	#[error(transparent)]
	Mq(#[from] sift_mq::Error),
	#[error(transparent)]
	Providers(#[from] sift_providers::Error),
	#[error(transparent)]
	Storage(#[from] sift_storage::Error),
}
