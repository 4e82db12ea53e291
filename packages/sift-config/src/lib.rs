mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Chunking, Config, EmbeddingProviderConfig, GenerationProviderConfig, Mq, ObjectStoreConfig,
	Postgres, Providers, Qdrant, Service, Storage, Summarize,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.qdrant.collection.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.qdrant.collection must be non-empty.".to_string(),
		});
	}
	if cfg.storage.qdrant.vector_dim == 0 {
		return Err(Error::Validation {
			message: "storage.qdrant.vector_dim must be greater than zero.".to_string(),
		});
	}
	if cfg.storage.object_store.bucket.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.object_store.bucket must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}
	if cfg.providers.embedding.batch_size == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.batch_size must be greater than zero.".to_string(),
		});
	}

	for (label, key) in [
		("embedding", &cfg.providers.embedding.api_key),
		("generation", &cfg.providers.generation.api_key),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	if cfg.chunking.max_chars == 0 {
		return Err(Error::Validation {
			message: "chunking.max_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.chunking.overlap_chars >= cfg.chunking.max_chars {
		return Err(Error::Validation {
			message: "chunking.overlap_chars must be less than chunking.max_chars.".to_string(),
		});
	}
	if cfg.mq.send_attempts == 0 {
		return Err(Error::Validation {
			message: "mq.send_attempts must be greater than zero.".to_string(),
		});
	}
	if cfg.mq.base_backoff_ms == 0 {
		return Err(Error::Validation {
			message: "mq.base_backoff_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.mq.max_backoff_ms < cfg.mq.base_backoff_ms {
		return Err(Error::Validation {
			message: "mq.max_backoff_ms must be at least mq.base_backoff_ms.".to_string(),
		});
	}
	if cfg.mq.consume_batch_size == 0 {
		return Err(Error::Validation {
			message: "mq.consume_batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.mq.worker_concurrency == 0 {
		return Err(Error::Validation {
			message: "mq.worker_concurrency must be greater than zero.".to_string(),
		});
	}
	if cfg.mq.max_redelivery == 0 {
		return Err(Error::Validation {
			message: "mq.max_redelivery must be greater than zero.".to_string(),
		});
	}
	if cfg.summarize.batch_size == 0 {
		return Err(Error::Validation {
			message: "summarize.batch_size must be greater than zero.".to_string(),
		});
	}
	if cfg.summarize.threshold_chars == 0 {
		return Err(Error::Validation {
			message: "summarize.threshold_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.summarize.flush_interval_ms == 0 {
		return Err(Error::Validation {
			message: "summarize.flush_interval_ms must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.storage
		.object_store
		.access_token
		.as_deref()
		.map(|token| token.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.storage.object_store.access_token = None;
	}

	for base in [
		&mut cfg.providers.embedding.api_base,
		&mut cfg.providers.generation.api_base,
		&mut cfg.storage.object_store.endpoint,
	] {
		while base.ends_with('/') {
			base.pop();
		}
	}
}
