use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub chunking: Chunking,
	#[serde(default)]
	pub mq: Mq,
	#[serde(default)]
	pub summarize: Summarize,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	pub qdrant: Qdrant,
	pub object_store: ObjectStoreConfig,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ObjectStoreConfig {
	pub endpoint: String,
	pub bucket: String,
	pub access_token: Option<String>,
	pub timeout_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	pub generation: GenerationProviderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	#[serde(default = "default_embedding_batch_size")]
	pub batch_size: usize,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationProviderConfig {
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct Chunking {
	#[serde(default = "default_max_chars")]
	pub max_chars: usize,
	#[serde(default = "default_overlap_chars")]
	pub overlap_chars: usize,
}
impl Default for Chunking {
	fn default() -> Self {
		Self { max_chars: default_max_chars(), overlap_chars: default_overlap_chars() }
	}
}

#[derive(Debug, Deserialize, Clone)]
pub struct Mq {
	#[serde(default = "default_send_attempts")]
	pub send_attempts: u32,
	#[serde(default = "default_base_backoff_ms")]
	pub base_backoff_ms: u64,
	#[serde(default = "default_max_backoff_ms")]
	pub max_backoff_ms: u64,
	#[serde(default = "default_poll_interval_ms")]
	pub poll_interval_ms: u64,
	#[serde(default = "default_consume_batch_size")]
	pub consume_batch_size: usize,
	#[serde(default = "default_worker_concurrency")]
	pub worker_concurrency: usize,
	#[serde(default = "default_max_redelivery")]
	pub max_redelivery: u32,
}
impl Default for Mq {
	fn default() -> Self {
		Self {
			send_attempts: default_send_attempts(),
			base_backoff_ms: default_base_backoff_ms(),
			max_backoff_ms: default_max_backoff_ms(),
			poll_interval_ms: default_poll_interval_ms(),
			consume_batch_size: default_consume_batch_size(),
			worker_concurrency: default_worker_concurrency(),
			max_redelivery: default_max_redelivery(),
		}
	}
}

#[derive(Debug, Deserialize, Clone)]
pub struct Summarize {
	#[serde(default = "default_summary_threshold_chars")]
	pub threshold_chars: usize,
	#[serde(default = "default_summary_batch_size")]
	pub batch_size: usize,
	#[serde(default = "default_flush_interval_ms")]
	pub flush_interval_ms: u64,
}
impl Default for Summarize {
	fn default() -> Self {
		Self {
			threshold_chars: default_summary_threshold_chars(),
			batch_size: default_summary_batch_size(),
			flush_interval_ms: default_flush_interval_ms(),
		}
	}
}

fn default_embedding_batch_size() -> usize {
	10
}

fn default_max_chars() -> usize {
	4_000
}

fn default_overlap_chars() -> usize {
	400
}

fn default_send_attempts() -> u32 {
	3
}

fn default_base_backoff_ms() -> u64 {
	500
}

fn default_max_backoff_ms() -> u64 {
	30_000
}

fn default_poll_interval_ms() -> u64 {
	500
}

fn default_consume_batch_size() -> usize {
	16
}

fn default_worker_concurrency() -> usize {
	10
}

fn default_max_redelivery() -> u32 {
	5
}

fn default_summary_threshold_chars() -> usize {
	2_500
}

fn default_summary_batch_size() -> usize {
	1
}

fn default_flush_interval_ms() -> u64 {
	5_000
}
