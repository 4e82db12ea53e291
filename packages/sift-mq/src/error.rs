pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxedError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	SerdeJson(#[from] serde_json::Error),
	#[error("Failed to send message to topic {topic} after {attempts} attempts.")]
	SendExhausted {
		topic: String,
		attempts: u32,
		#[source]
		source: BoxedError,
	},
	#[error("Broker backend error: {0}")]
	Backend(#[source] BoxedError),
	#[error("Consumer group {group} is already subscribed to topic {topic}.")]
	AlreadySubscribed { group: String, topic: String },
}
