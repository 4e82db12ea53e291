use std::{sync::Arc, time::Duration};

use serde::Serialize;

use crate::{Error, Producer, Result, backoff::backoff_for_attempt};

/// Publish wrapper used by every producer: serializes the payload and
/// retries a failed publish with capped exponential backoff before giving
/// up. Callers on the request path treat the returned error as non-fatal
/// (log and continue): broker unavailability must not add user-facing
/// latency, so a publish failure means the async side effect silently never
/// happens.
pub struct ReliableSender {
	producer: Arc<dyn Producer>,
	attempts: u32,
	base_backoff: Duration,
	max_backoff: Duration,
}
impl ReliableSender {
	pub fn new(producer: Arc<dyn Producer>, cfg: &sift_config::Mq) -> Self {
		Self {
			producer,
			attempts: cfg.send_attempts,
			base_backoff: Duration::from_millis(cfg.base_backoff_ms),
			max_backoff: Duration::from_millis(cfg.max_backoff_ms),
		}
	}

	/// Serializes `payload` as JSON and publishes it under (topic, tag). An
	/// empty tag means untagged.
	pub async fn send<T>(&self, topic: &str, tag: &str, payload: &T) -> Result<()>
	where
		T: Serialize + Sync,
	{
		let bytes = serde_json::to_vec(payload)?;
		let mut last_err = None;

		for attempt in 1..=self.attempts {
			match self.producer.publish(topic, tag, bytes.clone()).await {
				Ok(msg_id) => {
					tracing::debug!(msg_id = %msg_id, topic, tag, "Message published.");

					return Ok(());
				},
				Err(err) => {
					if attempt < self.attempts {
						tracing::warn!(
							attempt = attempt + 1,
							topic,
							error = %err,
							"Retrying to send message.",
						);
						tokio::time::sleep(backoff_for_attempt(
							attempt,
							self.base_backoff,
							self.max_backoff,
						))
						.await;
					}

					last_err = Some(err);
				},
			}
		}

		Err(Error::SendExhausted {
			topic: topic.to_string(),
			attempts: self.attempts,
			source: Box::new(last_err.expect("at least one attempt was made")),
		})
	}
}
