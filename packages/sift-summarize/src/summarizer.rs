use std::{
	sync::{Arc, Mutex, MutexGuard},
	time::{Duration, Instant},
};

use async_trait::async_trait;
use sift_domain::events::SummarizeEvent;
use sift_mq::{Handler, HandlerResult, Message};
use sift_providers::Generator;
use sift_storage::store::{MessageStore, SummaryUpdate};

use crate::Result;

const PROMPT_TEMPLATE: &str = include_str!("../prompts/summarization.txt");

struct Pending {
	updates: Vec<SummaryUpdate>,
	oldest: Option<Instant>,
}

/// Batched conversation summarizer. Long messages are summarized one at a
/// time; finished summaries accumulate in a pending batch that is written
/// back in a single transaction once it is full or old enough.
///
/// A message below the length threshold is skipped no matter its role.
/// Fetch and generation failures skip that id; the rest of the event still
/// runs. Only a malformed payload fails the delivery.
pub struct Summarizer {
	store: Arc<dyn MessageStore>,
	generator: Arc<dyn Generator>,
	threshold_chars: usize,
	batch_size: usize,
	flush_after: Duration,
	pending: Mutex<Pending>,
}
impl Summarizer {
	pub fn new(
		store: Arc<dyn MessageStore>,
		generator: Arc<dyn Generator>,
		cfg: &sift_config::Summarize,
	) -> Self {
		Self {
			store,
			generator,
			threshold_chars: cfg.threshold_chars,
			batch_size: cfg.batch_size,
			flush_after: Duration::from_millis(cfg.flush_interval_ms),
			pending: Mutex::new(Pending { updates: Vec::new(), oldest: None }),
		}
	}

	pub async fn process(&self, event: &SummarizeEvent) -> Result<()> {
		for raw_id in &event.msg_ids {
			let id = *raw_id as i64;
			let message = match self.store.message_by_id(id).await {
				Ok(Some(message)) => message,
				Ok(None) => {
					tracing::warn!(msg_id = id, "Conversation message not found, skipping.");

					continue;
				},
				Err(err) => {
					tracing::warn!(msg_id = id, error = %err, "Failed to fetch message, skipping.");

					continue;
				},
			};

			if message.content.chars().count() < self.threshold_chars {
				continue;
			}

			let prompt = render_prompt(&message.role, &message.content);
			let summary = match self.generator.generate(&prompt).await {
				Ok(summary) => summary,
				Err(err) => {
					tracing::warn!(msg_id = id, error = %err, "Failed to summarize message, skipping.");

					continue;
				},
			};
			let full = {
				let mut pending = self.lock_pending();

				if pending.updates.is_empty() {
					pending.oldest = Some(Instant::now());
				}

				pending.updates.push(SummaryUpdate { id, summary });

				pending.updates.len() >= self.batch_size
			};

			if full {
				self.flush().await;
			}
		}

		Ok(())
	}

	/// Flushes a batch that has been pending longer than the configured
	/// interval. Called from the worker's periodic tick.
	pub async fn flush_due(&self) {
		let due = {
			let pending = self.lock_pending();

			!pending.updates.is_empty()
				&& pending.oldest.is_some_and(|oldest| oldest.elapsed() >= self.flush_after)
		};

		if due {
			self.flush().await;
		}
	}

	/// Flushes whatever is pending. Called once at shutdown.
	pub async fn drain(&self) {
		self.flush().await;
	}

	async fn flush(&self) {
		let updates = {
			let mut pending = self.lock_pending();

			pending.oldest = None;

			std::mem::take(&mut pending.updates)
		};

		if updates.is_empty() {
			return;
		}
		// A failed flush drops this copy; the rows keep their previous
		// summaries and the conversation stays readable.
		if let Err(err) = self.store.update_summaries(&updates).await {
			tracing::error!(count = updates.len(), error = %err, "Failed to flush summaries.");
		} else {
			tracing::info!(count = updates.len(), "Flushed summaries.");
		}
	}

	fn lock_pending(&self) -> MutexGuard<'_, Pending> {
		self.pending.lock().unwrap_or_else(|err| err.into_inner())
	}
}
#[async_trait]
impl Handler for Summarizer {
	async fn handle(&self, msg: &Message) -> HandlerResult {
		let event: SummarizeEvent =
			serde_json::from_slice(&msg.payload).map_err(crate::Error::from)?;

		self.process(&event).await.map_err(Into::into)
	}
}

fn render_prompt(role: &str, content: &str) -> String {
	PROMPT_TEMPLATE.replace("{role}", role).replace("{content}", content)
}

#[cfg(test)]
mod tests {
	use sift_testkit::fakes::{MemoryMessageStore, ScriptedGenerator};

	use super::*;

	fn cfg(batch_size: usize, flush_interval_ms: u64) -> sift_config::Summarize {
		sift_config::Summarize { threshold_chars: 2_500, batch_size, flush_interval_ms }
	}

	fn event(ids: &[u64]) -> SummarizeEvent {
		SummarizeEvent { msg_ids: ids.to_vec() }
	}

	fn long_text() -> String {
		"x".repeat(3_000)
	}

	#[tokio::test]
	async fn summarizes_and_flushes_a_long_message() {
		let store =
			Arc::new(MemoryMessageStore::default().with_message(42, "assistant", &long_text()));
		let generator =
			Arc::new(ScriptedGenerator::default().with_response("compact recap"));
		let summarizer = Summarizer::new(store.clone(), generator.clone(), &cfg(1, 5_000));

		summarizer.process(&event(&[42])).await.unwrap();

		assert_eq!(store.summary_of(42), Some("compact recap".to_string()));
		assert!(generator.prompts()[0].contains("assistant"));
	}

	#[tokio::test]
	async fn short_messages_are_skipped_for_every_role() {
		let store = Arc::new(
			MemoryMessageStore::default()
				.with_message(1, "user", "short question")
				.with_message(2, "assistant", "short answer")
				.with_message(3, "system", "short note"),
		);
		let generator = Arc::new(ScriptedGenerator::default());
		let summarizer = Summarizer::new(store.clone(), generator.clone(), &cfg(1, 5_000));

		summarizer.process(&event(&[1, 2, 3])).await.unwrap();

		assert!(generator.prompts().is_empty());
		assert_eq!(store.summary_of(1), None);
		assert_eq!(store.summary_of(2), None);
		assert_eq!(store.summary_of(3), None);
	}

	#[tokio::test]
	async fn missing_message_is_skipped_not_fatal() {
		let store =
			Arc::new(MemoryMessageStore::default().with_message(2, "user", &long_text()));
		let summarizer =
			Summarizer::new(store.clone(), Arc::new(ScriptedGenerator::default()), &cfg(1, 5_000));

		summarizer.process(&event(&[1, 2])).await.unwrap();

		assert!(store.summary_of(2).is_some());
	}

	#[tokio::test]
	async fn batch_waits_for_the_configured_size() {
		let store = Arc::new(
			MemoryMessageStore::default()
				.with_message(1, "user", &long_text())
				.with_message(2, "user", &long_text()),
		);
		let summarizer =
			Summarizer::new(store.clone(), Arc::new(ScriptedGenerator::default()), &cfg(2, 60_000));

		summarizer.process(&event(&[1])).await.unwrap();
		assert_eq!(store.summary_of(1), None);

		summarizer.process(&event(&[2])).await.unwrap();
		assert!(store.summary_of(1).is_some());
		assert!(store.summary_of(2).is_some());
	}

	#[tokio::test]
	async fn deadline_flushes_a_partial_batch() {
		let store =
			Arc::new(MemoryMessageStore::default().with_message(1, "user", &long_text()));
		let summarizer =
			Summarizer::new(store.clone(), Arc::new(ScriptedGenerator::default()), &cfg(10, 0));

		summarizer.process(&event(&[1])).await.unwrap();
		assert_eq!(store.summary_of(1), None);

		summarizer.flush_due().await;
		assert!(store.summary_of(1).is_some());
	}

	#[tokio::test]
	async fn drain_flushes_whatever_is_pending() {
		let store =
			Arc::new(MemoryMessageStore::default().with_message(1, "user", &long_text()));
		let summarizer =
			Summarizer::new(store.clone(), Arc::new(ScriptedGenerator::default()), &cfg(10, 60_000));

		summarizer.process(&event(&[1])).await.unwrap();
		summarizer.drain().await;

		assert!(store.summary_of(1).is_some());
	}

	#[tokio::test]
	async fn malformed_payload_fails_the_delivery() {
		let store = Arc::new(MemoryMessageStore::default());
		let summarizer =
			Summarizer::new(store, Arc::new(ScriptedGenerator::default()), &cfg(1, 5_000));
		let msg = Message {
			msg_id: "m-1".to_string(),
			topic: sift_mq::TOPIC_AGENT_CONTEXT.to_string(),
			tag: sift_mq::TAG_SUMMARIZE.to_string(),
			payload: b"not json".to_vec(),
			reconsume_times: 0,
		};

		assert!(summarizer.handle(&msg).await.is_err());
	}
}
