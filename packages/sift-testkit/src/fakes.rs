//! In-memory stand-ins for the external services. Each fake records enough
//! of what it saw for a test to assert on, and nothing more.

use std::{
	collections::BTreeMap,
	sync::{
		Mutex,
		atomic::{AtomicBool, AtomicUsize, Ordering},
	},
};

use async_trait::async_trait;
use sift_mq::{
	BatchCallback, ConsumeVerdict, DeadLetterSink, Message, Producer, PushConsumer,
};
use sift_providers::{
	embedding::Embedder, generation::Generator, object_store::ObjectStore,
};
use sift_storage::{
	models::ConversationMessage,
	store::{MessageStore, SummaryUpdate},
	vector::{RowFilter, ScoredChunk, VectorIndex, VectorRow},
};
use time::OffsetDateTime;
use uuid::Uuid;

fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
	mutex.lock().unwrap_or_else(|err| err.into_inner())
}

#[derive(Default)]
pub struct MemoryObjectStore {
	objects: Mutex<BTreeMap<String, Vec<u8>>>,
	deleted: Mutex<Vec<String>>,
}
impl MemoryObjectStore {
	pub fn with_object(self, key: &str, bytes: &[u8]) -> Self {
		lock(&self.objects).insert(key.to_string(), bytes.to_vec());

		self
	}

	pub fn insert(&self, key: &str, bytes: &[u8]) {
		lock(&self.objects).insert(key.to_string(), bytes.to_vec());
	}

	pub fn deleted_keys(&self) -> Vec<String> {
		lock(&self.deleted).clone()
	}
}
#[async_trait]
impl ObjectStore for MemoryObjectStore {
	async fn get(&self, key: &str) -> sift_providers::Result<Vec<u8>> {
		lock(&self.objects)
			.get(key)
			.cloned()
			.ok_or(sift_providers::Error::ObjectStore { key: key.to_string(), status: 404 })
	}

	async fn delete(&self, key: &str) -> sift_providers::Result<()> {
		lock(&self.objects).remove(key);
		lock(&self.deleted).push(key.to_string());

		Ok(())
	}

	async fn list(&self, prefix: &str) -> sift_providers::Result<Vec<String>> {
		Ok(lock(&self.objects).keys().filter(|k| k.starts_with(prefix)).cloned().collect())
	}
}

/// Deterministic embedder: the vector is a function of the text alone, so
/// re-embedding the same chunk yields the same vector. Records the size of
/// every batch it receives.
pub struct StubEmbedder {
	pub dimensions: usize,
	batch_sizes: Mutex<Vec<usize>>,
	fail: AtomicBool,
	// 1-based call number to fail on, 0 disables.
	fail_on_call: AtomicUsize,
	calls: AtomicUsize,
}
impl StubEmbedder {
	pub fn new(dimensions: usize) -> Self {
		Self {
			dimensions,
			batch_sizes: Mutex::new(Vec::new()),
			fail: AtomicBool::new(false),
			fail_on_call: AtomicUsize::new(0),
			calls: AtomicUsize::new(0),
		}
	}

	pub fn batch_sizes(&self) -> Vec<usize> {
		lock(&self.batch_sizes).clone()
	}

	pub fn fail_next(&self) {
		self.fail.store(true, Ordering::SeqCst);
	}

	pub fn fail_on_call(&self, call: usize) {
		self.fail_on_call.store(call, Ordering::SeqCst);
	}

	pub fn vector_for(&self, text: &str) -> Vec<f32> {
		let seed = text.bytes().fold(0_u32, |acc, b| acc.wrapping_mul(31).wrapping_add(b as u32));

		(0..self.dimensions)
			.map(|i| ((seed.wrapping_add(i as u32) % 1_000) as f32) / 1_000.)
			.collect()
	}
}
#[async_trait]
impl Embedder for StubEmbedder {
	async fn embed(&self, texts: &[String]) -> sift_providers::Result<Vec<Vec<f32>>> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;

		if self.fail.swap(false, Ordering::SeqCst)
			|| call == self.fail_on_call.load(Ordering::SeqCst)
		{
			return Err(sift_providers::Error::InvalidResponse {
				message: "Embedding backend unavailable.".to_string(),
			});
		}

		lock(&self.batch_sizes).push(texts.len());

		Ok(texts.iter().map(|t| self.vector_for(t)).collect())
	}
}

/// Replays scripted responses in order, then falls back to a fixed string.
#[derive(Default)]
pub struct ScriptedGenerator {
	responses: Mutex<Vec<String>>,
	prompts: Mutex<Vec<String>>,
}
impl ScriptedGenerator {
	pub fn with_response(self, response: &str) -> Self {
		lock(&self.responses).push(response.to_string());

		self
	}

	pub fn prompts(&self) -> Vec<String> {
		lock(&self.prompts).clone()
	}
}
#[async_trait]
impl Generator for ScriptedGenerator {
	async fn generate(&self, prompt: &str) -> sift_providers::Result<String> {
		lock(&self.prompts).push(prompt.to_string());

		let mut responses = lock(&self.responses);

		if responses.is_empty() {
			Ok("stub summary".to_string())
		} else {
			Ok(responses.remove(0))
		}
	}
}

#[derive(Default)]
pub struct MemoryVectorIndex {
	rows: Mutex<Vec<VectorRow>>,
}
impl MemoryVectorIndex {
	pub fn rows(&self) -> Vec<VectorRow> {
		lock(&self.rows).clone()
	}

	pub fn rows_matching(&self, filter: &RowFilter) -> Vec<VectorRow> {
		lock(&self.rows).iter().filter(|row| matches(row, filter)).cloned().collect()
	}
}

fn matches(row: &VectorRow, filter: &RowFilter) -> bool {
	row.tenant == filter.tenant
		&& filter.title.as_ref().is_none_or(|title| &row.title == title)
}

#[async_trait]
impl VectorIndex for MemoryVectorIndex {
	async fn upsert(&self, rows: Vec<VectorRow>) -> sift_storage::Result<()> {
		lock(&self.rows).extend(rows);

		Ok(())
	}

	async fn search(
		&self,
		_vector: Vec<f32>,
		k: u64,
		filter: &RowFilter,
	) -> sift_storage::Result<Vec<ScoredChunk>> {
		Ok(self
			.rows_matching(filter)
			.into_iter()
			.take(k as usize)
			.map(|row| ScoredChunk { text: row.text, score: 1. })
			.collect())
	}

	async fn delete_by_filter(&self, filter: &RowFilter) -> sift_storage::Result<()> {
		lock(&self.rows).retain(|row| !matches(row, filter));

		Ok(())
	}
}

#[derive(Default)]
pub struct MemoryMessageStore {
	messages: Mutex<BTreeMap<i64, ConversationMessage>>,
}
impl MemoryMessageStore {
	pub fn with_message(self, id: i64, role: &str, content: &str) -> Self {
		lock(&self.messages).insert(id, ConversationMessage {
			id,
			session_id: 1,
			role: role.to_string(),
			content: content.to_string(),
			summary: None,
			created_at: OffsetDateTime::now_utc(),
		});

		self
	}

	pub fn summary_of(&self, id: i64) -> Option<String> {
		lock(&self.messages).get(&id).and_then(|m| m.summary.clone())
	}
}
#[async_trait]
impl MessageStore for MemoryMessageStore {
	async fn message_by_id(&self, id: i64) -> sift_storage::Result<Option<ConversationMessage>> {
		Ok(lock(&self.messages).get(&id).cloned())
	}

	async fn update_summaries(&self, updates: &[SummaryUpdate]) -> sift_storage::Result<()> {
		let mut messages = lock(&self.messages);

		for update in updates {
			let Some(message) = messages.get_mut(&update.id) else {
				return Err(sift_storage::Error::NotFound(format!(
					"Conversation message {} not found.",
					update.id
				)));
			};

			message.summary = Some(update.summary.clone());
		}

		Ok(())
	}
}

struct BrokerSubscription {
	topic: String,
	tags: Vec<String>,
	callback: BatchCallback,
}

/// Broker fake with manual delivery. Published messages queue until the test
/// calls [`MemoryBroker::deliver_pending`]; a `RetryLater` verdict re-queues
/// the batch with its attempt counts bumped, mimicking redelivery.
#[derive(Default)]
pub struct MemoryBroker {
	queued: Mutex<Vec<Message>>,
	subscriptions: Mutex<Vec<BrokerSubscription>>,
	published: Mutex<Vec<(String, String)>>,
}
impl MemoryBroker {
	pub fn published_topics(&self) -> Vec<(String, String)> {
		lock(&self.published).clone()
	}

	pub fn queued_len(&self) -> usize {
		lock(&self.queued).len()
	}

	/// Delivers every queued message whose (topic, tag) has a subscriber.
	/// Returns the number of batches that came back `RetryLater`.
	pub async fn deliver_pending(&self) -> usize {
		let queued = std::mem::take(&mut *lock(&self.queued));
		// Snapshot the routes so no lock is held while callbacks run.
		let routes = lock(&self.subscriptions)
			.iter()
			.map(|s| (s.topic.clone(), s.tags.clone(), s.callback.clone()))
			.collect::<Vec<_>>();
		let mut retried = 0;
		let mut leftovers = Vec::new();

		for (topic, tags, callback) in &routes {
			let batch = queued
				.iter()
				.filter(|m| &m.topic == topic && tags.contains(&m.tag))
				.cloned()
				.collect::<Vec<_>>();

			if batch.is_empty() {
				continue;
			}
			if callback(batch.clone()).await == ConsumeVerdict::RetryLater {
				retried += 1;

				leftovers.extend(batch.into_iter().map(|mut m| {
					m.reconsume_times += 1;

					m
				}));
			}
		}

		let routable =
			|m: &Message| routes.iter().any(|(topic, tags, _)| topic == &m.topic && tags.contains(&m.tag));

		leftovers.extend(queued.into_iter().filter(|m| !routable(m)));
		lock(&self.queued).extend(leftovers);

		retried
	}
}
#[async_trait]
impl Producer for MemoryBroker {
	async fn publish(&self, topic: &str, tag: &str, payload: Vec<u8>) -> sift_mq::Result<String> {
		let msg_id = Uuid::new_v4().to_string();

		lock(&self.published).push((topic.to_string(), tag.to_string()));
		lock(&self.queued).push(Message {
			msg_id: msg_id.clone(),
			topic: topic.to_string(),
			tag: tag.to_string(),
			payload,
			reconsume_times: 0,
		});

		Ok(msg_id)
	}
}
#[async_trait]
impl PushConsumer for MemoryBroker {
	async fn subscribe(
		&self,
		topic: &str,
		expression: &str,
		callback: BatchCallback,
	) -> sift_mq::Result<()> {
		let mut subscriptions = lock(&self.subscriptions);

		if subscriptions.iter().any(|s| s.topic == topic) {
			return Err(sift_mq::Error::AlreadySubscribed {
				group: "memory".to_string(),
				topic: topic.to_string(),
			});
		}

		subscriptions.push(BrokerSubscription {
			topic: topic.to_string(),
			tags: expression.split(" || ").map(str::to_string).collect(),
			callback,
		});

		Ok(())
	}

	async fn start(&self) -> sift_mq::Result<()> {
		Ok(())
	}

	async fn shutdown(&self) -> sift_mq::Result<()> {
		Ok(())
	}
}

#[derive(Default)]
pub struct RecordingDeadLetter {
	seen: Mutex<Vec<(Message, String)>>,
}
impl RecordingDeadLetter {
	pub fn seen(&self) -> Vec<(Message, String)> {
		lock(&self.seen).clone()
	}
}
#[async_trait]
impl DeadLetterSink for RecordingDeadLetter {
	async fn sink(&self, msg: &Message, reason: &str) -> sift_mq::Result<()> {
		lock(&self.seen).push((msg.clone(), reason.to_string()));

		Ok(())
	}
}
