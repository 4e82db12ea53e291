use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;

use crate::{BoxedError, ConsumeVerdict, Message, PushConsumer, Result};

pub type HandlerResult = std::result::Result<(), BoxedError>;

/// A logical consumer for one (topic, tag) route. Handlers must be
/// idempotent: delivery is at-least-once, a whole-batch retry redelivers
/// messages that already succeeded, and redelivery can overlap with a
/// still-in-flight earlier attempt.
#[async_trait]
pub trait Handler: Send + Sync {
	async fn handle(&self, msg: &Message) -> HandlerResult;
}

/// Receives messages whose delivery attempt count reached the redelivery
/// ceiling, instead of another redelivery.
#[async_trait]
pub trait DeadLetterSink: Send + Sync {
	async fn sink(&self, msg: &Message, reason: &str) -> Result<()>;
}

struct TopicRouter {
	handlers: BTreeMap<String, Arc<dyn Handler>>,
}

/// Routes broker batches to registered handlers by (topic, tag).
///
/// Built once at startup: `register` every route, then `bind` to a consumer
/// group, which freezes the table. One dispatcher binds one consumer group;
/// the set of registered tags per topic becomes the group's subscription
/// filter expression.
pub struct Dispatcher {
	routes: BTreeMap<String, TopicRouter>,
	max_redelivery: u32,
	dead_letter: Option<Arc<dyn DeadLetterSink>>,
}
impl Dispatcher {
	pub fn new(max_redelivery: u32) -> Self {
		Self { routes: BTreeMap::new(), max_redelivery, dead_letter: None }
	}

	pub fn with_dead_letter(mut self, sink: Arc<dyn DeadLetterSink>) -> Self {
		self.dead_letter = Some(sink);

		self
	}

	/// Registers `handler` for (topic, tag). The last registration for a
	/// given pair wins. Must be called before [`Self::bind`].
	pub fn register(&mut self, topic: &str, tag: &str, handler: Arc<dyn Handler>) {
		self.routes
			.entry(topic.to_string())
			.or_insert_with(|| TopicRouter { handlers: BTreeMap::new() })
			.handlers
			.insert(tag.to_string(), handler);
	}

	/// Subscribes `consumer` once per registered topic, with the topic's tags
	/// joined into a single filter expression. Consumes the dispatcher; the
	/// routing table is immutable from here on.
	pub async fn bind(self, consumer: &dyn PushConsumer) -> Result<Arc<Self>> {
		let dispatcher = Arc::new(self);

		for (topic, router) in &dispatcher.routes {
			let tags: Vec<&str> = router.handlers.keys().map(String::as_str).collect();
			let expression = tags.join(" || ");
			let callback_dispatcher = dispatcher.clone();
			let callback_topic = topic.clone();
			let callback: crate::BatchCallback = Arc::new(move |msgs| {
				let dispatcher = callback_dispatcher.clone();
				let topic = callback_topic.clone();

				Box::pin(async move { dispatcher.dispatch_batch(&topic, msgs).await })
			});

			consumer.subscribe(topic, &expression, callback).await?;
		}

		Ok(dispatcher)
	}

	/// Walks the batch in order. An unknown tag is logged and skipped. The
	/// first handler error stops the batch and returns `RetryLater` for all
	/// of it, so messages that already succeeded will be redelivered.
	async fn dispatch_batch(&self, topic: &str, msgs: Vec<Message>) -> ConsumeVerdict {
		let Some(router) = self.routes.get(topic) else {
			tracing::warn!(topic, "Batch delivered for a topic with no routes.");

			return ConsumeVerdict::Success;
		};

		for msg in &msgs {
			let Some(handler) = router.handlers.get(&msg.tag) else {
				tracing::warn!(
					msg_id = %msg.msg_id,
					topic = %msg.topic,
					tag = %msg.tag,
					"No handler for tag.",
				);

				continue;
			};

			if msg.reconsume_times >= self.max_redelivery {
				if let Err(err) = self.dead_letter_exceeded(msg).await {
					tracing::error!(
						error = %err,
						msg_id = %msg.msg_id,
						"Dead-letter sink failed. Requesting redelivery.",
					);

					return ConsumeVerdict::RetryLater;
				}

				continue;
			}

			if let Err(err) = handler.handle(msg).await {
				tracing::error!(
					error = %err,
					msg_id = %msg.msg_id,
					topic = %msg.topic,
					tag = %msg.tag,
					"Handle message failed.",
				);

				return ConsumeVerdict::RetryLater;
			}
		}

		ConsumeVerdict::Success
	}

	async fn dead_letter_exceeded(&self, msg: &Message) -> Result<()> {
		let reason = format!(
			"Redelivery ceiling reached after {} delivery attempts.",
			msg.reconsume_times
		);

		tracing::error!(
			msg_id = %msg.msg_id,
			topic = %msg.topic,
			tag = %msg.tag,
			attempts = msg.reconsume_times,
			"Message exceeded the redelivery ceiling.",
		);

		match &self.dead_letter {
			Some(sink) => sink.sink(msg, &reason).await,
			None => Ok(()),
		}
	}
}

#[cfg(test)]
mod tests {
	use std::sync::Mutex;

	use super::*;
	use crate::BatchCallback;

	#[derive(Default)]
	struct RecordingHandler {
		seen: Mutex<Vec<String>>,
	}
	#[async_trait]
	impl Handler for RecordingHandler {
		async fn handle(&self, msg: &Message) -> HandlerResult {
			self.seen.lock().unwrap().push(msg.msg_id.clone());

			Ok(())
		}
	}

	struct FailingHandler;
	#[async_trait]
	impl Handler for FailingHandler {
		async fn handle(&self, _msg: &Message) -> HandlerResult {
			Err("boom".into())
		}
	}

	#[derive(Default)]
	struct RecordingSink {
		seen: Mutex<Vec<String>>,
	}
	#[async_trait]
	impl DeadLetterSink for RecordingSink {
		async fn sink(&self, msg: &Message, _reason: &str) -> Result<()> {
			self.seen.lock().unwrap().push(msg.msg_id.clone());

			Ok(())
		}
	}

	/// Captures subscriptions so a test can drive the batch callback by hand.
	#[derive(Default)]
	struct CapturingConsumer {
		subscriptions: Mutex<Vec<(String, String, BatchCallback)>>,
	}
	impl CapturingConsumer {
		fn callback_for(&self, topic: &str) -> BatchCallback {
			let subscriptions = self.subscriptions.lock().unwrap();
			let (_, _, callback) = subscriptions
				.iter()
				.find(|(subscribed, _, _)| subscribed == topic)
				.expect("topic not subscribed");

			callback.clone()
		}

		fn expression_for(&self, topic: &str) -> String {
			let subscriptions = self.subscriptions.lock().unwrap();

			subscriptions
				.iter()
				.find(|(subscribed, _, _)| subscribed == topic)
				.map(|(_, expression, _)| expression.clone())
				.expect("topic not subscribed")
		}
	}
	#[async_trait]
	impl PushConsumer for CapturingConsumer {
		async fn subscribe(
			&self,
			topic: &str,
			expression: &str,
			callback: BatchCallback,
		) -> Result<()> {
			self.subscriptions.lock().unwrap().push((
				topic.to_string(),
				expression.to_string(),
				callback,
			));

			Ok(())
		}

		async fn start(&self) -> Result<()> {
			Ok(())
		}

		async fn shutdown(&self) -> Result<()> {
			Ok(())
		}
	}

	fn message(msg_id: &str, topic: &str, tag: &str) -> Message {
		Message {
			msg_id: msg_id.to_string(),
			topic: topic.to_string(),
			tag: tag.to_string(),
			payload: Vec::new(),
			reconsume_times: 0,
		}
	}

	#[tokio::test]
	async fn dispatches_to_the_registered_handler_only() {
		let etl = Arc::new(RecordingHandler::default());
		let delete = Arc::new(RecordingHandler::default());
		let mut dispatcher = Dispatcher::new(5);

		dispatcher.register("topic_kb", "tag_etl", etl.clone());
		dispatcher.register("topic_kb", "tag_delete", delete.clone());

		let consumer = CapturingConsumer::default();
		let _bound = dispatcher.bind(&consumer).await.unwrap();
		let callback = consumer.callback_for("topic_kb");
		let verdict = callback(vec![message("m1", "topic_kb", "tag_etl")]).await;

		assert_eq!(verdict, ConsumeVerdict::Success);
		assert_eq!(*etl.seen.lock().unwrap(), vec!["m1".to_string()]);
		assert!(delete.seen.lock().unwrap().is_empty());
	}

	#[tokio::test]
	async fn joins_topic_tags_into_one_expression() {
		let mut dispatcher = Dispatcher::new(5);

		dispatcher.register("topic_kb", "tag_etl", Arc::new(RecordingHandler::default()));
		dispatcher.register("topic_kb", "tag_delete", Arc::new(RecordingHandler::default()));

		let consumer = CapturingConsumer::default();
		let _bound = dispatcher.bind(&consumer).await.unwrap();

		assert_eq!(consumer.expression_for("topic_kb"), "tag_delete || tag_etl");
	}

	#[tokio::test]
	async fn unknown_tag_is_skipped_without_failing_the_batch() {
		let etl = Arc::new(RecordingHandler::default());
		let mut dispatcher = Dispatcher::new(5);

		dispatcher.register("topic_kb", "tag_etl", etl.clone());

		let consumer = CapturingConsumer::default();
		let _bound = dispatcher.bind(&consumer).await.unwrap();
		let callback = consumer.callback_for("topic_kb");
		let verdict = callback(vec![
			message("m1", "topic_kb", "tag_unknown"),
			message("m2", "topic_kb", "tag_etl"),
		])
		.await;

		assert_eq!(verdict, ConsumeVerdict::Success);
		assert_eq!(*etl.seen.lock().unwrap(), vec!["m2".to_string()]);
	}

	#[tokio::test]
	async fn first_handler_error_retries_the_whole_batch() {
		let etl = Arc::new(RecordingHandler::default());
		let mut dispatcher = Dispatcher::new(5);

		dispatcher.register("topic_kb", "tag_etl", etl.clone());
		dispatcher.register("topic_kb", "tag_delete", Arc::new(FailingHandler));

		let consumer = CapturingConsumer::default();
		let _bound = dispatcher.bind(&consumer).await.unwrap();
		let callback = consumer.callback_for("topic_kb");
		let verdict = callback(vec![
			message("m1", "topic_kb", "tag_etl"),
			message("m2", "topic_kb", "tag_delete"),
			message("m3", "topic_kb", "tag_etl"),
		])
		.await;

		// The failure stops the batch: m3 is not attempted, and m1 will be
		// redelivered even though it succeeded.
		assert_eq!(verdict, ConsumeVerdict::RetryLater);
		assert_eq!(*etl.seen.lock().unwrap(), vec!["m1".to_string()]);
	}

	#[tokio::test]
	async fn last_registration_for_a_route_wins() {
		let first = Arc::new(RecordingHandler::default());
		let second = Arc::new(RecordingHandler::default());
		let mut dispatcher = Dispatcher::new(5);

		dispatcher.register("topic_kb", "tag_etl", first.clone());
		dispatcher.register("topic_kb", "tag_etl", second.clone());

		let consumer = CapturingConsumer::default();
		let _bound = dispatcher.bind(&consumer).await.unwrap();
		let callback = consumer.callback_for("topic_kb");

		callback(vec![message("m1", "topic_kb", "tag_etl")]).await;

		assert!(first.seen.lock().unwrap().is_empty());
		assert_eq!(*second.seen.lock().unwrap(), vec!["m1".to_string()]);
	}

	#[tokio::test]
	async fn ceiling_routes_to_dead_letter_instead_of_handler() {
		let etl = Arc::new(RecordingHandler::default());
		let sink = Arc::new(RecordingSink::default());
		let mut dispatcher = Dispatcher::new(3);

		dispatcher.register("topic_kb", "tag_etl", etl.clone());

		let dispatcher = dispatcher.with_dead_letter(sink.clone());
		let consumer = CapturingConsumer::default();
		let _bound = dispatcher.bind(&consumer).await.unwrap();
		let callback = consumer.callback_for("topic_kb");
		let mut poisoned = message("m1", "topic_kb", "tag_etl");

		poisoned.reconsume_times = 3;

		let verdict = callback(vec![poisoned, message("m2", "topic_kb", "tag_etl")]).await;

		assert_eq!(verdict, ConsumeVerdict::Success);
		assert_eq!(*sink.seen.lock().unwrap(), vec!["m1".to_string()]);
		assert_eq!(*etl.seen.lock().unwrap(), vec!["m2".to_string()]);
	}
}
