use std::{future::Future, pin::Pin, sync::Arc};

use async_trait::async_trait;

use crate::{ConsumeVerdict, Message, Result};

pub type ConsumeFuture = Pin<Box<dyn Future<Output = ConsumeVerdict> + Send>>;

/// Invoked by the broker with each delivered batch. The returned verdict
/// applies to the whole batch.
pub type BatchCallback = Arc<dyn Fn(Vec<Message>) -> ConsumeFuture + Send + Sync>;

/// Producer half of the broker boundary. At-least-once: a publish that
/// returns `Ok` is durable, but consumers may still see redeliveries.
#[async_trait]
pub trait Producer: Send + Sync {
	/// Publishes `payload` onto `topic`. An empty `tag` means untagged.
	/// Returns the broker-assigned message id.
	async fn publish(&self, topic: &str, tag: &str, payload: Vec<u8>) -> Result<String>;
}

/// Consumer half of the broker boundary: push delivery to a consumer group.
/// `expression` is a tag filter, tags joined by `" || "`.
#[async_trait]
pub trait PushConsumer: Send + Sync {
	async fn subscribe(&self, topic: &str, expression: &str, callback: BatchCallback)
	-> Result<()>;

	/// Begins delivering batches to registered callbacks.
	async fn start(&self) -> Result<()>;

	/// Stops delivery. In-flight handler invocations run to completion.
	async fn shutdown(&self) -> Result<()>;
}
