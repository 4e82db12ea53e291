//! Postgres-backed broker. Messages live in `mq_messages`; consumers claim
//! batches with `FOR UPDATE SKIP LOCKED` so concurrent pollers never hand the
//! same message to two callbacks at once.

use std::sync::Arc;

use async_trait::async_trait;
use sift_mq::{
	BatchCallback, ConsumeVerdict, DeadLetterSink, Message, Producer, PushConsumer,
	backoff::backoff_for_attempt,
};
use sqlx::PgPool;
use time::{Duration as Lease, OffsetDateTime};
use tokio::{
	sync::{Mutex, watch},
	task::JoinHandle,
	time::{Duration, sleep},
};
use uuid::Uuid;

use crate::models::BrokerMessage;

const STATUS_PENDING: &str = "PENDING";
const STATUS_FAILED: &str = "FAILED";
const STATUS_DONE: &str = "DONE";

/// How long a claimed batch stays invisible to other pollers. A crashed
/// consumer's messages become claimable again once the lease lapses.
const CLAIM_LEASE_SECS: i64 = 30;

fn backend(err: impl std::error::Error + Send + Sync + 'static) -> sift_mq::Error {
	sift_mq::Error::Backend(Box::new(err))
}

#[derive(Clone)]
pub struct PgProducer {
	pool: PgPool,
}
impl PgProducer {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
#[async_trait]
impl Producer for PgProducer {
	async fn publish(&self, topic: &str, tag: &str, payload: Vec<u8>) -> sift_mq::Result<String> {
		let msg_id = Uuid::new_v4();

		sqlx::query(
			"\
INSERT INTO mq_messages (msg_id, topic, tag, payload)
VALUES ($1, $2, $3, $4)",
		)
		.bind(msg_id)
		.bind(topic)
		.bind(tag)
		.bind(payload)
		.execute(&self.pool)
		.await
		.map_err(backend)?;

		Ok(msg_id.to_string())
	}
}

struct Subscription {
	topic: String,
	tags: Vec<String>,
	callback: BatchCallback,
}

struct ConsumerInner {
	pool: PgPool,
	group: String,
	cfg: sift_config::Mq,
	subscriptions: Mutex<Vec<Subscription>>,
	shutdown_rx: watch::Receiver<bool>,
}

/// Push consumer built on polling. Each subscription gets
/// `worker_concurrency` pollers; a poller claims up to `consume_batch_size`
/// due messages, delivers them to the callback, and settles the whole batch
/// on the returned verdict.
pub struct PgConsumer {
	inner: Arc<ConsumerInner>,
	shutdown_tx: watch::Sender<bool>,
	tasks: Mutex<Vec<JoinHandle<()>>>,
}
impl PgConsumer {
	pub fn new(pool: PgPool, group: &str, cfg: &sift_config::Mq) -> Self {
		let (shutdown_tx, shutdown_rx) = watch::channel(false);

		Self {
			inner: Arc::new(ConsumerInner {
				pool,
				group: group.to_string(),
				cfg: cfg.clone(),
				subscriptions: Mutex::new(Vec::new()),
				shutdown_rx,
			}),
			shutdown_tx,
			tasks: Mutex::new(Vec::new()),
		}
	}
}
#[async_trait]
impl PushConsumer for PgConsumer {
	async fn subscribe(
		&self,
		topic: &str,
		expression: &str,
		callback: BatchCallback,
	) -> sift_mq::Result<()> {
		let mut subscriptions = self.inner.subscriptions.lock().await;

		if subscriptions.iter().any(|s| s.topic == topic) {
			return Err(sift_mq::Error::AlreadySubscribed {
				group: self.inner.group.clone(),
				topic: topic.to_string(),
			});
		}

		let tags = expression.split(" || ").map(str::to_string).collect::<Vec<_>>();

		tracing::info!(
			group = %self.inner.group,
			topic = %topic,
			expression = %expression,
			"Subscribed consumer group.",
		);

		subscriptions.push(Subscription { topic: topic.to_string(), tags, callback });

		Ok(())
	}

	async fn start(&self) -> sift_mq::Result<()> {
		let subscriptions = self.inner.subscriptions.lock().await;
		let mut tasks = self.tasks.lock().await;

		for subscription in subscriptions.iter() {
			for _ in 0..self.inner.cfg.worker_concurrency {
				let inner = self.inner.clone();
				let topic = subscription.topic.clone();
				let tags = subscription.tags.clone();
				let callback = subscription.callback.clone();

				tasks.push(tokio::spawn(async move {
					poll_loop(inner, topic, tags, callback).await;
				}));
			}
		}

		Ok(())
	}

	async fn shutdown(&self) -> sift_mq::Result<()> {
		let _ = self.shutdown_tx.send(true);

		let mut tasks = self.tasks.lock().await;

		for task in tasks.drain(..) {
			let _ = task.await;
		}

		tracing::info!(group = %self.inner.group, "Consumer group stopped.");

		Ok(())
	}
}

async fn poll_loop(inner: Arc<ConsumerInner>, topic: String, tags: Vec<String>, callback: BatchCallback) {
	let mut shutdown_rx = inner.shutdown_rx.clone();
	let idle = Duration::from_millis(inner.cfg.poll_interval_ms);

	loop {
		if *shutdown_rx.borrow() {
			return;
		}

		let delivered = match deliver_once(&inner, &topic, &tags, &callback).await {
			Ok(delivered) => delivered,
			Err(err) => {
				tracing::error!(topic = %topic, error = %err, "Broker poll failed.");

				false
			},
		};

		if !delivered {
			tokio::select! {
				_ = sleep(idle) => {},
				_ = shutdown_rx.changed() => {},
			}
		}
	}
}

/// Claims and delivers one batch. Returns `false` when no message was due,
/// which tells the poll loop to back off for one interval.
async fn deliver_once(
	inner: &ConsumerInner,
	topic: &str,
	tags: &[String],
	callback: &BatchCallback,
) -> Result<bool, sqlx::Error> {
	let now = OffsetDateTime::now_utc();
	let mut tx = inner.pool.begin().await?;
	let claimed = sqlx::query_as::<_, BrokerMessage>(
		"\
SELECT * FROM mq_messages
WHERE topic = $1 AND tag = ANY($2) AND status IN ($3, $4) AND available_at <= $5
ORDER BY available_at
LIMIT $6
FOR UPDATE SKIP LOCKED",
	)
	.bind(topic)
	.bind(tags)
	.bind(STATUS_PENDING)
	.bind(STATUS_FAILED)
	.bind(now)
	.bind(inner.cfg.consume_batch_size as i64)
	.fetch_all(&mut *tx)
	.await?;

	if claimed.is_empty() {
		tx.commit().await?;

		return Ok(false);
	}

	let ids = claimed.iter().map(|m| m.msg_id).collect::<Vec<_>>();

	sqlx::query(
		"UPDATE mq_messages SET available_at = $1, updated_at = $2 WHERE msg_id = ANY($3)",
	)
	.bind(now + Lease::seconds(CLAIM_LEASE_SECS))
	.bind(now)
	.bind(&ids)
	.execute(&mut *tx)
	.await?;
	tx.commit().await?;

	let batch = claimed
		.iter()
		.map(|m| Message {
			msg_id: m.msg_id.to_string(),
			topic: m.topic.clone(),
			tag: m.tag.clone(),
			payload: m.payload.clone(),
			reconsume_times: m.attempts.max(0) as u32,
		})
		.collect::<Vec<_>>();
	let verdict = (callback)(batch).await;
	let now = OffsetDateTime::now_utc();

	match verdict {
		ConsumeVerdict::Success => {
			sqlx::query(
				"UPDATE mq_messages SET status = $1, updated_at = $2 WHERE msg_id = ANY($3)",
			)
			.bind(STATUS_DONE)
			.bind(now)
			.bind(&ids)
			.execute(&inner.pool)
			.await?;
		},
		ConsumeVerdict::RetryLater => {
			// Backoff grows with the per-message attempt count, so a batch of
			// mixed ages fans back out instead of retrying in lockstep.
			for msg in &claimed {
				let attempt = msg.attempts.max(0) as u32 + 1;
				let delay = backoff_for_attempt(
					attempt,
					Duration::from_millis(inner.cfg.base_backoff_ms),
					Duration::from_millis(inner.cfg.max_backoff_ms),
				);

				sqlx::query(
					"\
UPDATE mq_messages
SET status = $1, attempts = attempts + 1, available_at = $2, updated_at = $3
WHERE msg_id = $4",
				)
				.bind(STATUS_FAILED)
				.bind(now + Lease::milliseconds(delay.as_millis() as i64))
				.bind(now)
				.bind(msg.msg_id)
				.execute(&inner.pool)
				.await?;
			}
		},
	}

	Ok(true)
}

/// Parks poisoned messages in `dead_letters`. Insertion is idempotent so a
/// whole-batch retry that replays the sink call cannot double-record.
#[derive(Clone)]
pub struct PgDeadLetter {
	pool: PgPool,
}
impl PgDeadLetter {
	pub fn new(pool: PgPool) -> Self {
		Self { pool }
	}
}
#[async_trait]
impl DeadLetterSink for PgDeadLetter {
	async fn sink(&self, msg: &Message, reason: &str) -> sift_mq::Result<()> {
		let msg_id = Uuid::parse_str(&msg.msg_id).map_err(backend)?;

		sqlx::query(
			"\
INSERT INTO dead_letters (msg_id, topic, tag, payload, attempts, reason)
VALUES ($1, $2, $3, $4, $5, $6)
ON CONFLICT (msg_id) DO NOTHING",
		)
		.bind(msg_id)
		.bind(&msg.topic)
		.bind(&msg.tag)
		.bind(&msg.payload)
		.bind(msg.reconsume_times as i32)
		.bind(reason)
		.execute(&self.pool)
		.await
		.map_err(backend)?;

		Ok(())
	}
}
