/// One broker-delivered message. Identity (`msg_id`) and the delivery
/// attempt count are owned by the broker; logical idempotence identity lives
/// inside the payload.
#[derive(Clone, Debug)]
pub struct Message {
	pub msg_id: String,
	pub topic: String,
	pub tag: String,
	pub payload: Vec<u8>,
	/// Number of completed delivery attempts before this one. Zero on first
	/// delivery.
	pub reconsume_times: u32,
}

/// Consumer-side verdict for a delivered batch.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ConsumeVerdict {
	/// The batch is consumed; the broker may discard it.
	Success,
	/// Redeliver the batch after a delay.
	RetryLater,
}
