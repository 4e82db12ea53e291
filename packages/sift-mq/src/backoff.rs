use std::time::Duration;

/// Capped exponential backoff: `base * 2^(attempt-1)`, never above `max`.
/// Attempt numbering starts at 1.
pub fn backoff_for_attempt(attempt: u32, base: Duration, max: Duration) -> Duration {
	let exp = attempt.max(1).saturating_sub(1).min(16);
	let scaled = base.saturating_mul(1_u32 << exp);

	scaled.min(max)
}
