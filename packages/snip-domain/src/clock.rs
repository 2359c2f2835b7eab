use std::sync::atomic::{AtomicI64, Ordering};

use time::OffsetDateTime;

pub fn now_millis() -> i64 {
	(OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

/// Timestamp for a mutation of a record last touched at `previous`. Always greater than
/// `previous`, even when the wall clock has not advanced or has gone backwards.
pub fn next_updated_at(previous: i64, now: i64) -> i64 {
	now.max(previous.saturating_add(1))
}

/// Millisecond clock that never hands out the same value twice.
#[derive(Debug, Default)]
pub struct MonotonicClock {
	last: AtomicI64,
}
impl MonotonicClock {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn tick(&self) -> i64 {
		let now = now_millis();
		let mut last = self.last.load(Ordering::Relaxed);

		loop {
			let next = next_updated_at(last, now);

			match self.last.compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
			{
				Ok(_) => return next,
				Err(observed) => last = observed,
			}
		}
	}
}
