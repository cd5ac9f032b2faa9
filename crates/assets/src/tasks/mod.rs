use std::time::Duration;

mod ensure;
mod materialize;

pub use ensure::{EnsureObjectTask, EnsureOutcome};
pub use materialize::MaterializeTask;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// How many times an object is downloaded before giving up on it, and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
	max_attempts: u32,
	delay: Duration,
}

impl RetryPolicy {
	/// `max_attempts` is clamped to at least one attempt.
	#[must_use]
	pub fn new(max_attempts: u32, delay: Duration) -> Self {
		Self {
			max_attempts: max_attempts.max(1),
			delay,
		}
	}

	#[must_use]
	pub const fn max_attempts(&self) -> u32 {
		self.max_attempts
	}

	#[must_use]
	pub const fn delay(&self) -> Duration {
		self.delay
	}
}

impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(DEFAULT_MAX_ATTEMPTS, DEFAULT_RETRY_DELAY)
	}
}
