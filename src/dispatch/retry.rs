//! Retry budget and linear backoff for transient request failures.

// self
use crate::{_prelude::*, error::Error};

/// How many times a failed request is re-sent and how long to wait between
/// attempts.
///
/// Only transient failures (network errors and 5xx responses) are retried;
/// every other outcome surfaces immediately.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
	base_delay: Duration,
	max_retries: u32,
}
impl RetryPolicy {
	/// Creates a policy from its parts.
	pub const fn new(base_delay: Duration, max_retries: u32) -> Self {
		Self { base_delay, max_retries }
	}

	/// Maximum number of re-sends after the initial attempt.
	pub fn max_retries(&self) -> u32 {
		self.max_retries
	}

	/// Delay before the `attempt`-th retry, growing linearly with the attempt
	/// number.
	pub fn backoff(&self, attempt: u32) -> Duration {
		self.base_delay * attempt.max(1) as i32
	}

	/// Whether `error` warrants another attempt given how many retries have
	/// already been spent.
	pub fn should_retry(&self, error: &Error, retries_used: u32) -> bool {
		retries_used < self.max_retries && error.is_transient()
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self::new(Duration::seconds(1), 3)
	}
}
