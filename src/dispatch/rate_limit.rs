//! Client-side fixed-window rate limiting, applied before any network call.

// self
use crate::_prelude::*;

/// Per-key request budget for one fixed window.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitQuota {
	/// Requests allowed inside one window.
	pub max_requests: u32,
	/// Window length.
	pub window: Duration,
}
impl RateLimitQuota {
	/// Creates a quota from its parts.
	pub const fn new(max_requests: u32, window: Duration) -> Self {
		Self { max_requests, window }
	}
}
impl Default for RateLimitQuota {
	// 30 requests per minute per endpoint, independent of any server-side limiter.
	fn default() -> Self {
		Self::new(30, Duration::seconds(60))
	}
}

/// Result of consulting the limiter.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RateLimitDecision {
	/// The request may proceed immediately.
	Allow,
	/// The budget is exhausted for the current window.
	Deny {
		/// Whole-second wait (rounded up) until the window resets.
		retry_after: Duration,
	},
}

#[derive(Clone, Debug)]
struct RateLimitWindow {
	count: u32,
	reset_at: OffsetDateTime,
}

/// Fixed-window request counter keyed by endpoint.
///
/// Windows are created lazily on the first request for a key and recreated
/// once `now` passes their reset instant; [`RateLimiter::cleanup`] purges
/// stale ones to bound memory.
#[derive(Debug, Default)]
pub struct RateLimiter(Mutex<HashMap<String, RateLimitWindow>>);
impl RateLimiter {
	/// Counts a request against the key's window and decides whether it may
	/// proceed. Denials do not consume budget.
	pub fn check(
		&self,
		key: &str,
		quota: &RateLimitQuota,
		now: OffsetDateTime,
	) -> RateLimitDecision {
		let mut windows = self.0.lock();

		match windows.get_mut(key) {
			Some(window) if now <= window.reset_at =>
				if window.count < quota.max_requests {
					window.count += 1;

					RateLimitDecision::Allow
				} else {
					RateLimitDecision::Deny { retry_after: retry_after(window.reset_at, now) }
				},
			_ => {
				windows.insert(
					key.to_owned(),
					RateLimitWindow { count: 1, reset_at: now + quota.window },
				);

				RateLimitDecision::Allow
			},
		}
	}

	/// Forgets the window for one key.
	pub fn reset(&self, key: &str) {
		self.0.lock().remove(key);
	}

	/// Forgets every window.
	pub fn clear_all(&self) {
		self.0.lock().clear();
	}

	/// Purges windows whose reset instant has passed; returns how many were
	/// removed. Meant for a periodic sweep, not the request path.
	pub fn cleanup(&self, now: OffsetDateTime) -> usize {
		let mut windows = self.0.lock();
		let before = windows.len();

		windows.retain(|_, window| now <= window.reset_at);

		before - windows.len()
	}
}

// Whole seconds, rounded up, so "retry after 0" can never be emitted while a
// window is still open.
fn retry_after(reset_at: OffsetDateTime, now: OffsetDateTime) -> Duration {
	let millis = (reset_at - now).whole_milliseconds().max(0);

	Duration::seconds(((millis + 999) / 1000) as i64)
}
