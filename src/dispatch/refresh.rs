//! Coordinated session refresh with a singleflight guard.
//!
//! Any number of concurrent calls can observe a 401 at the same time, but only
//! one of them performs the token rotation. Every caller funnels through
//! [`Dispatcher::refresh_session`]: the first task through the guard posts to
//! the refresh endpoint and rotates the session, while the rest wait on the
//! lock and then simply pick up the already-rotated access token. A refresh
//! that fails terminally tears the session down and fires the expiry handler
//! exactly once, from the task that performed the attempt.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	endpoint::wire::SessionGrant,
	http::{ApiRequest, ApiTransport, Method},
	obs::{self, PipelineKind},
};

/// Side effect fired once when the session ends involuntarily.
///
/// Typical implementations navigate to the login screen or surface a
/// "signed out" notice. The handler is never invoked by [`SessionHandle::clear`]
/// itself, only by a refresh attempt that failed terminally.
///
/// [`SessionHandle::clear`]: crate::auth::SessionHandle::clear
pub trait SessionExpiryHandler
where
	Self: Send + Sync,
{
	/// Invoked exactly once per failed refresh, from the task that performed it.
	fn on_session_expired(&self);
}

impl<C> super::Dispatcher<C>
where
	C: ?Sized + ApiTransport,
{
	/// Rotates the session's token pair, coalescing concurrent callers.
	///
	/// `observed` is the access token the caller attached to the request that
	/// came back 401. If the session already carries a different token when the
	/// guard is acquired, another task completed the rotation in the meantime
	/// and that token is returned without touching the network.
	///
	/// On success the new access token is returned and the session holds the
	/// rotated pair. On failure the session is cleared, the expiry handler (if
	/// any) fires, and [`Error::SessionExpired`] is returned; waiters never
	/// fire the handler a second time.
	pub async fn refresh_session(&self, observed: Option<&TokenSecret>) -> Result<TokenSecret> {
		obs::observe(PipelineKind::Refresh, "refresh_session", async move {
			self.refresh_metrics.record_attempt();

			let _singleflight = self.refresh_guard.lock().await;

			// A rotation that completed while we waited on the guard already
			// satisfies this caller.
			match self.session.access_token() {
				Some(current)
					if observed.is_none_or(|seen| seen.expose() != current.expose()) =>
				{
					self.refresh_metrics.record_coalesced();
					self.refresh_metrics.record_success();

					return Ok(current);
				},
				Some(_) => (),
				// A previous holder of the guard tore the session down (or the
				// caller was never signed in); surfacing the teardown here must
				// not fire the handler again.
				None => {
					self.refresh_metrics.record_failure();

					return Err(Error::SessionExpired);
				},
			}

			let Some(refresh_token) = self.session.refresh_token() else {
				self.refresh_metrics.record_failure();

				return Err(self.expire_session());
			};
			let url = self.endpoint_url(&self.refresh_path)?;
			let request = ApiRequest::new(Method::Post, url)
				.with_body(serde_json::json!({ "refreshToken": refresh_token.expose() }));
			let response = match self.transport.send(request).await {
				Ok(response) => response,
				Err(_) => {
					self.refresh_metrics.record_failure();

					return Err(self.expire_session());
				},
			};

			// Any rejection of the rotation is terminal for this session; the
			// refresh call itself is never retried.
			if !response.is_success() {
				self.refresh_metrics.record_failure();

				return Err(self.expire_session());
			}

			let grant = match serde_json::from_slice::<SessionGrant>(&response.body) {
				Ok(grant) => grant,
				Err(_) => {
					self.refresh_metrics.record_failure();

					return Err(self.expire_session());
				},
			};
			let access = TokenSecret::new(grant.token);

			self.session.rotate(access.clone(), TokenSecret::new(grant.refresh_token));
			self.refresh_metrics.record_success();

			Ok(access)
		})
		.await
	}

	fn expire_session(&self) -> Error {
		self.session.clear();

		if let Some(handler) = &self.expiry_handler {
			handler.on_session_expired();
		}

		Error::SessionExpired
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::{
		collections::VecDeque,
		io,
		sync::atomic::{AtomicUsize, Ordering},
	};
	// self
	use crate::{
		_prelude::*,
		auth::{SessionHandle, TokenSecret},
		dispatch::{Dispatcher, SessionExpiryHandler},
		http::{ApiRequest, ApiResponse, ApiTransport, SleepFuture, TransportFuture},
	};

	struct QueuedTransport {
		responses: Mutex<VecDeque<io::Result<ApiResponse>>>,
		sends: AtomicUsize,
	}
	impl QueuedTransport {
		fn new(responses: Vec<io::Result<ApiResponse>>) -> Self {
			Self { responses: Mutex::new(responses.into()), sends: AtomicUsize::new(0) }
		}
	}
	impl ApiTransport for QueuedTransport {
		type TransportError = io::Error;

		fn send(&self, _: ApiRequest) -> TransportFuture<'_, Self::TransportError> {
			self.sends.fetch_add(1, Ordering::SeqCst);

			let next = self
				.responses
				.lock()
				.pop_front()
				.expect("Queued transport should not be exhausted.");

			Box::pin(async move { next })
		}

		fn sleep(&self, _: Duration) -> SleepFuture<'_> {
			Box::pin(async {})
		}
	}

	#[derive(Default)]
	struct CountingHandler(AtomicUsize);
	impl SessionExpiryHandler for CountingHandler {
		fn on_session_expired(&self) {
			self.0.fetch_add(1, Ordering::SeqCst);
		}
	}

	fn grant_body(token: &str, refresh: &str) -> Vec<u8> {
		serde_json::json!({
			"user": { "id": 1, "email": "dev@example.com", "username": "dev" },
			"token": token,
			"refreshToken": refresh,
		})
		.to_string()
		.into_bytes()
	}

	fn signed_in_dispatcher(transport: QueuedTransport) -> Dispatcher<QueuedTransport> {
		let session = Arc::new(SessionHandle::new());

		session.establish(TokenSecret::new("stale-access"), TokenSecret::new("refresh-1"));

		Dispatcher::with_transport("http://localhost:8080", transport)
			.expect("Origin should parse.")
			.with_session(session)
	}

	#[tokio::test]
	async fn successful_refresh_rotates_both_tokens() {
		let dispatcher = signed_in_dispatcher(QueuedTransport::new(vec![Ok(ApiResponse {
			status: 200,
			retry_after: None,
			body: grant_body("fresh-access", "refresh-2"),
		})]));
		let observed = dispatcher.session.access_token();
		let access = dispatcher
			.refresh_session(observed.as_ref())
			.await
			.expect("Refresh should succeed.");

		assert_eq!(access.expose(), "fresh-access");

		let session = dispatcher.session.snapshot().expect("Session should survive.");

		assert_eq!(session.access_token.expose(), "fresh-access");
		assert_eq!(session.refresh_token.expose(), "refresh-2");
		assert_eq!(dispatcher.refresh_metrics.successes(), 1);
	}

	#[tokio::test]
	async fn waiter_reuses_a_rotation_that_happened_before_the_guard() {
		let dispatcher = signed_in_dispatcher(QueuedTransport::new(Vec::new()));
		let observed = TokenSecret::new("token-from-before-someone-else-rotated");
		let access = dispatcher
			.refresh_session(Some(&observed))
			.await
			.expect("Observed token differs from current, so no network call is needed.");

		assert_eq!(access.expose(), "stale-access");
		assert_eq!(dispatcher.transport.sends.load(Ordering::SeqCst), 0);
		assert_eq!(dispatcher.refresh_metrics.coalesced(), 1);
	}

	#[tokio::test]
	async fn failed_refresh_clears_the_session_and_fires_the_handler_once() {
		let handler = Arc::new(CountingHandler::default());
		let dispatcher = signed_in_dispatcher(QueuedTransport::new(vec![Ok(ApiResponse {
			status: 401,
			retry_after: None,
			body: br#"{"error":"invalid refresh token"}"#.to_vec(),
		})]))
		.with_expiry_handler(handler.clone());
		let observed = dispatcher.session.access_token();
		let err = dispatcher
			.refresh_session(observed.as_ref())
			.await
			.expect_err("Rejected rotation must expire the session.");

		assert!(matches!(err, Error::SessionExpired));
		assert!(!dispatcher.session.is_active());
		assert_eq!(handler.0.load(Ordering::SeqCst), 1);

		// A late caller observes the teardown without firing the handler again.
		let late = dispatcher
			.refresh_session(observed.as_ref())
			.await
			.expect_err("Refresh without a session must fail.");

		assert!(matches!(late, Error::SessionExpired));
		assert_eq!(handler.0.load(Ordering::SeqCst), 1);
		assert_eq!(dispatcher.refresh_metrics.failures(), 2);
	}

	#[tokio::test]
	async fn concurrent_callers_produce_exactly_one_rotation() {
		let dispatcher = Arc::new(signed_in_dispatcher(QueuedTransport::new(vec![Ok(
			ApiResponse {
				status: 200,
				retry_after: None,
				body: grant_body("fresh-access", "refresh-2"),
			},
		)])));
		let observed = dispatcher.session.access_token();
		let tasks = (0..8)
			.map(|_| {
				let dispatcher = dispatcher.clone();
				let observed = observed.clone();

				tokio::spawn(async move { dispatcher.refresh_session(observed.as_ref()).await })
			})
			.collect::<Vec<_>>();

		for task in tasks {
			let access = task
				.await
				.expect("Task should not panic.")
				.expect("Every caller should end up with the rotated token.");

			assert_eq!(access.expose(), "fresh-access");
		}

		// One network rotation served all eight callers.
		assert_eq!(dispatcher.transport.sends.load(Ordering::SeqCst), 1);
		assert_eq!(dispatcher.refresh_metrics.coalesced(), 7);
	}
}
