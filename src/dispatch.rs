//! Client request pipeline: rate limiting, bearer attachment, refresh
//! coordination, retry, and error classification.

pub mod rate_limit;
pub mod refresh;
pub mod retry;

pub use rate_limit::*;
pub use refresh::*;
pub use retry::*;

// self
use crate::{
	_prelude::*,
	auth::SessionHandle,
	error::{ConfigError, RateLimitOrigin},
	http::{ApiRequest, ApiResponse, ApiTransport, Method},
	obs::{self, PipelineKind},
};
#[cfg(feature = "reqwest")]
use crate::http::ReqwestTransport;

#[cfg(feature = "reqwest")]
/// Dispatcher specialized for the crate's default reqwest transport.
pub type ReqwestDispatcher = Dispatcher<ReqwestTransport>;

/// Coordinates every API call made on behalf of one session.
///
/// The dispatcher owns the transport, the session handle, the client-side rate
/// limiter, and the refresh guard, so call sites only describe *what* to send
/// ([`ApiCall`]) and get back either a decoded reply or one [`Error`] variant.
/// A 401 on a non-refresh endpoint triggers exactly one coordinated refresh
/// followed by a single replay; transient failures are retried with linear
/// backoff; everything else surfaces immediately.
#[derive(Clone)]
pub struct Dispatcher<C>
where
	C: ?Sized + ApiTransport,
{
	/// Transport used for every outbound request.
	pub transport: Arc<C>,
	/// Session state shared with login/logout call sites.
	pub session: Arc<SessionHandle>,
	/// Shared metrics recorder for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	origin: Url,
	retry_policy: RetryPolicy,
	quota: RateLimitQuota,
	limiter: Arc<RateLimiter>,
	refresh_path: String,
	pub(crate) refresh_guard: Arc<AsyncMutex<()>>,
	pub(crate) expiry_handler: Option<Arc<dyn SessionExpiryHandler>>,
}
impl<C> Dispatcher<C>
where
	C: ?Sized + ApiTransport,
{
	/// Creates a dispatcher that reuses a caller-provided transport.
	pub fn with_transport(origin: &str, transport: impl Into<Arc<C>>) -> Result<Self> {
		Ok(Self {
			transport: transport.into(),
			session: Arc::new(SessionHandle::new()),
			refresh_metrics: Default::default(),
			origin: Url::parse(origin).map_err(|source| ConfigError::InvalidOrigin { source })?,
			retry_policy: Default::default(),
			quota: Default::default(),
			limiter: Default::default(),
			refresh_path: "/api/auth/refresh".into(),
			refresh_guard: Default::default(),
			expiry_handler: None,
		})
	}

	/// Shares an existing session handle instead of the dispatcher's own.
	pub fn with_session(mut self, session: Arc<SessionHandle>) -> Self {
		self.session = session;

		self
	}

	/// Overrides the retry policy.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Overrides the per-endpoint rate limit quota.
	pub fn with_rate_limit_quota(mut self, quota: RateLimitQuota) -> Self {
		self.quota = quota;

		self
	}

	/// Overrides the path the refresh coordinator posts rotations to.
	pub fn with_refresh_path(mut self, path: impl Into<String>) -> Self {
		self.refresh_path = path.into();

		self
	}

	/// Installs a side-effect handler fired once when the session expires.
	pub fn with_expiry_handler(mut self, handler: Arc<dyn SessionExpiryHandler>) -> Self {
		self.expiry_handler = Some(handler);

		self
	}

	/// Backend origin every path is resolved against.
	pub fn origin(&self) -> &Url {
		&self.origin
	}

	/// Client-side rate limiter, exposed for resets and periodic sweeps.
	pub fn rate_limiter(&self) -> &RateLimiter {
		&self.limiter
	}

	/// Executes one API call through the full pipeline.
	///
	/// Order of operations: local rate limit check, bearer attachment, send,
	/// then classification. A 401 triggers one refresh-and-replay; network and
	/// 5xx failures consume the retry budget; every other non-2xx maps to its
	/// [`Error`] variant without another attempt.
	pub async fn execute(&self, call: ApiCall) -> Result<ApiReply> {
		obs::observe(PipelineKind::Dispatch, "execute", async move {
			let url = self.endpoint_url(&call.path)?;

			if let RateLimitDecision::Deny { retry_after } =
				self.limiter.check(&call.path, &self.quota, OffsetDateTime::now_utc())
			{
				return Err(Error::RateLimited {
					origin: RateLimitOrigin::Client,
					retry_after: Some(retry_after),
				});
			}

			let mut retries_used = 0;
			let mut refreshed = false;

			loop {
				let bearer = self.session.access_token();
				let request = ApiRequest {
					method: call.method,
					url: url.clone(),
					bearer: bearer.clone(),
					body: call.body.clone(),
				};
				let err = match self.transport.send(request).await {
					Ok(response) => {
						if response.is_success() {
							return Ok(ApiReply::from_response(&response));
						}

						match response.status {
							// The refresh endpoint rejecting its own call means the
							// refresh token itself is dead; a refresh-and-replay
							// loop here would never terminate.
							401 if self.is_refresh_endpoint(&call.path) =>
								return Err(Error::InvalidRefreshToken),
							401 if !refreshed => {
								self.refresh_session(bearer.as_ref()).await?;

								refreshed = true;

								continue;
							},
							401 => return Err(Error::Rejected {
								status: 401,
								message: error_message(&response.body),
							}),
							403 => return Err(Error::Forbidden {
								message: error_message(&response.body),
							}),
							404 => return Err(Error::NotFound),
							429 => return Err(Error::RateLimited {
								origin: RateLimitOrigin::Server,
								retry_after: response.retry_after,
							}),
							status if status >= 500 => Error::Server {
								status,
								message: error_message(&response.body),
							},
							status => return Err(Error::Rejected {
								status,
								message: error_message(&response.body),
							}),
						}
					},
					Err(source) => Error::network(self.origin.as_str(), source),
				};

				if !self.retry_policy.should_retry(&err, retries_used) {
					return Err(err);
				}

				retries_used += 1;

				self.transport.sleep(self.retry_policy.backoff(retries_used)).await;
			}
		})
		.await
	}

	pub(crate) fn endpoint_url(&self, path: &str) -> Result<Url> {
		self.origin.join(path).map_err(|source| {
			ConfigError::InvalidEndpoint { path: path.to_owned(), source }.into()
		})
	}

	fn is_refresh_endpoint(&self, path: &str) -> bool {
		path == self.refresh_path
	}
}
impl<C> Debug for Dispatcher<C>
where
	C: ?Sized + ApiTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Dispatcher")
			.field("origin", &self.origin)
			.field("retry_policy", &self.retry_policy)
			.field("quota", &self.quota)
			.field("refresh_path", &self.refresh_path)
			.field("session_active", &self.session.is_active())
			.finish()
	}
}
#[cfg(feature = "reqwest")]
impl Dispatcher<ReqwestTransport> {
	/// Creates a dispatcher with the crate's default reqwest transport.
	///
	/// The transport keeps a cookie store so httpOnly token cookies set by the
	/// backend are replayed automatically.
	pub fn new(origin: &str) -> Result<Self> {
		Self::with_transport(origin, ReqwestTransport::new()?)
	}
}

/// One API call described independently of the transport.
#[derive(Clone, Debug)]
pub struct ApiCall {
	/// HTTP method.
	pub method: Method,
	/// Path resolved against the dispatcher's origin.
	pub path: String,
	/// Optional JSON body.
	pub body: Option<serde_json::Value>,
}
impl ApiCall {
	/// Creates a bodyless call.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), body: None }
	}

	/// Shorthand for a GET call.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::Get, path)
	}

	/// Shorthand for a POST call with a JSON body.
	pub fn post(path: impl Into<String>, body: serde_json::Value) -> Self {
		Self { method: Method::Post, path: path.into(), body: Some(body) }
	}

	/// Shorthand for a PUT call with a JSON body.
	pub fn put(path: impl Into<String>, body: serde_json::Value) -> Self {
		Self { method: Method::Put, path: path.into(), body: Some(body) }
	}

	/// Shorthand for a DELETE call.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::Delete, path)
	}
}

/// Successful pipeline outcome.
///
/// Empty and non-JSON 2xx bodies are normalized to `None` so callers of
/// bodyless endpoints (e.g. DELETE) get a uniform sentinel instead of a parse
/// failure.
#[derive(Clone, Debug)]
pub struct ApiReply {
	/// HTTP status code of the successful response.
	pub status: u16,
	/// Decoded JSON body, when one was present.
	pub body: Option<serde_json::Value>,
}
impl ApiReply {
	/// Captures a successful response, decoding the body when possible.
	pub fn from_response(response: &ApiResponse) -> Self {
		Self { status: response.status, body: serde_json::from_slice(&response.body).ok() }
	}

	/// Returns `true` when the reply carried no decodable body.
	pub fn is_empty(&self) -> bool {
		self.body.is_none()
	}

	/// Deserializes the body into `T`, reporting the failing path on mismatch.
	pub fn json<T>(&self) -> Result<T>
	where
		T: DeserializeOwned,
	{
		let value = self.body.clone().unwrap_or(serde_json::Value::Null);

		serde_path_to_error::deserialize(value)
			.map_err(|source| Error::Decode { status: self.status, source })
	}
}

// Best-effort extraction of `error`/`message` fields from a failure body.
fn error_message(body: &[u8]) -> String {
	serde_json::from_slice::<serde_json::Value>(body)
		.ok()
		.and_then(|value| {
			["error", "message"]
				.iter()
				.find_map(|key| value.get(key).and_then(serde_json::Value::as_str))
				.map(str::to_owned)
		})
		.unwrap_or_else(|| "The server reported an unexpected error".into())
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
	use super::*;
	use crate::http::{SleepFuture, TransportFuture};

	struct ScriptedTransport {
		responses: Mutex<VecDeque<io::Result<ApiResponse>>>,
		sends: AtomicUsize,
	}
	impl ScriptedTransport {
		fn new(responses: Vec<io::Result<ApiResponse>>) -> Self {
			Self { responses: Mutex::new(responses.into()), sends: AtomicUsize::new(0) }
		}

		fn sends(&self) -> usize {
			self.sends.load(Ordering::SeqCst)
		}
	}
	impl ApiTransport for ScriptedTransport {
		type TransportError = io::Error;

		fn send(&self, _: ApiRequest) -> TransportFuture<'_, Self::TransportError> {
			self.sends.fetch_add(1, Ordering::SeqCst);

			let next = self
				.responses
				.lock()
				.pop_front()
				.expect("Scripted transport should not be exhausted.");

			Box::pin(async move { next })
		}

		// Backoff sleeps are skipped so retry tests stay fast.
		fn sleep(&self, _: Duration) -> SleepFuture<'_> {
			Box::pin(async {})
		}
	}

	fn network_failure() -> io::Result<ApiResponse> {
		Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused"))
	}

	fn response(status: u16, body: &[u8]) -> io::Result<ApiResponse> {
		Ok(ApiResponse { status, retry_after: None, body: body.to_vec() })
	}

	fn dispatcher(transport: ScriptedTransport) -> Dispatcher<ScriptedTransport> {
		Dispatcher::with_transport("http://localhost:8080", transport)
			.expect("Origin should parse.")
	}

	#[tokio::test]
	async fn transient_failures_are_retried_until_success() {
		let dispatcher = dispatcher(ScriptedTransport::new(vec![
			network_failure(),
			network_failure(),
			network_failure(),
			response(200, br#"{"ok":true}"#),
		]));
		let reply = dispatcher
			.execute(ApiCall::get("/api/items"))
			.await
			.expect("Fourth attempt should succeed within the retry budget.");

		assert_eq!(reply.status, 200);
		assert_eq!(dispatcher.transport.sends(), 4);
	}

	#[tokio::test]
	async fn retry_budget_exhaustion_surfaces_the_last_error() {
		let dispatcher = dispatcher(ScriptedTransport::new(vec![
			network_failure(),
			network_failure(),
			network_failure(),
			network_failure(),
		]))
		.with_retry_policy(RetryPolicy::new(Duration::milliseconds(1), 3));
		let err = dispatcher
			.execute(ApiCall::get("/api/items"))
			.await
			.expect_err("All attempts fail, so the pipeline must error.");

		assert!(matches!(err, Error::Network { .. }));
		assert_eq!(dispatcher.transport.sends(), 4);
	}

	#[tokio::test]
	async fn not_found_is_never_retried() {
		let dispatcher =
			dispatcher(ScriptedTransport::new(vec![response(404, b"")]));
		let err = dispatcher
			.execute(ApiCall::get("/api/items/42"))
			.await
			.expect_err("404 should surface immediately.");

		assert!(matches!(err, Error::NotFound));
		assert_eq!(dispatcher.transport.sends(), 1);
	}

	#[tokio::test]
	async fn local_rate_limit_denies_before_any_send() {
		let dispatcher = dispatcher(ScriptedTransport::new(vec![response(200, b"{}")]))
			.with_rate_limit_quota(RateLimitQuota::new(1, Duration::seconds(60)));

		dispatcher
			.execute(ApiCall::get("/api/items"))
			.await
			.expect("First call should pass the limiter.");

		let err = dispatcher
			.execute(ApiCall::get("/api/items"))
			.await
			.expect_err("Second call must be denied locally.");

		match err {
			Error::RateLimited { origin, retry_after } => {
				assert_eq!(origin, RateLimitOrigin::Client);
				assert!(retry_after.unwrap_or(Duration::ZERO) > Duration::ZERO);
			},
			err => panic!("Expected a client rate limit error, got {err:?}."),
		}
		assert_eq!(dispatcher.transport.sends(), 1);
	}

	#[tokio::test]
	async fn server_rate_limit_surfaces_without_retry() {
		let dispatcher = dispatcher(ScriptedTransport::new(vec![Ok(ApiResponse {
			status: 429,
			retry_after: Some(Duration::seconds(30)),
			body: Vec::new(),
		})]));
		let err = dispatcher
			.execute(ApiCall::get("/api/items"))
			.await
			.expect_err("429 should surface immediately.");

		assert_eq!(err.retry_after(), Some(Duration::seconds(30)));
		assert!(matches!(
			err,
			Error::RateLimited { origin: RateLimitOrigin::Server, .. }
		));
		assert_eq!(dispatcher.transport.sends(), 1);
	}

	#[tokio::test]
	async fn unauthenticated_401_tears_down_without_a_network_refresh() {
		let dispatcher = dispatcher(ScriptedTransport::new(vec![response(
			401,
			br#"{"error":"missing token"}"#,
		)]));
		let err = dispatcher
			.execute(ApiCall::get("/api/items"))
			.await
			.expect_err("401 with no session should end the pipeline.");

		assert!(matches!(err, Error::SessionExpired));
		// Only the original call reached the transport.
		assert_eq!(dispatcher.transport.sends(), 1);
	}

	#[tokio::test]
	async fn empty_success_body_maps_to_the_none_sentinel() {
		let dispatcher = dispatcher(ScriptedTransport::new(vec![response(204, b"")]));
		let reply = dispatcher
			.execute(ApiCall::delete("/api/items/7"))
			.await
			.expect("DELETE should succeed.");

		assert!(reply.is_empty());
		assert_eq!(reply.json::<Option<serde_json::Value>>().ok(), Some(None));
	}

	#[test]
	fn error_message_prefers_error_then_message_fields() {
		assert_eq!(error_message(br#"{"error":"uh oh"}"#), "uh oh");
		assert_eq!(error_message(br#"{"message":"later"}"#), "later");
		assert_eq!(
			error_message(b"<html>nope</html>"),
			"The server reported an unexpected error"
		);
	}
}
