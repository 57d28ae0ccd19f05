//! Transport primitives for the API dispatcher.
//!
//! [`ApiTransport`] is the dispatcher's only dependency on an HTTP stack.
//! Implementations execute one JSON request, surface the status, body, and any
//! `Retry-After` hint, and provide the timer the retry policy sleeps on. The
//! default implementation wraps reqwest with a cookie store enabled so
//! httpOnly token cookies ride along with every same-origin call.

// crates.io
#[cfg(feature = "reqwest")] use reqwest::header::{AUTHORIZATION, HeaderMap, RETRY_AFTER};
#[cfg(feature = "reqwest")] use time::format_description::well_known::Rfc2822;
// self
use crate::{_prelude::*, auth::TokenSecret};
#[cfg(feature = "reqwest")] use crate::error::ConfigError;

/// Boxed future returned by [`ApiTransport::send`].
pub type TransportFuture<'a, E> = Pin<Box<dyn Future<Output = Result<ApiResponse, E>> + 'a + Send>>;
/// Boxed future returned by [`ApiTransport::sleep`].
pub type SleepFuture<'a> = Pin<Box<dyn Future<Output = ()> + 'a + Send>>;

/// Abstraction over HTTP transports capable of executing JSON API calls.
///
/// Implementations must be `Send + Sync + 'static` so one transport can be
/// shared across dispatchers without additional wrappers. The transport owns
/// connection reuse and cookie handling; the dispatcher owns classification,
/// refresh, and retry.
pub trait ApiTransport
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// Executes one request and captures the response verbatim.
	///
	/// Non-2xx statuses are *not* errors at this layer; only failures to
	/// obtain a response at all (DNS, TCP, TLS) surface as
	/// [`Self::TransportError`].
	fn send(&self, request: ApiRequest) -> TransportFuture<'_, Self::TransportError>;

	/// Sleeps for the given duration; used by the retry policy's backoff.
	fn sleep(&self, delay: Duration) -> SleepFuture<'_>;
}

/// HTTP methods the dispatcher issues.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Method {
	/// HTTP GET.
	Get,
	/// HTTP POST.
	Post,
	/// HTTP PUT.
	Put,
	/// HTTP DELETE.
	Delete,
}
impl Method {
	/// Returns the method's wire name.
	pub const fn as_str(self) -> &'static str {
		match self {
			Method::Get => "GET",
			Method::Post => "POST",
			Method::Put => "PUT",
			Method::Delete => "DELETE",
		}
	}
}
impl Display for Method {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// One outbound API request.
#[derive(Clone, Debug)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Absolute request URL.
	pub url: Url,
	/// Bearer credential attached as `Authorization: Bearer <token>`.
	pub bearer: Option<TokenSecret>,
	/// JSON request body, when present.
	pub body: Option<serde_json::Value>,
}
impl ApiRequest {
	/// Creates a bodyless, unauthenticated request.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, bearer: None, body: None }
	}

	/// Attaches a bearer credential.
	pub fn with_bearer(mut self, bearer: Option<TokenSecret>) -> Self {
		self.bearer = bearer;

		self
	}

	/// Attaches a JSON body.
	pub fn with_body(mut self, body: serde_json::Value) -> Self {
		self.body = Some(body);

		self
	}
}

/// Raw response captured by a transport.
#[derive(Clone, Debug)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// `Retry-After` hint, parsed into a relative duration when present.
	pub retry_after: Option<Duration>,
	/// Response body bytes; may be empty.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}
}

#[cfg(feature = "reqwest")]
/// Default transport backed by reqwest with an enabled cookie store.
#[derive(Clone)]
pub struct ReqwestTransport(ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with a cookie store so httpOnly token cookies are
	/// replayed on subsequent same-origin requests.
	pub fn new() -> Result<Self, ConfigError> {
		Ok(Self(ReqwestClient::builder().cookie_store(true).build()?))
	}

	/// Wraps an existing reqwest client.
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl ApiTransport for ReqwestTransport {
	type TransportError = ReqwestError;

	fn send(&self, request: ApiRequest) -> TransportFuture<'_, Self::TransportError> {
		let client = self.0.clone();

		Box::pin(async move {
			let mut builder = match request.method {
				Method::Get => client.get(request.url),
				Method::Post => client.post(request.url),
				Method::Put => client.put(request.url),
				Method::Delete => client.delete(request.url),
			};

			if let Some(bearer) = &request.bearer {
				builder = builder.header(AUTHORIZATION, format!("Bearer {}", bearer.expose()));
			}
			if let Some(body) = &request.body {
				builder = builder
					.header(reqwest::header::CONTENT_TYPE, "application/json")
					.body(body.to_string());
			}

			let response = builder.send().await?;
			let status = response.status().as_u16();
			let retry_after = parse_retry_after(response.headers());
			let body = response.bytes().await?.to_vec();

			Ok(ApiResponse { status, retry_after, body })
		})
	}

	fn sleep(&self, delay: Duration) -> SleepFuture<'_> {
		let delay = std::time::Duration::try_from(delay).unwrap_or_default();

		Box::pin(tokio::time::sleep(delay))
	}
}

#[cfg(feature = "reqwest")]
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;
	let raw = value.to_str().ok()?.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}
