//! Broker-level error taxonomy shared by the dispatcher, issuer, store, and endpoints.
//!
//! Every failure is normalized into one [`Error`] value and all policy branching
//! (refresh, retry, rate limiting) happens on its variants, never on raw HTTP
//! status codes. [`Error::http_status`] and [`Error::retry_after`] expose the
//! transport metadata that produced a classification for diagnostics.

// self
use crate::_prelude::*;

/// Broker-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical broker error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Storage-layer failure.
	#[error("{0}")]
	Storage(
		#[from]
		#[source]
		crate::store::StoreError,
	),
	/// Local configuration problem; fatal and never retried.
	#[error(transparent)]
	Config(#[from] ConfigError),

	/// Login or register was rejected because the credentials do not match.
	#[error("Credentials were rejected.")]
	InvalidCredentials,
	/// Access token signature is valid but the token has expired; drives a refresh.
	#[error("Access token has expired.")]
	ExpiredAccessToken,
	/// Access token is malformed or carries a bad signature; rejected outright.
	#[error("Access token is invalid.")]
	InvalidAccessToken,
	/// Refresh token is unknown, expired, or revoked; the session cannot continue.
	#[error("Refresh token is invalid or expired.")]
	InvalidRefreshToken,
	/// The client session ended because a refresh attempt failed; re-login required.
	#[error("Session has expired; sign in again.")]
	SessionExpired,
	/// A client- or server-side request budget was exhausted.
	#[error("Rate limit exceeded ({origin}).")]
	RateLimited {
		/// Which side imposed the limit.
		origin: RateLimitOrigin,
		/// Suggested wait before the next attempt, when known.
		retry_after: Option<Duration>,
	},
	/// Server answered 403; the caller lacks permission and no retry will help.
	#[error("Forbidden: {message}.")]
	Forbidden {
		/// Server-provided message, or a generic fallback.
		message: String,
	},
	/// Server answered 404 for the requested resource.
	#[error("Resource not found.")]
	NotFound,
	/// Server answered 5xx after the retry budget was exhausted.
	#[error("Server error {status}: {message}.")]
	Server {
		/// HTTP status code that was returned.
		status: u16,
		/// Server-provided message, or a generic fallback.
		message: String,
	},
	/// Any other 4xx rejection surfaced with the server's message.
	#[error("Request rejected with status {status}: {message}.")]
	Rejected {
		/// HTTP status code that was returned.
		status: u16,
		/// Server-provided message, or a generic fallback.
		message: String,
	},
	/// Transport-level failure (DNS, TCP, TLS) while calling the backend.
	#[error("Network error while calling the API backend at {origin}.")]
	Network {
		/// Backend origin the dispatcher expected to reach.
		origin: String,
		/// Transport-specific failure.
		#[source]
		source: BoxError,
	},
	/// Successful response carried a body that does not match the expected shape.
	#[error("Response body could not be decoded.")]
	Decode {
		/// HTTP status code of the response being decoded.
		status: u16,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
}
impl Error {
	/// Wraps a transport failure together with the backend origin it targeted.
	pub fn network(origin: impl Into<String>, src: impl 'static + Send + Sync + StdError) -> Self {
		Self::Network { origin: origin.into(), source: Box::new(src) }
	}

	/// HTTP status associated with the failure, when one was observed.
	pub fn http_status(&self) -> Option<u16> {
		match self {
			Self::InvalidCredentials
			| Self::ExpiredAccessToken
			| Self::InvalidAccessToken
			| Self::InvalidRefreshToken
			| Self::SessionExpired => Some(401),
			Self::RateLimited { .. } => Some(429),
			Self::Forbidden { .. } => Some(403),
			Self::NotFound => Some(404),
			Self::Server { status, .. } | Self::Rejected { status, .. } => Some(*status),
			Self::Decode { status, .. } => Some(*status),
			_ => None,
		}
	}

	/// Suggested wait before retrying, when the failure carries one.
	pub fn retry_after(&self) -> Option<Duration> {
		match self {
			Self::RateLimited { retry_after, .. } => *retry_after,
			_ => None,
		}
	}

	/// Returns `true` for failures the retry policy may attempt again.
	///
	/// Only network failures and 5xx responses qualify; 401 is owned by the
	/// refresh coordinator and 429 is a distinct non-retryable signal.
	pub fn is_transient(&self) -> bool {
		matches!(self, Self::Network { .. } | Self::Server { .. })
	}
}

/// Which side of the wire imposed a rate limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum RateLimitOrigin {
	/// The dispatcher's own fixed-window budget denied the call locally.
	Client,
	/// The server answered 429.
	Server,
}
impl Display for RateLimitOrigin {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::Client => f.write_str("client"),
			Self::Server => f.write_str("server"),
		}
	}
}

/// Configuration and validation failures raised by the broker.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// No signing secret is configured; access tokens cannot be issued.
	#[error("No signing secret is configured.")]
	MissingSigningSecret,
	/// Backend origin URL cannot be parsed.
	#[error("Backend origin URL is invalid.")]
	InvalidOrigin {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Endpoint path cannot be joined onto the backend origin.
	#[error("Endpoint path `{path}` cannot be resolved against the backend origin.")]
	InvalidEndpoint {
		/// Path that failed to resolve.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Password hashing backend failed.
	#[error("Password hash operation failed: {message}.")]
	PasswordHash {
		/// Human-readable error payload.
		message: String,
	},
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}
