//! Access-token signing and refresh-token minting.
//!
//! [`TokenIssuer`] is the only component that touches the signing secret.
//! Access tokens are stateless HS256 JWTs carrying [`AccessClaims`]; refresh
//! tokens are opaque random secrets persisted (as digests) through a
//! [`RefreshTokenStore`]. Verification distinguishes "expired" from "invalid"
//! so callers can tell refresh-and-retry apart from reject-outright.

// crates.io
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
// self
use crate::{
	_prelude::*,
	auth::{AccessClaims, TokenSecret, UserId},
	error::ConfigError,
	store::RefreshTokenStore,
};

/// Token time-to-live parsed from the `^\d+[dhms]$` duration grammar.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TokenTtl(Duration);
impl TokenTtl {
	/// Default access-token lifetime (15 minutes).
	pub const DEFAULT_ACCESS: Self = Self(Duration::minutes(15));
	/// Default refresh-token lifetime, also the malformed-input fallback (7 days).
	pub const DEFAULT_REFRESH: Self = Self(Duration::days(7));

	/// Wraps an already-known duration.
	pub const fn from_duration(duration: Duration) -> Self {
		Self(duration)
	}

	/// Parses `"<digits><d|h|m|s>"`; anything else yields `None`.
	pub fn parse(raw: &str) -> Option<Self> {
		if raw.len() < 2 {
			return None;
		}

		let (digits, unit) = raw.split_at(raw.len() - 1);

		if !digits.bytes().all(|byte| byte.is_ascii_digit()) {
			return None;
		}

		let value = digits.parse::<i64>().ok()?;
		let duration = match unit {
			"d" => Duration::days(value),
			"h" => Duration::hours(value),
			"m" => Duration::minutes(value),
			"s" => Duration::seconds(value),
			_ => return None,
		};

		Some(Self(duration))
	}

	/// Parses the grammar, falling back to `fallback` on malformed input.
	pub fn parse_or(raw: &str, fallback: Self) -> Self {
		Self::parse(raw).unwrap_or(fallback)
	}

	/// Returns the wrapped duration.
	pub fn duration(self) -> Duration {
		self.0
	}
}

/// Issuer configuration consumed once at startup.
///
/// TTLs arrive as duration strings straight from the environment; malformed
/// values fall back to the defaults instead of failing startup. A missing
/// signing secret is only rejected when a token is actually issued or
/// verified, so read-only deployments can still boot.
#[derive(Clone, Debug)]
pub struct IssuerConfig {
	/// HS256 signing secret; `None` makes every sign/verify fail fast.
	pub signing_secret: Option<String>,
	/// Access-token TTL duration string (default `"15m"`).
	pub access_ttl: String,
	/// Refresh-token TTL duration string (default `"7d"`).
	pub refresh_ttl: String,
}
impl IssuerConfig {
	/// Starts from the defaults with the provided signing secret.
	pub fn new(signing_secret: impl Into<String>) -> Self {
		Self { signing_secret: Some(signing_secret.into()), ..Default::default() }
	}

	/// Overrides the access-token TTL duration string.
	pub fn with_access_ttl(mut self, ttl: impl Into<String>) -> Self {
		self.access_ttl = ttl.into();

		self
	}

	/// Overrides the refresh-token TTL duration string.
	pub fn with_refresh_ttl(mut self, ttl: impl Into<String>) -> Self {
		self.refresh_ttl = ttl.into();

		self
	}
}
impl Default for IssuerConfig {
	fn default() -> Self {
		Self { signing_secret: None, access_ttl: "15m".into(), refresh_ttl: "7d".into() }
	}
}

/// Signs access tokens and mints persisted refresh tokens.
#[derive(Clone)]
pub struct TokenIssuer {
	signing_secret: Option<String>,
	access_ttl: TokenTtl,
	refresh_ttl: TokenTtl,
}
impl TokenIssuer {
	/// Builds an issuer from the startup configuration.
	pub fn new(config: IssuerConfig) -> Self {
		Self {
			signing_secret: config.signing_secret,
			access_ttl: TokenTtl::parse_or(&config.access_ttl, TokenTtl::DEFAULT_ACCESS),
			refresh_ttl: TokenTtl::parse_or(&config.refresh_ttl, TokenTtl::DEFAULT_REFRESH),
		}
	}

	/// Configured access-token lifetime.
	pub fn access_ttl(&self) -> Duration {
		self.access_ttl.duration()
	}

	/// Configured refresh-token lifetime.
	pub fn refresh_ttl(&self) -> Duration {
		self.refresh_ttl.duration()
	}

	/// Signs an access token for the user with the configured TTL.
	pub fn issue_access_token(
		&self,
		user_id: UserId,
		email: &str,
		username: &str,
	) -> Result<TokenSecret> {
		self.issue_access_token_at(user_id, email, username, OffsetDateTime::now_utc())
	}

	/// Signs an access token whose validity window starts at `issued_at`.
	///
	/// Exposed so operators and tests can control the clock; production code
	/// goes through [`TokenIssuer::issue_access_token`].
	pub fn issue_access_token_at(
		&self,
		user_id: UserId,
		email: &str,
		username: &str,
		issued_at: OffsetDateTime,
	) -> Result<TokenSecret> {
		let secret = self.signing_secret()?;
		let claims =
			AccessClaims::issue(user_id, email, username, issued_at, self.access_ttl.duration());
		let token = jsonwebtoken::encode(
			&Header::new(Algorithm::HS256),
			&claims,
			&EncodingKey::from_secret(secret),
		)
		.map_err(|_| Error::InvalidAccessToken)?;

		Ok(TokenSecret::new(token))
	}

	/// Decodes and validates an access token.
	///
	/// Fails with [`Error::ExpiredAccessToken`] when only the expiry is stale
	/// and [`Error::InvalidAccessToken`] for every other defect, so the caller
	/// can decide between refreshing and rejecting.
	pub fn verify_access_token(&self, token: &str) -> Result<AccessClaims> {
		let secret = self.signing_secret()?;
		let mut validation = Validation::new(Algorithm::HS256);

		validation.leeway = 0;
		validation.validate_aud = false;

		jsonwebtoken::decode::<AccessClaims>(
			token,
			&DecodingKey::from_secret(secret),
			&validation,
		)
		.map(|data| data.claims)
		.map_err(|err| match err.kind() {
			ErrorKind::ExpiredSignature => Error::ExpiredAccessToken,
			_ => Error::InvalidAccessToken,
		})
	}

	/// Mints a random refresh secret, persists its record, and returns the raw value.
	///
	/// The record's expiry is `now + refresh_ttl`; only the SHA-256 digest of
	/// the secret reaches the store.
	pub async fn issue_refresh_token(
		&self,
		store: &dyn RefreshTokenStore,
		user_id: UserId,
		now: OffsetDateTime,
	) -> Result<TokenSecret> {
		let secret = TokenSecret::generate();

		store.insert(user_id, &secret, now, now + self.refresh_ttl.duration()).await?;

		Ok(secret)
	}

	fn signing_secret(&self) -> Result<&[u8]> {
		self.signing_secret
			.as_deref()
			.filter(|secret| !secret.is_empty())
			.map(str::as_bytes)
			.ok_or_else(|| ConfigError::MissingSigningSecret.into())
	}
}
impl Debug for TokenIssuer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenIssuer")
			.field("signing_secret_set", &self.signing_secret.is_some())
			.field("access_ttl", &self.access_ttl)
			.field("refresh_ttl", &self.refresh_ttl)
			.finish()
	}
}
