//! Wire payloads for the auth endpoints and token-delivery helpers.
//!
//! JSON field names follow the camelCase wire protocol (`refreshToken`,
//! `userId`). Access tokens travel either as an httpOnly `accessToken` cookie
//! or an `Authorization: Bearer` header; the cookie wins when both are
//! present.

// self
use crate::{_prelude::*, auth::UserId};

/// Cookie carrying the access token.
pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
/// Cookie carrying the refresh token.
pub const REFRESH_TOKEN_COOKIE: &str = "refreshToken";

/// `POST /auth/login` request body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginRequest {
	/// Account email address.
	pub email: String,
	/// Plaintext password, verified against the stored hash.
	pub password: String,
}

/// `POST /auth/register` request body.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegisterRequest {
	/// Account email address.
	pub email: String,
	/// Display username.
	pub username: String,
	/// Plaintext password to hash and store.
	pub password: String,
}

/// `POST /auth/refresh` and `POST /auth/logout` request body.
///
/// The refresh token is optional on the wire because the httpOnly cookie is
/// checked first; the body value is the fallback.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
	/// Refresh token sent in the body when no cookie is available.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub refresh_token: Option<String>,
}
impl RefreshRequest {
	/// Picks the effective token: cookie first, body fallback.
	pub fn effective_token<'a>(&'a self, cookie: Option<&'a str>) -> Option<&'a str> {
		cookie.or(self.refresh_token.as_deref())
	}
}

/// `POST /auth/logout-all` request body.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutAllRequest {
	/// User whose refresh tokens should all be revoked.
	pub user_id: UserId,
}

/// Public projection of a user account; never carries the password hash.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicUser {
	/// Account identifier.
	pub id: UserId,
	/// Account email address.
	pub email: String,
	/// Display username.
	pub username: String,
}

/// Successful response body for login, register, and refresh.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionGrant {
	/// Authenticated user.
	pub user: PublicUser,
	/// Signed access token.
	pub token: String,
	/// Raw refresh secret; shown to the client exactly once.
	pub refresh_token: String,
}

/// `Set-Cookie` header values delivering a [`SessionGrant`] as httpOnly cookies.
#[derive(Clone, Debug)]
pub struct CookieDirectives {
	/// `Set-Cookie` value for the access token.
	pub access: String,
	/// `Set-Cookie` value for the refresh token.
	pub refresh: String,
}
impl CookieDirectives {
	/// Renders cookie directives for the grant with the provided max-ages.
	pub fn for_grant(grant: &SessionGrant, access_ttl: Duration, refresh_ttl: Duration) -> Self {
		Self {
			access: render_cookie(ACCESS_TOKEN_COOKIE, &grant.token, access_ttl),
			refresh: render_cookie(REFRESH_TOKEN_COOKIE, &grant.refresh_token, refresh_ttl),
		}
	}

	/// Renders expired cookies that clear both tokens on logout.
	pub fn cleared() -> Self {
		Self {
			access: render_cookie(ACCESS_TOKEN_COOKIE, "", Duration::ZERO),
			refresh: render_cookie(REFRESH_TOKEN_COOKIE, "", Duration::ZERO),
		}
	}
}

/// Extracts the effective bearer credential: `accessToken` cookie first, then
/// the `Authorization: Bearer` header.
pub fn bearer_token<'a>(cookie: Option<&'a str>, authorization: Option<&'a str>) -> Option<&'a str> {
	cookie.or_else(|| authorization?.strip_prefix("Bearer "))
}

fn render_cookie(name: &str, value: &str, max_age: Duration) -> String {
	format!(
		"{name}={value}; Max-Age={}; Path=/; HttpOnly; SameSite=Strict",
		max_age.whole_seconds().max(0)
	)
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn bearer_prefers_cookie_over_header() {
		assert_eq!(bearer_token(Some("cookie-token"), Some("Bearer header-token")), Some("cookie-token"));
		assert_eq!(bearer_token(None, Some("Bearer header-token")), Some("header-token"));
		assert_eq!(bearer_token(None, Some("Basic abc")), None);
		assert_eq!(bearer_token(None, None), None);
	}

	#[test]
	fn refresh_request_prefers_cookie_over_body() {
		let request = RefreshRequest { refresh_token: Some("body-token".into()) };

		assert_eq!(request.effective_token(Some("cookie-token")), Some("cookie-token"));
		assert_eq!(request.effective_token(None), Some("body-token"));
		assert_eq!(RefreshRequest::default().effective_token(None), None);
	}

	#[test]
	fn wire_shape_uses_camel_case() {
		let grant = SessionGrant {
			user: PublicUser { id: UserId(1), email: "a@b.c".into(), username: "alice".into() },
			token: "jwt".into(),
			refresh_token: "secret".into(),
		};
		let json = serde_json::to_value(&grant).expect("Grant should serialize.");

		assert_eq!(json["refreshToken"], "secret");
		assert_eq!(json["user"]["username"], "alice");

		let parsed: RefreshRequest = serde_json::from_str(r#"{"refreshToken":"abc"}"#)
			.expect("Refresh request should deserialize.");

		assert_eq!(parsed.refresh_token.as_deref(), Some("abc"));
	}

	#[test]
	fn cleared_cookies_expire_immediately() {
		let cleared = CookieDirectives::cleared();

		assert!(cleared.access.starts_with("accessToken=;"));
		assert!(cleared.access.contains("Max-Age=0"));
		assert!(cleared.refresh.contains("HttpOnly"));
	}
}
