//! Signed access-token claims.

// self
use crate::{_prelude::*, auth::UserId};

/// Claims embedded in every signed access token.
///
/// Access tokens are stateless; everything a protected route needs to identify
/// the caller travels inside the claims. The token itself is never persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
	/// Subject: the user identifier, rendered as a decimal string.
	pub sub: String,
	/// Email address of the authenticated user.
	pub email: String,
	/// Display username of the authenticated user.
	pub username: String,
	/// Issued-at instant as a Unix timestamp (seconds).
	pub iat: i64,
	/// Expiry instant as a Unix timestamp (seconds).
	pub exp: i64,
}
impl AccessClaims {
	/// Builds claims for the given user covering `issued_at..issued_at + ttl`.
	pub fn issue(
		user_id: UserId,
		email: impl Into<String>,
		username: impl Into<String>,
		issued_at: OffsetDateTime,
		ttl: Duration,
	) -> Self {
		Self {
			sub: user_id.as_subject(),
			email: email.into(),
			username: username.into(),
			iat: issued_at.unix_timestamp(),
			exp: (issued_at + ttl).unix_timestamp(),
		}
	}

	/// Parses the subject back into a [`UserId`], rejecting malformed subjects.
	pub fn user_id(&self) -> Result<UserId> {
		UserId::from_subject(&self.sub).ok_or(Error::InvalidAccessToken)
	}

	/// Expiry instant reconstructed from the `exp` claim.
	pub fn expires_at(&self) -> Result<OffsetDateTime> {
		OffsetDateTime::from_unix_timestamp(self.exp).map_err(|_| Error::InvalidAccessToken)
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use time::macros;
	// self
	use super::*;

	#[test]
	fn issue_covers_the_requested_window() {
		let issued = macros::datetime!(2025-06-01 10:00 UTC);
		let claims =
			AccessClaims::issue(UserId(3), "a@b.c", "alice", issued, Duration::minutes(15));

		assert_eq!(claims.sub, "3");
		assert_eq!(claims.exp - claims.iat, 15 * 60);
		assert_eq!(
			claims.expires_at().expect("Expiry claim should convert back to a timestamp."),
			issued + Duration::minutes(15)
		);
		assert_eq!(claims.user_id().expect("Subject should parse back into a user id."), UserId(3));
	}

	#[test]
	fn malformed_subject_is_rejected() {
		let mut claims = AccessClaims::issue(
			UserId(1),
			"a@b.c",
			"alice",
			OffsetDateTime::now_utc(),
			Duration::minutes(15),
		);

		claims.sub = "definitely-not-a-number".into();

		assert!(matches!(claims.user_id(), Err(Error::InvalidAccessToken)));
	}
}
