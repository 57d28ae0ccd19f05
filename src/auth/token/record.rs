//! Persisted refresh-token records and their lifecycle state machine.

// self
use crate::{_prelude::*, auth::UserId};

/// Current lifecycle status for a refresh-token record.
///
/// `Active -> Revoked` and `Active -> Expired` are both terminal; no transition
/// ever re-activates a record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenStatus {
	/// Record is live and may authorize exactly one refresh.
	Active,
	/// Record exceeded its expiry instant.
	Expired,
	/// Record was consumed by a rotation or revoked by a logout.
	Revoked,
}

/// One row of the refresh-token table.
///
/// The raw secret never reaches storage; `token_digest` holds its SHA-256
/// digest and is unique across all records, so at most one live row can ever
/// match a presented token value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshTokenRecord {
	/// Surrogate primary key assigned by the store.
	pub id: u64,
	/// Owning user.
	pub user_id: UserId,
	/// SHA-256 digest of the issued secret, hex-encoded.
	pub token_digest: String,
	/// Instant the record was created (login, register, or rotation).
	pub created_at: OffsetDateTime,
	/// Natural expiry instant.
	pub expires_at: OffsetDateTime,
	/// Revocation instant, set by rotation, logout, or logout-all.
	pub revoked_at: Option<OffsetDateTime>,
}
impl RefreshTokenRecord {
	/// Builds a fresh, unrevoked record.
	pub fn new(
		id: u64,
		user_id: UserId,
		token_digest: impl Into<String>,
		created_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Self {
		Self {
			id,
			user_id,
			token_digest: token_digest.into(),
			created_at,
			expires_at,
			revoked_at: None,
		}
	}

	/// Computes the lifecycle status at a given instant. Revocation wins over expiry.
	pub fn status_at(&self, instant: OffsetDateTime) -> TokenStatus {
		if self.revoked_at.is_some() {
			return TokenStatus::Revoked;
		}
		if instant >= self.expires_at {
			return TokenStatus::Expired;
		}

		TokenStatus::Active
	}

	/// Returns `true` if the record may authorize a refresh at `instant`.
	pub fn is_live_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Active)
	}

	/// Returns `true` if the record has been revoked.
	pub fn is_revoked(&self) -> bool {
		self.revoked_at.is_some()
	}

	/// Returns `true` if the record has expired at `instant`.
	pub fn is_expired_at(&self, instant: OffsetDateTime) -> bool {
		matches!(self.status_at(instant), TokenStatus::Expired)
	}

	/// Marks the record as revoked. Idempotent: the first revocation instant sticks.
	pub fn revoke(&mut self, instant: OffsetDateTime) {
		if self.revoked_at.is_none() {
			self.revoked_at = Some(instant);
		}
	}
}
