//! Storage contract and built-in backend for refresh-token records.
//!
//! The trait is the boundary to whatever persistence engine hosts the
//! `refresh_tokens` table; the broker never branches on a database dialect.
//! Rotation safety hinges on [`RefreshTokenStore::claim`] being a single
//! atomic "check liveness and consume" step, so two concurrent refreshes can
//! never both succeed off the same token.

pub mod memory;

pub use memory::MemoryTokenStore;

// self
use crate::{
	_prelude::*,
	auth::{RefreshTokenRecord, TokenSecret, UserId},
};

/// How long revoked rows are retained before cleanup may purge them.
pub const REVOKED_RETENTION: Duration = Duration::days(30);

/// Boxed future returned by every [`RefreshTokenStore`] operation.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + 'a + Send>>;

/// Persistence contract for refresh-token records.
///
/// Implementations receive raw token values and are responsible for digesting
/// them at rest; callers never handle digests directly.
pub trait RefreshTokenStore
where
	Self: Send + Sync,
{
	/// Persists a new record for the secret and returns the stored row.
	fn insert<'a>(
		&'a self,
		user_id: UserId,
		secret: &'a TokenSecret,
		created_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> StoreFuture<'a, RefreshTokenRecord>;

	/// Atomically verifies and consumes the record matching `token_value`.
	///
	/// When the record is live at `now`, it is marked revoked in the same
	/// operation and returned as it stood at claim time; every other state is
	/// reported without side effects. A claimed token can never authorize a
	/// second refresh.
	fn claim<'a>(&'a self, token_value: &'a str, now: OffsetDateTime)
	-> StoreFuture<'a, ClaimOutcome>;

	/// Marks the record matching `token_value` as revoked. Idempotent; unknown
	/// values are ignored.
	fn revoke<'a>(&'a self, token_value: &'a str, now: OffsetDateTime) -> StoreFuture<'a, ()>;

	/// Revokes every live record for the user, returning how many were hit.
	fn revoke_all_for_user(&self, user_id: UserId, now: OffsetDateTime) -> StoreFuture<'_, usize>;

	/// Purges rows that are expired, or revoked for longer than
	/// [`REVOKED_RETENTION`]. Runs on its own schedule, never in the request
	/// path. Returns the number of rows removed.
	fn cleanup(&self, now: OffsetDateTime) -> StoreFuture<'_, usize>;

	/// Fetches the record matching `token_value` without consuming it.
	fn fetch<'a>(&'a self, token_value: &'a str) -> StoreFuture<'a, Option<RefreshTokenRecord>>;
}

/// Result of an atomic refresh-token claim.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClaimOutcome {
	/// The record was live and has now been consumed; the snapshot predates
	/// the consuming revocation.
	Claimed(RefreshTokenRecord),
	/// No record matches the presented value.
	Missing,
	/// The record exists but exceeded its expiry.
	Expired,
	/// The record was already revoked (rotation replay, logout, or logout-all).
	Revoked,
}
impl ClaimOutcome {
	/// Converts the outcome into the claimed record, mapping every non-live
	/// state to [`Error::InvalidRefreshToken`].
	pub fn into_record(self) -> Result<RefreshTokenRecord> {
		match self {
			Self::Claimed(record) => Ok(record),
			Self::Missing | Self::Expired | Self::Revoked => Err(Error::InvalidRefreshToken),
		}
	}
}

/// Error type produced by [`RefreshTokenStore`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}
