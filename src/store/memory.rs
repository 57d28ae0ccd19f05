//! Thread-safe in-memory [`RefreshTokenStore`] for local development and tests.

// self
use crate::{
	_prelude::*,
	auth::{RefreshTokenRecord, TokenSecret, TokenStatus, UserId, token::secret::digest_value},
	store::{ClaimOutcome, REVOKED_RETENTION, RefreshTokenStore, StoreError, StoreFuture},
};

type StoreMap = Arc<RwLock<MemoryInner>>;

#[derive(Debug, Default)]
struct MemoryInner {
	// Keyed by token digest; digests are unique, so at most one row per value.
	rows: HashMap<String, RefreshTokenRecord>,
	next_id: u64,
}

/// Thread-safe storage backend that keeps records in-process for tests and demos.
///
/// All mutating operations take the write lock for their whole duration, which
/// makes [`RefreshTokenStore::claim`] the required atomic check-and-consume.
#[derive(Clone, Debug, Default)]
pub struct MemoryTokenStore(StoreMap);
impl MemoryTokenStore {
	fn insert_now(
		map: StoreMap,
		user_id: UserId,
		digest: String,
		created_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> Result<RefreshTokenRecord, StoreError> {
		let mut guard = map.write();

		if guard.rows.contains_key(&digest) {
			return Err(StoreError::Backend { message: "token digest already exists".into() });
		}

		guard.next_id += 1;

		let record =
			RefreshTokenRecord::new(guard.next_id, user_id, digest.clone(), created_at, expires_at);

		guard.rows.insert(digest, record.clone());

		Ok(record)
	}

	fn claim_now(map: StoreMap, digest: String, now: OffsetDateTime) -> ClaimOutcome {
		let mut guard = map.write();
		let Some(record) = guard.rows.get_mut(&digest) else {
			return ClaimOutcome::Missing;
		};

		match record.status_at(now) {
			TokenStatus::Active => {
				let snapshot = record.clone();

				// Consume in the same critical section that proved liveness.
				record.revoke(now);

				ClaimOutcome::Claimed(snapshot)
			},
			TokenStatus::Expired => ClaimOutcome::Expired,
			TokenStatus::Revoked => ClaimOutcome::Revoked,
		}
	}

	fn revoke_now(map: StoreMap, digest: String, now: OffsetDateTime) {
		if let Some(record) = map.write().rows.get_mut(&digest) {
			record.revoke(now);
		}
	}

	fn revoke_all_now(map: StoreMap, user_id: UserId, now: OffsetDateTime) -> usize {
		let mut guard = map.write();
		let mut revoked = 0;

		for record in guard.rows.values_mut() {
			if record.user_id == user_id && record.is_live_at(now) {
				record.revoke(now);

				revoked += 1;
			}
		}

		revoked
	}

	fn cleanup_now(map: StoreMap, now: OffsetDateTime) -> usize {
		let mut guard = map.write();
		let before = guard.rows.len();

		// Revoked rows are tombstones for replay detection: they stay for the
		// retention window even past their natural expiry.
		guard.rows.retain(|_, record| match record.revoked_at {
			Some(revoked_at) => now < revoked_at + REVOKED_RETENTION,
			None => !record.is_expired_at(now),
		});

		before - guard.rows.len()
	}

	fn fetch_now(map: StoreMap, digest: String) -> Option<RefreshTokenRecord> {
		map.read().rows.get(&digest).cloned()
	}
}
impl RefreshTokenStore for MemoryTokenStore {
	fn insert<'a>(
		&'a self,
		user_id: UserId,
		secret: &'a TokenSecret,
		created_at: OffsetDateTime,
		expires_at: OffsetDateTime,
	) -> StoreFuture<'a, RefreshTokenRecord> {
		let map = self.0.clone();
		let digest = secret.digest();

		Box::pin(async move { Self::insert_now(map, user_id, digest, created_at, expires_at) })
	}

	fn claim<'a>(
		&'a self,
		token_value: &'a str,
		now: OffsetDateTime,
	) -> StoreFuture<'a, ClaimOutcome> {
		let map = self.0.clone();
		let digest = digest_value(token_value);

		Box::pin(async move { Ok(Self::claim_now(map, digest, now)) })
	}

	fn revoke<'a>(&'a self, token_value: &'a str, now: OffsetDateTime) -> StoreFuture<'a, ()> {
		let map = self.0.clone();
		let digest = digest_value(token_value);

		Box::pin(async move {
			Self::revoke_now(map, digest, now);

			Ok(())
		})
	}

	fn revoke_all_for_user(&self, user_id: UserId, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::revoke_all_now(map, user_id, now)) })
	}

	fn cleanup(&self, now: OffsetDateTime) -> StoreFuture<'_, usize> {
		let map = self.0.clone();

		Box::pin(async move { Ok(Self::cleanup_now(map, now)) })
	}

	fn fetch<'a>(&'a self, token_value: &'a str) -> StoreFuture<'a, Option<RefreshTokenRecord>> {
		let map = self.0.clone();
		let digest = digest_value(token_value);

		Box::pin(async move { Ok(Self::fetch_now(map, digest)) })
	}
}
