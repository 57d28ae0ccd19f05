//! Client-side session state with an explicit, narrow write surface.
//!
//! The stored access/refresh pair is process-wide mutable state, so it lives in
//! one place behind [`SessionHandle`] instead of ambient globals. Exactly three
//! code paths write it: [`SessionHandle::establish`] (login/register flows),
//! the refresh coordinator's rotation, and [`SessionHandle::clear`]
//! (logout and failed refresh). Everything else only reads snapshots.

// self
use crate::{_prelude::*, auth::TokenSecret};

/// Value describing one authenticated session.
#[derive(Clone, Debug)]
pub struct AuthSession {
	/// Short-lived signed access token attached to API calls.
	pub access_token: TokenSecret,
	/// Long-lived refresh secret exchanged during rotations.
	pub refresh_token: TokenSecret,
	/// Instant the session was first established (login/register).
	pub established_at: OffsetDateTime,
}

/// Shared, lock-guarded holder for the current [`AuthSession`], if any.
#[derive(Debug, Default)]
pub struct SessionHandle(RwLock<Option<AuthSession>>);
impl SessionHandle {
	/// Creates an empty handle with no active session.
	pub fn new() -> Self {
		Self::default()
	}

	/// Installs a fresh session after a successful login or register.
	pub fn establish(&self, access_token: TokenSecret, refresh_token: TokenSecret) {
		*self.0.write() = Some(AuthSession {
			access_token,
			refresh_token,
			established_at: OffsetDateTime::now_utc(),
		});
	}

	/// Swaps in a rotated token pair, preserving the establishment instant.
	///
	/// No-op when the session was already torn down; a rotation must never
	/// resurrect a session that a concurrent logout destroyed.
	pub(crate) fn rotate(&self, access_token: TokenSecret, refresh_token: TokenSecret) {
		let mut guard = self.0.write();

		if let Some(session) = guard.as_mut() {
			session.access_token = access_token;
			session.refresh_token = refresh_token;
		}
	}

	/// Destroys the session (logout, or a refresh that failed terminally).
	pub fn clear(&self) {
		*self.0.write() = None;
	}

	/// Returns `true` while a session is established.
	pub fn is_active(&self) -> bool {
		self.0.read().is_some()
	}

	/// Current access token, if a session is established.
	pub fn access_token(&self) -> Option<TokenSecret> {
		self.0.read().as_ref().map(|session| session.access_token.clone())
	}

	/// Current refresh token, if a session is established.
	pub fn refresh_token(&self) -> Option<TokenSecret> {
		self.0.read().as_ref().map(|session| session.refresh_token.clone())
	}

	/// Clones the whole session value for inspection.
	pub fn snapshot(&self) -> Option<AuthSession> {
		self.0.read().clone()
	}
}
