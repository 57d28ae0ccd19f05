//! User-account lookup boundary consumed by the auth endpoints.
//!
//! The directory is the seam to the application's (out-of-scope) user table;
//! the broker only needs lookup and creation. An in-memory implementation is
//! provided for tests and demos.

// self
use crate::{
	_prelude::*,
	auth::UserId,
	endpoint::wire::PublicUser,
	store::{StoreError, StoreFuture},
};

/// Stored user account, including the password hash.
#[derive(Clone, Debug)]
pub struct UserAccount {
	/// Account identifier.
	pub id: UserId,
	/// Account email address, unique across the directory.
	pub email: String,
	/// Display username.
	pub username: String,
	/// Argon2 PHC string of the account password.
	pub password_hash: String,
}
impl UserAccount {
	/// Projects the account into its wire-safe form.
	pub fn public(&self) -> PublicUser {
		PublicUser { id: self.id, email: self.email.clone(), username: self.username.clone() }
	}
}

/// Input for creating a new account; the id is assigned by the directory.
#[derive(Clone, Debug)]
pub struct NewUserAccount {
	/// Account email address.
	pub email: String,
	/// Display username.
	pub username: String,
	/// Argon2 PHC string of the account password.
	pub password_hash: String,
}

/// Lookup/creation contract for user accounts.
pub trait UserDirectory
where
	Self: Send + Sync,
{
	/// Finds the account registered under `email`, if any.
	fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<UserAccount>>;

	/// Finds the account with the given identifier, if any.
	fn find_by_id(&self, id: UserId) -> StoreFuture<'_, Option<UserAccount>>;

	/// Creates an account and returns it with its assigned identifier.
	fn create(&self, account: NewUserAccount) -> StoreFuture<'_, UserAccount>;
}

type DirectoryMap = Arc<RwLock<MemoryDirectoryInner>>;

#[derive(Debug, Default)]
struct MemoryDirectoryInner {
	accounts: Vec<UserAccount>,
	next_id: i64,
}

/// In-memory [`UserDirectory`] for tests and demos.
#[derive(Clone, Debug, Default)]
pub struct MemoryUserDirectory(DirectoryMap);
impl MemoryUserDirectory {
	fn create_now(map: DirectoryMap, account: NewUserAccount) -> Result<UserAccount, StoreError> {
		let mut guard = map.write();

		if guard.accounts.iter().any(|existing| existing.email == account.email) {
			return Err(StoreError::Backend { message: "email already registered".into() });
		}

		guard.next_id += 1;

		let created = UserAccount {
			id: UserId(guard.next_id),
			email: account.email,
			username: account.username,
			password_hash: account.password_hash,
		};

		guard.accounts.push(created.clone());

		Ok(created)
	}
}
impl UserDirectory for MemoryUserDirectory {
	fn find_by_email<'a>(&'a self, email: &'a str) -> StoreFuture<'a, Option<UserAccount>> {
		let map = self.0.clone();
		let email = email.to_owned();

		Box::pin(async move {
			Ok(map.read().accounts.iter().find(|account| account.email == email).cloned())
		})
	}

	fn find_by_id(&self, id: UserId) -> StoreFuture<'_, Option<UserAccount>> {
		let map = self.0.clone();

		Box::pin(
			async move { Ok(map.read().accounts.iter().find(|account| account.id == id).cloned()) },
		)
	}

	fn create(&self, account: NewUserAccount) -> StoreFuture<'_, UserAccount> {
		let map = self.0.clone();

		Box::pin(async move { Self::create_now(map, account) })
	}
}
