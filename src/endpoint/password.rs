//! Argon2 password hashing for login and register.

// crates.io
use argon2::{
	Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
	password_hash::{SaltString, rand_core::OsRng},
};
// self
use crate::{_prelude::*, error::ConfigError};

/// Hashes and verifies account passwords using Argon2id PHC strings.
#[derive(Clone, Copy, Debug, Default)]
pub struct PasswordVault;
impl PasswordVault {
	/// Hashes a plaintext password with a fresh random salt.
	pub fn hash(&self, password: &str) -> Result<String> {
		let salt = SaltString::generate(&mut OsRng);
		let hash = Argon2::default()
			.hash_password(password.as_bytes(), &salt)
			.map_err(|err| ConfigError::PasswordHash { message: err.to_string() })?;

		Ok(hash.to_string())
	}

	/// Verifies a plaintext password against a stored PHC string.
	///
	/// A mismatched password returns `Ok(false)`; a corrupt stored hash is a
	/// configuration failure, not a credential failure.
	pub fn verify(&self, password: &str, stored_hash: &str) -> Result<bool> {
		let parsed = PasswordHash::new(stored_hash)
			.map_err(|err| ConfigError::PasswordHash { message: err.to_string() })?;

		match Argon2::default().verify_password(password.as_bytes(), &parsed) {
			Ok(()) => Ok(true),
			Err(argon2::password_hash::Error::Password) => Ok(false),
			Err(err) => Err(ConfigError::PasswordHash { message: err.to_string() }.into()),
		}
	}
}
