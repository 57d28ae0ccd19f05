//! Secure token secret wrapper that redacts sensitive material.

// crates.io
use rand::RngCore;
use sha2::{Digest, Sha256};
// self
use crate::_prelude::*;

/// Number of random bytes backing a freshly minted refresh secret (256 bits).
const SECRET_BYTES: usize = 32;

/// Redacted token secret wrapper keeping sensitive material out of logs.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps an existing secret string.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Mints a cryptographically random secret, hex-encoded.
	pub fn generate() -> Self {
		let mut buf = [0_u8; SECRET_BYTES];

		rand::rng().fill_bytes(&mut buf);

		Self(hex::encode(buf))
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// SHA-256 digest of the secret, hex-encoded; the only form stores persist.
	pub fn digest(&self) -> String {
		digest_value(&self.0)
	}
}
impl AsRef<str> for TokenSecret {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("TokenSecret").field(&"<redacted>").finish()
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}

/// Digests a raw token value the same way [`TokenSecret::digest`] does.
///
/// Store implementations use this to look up rows for values that arrive as
/// plain strings on the wire.
pub fn digest_value(value: &str) -> String {
	hex::encode(Sha256::digest(value.as_bytes()))
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn secret_formatters_redact() {
		let secret = TokenSecret::new("super-secret");

		assert_eq!(format!("{secret:?}"), "TokenSecret(\"<redacted>\")");
		assert_eq!(format!("{secret}"), "<redacted>");
	}

	#[test]
	fn generated_secrets_are_long_and_unique() {
		let a = TokenSecret::generate();
		let b = TokenSecret::generate();

		// 32 random bytes, hex-encoded.
		assert_eq!(a.expose().len(), 64);
		assert_ne!(a.expose(), b.expose());
	}

	#[test]
	fn digest_matches_free_function() {
		let secret = TokenSecret::new("value");

		assert_eq!(secret.digest(), digest_value("value"));
		assert_ne!(secret.digest(), digest_value("other"));
	}
}
