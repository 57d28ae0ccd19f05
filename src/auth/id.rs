//! Strongly typed identifiers enforced across the broker domain.

// self
use crate::_prelude::*;

/// Unique numeric identifier for a user account.
///
/// Matches the `user_id` column of the persisted refresh-token schema, so the
/// same value flows through claims, records, and directory lookups without
/// stringly-typed conversions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);
impl UserId {
	/// Renders the identifier the way JWT subjects expect it (decimal string).
	pub fn as_subject(self) -> String {
		self.0.to_string()
	}

	/// Parses a JWT subject back into a [`UserId`].
	pub fn from_subject(subject: &str) -> Option<Self> {
		subject.parse().ok().map(Self)
	}
}
impl From<i64> for UserId {
	fn from(value: i64) -> Self {
		Self(value)
	}
}
impl From<UserId> for i64 {
	fn from(value: UserId) -> Self {
		value.0
	}
}
impl Display for UserId {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		Display::fmt(&self.0, f)
	}
}
impl FromStr for UserId {
	type Err = std::num::ParseIntError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		s.parse().map(Self)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn subject_round_trip() {
		let id = UserId(42);

		assert_eq!(id.as_subject(), "42");
		assert_eq!(UserId::from_subject("42"), Some(id));
		assert_eq!(UserId::from_subject("not-a-number"), None);
	}

	#[test]
	fn serde_is_transparent() {
		let id: UserId = serde_json::from_str("7").expect("User id should deserialize from JSON.");

		assert_eq!(id, UserId(7));
		assert_eq!(
			serde_json::to_string(&id).expect("User id should serialize to JSON."),
			"7".to_string()
		);
	}
}
