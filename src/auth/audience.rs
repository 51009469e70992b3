//! Validated relying-party identifiers that identity tokens are scoped to.

// std
use std::{borrow::Borrow, ops::Deref};
// self
use crate::_prelude::*;

/// Error returned when audience validation fails.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum AudienceError {
	/// The audience was empty.
	#[error("Audience cannot be empty.")]
	Empty,
}

/// Relying-party client identifier a token is minted for (the OAuth client ID guarding the
/// trusted server).
///
/// The value is opaque: any non-empty string is accepted and passed through byte for byte.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Audience(String);
impl Audience {
	/// Creates a new audience after validation.
	pub fn new(value: impl AsRef<str>) -> Result<Self, AudienceError> {
		let view = value.as_ref();

		validate_view(view)?;

		Ok(Self(view.to_owned()))
	}
}
impl Deref for Audience {
	type Target = str;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl AsRef<str> for Audience {
	fn as_ref(&self) -> &str {
		&self.0
	}
}
impl Borrow<str> for Audience {
	fn borrow(&self) -> &str {
		&self.0
	}
}
impl From<Audience> for String {
	fn from(value: Audience) -> Self {
		value.0
	}
}
impl TryFrom<String> for Audience {
	type Error = AudienceError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		validate_view(&value)?;

		Ok(Self(value))
	}
}
impl Debug for Audience {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "Audience({})", self.0)
	}
}
impl Display for Audience {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(&self.0)
	}
}
impl FromStr for Audience {
	type Err = AudienceError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

fn validate_view(view: &str) -> Result<(), AudienceError> {
	if view.is_empty() {
		return Err(AudienceError::Empty);
	}

	Ok(())
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn only_empty_audiences_are_rejected() {
		assert_eq!(Audience::new(""), Err(AudienceError::Empty));

		for value in [
			"123-abc.apps.googleusercontent.com".to_owned(),
			"https://api.example.com/ audience".to_owned(),
			"a".repeat(4_096),
		] {
			let audience = Audience::new(&value).expect("Opaque audiences should be accepted.");

			assert_eq!(audience.as_ref(), value);
		}
	}

	#[test]
	fn serde_enforces_validation() {
		let audience: Audience =
			serde_json::from_str("\"abc\"").expect("Audience should deserialize successfully.");

		assert_eq!(audience.as_ref(), "abc");
		assert!(serde_json::from_str::<Audience>("\"\"").is_err());
	}

	#[test]
	fn borrow_supports_fast_lookup() {
		let map: HashMap<Audience, u8> = HashMap::from_iter([(
			Audience::new("abc").expect("Audience used for lookup should be valid."),
			7_u8,
		)]);

		assert_eq!(map.get("abc"), Some(&7));
	}
}
