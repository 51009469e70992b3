//! Bearer material that never shows up in logs.

// crates.io
use reqwest::header::HeaderValue;
// self
use crate::_prelude::*;

/// Raw token string. `Debug` and `Display` only ever print a redaction marker.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSecret(String);
impl TokenSecret {
	/// Wraps the raw token.
	pub fn new(value: impl Into<String>) -> Self {
		Self(value.into())
	}

	/// Returns the raw token. Do not log the result.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// `Bearer <token>`, as carried by the `Authorization` header.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}

	/// Builds a sensitive `Authorization` header value.
	///
	/// Returns `None` for empty tokens and for tokens with bytes a header cannot carry.
	pub fn to_header_value(&self) -> Option<HeaderValue> {
		if self.0.is_empty() {
			return None;
		}

		let mut value = HeaderValue::from_str(&self.bearer()).ok()?;

		value.set_sensitive(true);

		Some(value)
	}
}
impl Debug for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "TokenSecret(<redacted, {} bytes>)", self.0.len())
	}
}
impl Display for TokenSecret {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
