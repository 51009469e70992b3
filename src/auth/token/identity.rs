//! Short-lived identity tokens minted by providers.

// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
// self
use crate::{_prelude::*, auth::TokenSecret};

/// Signed identity token (usually an OIDC ID token) ready to be presented as a bearer.
///
/// The expiry is advisory: providers use it to decide when a cached token must be
/// replaced, and the injector itself never inspects it.
#[derive(Clone, PartialEq, Eq)]
pub struct IdentityToken {
	/// Bearer secret; callers must avoid logging it.
	pub secret: TokenSecret,
	/// Expiry instant, when the token advertises one.
	pub expires_at: Option<OffsetDateTime>,
}
impl IdentityToken {
	/// Wraps a raw token without expiry information.
	pub fn new(secret: impl Into<String>) -> Self {
		Self { secret: TokenSecret::new(secret), expires_at: None }
	}

	/// Wraps a compact JWT, reading `exp` from its payload when present.
	///
	/// The signature is not verified; the token is only forwarded to its audience.
	pub fn from_jwt(raw: impl Into<String>) -> Self {
		let raw = raw.into();
		let expires_at = read_jwt_expiry(&raw);

		Self { secret: TokenSecret::new(raw), expires_at }
	}

	/// Overrides the expiry instant.
	pub fn with_expires_at(mut self, instant: OffsetDateTime) -> Self {
		self.expires_at = Some(instant);

		self
	}

	/// Returns `true` when the token stays valid for at least `skew` past `now`.
	///
	/// Tokens without an expiry are never considered fresh, so they are never reused.
	pub fn is_fresh_at(&self, now: OffsetDateTime, skew: Duration) -> bool {
		match self.expires_at {
			Some(expires_at) => expires_at - now > skew,
			None => false,
		}
	}
}
impl Debug for IdentityToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("IdentityToken")
			.field("secret", &self.secret)
			.field("expires_at", &self.expires_at)
			.finish()
	}
}

#[derive(Deserialize)]
struct ExpiryClaim {
	exp: Option<i64>,
}

fn read_jwt_expiry(raw: &str) -> Option<OffsetDateTime> {
	let payload = raw.split('.').nth(1)?;
	let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
	let claim = serde_json::from_slice::<ExpiryClaim>(&bytes).ok()?;

	OffsetDateTime::from_unix_timestamp(claim.exp?).ok()
}
