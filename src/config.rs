//! Provider configuration resolved once per process.
//!
//! Two values decide whether injection happens at all: the provider name and the client
//! identifier used as the token audience. Either one missing turns the injector into a
//! no-op; neither situation is an error.

// self
use crate::{_prelude::*, auth::Audience};

/// Environment variable naming the identity provider (compared case-insensitively).
pub const PROVIDER_ENV: &str = "SKY_OAUTH_PROVIDER";
/// Environment variable holding the relying-party client identifier.
pub const CLIENT_ID_ENV: &str = "SKY_OAUTH_CLIENT_ID";

/// Identity provider selected by configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum ProviderName {
	/// Google application-default credentials.
	Google,
	/// A provider name with no built-in meaning; resolved through the registry.
	Other(String),
	/// No provider configured.
	#[default]
	None,
}
impl ProviderName {
	/// Returns the normalized (lowercase) label used as a registry key.
	pub fn as_str(&self) -> &str {
		match self {
			Self::Google => "google",
			Self::Other(name) => name,
			Self::None => "none",
		}
	}

	/// Returns `true` when no provider is configured.
	pub fn is_none(&self) -> bool {
		matches!(self, Self::None)
	}
}
impl FromStr for ProviderName {
	type Err = std::convert::Infallible;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let normalized = s.trim().to_ascii_lowercase();

		Ok(match normalized.as_str() {
			"" | "none" => Self::None,
			"google" => Self::Google,
			_ => Self::Other(normalized),
		})
	}
}
impl Display for ProviderName {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Immutable provider configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProviderConfig {
	/// Provider that mints tokens.
	pub provider: ProviderName,
	/// Audience tokens are minted for.
	pub client_id: Option<Audience>,
}
impl ProviderConfig {
	/// Creates a configuration from explicit values.
	pub fn new(provider: ProviderName, client_id: Option<Audience>) -> Self {
		Self { provider, client_id }
	}

	/// Configuration that never injects anything.
	pub fn disabled() -> Self {
		Self::default()
	}

	/// Reads [`PROVIDER_ENV`] and [`CLIENT_ID_ENV`] from the process environment.
	pub fn from_env() -> Self {
		Self::from_lookup(|key| std::env::var(key).ok())
	}

	/// Reads the configuration through an arbitrary key lookup.
	///
	/// Values are trimmed and blank values count as absent. Anything else is taken as the
	/// client identifier verbatim.
	pub fn from_lookup<F>(lookup: F) -> Self
	where
		F: Fn(&str) -> Option<String>,
	{
		let provider = lookup(PROVIDER_ENV)
			.map(|raw| raw.parse::<ProviderName>().unwrap_or_default())
			.unwrap_or_default();
		// Blank values are the only ones `Audience` rejects.
		let client_id = lookup(CLIENT_ID_ENV).and_then(|raw| Audience::new(raw.trim()).ok());

		Self { provider, client_id }
	}

	/// Returns the provider and audience when both are present.
	pub fn enabled(&self) -> Option<(&ProviderName, &Audience)> {
		if self.provider.is_none() {
			return None;
		}

		self.client_id.as_ref().map(|audience| (&self.provider, audience))
	}
}
