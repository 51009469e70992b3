//! Trusted server resolution and destination matching.
//!
//! The trusted server URL comes from an external configuration collaborator
//! ([`ServerUrlSource`]). [`TrustedServer`] asks it once, normalizes the answer, and keeps the
//! result for as long as the injector lives. [`is_trusted_target`] is the pure matching rule.

// self
use crate::{
	_prelude::*,
	error::{BoxError, ConfigError},
};

/// Environment variable consulted by [`EnvServerUrl::default`].
pub const SERVER_URL_ENV: &str = "SKYPILOT_API_SERVER_ENDPOINT";
/// URL reported by [`EnvServerUrl::default`] when the variable is unset.
pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:46580";

/// Configuration collaborator that knows where the trusted API server lives.
pub trait ServerUrlSource
where
	Self: Send + Sync,
{
	/// Returns the trusted server URL.
	fn server_url(&self) -> Result<String, BoxError>;
}

/// Fixed server URL.
#[derive(Clone, Debug)]
pub struct StaticServerUrl(pub String);
impl StaticServerUrl {
	/// Wraps the provided URL.
	pub fn new(url: impl Into<String>) -> Self {
		Self(url.into())
	}
}
impl ServerUrlSource for StaticServerUrl {
	fn server_url(&self) -> Result<String, BoxError> {
		Ok(self.0.clone())
	}
}

/// Server URL read from an environment variable, with a fallback.
#[derive(Clone, Debug)]
pub struct EnvServerUrl {
	/// Variable to read.
	pub var: String,
	/// Value used when the variable is unset or blank.
	pub fallback: String,
}
impl EnvServerUrl {
	/// Reads `var`, falling back to `fallback`.
	pub fn new(var: impl Into<String>, fallback: impl Into<String>) -> Self {
		Self { var: var.into(), fallback: fallback.into() }
	}
}
impl Default for EnvServerUrl {
	fn default() -> Self {
		Self::new(SERVER_URL_ENV, DEFAULT_SERVER_URL)
	}
}
impl ServerUrlSource for EnvServerUrl {
	fn server_url(&self) -> Result<String, BoxError> {
		match std::env::var(&self.var) {
			Ok(value) if !value.trim().is_empty() => Ok(value),
			Ok(_) | Err(std::env::VarError::NotPresent) => Ok(self.fallback.clone()),
			Err(e) => Err(Box::new(e)),
		}
	}
}

/// Lazily resolved, initialize-once trusted server URL.
///
/// Concurrent first callers share a single resolution. Failed resolutions are not cached, so
/// a later call asks the collaborator again.
pub struct TrustedServer {
	source: Arc<dyn ServerUrlSource>,
	resolved: AsyncOnceCell<String>,
}
impl TrustedServer {
	/// Creates a resolver backed by `source`. Nothing is resolved until first use.
	pub fn new(source: Arc<dyn ServerUrlSource>) -> Self {
		Self { source, resolved: AsyncOnceCell::new() }
	}

	/// Convenience constructor for a fixed URL.
	pub fn fixed(url: impl Into<String>) -> Self {
		Self::new(Arc::new(StaticServerUrl::new(url)))
	}

	/// Returns the normalized trusted server URL, resolving it on first use.
	pub async fn resolve(&self) -> Result<&str> {
		let url = self
			.resolved
			.get_or_try_init(|| async {
				let raw = self
					.source
					.server_url()
					.map_err(|source| ConfigError::ServerUrl { source })?;
				let normalized = normalize_server_url(&raw);

				if normalized.is_empty() {
					return Err(ConfigError::EmptyServerUrl);
				}

				Ok(normalized)
			})
			.await?;

		Ok(url.as_str())
	}

	/// Returns the cached URL without triggering resolution.
	pub fn cached(&self) -> Option<&str> {
		self.resolved.get().map(String::as_str)
	}
}
impl Debug for TrustedServer {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TrustedServer").field("resolved", &self.cached()).finish()
	}
}

/// Decides whether `url` is bound for the trusted server.
///
/// The rule is plain substring containment, which tolerates path suffixes. It is
/// deliberately permissive: a trusted URL that appears inside an unrelated host or query
/// string also matches. An empty trusted URL never matches.
pub fn is_trusted_target(url: &str, trusted: &str) -> bool {
	!trusted.is_empty() && url.contains(trusted)
}

/// Brings the trusted URL into the form [`Url`] serializes outbound URLs in (lowercase host,
/// default port dropped), then strips surrounding slashes. Values that do not parse are only
/// trimmed.
fn normalize_server_url(raw: &str) -> String {
	let trimmed = raw.trim();

	match Url::parse(trimmed) {
		Ok(url) if url.has_host() => url.as_str().trim_matches('/').to_owned(),
		_ => trimmed.trim_matches('/').to_owned(),
	}
}

#[cfg(test)]
mod tests {
	// std
	use std::sync::atomic::{AtomicUsize, Ordering};
	// self
	use super::*;
	use crate::error::Error;

	struct CountingSource {
		calls: AtomicUsize,
		url: &'static str,
	}
	impl ServerUrlSource for CountingSource {
		fn server_url(&self) -> Result<String, BoxError> {
			self.calls.fetch_add(1, Ordering::SeqCst);

			Ok(self.url.to_owned())
		}
	}

	struct FlakySource {
		calls: AtomicUsize,
	}
	impl ServerUrlSource for FlakySource {
		fn server_url(&self) -> Result<String, BoxError> {
			if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
				Err("config not loaded yet".into())
			} else {
				Ok("https://api.example.com/".into())
			}
		}
	}

	#[test]
	fn substring_matching_tolerates_paths() {
		assert!(is_trusted_target("https://api.example.com/v1/jobs", "https://api.example.com"));
		assert!(is_trusted_target("https://api.example.com", "https://api.example.com"));
		assert!(!is_trusted_target("https://other.example.com", "https://api.example.com"));
		assert!(!is_trusted_target("https://api.example.com", ""));
	}

	#[test]
	fn substring_matching_is_permissive() {
		assert!(is_trusted_target(
			"https://evil.example.net/?next=http://10.0.0.5",
			"http://10.0.0.5"
		));
	}

	#[test]
	fn normalization_strips_slashes() {
		assert_eq!(normalize_server_url("https://api.example.com/"), "https://api.example.com");
		assert_eq!(normalize_server_url(" https://api.example.com// "), "https://api.example.com");
		assert_eq!(normalize_server_url("/"), "");
		assert_eq!(
			normalize_server_url("https://api.example.com/api/"),
			"https://api.example.com/api"
		);
		assert_eq!(normalize_server_url("not a url/"), "not a url");
	}

	#[test]
	fn normalization_matches_url_serialization() {
		let trusted = normalize_server_url("https://api.example.com:443");
		let outbound = Url::parse("https://api.example.com:443/v1/jobs")
			.expect("Default-port URL fixture should parse.");

		assert_eq!(trusted, "https://api.example.com");
		assert!(is_trusted_target(outbound.as_str(), &trusted));

		let trusted = normalize_server_url("https://API.Example.com/");
		let outbound = Url::parse("https://API.example.com/v1/jobs")
			.expect("Mixed-case URL fixture should parse.");

		assert_eq!(trusted, "https://api.example.com");
		assert!(is_trusted_target(outbound.as_str(), &trusted));

		let trusted = normalize_server_url("http://127.0.0.1:46580");
		let outbound = Url::parse("http://127.0.0.1:46580/api/health")
			.expect("Explicit-port URL fixture should parse.");

		assert!(is_trusted_target(outbound.as_str(), &trusted));
	}

	#[tokio::test]
	async fn resolution_happens_once() {
		let source = Arc::new(CountingSource {
			calls: AtomicUsize::new(0),
			url: "https://api.example.com/",
		});
		let server = Arc::new(TrustedServer::new(source.clone()));
		let handles = (0..16)
			.map(|_| {
				let server = server.clone();

				tokio::spawn(async move {
					server.resolve().await.map(str::to_owned).expect("Resolution should succeed.")
				})
			})
			.collect::<Vec<_>>();

		for handle in handles {
			assert_eq!(
				handle.await.expect("Resolver task should not panic."),
				"https://api.example.com"
			);
		}

		assert_eq!(source.calls.load(Ordering::SeqCst), 1);
		assert_eq!(server.cached(), Some("https://api.example.com"));
	}

	#[tokio::test]
	async fn failed_resolution_is_retried() {
		let server = TrustedServer::new(Arc::new(FlakySource { calls: AtomicUsize::new(0) }));

		assert!(matches!(
			server.resolve().await,
			Err(Error::Config(ConfigError::ServerUrl { .. }))
		));
		assert_eq!(server.cached(), None);
		assert_eq!(
			server.resolve().await.expect("Second resolution should succeed."),
			"https://api.example.com"
		);
	}

	#[tokio::test]
	async fn empty_url_is_rejected() {
		let server = TrustedServer::fixed("/");

		assert!(matches!(server.resolve().await, Err(Error::Config(ConfigError::EmptyServerUrl))));
	}
}
