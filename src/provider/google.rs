//! Google identity tokens minted from application-default credentials.
//!
//! Minting is two independent steps. First the ambient credentials are loaded (and kept for
//! later calls); then they are exchanged for an ID token whose `aud` is the requested
//! audience, which is what Identity-Aware Proxy and Cloud Run expect. Tokens are cached per
//! audience until shortly before they expire, and concurrent mints for the same audience are
//! collapsed into one exchange.

pub mod credentials;

pub use credentials::*;

// crates.io
use reqwest::redirect::Policy;
// self
use crate::{
	_prelude::*,
	auth::{Audience, IdentityToken},
	error::{ConfigError, ProviderError},
	provider::{IdentityProvider, ProviderFuture},
};

/// Cached tokens are replaced once they are this close to expiry.
pub const TOKEN_REFRESH_SKEW: Duration = Duration::seconds(60);

const EXCHANGE_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// `google` identity provider adapter.
pub struct GoogleIdentityProvider {
	http: ReqwestClient,
	discovery: CredentialDiscovery,
	credentials: AsyncMutex<Option<Arc<AmbientCredentials>>>,
	tokens: Mutex<HashMap<Audience, IdentityToken>>,
	mint_guards: Mutex<HashMap<Audience, Arc<AsyncMutex<()>>>>,
}
impl GoogleIdentityProvider {
	/// Creates an adapter that discovers credentials from the process environment.
	pub fn from_env() -> Result<Self, ConfigError> {
		Self::new(CredentialDiscovery::from_env())
	}

	/// Creates an adapter with explicit discovery settings and a dedicated HTTP client.
	///
	/// The client never follows redirects: token endpoints answer directly.
	pub fn new(discovery: CredentialDiscovery) -> Result<Self, ConfigError> {
		let http =
			ReqwestClient::builder().redirect(Policy::none()).timeout(EXCHANGE_TIMEOUT).build()?;

		Ok(Self::with_client(http, discovery))
	}

	/// Creates an adapter that reuses the caller-provided HTTP client for token exchanges.
	pub fn with_client(http: ReqwestClient, discovery: CredentialDiscovery) -> Self {
		Self {
			http,
			discovery,
			credentials: AsyncMutex::new(None),
			tokens: Default::default(),
			mint_guards: Default::default(),
		}
	}

	/// Returns the discovery settings in use.
	pub fn discovery(&self) -> &CredentialDiscovery {
		&self.discovery
	}

	async fn credentials(&self) -> Result<Arc<AmbientCredentials>, ProviderError> {
		let mut slot = self.credentials.lock().await;

		if let Some(existing) = slot.as_ref() {
			return Ok(existing.clone());
		}

		let loaded = Arc::new(self.discovery.discover().await?);

		#[cfg(feature = "tracing")]
		tracing::debug!(kind = loaded.kind(), "loaded google ambient credentials");

		*slot = Some(loaded.clone());

		Ok(loaded)
	}

	fn cached(&self, audience: &Audience) -> Option<IdentityToken> {
		let now = OffsetDateTime::now_utc();

		self.tokens
			.lock()
			.get(audience)
			.filter(|token| token.is_fresh_at(now, TOKEN_REFRESH_SKEW))
			.cloned()
	}

	fn mint_guard(&self, audience: &Audience) -> Arc<AsyncMutex<()>> {
		let mut guards = self.mint_guards.lock();

		guards.entry(audience.clone()).or_insert_with(|| Arc::new(AsyncMutex::new(()))).clone()
	}
}
impl IdentityProvider for GoogleIdentityProvider {
	fn name(&self) -> &str {
		"google"
	}

	fn mint_token<'a>(&'a self, audience: &'a Audience) -> ProviderFuture<'a> {
		Box::pin(async move {
			if let Some(token) = self.cached(audience) {
				return Ok(token);
			}

			let guard = self.mint_guard(audience);
			let _singleflight = guard.lock().await;

			if let Some(token) = self.cached(audience) {
				return Ok(token);
			}

			let credentials = self.credentials().await?;
			let token = credentials.exchange(&self.http, audience).await?;

			if token.is_fresh_at(OffsetDateTime::now_utc(), TOKEN_REFRESH_SKEW) {
				self.tokens.lock().insert(audience.clone(), token.clone());
			}

			Ok(token)
		})
	}

	fn invalidate(&self, audience: &Audience) {
		self.tokens.lock().remove(audience);
	}
}
impl Debug for GoogleIdentityProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("GoogleIdentityProvider")
			.field("discovery", &self.discovery)
			.field("cached_tokens", &self.tokens.lock().len())
			.finish()
	}
}
