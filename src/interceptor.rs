//! The shared interception policy.
//!
//! [`AuthInjector`] owns everything needed to decide what one outbound request should carry:
//! the selected identity provider, the audience, the lazily resolved trusted server, and the
//! bound on how long minting may take. Every wrap shape in [`crate::client`] funnels through
//! [`AuthInjector::authorize`], so the policy exists exactly once.

// self
use crate::{
	_prelude::*,
	auth::{Audience, IdentityToken},
	config::ProviderConfig,
	error::ProviderError,
	inject,
	obs::{self, InjectionOutcome, InterceptSpan},
	provider::{IdentityProvider, ProviderRegistry},
	target::{self, EnvServerUrl, ServerUrlSource, TrustedServer},
};

/// Default bound on a single mint.
pub const DEFAULT_MINT_TIMEOUT: StdDuration = StdDuration::from_secs(10);

/// Why an injector will never attach a token.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DisabledReason {
	/// Provider name or client identifier is missing.
	ConfigurationAbsent,
	/// No adapter is registered for the configured provider name.
	UnsupportedProvider(String),
}
impl Display for DisabledReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::ConfigurationAbsent => f.write_str("identity provider configuration is absent"),
			Self::UnsupportedProvider(name) =>
				write!(f, "identity provider `{name}` is not supported"),
		}
	}
}

/// Resolved injection state, fixed at construction.
#[derive(Clone, Debug)]
pub enum InjectionState {
	/// Tokens are minted by `provider` for `audience`.
	Enabled {
		/// Selected adapter.
		provider: Arc<dyn IdentityProvider>,
		/// Audience tokens are scoped to.
		audience: Audience,
	},
	/// Injection is a no-op.
	Disabled(DisabledReason),
}

/// Result of running the policy for one request.
#[derive(Clone, Debug)]
pub struct Authorization {
	/// Headers to send.
	pub headers: HeaderMap,
	/// What happened.
	pub outcome: InjectionOutcome,
	/// Whether the destination matched the trusted server.
	pub trusted: bool,
}

/// Builder for [`AuthInjector`].
pub struct AuthInjectorBuilder {
	config: ProviderConfig,
	registry: ProviderRegistry,
	provider: Option<Arc<dyn IdentityProvider>>,
	server: Option<Arc<dyn ServerUrlSource>>,
	mint_timeout: StdDuration,
	reauth_on_login_redirect: bool,
}
impl AuthInjectorBuilder {
	/// Creates a builder for `config` using the default provider registry.
	pub fn new(config: ProviderConfig) -> Self {
		Self {
			config,
			registry: ProviderRegistry::with_defaults(),
			provider: None,
			server: None,
			mint_timeout: DEFAULT_MINT_TIMEOUT,
			reauth_on_login_redirect: true,
		}
	}

	/// Replaces the provider registry.
	pub fn registry(mut self, registry: ProviderRegistry) -> Self {
		self.registry = registry;

		self
	}

	/// Uses `provider` directly instead of looking the configured name up in the registry.
	///
	/// The configuration still has to name a provider and a client identifier; otherwise the
	/// injector stays disabled.
	pub fn provider(mut self, provider: Arc<dyn IdentityProvider>) -> Self {
		self.provider = Some(provider);

		self
	}

	/// Sets the trusted server collaborator. Defaults to [`EnvServerUrl::default`].
	pub fn server(mut self, source: Arc<dyn ServerUrlSource>) -> Self {
		self.server = Some(source);

		self
	}

	/// Bounds how long a single mint may take before the request proceeds without a token.
	pub fn mint_timeout(mut self, timeout: StdDuration) -> Self {
		self.mint_timeout = timeout;

		self
	}

	/// Toggles the single re-authenticated retry after a redirect to an HTML login page.
	pub fn reauth_on_login_redirect(mut self, enabled: bool) -> Self {
		self.reauth_on_login_redirect = enabled;

		self
	}

	/// Selects the provider and assembles the injector.
	///
	/// Missing configuration and unsupported providers produce a disabled injector, not an
	/// error. Errors only come from a registered factory that fails to build its adapter.
	pub fn build(self) -> Result<AuthInjector> {
		let state = match self.config.enabled() {
			None => InjectionState::Disabled(DisabledReason::ConfigurationAbsent),
			Some((name, audience)) => {
				let provider = match self.provider {
					Some(provider) => Some(provider),
					None => self.registry.select(name)?,
				};

				match provider {
					Some(provider) =>
						InjectionState::Enabled { provider, audience: audience.clone() },
					None => InjectionState::Disabled(DisabledReason::UnsupportedProvider(
						name.to_string(),
					)),
				}
			},
		};

		match &state {
			InjectionState::Enabled { provider, audience } => obs::log_event(&format_args!(
				"identity token injection enabled (provider: {}, audience: {audience})",
				provider.name()
			)),
			InjectionState::Disabled(reason) =>
				obs::log_event(&format_args!("identity token injection disabled: {reason}")),
		}

		let source = self.server.unwrap_or_else(|| Arc::new(EnvServerUrl::default()));

		Ok(AuthInjector {
			state: Arc::new(state),
			trusted: Arc::new(TrustedServer::new(source)),
			mint_timeout: self.mint_timeout,
			reauth_on_login_redirect: self.reauth_on_login_redirect,
		})
	}
}
impl Debug for AuthInjectorBuilder {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthInjectorBuilder")
			.field("config", &self.config)
			.field("registry", &self.registry)
			.field("mint_timeout", &self.mint_timeout)
			.field("reauth_on_login_redirect", &self.reauth_on_login_redirect)
			.finish()
	}
}

/// Interception policy shared by every client shape.
///
/// Cloning is cheap and clones share the resolved trusted server.
#[derive(Clone)]
pub struct AuthInjector {
	state: Arc<InjectionState>,
	trusted: Arc<TrustedServer>,
	mint_timeout: StdDuration,
	reauth_on_login_redirect: bool,
}
impl AuthInjector {
	/// Starts a builder for `config`.
	pub fn builder(config: ProviderConfig) -> AuthInjectorBuilder {
		AuthInjectorBuilder::new(config)
	}

	/// Builds an injector from the process environment with default collaborators.
	pub fn from_env() -> Result<Self> {
		Self::builder(ProviderConfig::from_env()).build()
	}

	/// Injector that never attaches anything.
	pub fn disabled() -> Self {
		Self {
			state: Arc::new(InjectionState::Disabled(DisabledReason::ConfigurationAbsent)),
			trusted: Arc::new(TrustedServer::new(Arc::new(EnvServerUrl::default()))),
			mint_timeout: DEFAULT_MINT_TIMEOUT,
			reauth_on_login_redirect: false,
		}
	}

	/// Returns the resolved injection state.
	pub fn state(&self) -> &InjectionState {
		&self.state
	}

	/// Returns `true` when tokens can be attached.
	pub fn is_enabled(&self) -> bool {
		matches!(self.state.as_ref(), InjectionState::Enabled { .. })
	}

	/// Returns the trusted server resolver.
	pub fn trusted_server(&self) -> &TrustedServer {
		&self.trusted
	}

	/// Returns `true` when a login-redirect retry is allowed.
	pub fn reauth_on_login_redirect(&self) -> bool {
		self.reauth_on_login_redirect && self.is_enabled()
	}

	/// Returns the headers `url` should be sent with.
	///
	/// Never fails: configuration gaps, resolution failures, and provider failures all yield
	/// an unchanged copy of `headers`.
	pub async fn authorize(&self, url: &Url, headers: &HeaderMap) -> HeaderMap {
		self.prepare(url, headers).await.headers
	}

	/// Runs the policy and reports the outcome alongside the headers.
	pub async fn prepare(&self, url: &Url, headers: &HeaderMap) -> Authorization {
		self.run(url, headers, false).await
	}

	/// Drops any cached token, mints a fresh one, and re-injects it.
	pub async fn reauthorize(&self, url: &Url, headers: &HeaderMap) -> Authorization {
		self.run(url, headers, true).await
	}

	async fn run(&self, url: &Url, headers: &HeaderMap, fresh: bool) -> Authorization {
		let span = InterceptSpan::new(if fresh { "reauthorize" } else { "authorize" });
		let authorization = span
			.instrument(async move {
				let (token, outcome, trusted) = self.token_for(url, fresh).await;

				Authorization {
					headers: inject::inject_auth(headers, token.as_ref()),
					outcome,
					trusted,
				}
			})
			.await;

		span.record_outcome(authorization.outcome, authorization.trusted);
		obs::record_injection_outcome(authorization.outcome);

		authorization
	}

	async fn token_for(
		&self,
		url: &Url,
		fresh: bool,
	) -> (Option<IdentityToken>, InjectionOutcome, bool) {
		let (provider, audience) = match self.state.as_ref() {
			InjectionState::Enabled { provider, audience } => (provider, audience),
			InjectionState::Disabled(reason) => {
				obs::log_skipped(InjectionOutcome::Disabled, reason);

				return (None, InjectionOutcome::Disabled, false);
			},
		};
		let trusted = match self.trusted.resolve().await {
			Ok(trusted) => trusted,
			Err(e) => {
				obs::log_skipped(InjectionOutcome::ServerUnresolved, &e);

				return (None, InjectionOutcome::ServerUnresolved, false);
			},
		};

		if !target::is_trusted_target(url.as_str(), trusted) {
			obs::log_skipped(InjectionOutcome::Untrusted, &url.host_str().unwrap_or_default());

			return (None, InjectionOutcome::Untrusted, false);
		}
		if fresh {
			provider.invalidate(audience);
		}

		match self.mint(provider.as_ref(), audience).await {
			Ok(token) if token.secret.expose().is_empty() => {
				obs::log_skipped(InjectionOutcome::MintFailed, &"provider returned an empty token");

				(None, InjectionOutcome::MintFailed, true)
			},
			Ok(token) => (Some(token), InjectionOutcome::Injected, true),
			Err(e) => {
				obs::log_skipped(
					InjectionOutcome::MintFailed,
					&format_args!("{} ({e})", e.kind()),
				);

				(None, InjectionOutcome::MintFailed, true)
			},
		}
	}

	async fn mint(
		&self,
		provider: &dyn IdentityProvider,
		audience: &Audience,
	) -> Result<IdentityToken, ProviderError> {
		match tokio::time::timeout(self.mint_timeout, provider.mint_token(audience)).await {
			Ok(result) => result,
			Err(_) => Err(ProviderError::Timeout { timeout: self.mint_timeout }),
		}
	}
}
impl Debug for AuthInjector {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("AuthInjector")
			.field("state", &self.state)
			.field("trusted", &self.trusted)
			.field("mint_timeout", &self.mint_timeout)
			.field("reauth_on_login_redirect", &self.reauth_on_login_redirect)
			.finish()
	}
}
