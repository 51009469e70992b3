//! Name-keyed registry of identity provider factories.

// self
use crate::{
	_prelude::*,
	config::ProviderName,
	error::ConfigError,
	provider::{GoogleIdentityProvider, IdentityProvider},
};

/// Factory that builds a provider instance for an injector.
pub type ProviderFactory =
	Arc<dyn Fn() -> Result<Arc<dyn IdentityProvider>, ConfigError> + Send + Sync>;

/// Maps provider names to factories.
///
/// Names are matched against [`ProviderName::as_str`], so registrations should use lowercase
/// keys. Looking up an unregistered name yields `None`; callers treat that as "injection
/// disabled" rather than an error.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
	factories: HashMap<String, ProviderFactory>,
}
impl ProviderRegistry {
	/// Empty registry.
	pub fn new() -> Self {
		Self::default()
	}

	/// Registry with the built-in `google` adapter.
	pub fn with_defaults() -> Self {
		Self::new().register(ProviderName::Google.as_str(), || {
			Ok(Arc::new(GoogleIdentityProvider::from_env()?) as Arc<dyn IdentityProvider>)
		})
	}

	/// Registers (or replaces) the factory for `name`.
	pub fn register<F>(mut self, name: impl Into<String>, factory: F) -> Self
	where
		F: 'static + Fn() -> Result<Arc<dyn IdentityProvider>, ConfigError> + Send + Sync,
	{
		self.factories.insert(name.into().to_ascii_lowercase(), Arc::new(factory));

		self
	}

	/// Registers an already built provider instance under `name`.
	pub fn register_instance(
		self,
		name: impl Into<String>,
		provider: Arc<dyn IdentityProvider>,
	) -> Self {
		self.register(name, move || Ok(provider.clone()))
	}

	/// Returns `true` when a factory exists for `name`.
	pub fn contains(&self, name: &ProviderName) -> bool {
		self.factories.contains_key(name.as_str())
	}

	/// Builds the provider registered for `name`, if any.
	pub fn select(
		&self,
		name: &ProviderName,
	) -> Result<Option<Arc<dyn IdentityProvider>>, ConfigError> {
		if name.is_none() {
			return Ok(None);
		}

		self.factories.get(name.as_str()).map(|factory| factory()).transpose()
	}
}
impl Debug for ProviderRegistry {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let mut names = self.factories.keys().collect::<Vec<_>>();

		names.sort();

		f.debug_struct("ProviderRegistry").field("providers", &names).finish()
	}
}
