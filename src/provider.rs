//! Identity provider adapters.
//!
//! An adapter turns an [`Audience`] into a signed [`IdentityToken`]. The interceptor only
//! sees the [`IdentityProvider`] capability; which adapter backs it is decided once, by name,
//! through the [`ProviderRegistry`]. Adapters own whatever credential or token caching they
//! need.

pub mod google;
pub mod registry;

pub use google::*;
pub use registry::*;

// self
use crate::{
	_prelude::*,
	auth::{Audience, IdentityToken},
	error::ProviderError,
};

/// Boxed future returned by [`IdentityProvider::mint_token`].
pub type ProviderFuture<'a> =
	Pin<Box<dyn Future<Output = Result<IdentityToken, ProviderError>> + 'a + Send>>;

/// Capability: given an audience, produce a bearer identity token.
///
/// Implementations must be `Send + Sync`; one adapter instance serves every concurrent
/// request that flows through an injector.
pub trait IdentityProvider
where
	Self: Send + Sync,
{
	/// Stable provider label used in logs.
	fn name(&self) -> &str;

	/// Mints (or reuses) a token scoped to `audience`.
	fn mint_token<'a>(&'a self, audience: &'a Audience) -> ProviderFuture<'a>;

	/// Drops any cached token for `audience` so the next mint fetches a fresh one.
	///
	/// The default implementation does nothing, which suits adapters without a cache.
	fn invalidate(&self, _audience: &Audience) {}
}
impl Debug for dyn IdentityProvider {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "IdentityProvider({})", self.name())
	}
}
