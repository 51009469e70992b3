//! Optional observability helpers for the interception path.
//!
//! # Feature Flags
//!
//! - `tracing` (default) emits spans named `id_token_injector.intercept` with `stage`,
//!   `outcome`, and `trusted` fields. Swallowed provider failures log at `warn` and skipped
//!   injections at `debug`.
//! - `metrics` increments the `id_token_injector_requests_total` counter once per intercepted
//!   request, labeled by `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// What the interceptor did with a single outbound request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum InjectionOutcome {
	/// A bearer token was attached.
	Injected,
	/// The destination is not the trusted server.
	Untrusted,
	/// Configuration is absent or the provider is unsupported.
	Disabled,
	/// The trusted server URL could not be resolved.
	ServerUnresolved,
	/// The provider failed or timed out.
	MintFailed,
}
impl InjectionOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			InjectionOutcome::Injected => "injected",
			InjectionOutcome::Untrusted => "untrusted",
			InjectionOutcome::Disabled => "disabled",
			InjectionOutcome::ServerUnresolved => "server_unresolved",
			InjectionOutcome::MintFailed => "mint_failed",
		}
	}
}
impl Display for InjectionOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
