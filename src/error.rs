//! Injector-level error types shared across providers, target resolution, and transports.

// self
use crate::_prelude::*;

/// Injector-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Boxed error used wherever a collaborator reports its own failure type.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical injector error exposed by public APIs.
///
/// Only [`Error::Transport`] ever reaches callers of the intercepted clients; configuration
/// problems surface while building an injector and provider failures are absorbed at the
/// interception boundary.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Identity provider could not mint a token.
	#[error(transparent)]
	Provider(#[from] ProviderError),
	/// Transport failure (DNS, TCP, TLS) while sending the real request.
	#[error(transparent)]
	Transport(#[from] TransportError),
}

/// Configuration and validation failures raised while assembling an injector.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Audience value failed validation.
	#[error(transparent)]
	InvalidAudience(#[from] crate::auth::AudienceError),
	/// Server configuration collaborator failed to report the trusted server URL.
	#[error("Trusted server URL could not be resolved.")]
	ServerUrl {
		/// Collaborator failure.
		#[source]
		source: BoxError,
	},
	/// Server configuration collaborator reported an empty URL.
	#[error("Trusted server URL is empty.")]
	EmptyServerUrl,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Identity provider failures. None of these abort an outbound request.
#[derive(Debug, ThisError)]
pub enum ProviderError {
	/// No ambient credentials could be found or used.
	#[error("No ambient credentials are available: {reason}.")]
	NoCredentials {
		/// Why discovery came up empty.
		reason: String,
	},
	/// Ambient credentials were found but could not be loaded or refreshed.
	#[error("Ambient credentials could not be refreshed.")]
	RefreshFailed {
		/// Underlying loading or refresh failure.
		#[source]
		source: BoxError,
	},
	/// The audience-scoped token exchange failed.
	#[error("Identity token exchange failed: {message}.")]
	TokenExchangeFailed {
		/// Provider- or injector-supplied message summarizing the failure.
		message: String,
		/// HTTP status code, when available.
		status: Option<u16>,
	},
	/// Minting did not finish within the configured bound.
	#[error("Identity token minting exceeded {timeout:?}.")]
	Timeout {
		/// Bound that was exceeded.
		timeout: StdDuration,
	},
}
impl ProviderError {
	/// Builds [`ProviderError::NoCredentials`] from any displayable reason.
	pub fn no_credentials(reason: impl Into<String>) -> Self {
		Self::NoCredentials { reason: reason.into() }
	}

	/// Wraps a loading or refresh failure.
	pub fn refresh_failed(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::RefreshFailed { source: Box::new(src) }
	}

	/// Builds [`ProviderError::TokenExchangeFailed`] without an HTTP status.
	pub fn token_exchange(message: impl Into<String>) -> Self {
		Self::TokenExchangeFailed { message: message.into(), status: None }
	}

	/// Stable label suitable for span or metric fields.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::NoCredentials { .. } => "no_credentials",
			Self::RefreshFailed { .. } => "refresh_failed",
			Self::TokenExchangeFailed { .. } => "token_exchange_failed",
			Self::Timeout { .. } => "timeout",
		}
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while sending the request.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while sending the request.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}
