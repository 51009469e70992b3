//! Fakes shared by the integration tests.

#![allow(dead_code)]

// std
use std::{
	io::Write,
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration as StdDuration,
};
// crates.io
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use parking_lot::Mutex;
use tempfile::{NamedTempFile, TempDir};
use time::OffsetDateTime;
// self
use id_token_injector::{
	auth::{Audience, IdentityToken},
	client::{HttpTransport, TransportFuture},
	config::{ProviderConfig, ProviderName},
	error::{ProviderError, TransportError},
	interceptor::AuthInjector,
	provider::{IdentityProvider, ProviderFuture},
	reqwest::{Request, Response, header::HeaderMap},
	target::StaticServerUrl,
};

pub const TRUSTED_SERVER: &str = "https://api.example.com";
pub const CLIENT_ID: &str = "abc";
pub const SERVICE_ACCOUNT_PEM: &str = include_str!("../fixtures/service_account_key.pem");

/// Unsigned JWT whose payload carries `exp` = now + `lifetime_secs`.
pub fn jwt_expiring_in(lifetime_secs: i64) -> String {
	let exp = OffsetDateTime::now_utc().unix_timestamp() + lifetime_secs;
	let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#);
	let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"aud":"{CLIENT_ID}","exp":{exp}}}"#));

	format!("{header}.{payload}.c2lnbmF0dXJl")
}

pub fn google_config() -> ProviderConfig {
	ProviderConfig::new(
		ProviderName::Google,
		Some(Audience::new(CLIENT_ID).expect("Client identifier fixture should be valid.")),
	)
}

/// Injector trusting [`TRUSTED_SERVER`] and minting through `provider`.
pub fn injector_with(provider: Arc<dyn IdentityProvider>) -> AuthInjector {
	AuthInjector::builder(google_config())
		.provider(provider)
		.server(Arc::new(StaticServerUrl::new(TRUSTED_SERVER)))
		.mint_timeout(StdDuration::from_secs(2))
		.build()
		.expect("Test injector should build.")
}

/// Fresh directory under the system temp dir, removed with everything in it on drop.
pub fn scratch_dir() -> TempDir {
	tempfile::Builder::new()
		.prefix("id-token-injector-")
		.tempdir()
		.expect("Scratch directory should be created.")
}

/// Service account key file exchanging at `token_uri`, removed on drop.
pub fn service_account_file(token_uri: &str) -> NamedTempFile {
	let mut file = tempfile::Builder::new()
		.prefix("id-token-injector-")
		.suffix(".json")
		.tempfile()
		.expect("Credentials file should be created.");

	file.write_all(service_account_json(token_uri).as_bytes())
		.expect("Credentials fixture should be written.");

	file
}

pub fn service_account_json(token_uri: &str) -> String {
	serde_json::json!({
		"type": "service_account",
		"project_id": "injector-tests",
		"private_key_id": "test-key-1",
		"private_key": SERVICE_ACCOUNT_PEM,
		"client_email": "runner@injector-tests.iam.gserviceaccount.com",
		"client_id": "1234567890",
		"token_uri": token_uri,
	})
	.to_string()
}

/// Provider that always mints the same token and counts calls.
pub struct StaticProvider {
	token: String,
	mints: AtomicUsize,
	invalidations: AtomicUsize,
}
impl StaticProvider {
	pub fn new(token: impl Into<String>) -> Arc<Self> {
		Arc::new(Self {
			token: token.into(),
			mints: AtomicUsize::new(0),
			invalidations: AtomicUsize::new(0),
		})
	}

	pub fn mints(&self) -> usize {
		self.mints.load(Ordering::SeqCst)
	}

	pub fn invalidations(&self) -> usize {
		self.invalidations.load(Ordering::SeqCst)
	}
}
impl IdentityProvider for StaticProvider {
	fn name(&self) -> &str {
		"static"
	}

	fn mint_token<'a>(&'a self, _audience: &'a Audience) -> ProviderFuture<'a> {
		Box::pin(async move {
			self.mints.fetch_add(1, Ordering::SeqCst);

			Ok(IdentityToken::new(self.token.clone()))
		})
	}

	fn invalidate(&self, _audience: &Audience) {
		self.invalidations.fetch_add(1, Ordering::SeqCst);
	}
}

/// Provider that mints `tok-0`, `tok-1`, ... and remembers every token it handed out.
#[derive(Default)]
pub struct SequenceProvider {
	next: AtomicUsize,
	minted: Mutex<Vec<String>>,
}
impl SequenceProvider {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn minted(&self) -> Vec<String> {
		self.minted.lock().clone()
	}
}
impl IdentityProvider for SequenceProvider {
	fn name(&self) -> &str {
		"sequence"
	}

	fn mint_token<'a>(&'a self, _audience: &'a Audience) -> ProviderFuture<'a> {
		Box::pin(async move {
			let token = format!("tok-{}", self.next.fetch_add(1, Ordering::SeqCst));

			// Let other requests interleave between minting and injection.
			tokio::task::yield_now().await;
			self.minted.lock().push(token.clone());

			Ok(IdentityToken::new(token))
		})
	}
}

/// Provider whose credentials are never available.
pub struct FailingProvider;
impl IdentityProvider for FailingProvider {
	fn name(&self) -> &str {
		"failing"
	}

	fn mint_token<'a>(&'a self, _audience: &'a Audience) -> ProviderFuture<'a> {
		Box::pin(async { Err(ProviderError::no_credentials("no ambient credentials in tests")) })
	}
}

/// Transport that records each request and echoes its headers back on a `200` JSON response.
#[derive(Default)]
pub struct RecordingTransport {
	seen: Mutex<Vec<(String, HeaderMap)>>,
}
impl RecordingTransport {
	pub fn new() -> Arc<Self> {
		Arc::new(Self::default())
	}

	pub fn requests(&self) -> Vec<(String, HeaderMap)> {
		self.seen.lock().clone()
	}
}
impl HttpTransport for RecordingTransport {
	fn execute(&self, request: Request) -> TransportFuture<'_> {
		self.seen.lock().push((request.url().to_string(), request.headers().clone()));

		let mut builder = http::Response::builder()
			.status(200)
			.header("content-type", "application/json");

		for (name, value) in request.headers() {
			builder = builder.header(name, value);
		}

		let response: Response =
			builder.body(b"{}".to_vec()).expect("Echo response should build.").into();

		Box::pin(async move { Ok(response) })
	}
}

/// Transport whose network is always down.
pub struct OfflineTransport;
impl HttpTransport for OfflineTransport {
	fn execute(&self, _request: Request) -> TransportFuture<'_> {
		Box::pin(async {
			Err(TransportError::network(std::io::Error::new(
				std::io::ErrorKind::ConnectionRefused,
				"connection refused",
			)))
		})
	}
}
