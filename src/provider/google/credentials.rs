//! Application-default credential discovery and the audience-scoped token exchange.
//!
//! Discovery order:
//! 1. the file named by `GOOGLE_APPLICATION_CREDENTIALS`;
//! 2. the gcloud well-known file under `$HOME/.config/gcloud`;
//! 3. the GCE metadata server (`GCE_METADATA_HOST`, default `metadata.google.internal`).

// std
use std::path::{Path, PathBuf};
// crates.io
use jsonwebtoken::{Algorithm, EncodingKey, Header};
// self
use crate::{
	_prelude::*,
	auth::{Audience, IdentityToken},
	error::ProviderError,
};

/// Environment variable naming an explicit credentials file.
pub const CREDENTIALS_ENV: &str = "GOOGLE_APPLICATION_CREDENTIALS";
/// Environment variable overriding the metadata server host.
pub const METADATA_HOST_ENV: &str = "GCE_METADATA_HOST";
/// Metadata server host used on Google Compute Engine and GKE.
pub const DEFAULT_METADATA_HOST: &str = "metadata.google.internal";
/// Token endpoint used when a service account key omits `token_uri`.
pub const DEFAULT_TOKEN_URI: &str = "https://oauth2.googleapis.com/token";
/// Grant type for signed-assertion exchanges (RFC 7523).
pub const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

const ASSERTION_LIFETIME_SECS: i64 = 3_600;
const BODY_PREVIEW_LIMIT: usize = 256;

/// Where to look for ambient credentials.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CredentialDiscovery {
	/// Explicit credentials file; when set, nothing else is consulted.
	pub credentials_file: Option<PathBuf>,
	/// gcloud well-known file, used only if it exists.
	pub well_known_file: Option<PathBuf>,
	/// Metadata server host; `None` disables the metadata fallback.
	pub metadata_host: Option<String>,
}
impl CredentialDiscovery {
	/// Discovery with every source disabled.
	pub fn new() -> Self {
		Self::default()
	}

	/// Discovery configured from the process environment.
	pub fn from_env() -> Self {
		let credentials_file = std::env::var_os(CREDENTIALS_ENV)
			.filter(|value| !value.is_empty())
			.map(PathBuf::from);
		let home = std::env::var_os("HOME").filter(|value| !value.is_empty());
		let well_known_file = home.map(|home| {
			PathBuf::from(home)
				.join(".config")
				.join("gcloud")
				.join("application_default_credentials.json")
		});
		let metadata_host = std::env::var(METADATA_HOST_ENV)
			.ok()
			.filter(|value| !value.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_METADATA_HOST.to_owned());

		Self { credentials_file, well_known_file, metadata_host: Some(metadata_host) }
	}

	/// Uses `path` as the explicit credentials file.
	pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.credentials_file = Some(path.into());

		self
	}

	/// Uses `path` as the well-known fallback file.
	pub fn with_well_known_file(mut self, path: impl Into<PathBuf>) -> Self {
		self.well_known_file = Some(path.into());

		self
	}

	/// Uses `host` (optionally with a port) as the metadata server.
	pub fn with_metadata_host(mut self, host: impl Into<String>) -> Self {
		self.metadata_host = Some(host.into());

		self
	}

	/// Disables the metadata server fallback.
	pub fn without_metadata(mut self) -> Self {
		self.metadata_host = None;

		self
	}

	/// Runs discovery, loading the first source that applies.
	pub async fn discover(&self) -> Result<AmbientCredentials, ProviderError> {
		if let Some(path) = &self.credentials_file {
			return AmbientCredentials::from_file(path).await;
		}
		if let Some(path) = &self.well_known_file
			&& tokio::fs::try_exists(path).await.unwrap_or(false)
		{
			return AmbientCredentials::from_file(path).await;
		}
		if let Some(host) = &self.metadata_host {
			return Ok(AmbientCredentials::MetadataServer(MetadataServer { host: host.clone() }));
		}

		Err(ProviderError::no_credentials(
			"no credentials file was found and the metadata server is disabled",
		))
	}
}

/// Loaded ambient credentials.
#[derive(Debug)]
pub enum AmbientCredentials {
	/// Service account key able to sign its own assertions.
	ServiceAccount(ServiceAccountKey),
	/// Compute metadata server that mints tokens for the attached service account.
	MetadataServer(MetadataServer),
}
impl AmbientCredentials {
	/// Loads a credentials file.
	pub async fn from_file(path: &Path) -> Result<Self, ProviderError> {
		let bytes = tokio::fs::read(path).await.map_err(|e| {
			ProviderError::no_credentials(format!("cannot read {}: {e}", path.display()))
		})?;

		Self::from_json(&bytes)
	}

	/// Parses the JSON contents of a credentials file.
	pub fn from_json(bytes: &[u8]) -> Result<Self, ProviderError> {
		let mut de = serde_json::Deserializer::from_slice(bytes);
		let file: CredentialFile =
			serde_path_to_error::deserialize(&mut de).map_err(ProviderError::refresh_failed)?;

		match file {
			CredentialFile::ServiceAccount(account) =>
				ServiceAccountKey::load(account).map(Self::ServiceAccount),
			CredentialFile::AuthorizedUser {} => Err(ProviderError::no_credentials(
				"authorized_user credentials cannot mint audience-scoped identity tokens",
			)),
			CredentialFile::Unsupported => Err(ProviderError::no_credentials(
				"credentials file has an unsupported type",
			)),
		}
	}

	/// Stable label for logs.
	pub const fn kind(&self) -> &'static str {
		match self {
			Self::ServiceAccount(_) => "service_account",
			Self::MetadataServer(_) => "metadata_server",
		}
	}

	/// Exchanges the credentials for an identity token scoped to `audience`.
	pub async fn exchange(
		&self,
		http: &ReqwestClient,
		audience: &Audience,
	) -> Result<IdentityToken, ProviderError> {
		match self {
			Self::ServiceAccount(key) => key.exchange(http, audience).await,
			Self::MetadataServer(server) => server.exchange(http, audience).await,
		}
	}
}

/// Service account key material.
pub struct ServiceAccountKey {
	/// Service account email, used as the assertion issuer.
	pub client_email: String,
	/// Key identifier placed in the assertion header.
	pub private_key_id: Option<String>,
	/// Token endpoint the assertion is posted to.
	pub token_uri: Url,
	signing_key: EncodingKey,
}
impl ServiceAccountKey {
	fn load(file: ServiceAccountFile) -> Result<Self, ProviderError> {
		let signing_key = EncodingKey::from_rsa_pem(file.private_key.as_bytes())
			.map_err(ProviderError::refresh_failed)?;
		let token_uri = Url::parse(file.token_uri.as_deref().unwrap_or(DEFAULT_TOKEN_URI))
			.map_err(ProviderError::refresh_failed)?;

		Ok(Self {
			client_email: file.client_email,
			private_key_id: file.private_key_id,
			token_uri,
			signing_key,
		})
	}

	async fn exchange(
		&self,
		http: &ReqwestClient,
		audience: &Audience,
	) -> Result<IdentityToken, ProviderError> {
		let assertion = self.sign_assertion(audience, OffsetDateTime::now_utc())?;
		let response = http
			.post(self.token_uri.clone())
			.form(&[("grant_type", JWT_BEARER_GRANT), ("assertion", assertion.as_str())])
			.send()
			.await
			.map_err(|e| {
				ProviderError::token_exchange(format!("token endpoint unreachable: {e}"))
			})?;
		let status = response.status();
		let body = response.bytes().await.map_err(|e| ProviderError::TokenExchangeFailed {
			message: format!("token response could not be read: {e}"),
			status: Some(status.as_u16()),
		})?;

		if !status.is_success() {
			return Err(ProviderError::TokenExchangeFailed {
				message: summarize_error_body(&body),
				status: Some(status.as_u16()),
			});
		}

		let mut de = serde_json::Deserializer::from_slice(&body);
		let parsed: IdTokenResponse = serde_path_to_error::deserialize(&mut de).map_err(|e| {
			ProviderError::TokenExchangeFailed {
				message: format!("malformed token response: {e}"),
				status: Some(status.as_u16()),
			}
		})?;

		Ok(IdentityToken::from_jwt(parsed.id_token))
	}

	fn sign_assertion(
		&self,
		audience: &Audience,
		now: OffsetDateTime,
	) -> Result<String, ProviderError> {
		let issued_at = now.unix_timestamp();
		let claims = AssertionClaims {
			iss: &self.client_email,
			aud: self.token_uri.as_str(),
			target_audience: audience,
			iat: issued_at,
			exp: issued_at + ASSERTION_LIFETIME_SECS,
		};
		let mut header = Header::new(Algorithm::RS256);

		header.kid = self.private_key_id.clone();

		jsonwebtoken::encode(&header, &claims, &self.signing_key)
			.map_err(|e| ProviderError::token_exchange(format!("assertion signing failed: {e}")))
	}
}
impl Debug for ServiceAccountKey {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("ServiceAccountKey")
			.field("client_email", &self.client_email)
			.field("private_key_id", &self.private_key_id)
			.field("token_uri", &self.token_uri.as_str())
			.field("signing_key", &"<redacted>")
			.finish()
	}
}

/// Compute metadata server endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MetadataServer {
	/// Host (and optional port) of the metadata server.
	pub host: String,
}
impl MetadataServer {
	/// Builds the identity endpoint URL for `audience`.
	pub fn identity_url(&self, audience: &Audience) -> Result<Url, ProviderError> {
		let mut url = Url::parse(&format!(
			"http://{}/computeMetadata/v1/instance/service-accounts/default/identity",
			self.host
		))
		.map_err(ProviderError::refresh_failed)?;

		url.query_pairs_mut().append_pair("audience", audience).append_pair("format", "full");

		Ok(url)
	}

	async fn exchange(
		&self,
		http: &ReqwestClient,
		audience: &Audience,
	) -> Result<IdentityToken, ProviderError> {
		let response = http
			.get(self.identity_url(audience)?)
			.header("Metadata-Flavor", "Google")
			.send()
			.await
			.map_err(|e| {
				if e.is_connect() {
					ProviderError::no_credentials(format!("metadata server unreachable: {e}"))
				} else {
					ProviderError::refresh_failed(e)
				}
			})?;
		let status = response.status();
		let body = response.text().await.map_err(|e| ProviderError::TokenExchangeFailed {
			message: format!("metadata response could not be read: {e}"),
			status: Some(status.as_u16()),
		})?;

		if !status.is_success() {
			return Err(ProviderError::TokenExchangeFailed {
				message: summarize_error_body(body.as_bytes()),
				status: Some(status.as_u16()),
			});
		}

		let raw = body.trim();

		if raw.is_empty() {
			return Err(ProviderError::TokenExchangeFailed {
				message: "metadata server returned an empty token".into(),
				status: Some(status.as_u16()),
			});
		}

		Ok(IdentityToken::from_jwt(raw))
	}
}

#[derive(Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum CredentialFile {
	ServiceAccount(ServiceAccountFile),
	AuthorizedUser {},
	#[serde(other)]
	Unsupported,
}

#[derive(Deserialize)]
struct ServiceAccountFile {
	client_email: String,
	private_key: String,
	private_key_id: Option<String>,
	token_uri: Option<String>,
}

#[derive(Serialize)]
struct AssertionClaims<'a> {
	iss: &'a str,
	aud: &'a str,
	target_audience: &'a str,
	iat: i64,
	exp: i64,
}

#[derive(Deserialize)]
struct IdTokenResponse {
	id_token: String,
}

#[derive(Deserialize)]
struct OAuthErrorBody {
	error: String,
	error_description: Option<String>,
}

fn summarize_error_body(body: &[u8]) -> String {
	if let Ok(parsed) = serde_json::from_slice::<OAuthErrorBody>(body) {
		return match parsed.error_description {
			Some(description) => format!("{}: {description}", parsed.error),
			None => parsed.error,
		};
	}

	truncate_preview(String::from_utf8_lossy(body).trim())
}

fn truncate_preview(body: &str) -> String {
	if body.chars().count() <= BODY_PREVIEW_LIMIT {
		return body.to_owned();
	}

	let mut buf = body.chars().take(BODY_PREVIEW_LIMIT).collect::<String>();

	buf.push('…');

	buf
}
