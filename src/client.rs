//! Wrap shapes that put an [`AuthInjector`] in front of a real HTTP transport.
//!
//! [`HttpTransport`] is the only dependency on the network. [`ReqwestTransport`] adapts a
//! [`ReqwestClient`]; [`InjectingClient`] decorates any transport (itself included) with the
//! interception policy, and [`request`] covers one-off calls through a process-wide client.

// std
use std::{ops::Deref, sync::OnceLock};
// crates.io
use reqwest::header::{CONTENT_TYPE, HeaderName, HeaderValue};
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
	interceptor::AuthInjector,
	obs,
};

/// Boxed future returned by [`HttpTransport::execute`].
pub type TransportFuture<'a> =
	Pin<Box<dyn Future<Output = Result<Response, TransportError>> + 'a + Send>>;

/// Sends fully built requests over the network.
///
/// Implementations must be `Send + Sync` so one transport can serve every task sharing an
/// [`InjectingClient`].
pub trait HttpTransport
where
	Self: Send + Sync,
{
	/// Sends `request` and returns the response, or the transport failure.
	fn execute(&self, request: Request) -> TransportFuture<'_>;
}
impl<T> HttpTransport for Arc<T>
where
	T: ?Sized + HttpTransport,
{
	fn execute(&self, request: Request) -> TransportFuture<'_> {
		(**self).execute(request)
	}
}

/// Thin wrapper around [`ReqwestClient`].
#[derive(Clone, Debug, Default)]
pub struct ReqwestTransport(pub ReqwestClient);
impl ReqwestTransport {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}
}
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
impl Deref for ReqwestTransport {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
impl HttpTransport for ReqwestTransport {
	fn execute(&self, request: Request) -> TransportFuture<'_> {
		Box::pin(async move { Ok(self.0.execute(request).await?) })
	}
}

/// Per-call request options for [`InjectingClient::send`] and [`request`].
#[derive(Clone, Debug, Default)]
pub struct RequestOptions {
	/// Headers supplied by the caller. Never mutated by injection.
	pub headers: HeaderMap,
	/// Request body.
	pub body: Option<Vec<u8>>,
	/// Per-request timeout, overriding the transport's.
	pub timeout: Option<StdDuration>,
}
impl RequestOptions {
	/// Empty options.
	pub fn new() -> Self {
		Self::default()
	}

	/// Appends a header.
	pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
		self.headers.append(name, value);

		self
	}

	/// Replaces every header.
	pub fn headers(mut self, headers: HeaderMap) -> Self {
		self.headers = headers;

		self
	}

	/// Sets a raw body.
	pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
		self.body = Some(body.into());

		self
	}

	/// Serializes `value` as the JSON body and sets `Content-Type: application/json`.
	pub fn json<T>(mut self, value: &T) -> Result<Self, serde_json::Error>
	where
		T: ?Sized + Serialize,
	{
		self.body = Some(serde_json::to_vec(value)?);
		self.headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

		Ok(self)
	}

	/// Sets the per-request timeout.
	pub fn timeout(mut self, timeout: StdDuration) -> Self {
		self.timeout = Some(timeout);

		self
	}

	fn into_request(self, method: Method, url: Url) -> Request {
		let mut request = Request::new(method, url);

		*request.headers_mut() = self.headers;
		*request.timeout_mut() = self.timeout;

		if let Some(body) = self.body {
			*request.body_mut() = Some(body.into());
		}

		request
	}
}

/// Session-style client that injects identity tokens before delegating to `T`.
///
/// Clones share the transport and the injector, so one value can serve any number of tasks.
pub struct InjectingClient<T = ReqwestTransport> {
	transport: Arc<T>,
	injector: AuthInjector,
}
impl<T> InjectingClient<T>
where
	T: HttpTransport,
{
	/// Decorates `transport` with `injector`.
	pub fn new(transport: T, injector: AuthInjector) -> Self {
		Self::with_shared(Arc::new(transport), injector)
	}

	/// Decorates an already shared transport.
	pub fn with_shared(transport: Arc<T>, injector: AuthInjector) -> Self {
		Self { transport, injector }
	}

	/// Installs `injector`, replacing the current one.
	///
	/// Installing twice leaves exactly one injector in place.
	pub fn install(&mut self, injector: AuthInjector) {
		self.injector = injector;
	}

	/// Returns the active injector.
	pub fn injector(&self) -> &AuthInjector {
		&self.injector
	}

	/// Returns the wrapped transport.
	pub fn transport(&self) -> &T {
		&self.transport
	}

	/// Builds a request from `options` and sends it.
	pub async fn send(
		&self,
		method: Method,
		url: Url,
		options: RequestOptions,
	) -> Result<Response> {
		self.execute(options.into_request(method, url)).await
	}

	/// Injects credentials into `request` (when its URL is trusted) and sends it.
	///
	/// Only transport failures are returned; provider problems produce a request without a
	/// token.
	pub async fn execute(&self, request: Request) -> Result<Response> {
		Ok(self.dispatch(request).await?)
	}

	async fn dispatch(&self, mut request: Request) -> Result<Response, TransportError> {
		let url = request.url().clone();
		let authorization = self.injector.prepare(&url, request.headers()).await;
		let retry = if authorization.trusted && self.injector.reauth_on_login_redirect() {
			request.try_clone()
		} else {
			None
		};

		*request.headers_mut() = authorization.headers;

		let response = self.transport.execute(request).await?;
		let mut retry = match retry {
			Some(retry) if is_login_redirect(&url, &response) => retry,
			_ => return Ok(response),
		};

		obs::log_event(&format_args!(
			"request to {url} was redirected to a login page, retrying with a fresh identity token"
		));

		let authorization = self.injector.reauthorize(&url, retry.headers()).await;

		*retry.headers_mut() = authorization.headers;

		self.transport.execute(retry).await
	}
}
impl<T> HttpTransport for InjectingClient<T>
where
	T: HttpTransport,
{
	fn execute(&self, request: Request) -> TransportFuture<'_> {
		Box::pin(self.dispatch(request))
	}
}
impl<T> Clone for InjectingClient<T> {
	fn clone(&self) -> Self {
		Self { transport: self.transport.clone(), injector: self.injector.clone() }
	}
}
impl<T> Debug for InjectingClient<T> {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("InjectingClient").field("injector", &self.injector).finish()
	}
}

static DEFAULT_TRANSPORT: OnceLock<Arc<ReqwestTransport>> = OnceLock::new();

/// Sends a single request through the process-wide default client.
pub async fn request(
	injector: &AuthInjector,
	method: Method,
	url: Url,
	options: RequestOptions,
) -> Result<Response> {
	InjectingClient::with_shared(default_transport()?, injector.clone())
		.send(method, url, options)
		.await
}

fn default_transport() -> Result<Arc<ReqwestTransport>, ConfigError> {
	if let Some(transport) = DEFAULT_TRANSPORT.get() {
		return Ok(transport.clone());
	}

	let client = ReqwestClient::builder().build()?;

	Ok(DEFAULT_TRANSPORT.get_or_init(|| Arc::new(ReqwestTransport(client))).clone())
}

/// An identity-aware proxy answers an expired or rejected token by redirecting to an HTML
/// sign-in page.
///
/// Fragments never reach the server, so they are ignored when deciding whether the final URL
/// moved.
fn is_login_redirect(requested: &Url, response: &Response) -> bool {
	let mut requested = requested.clone();
	let mut landed = response.url().clone();

	requested.set_fragment(None);
	landed.set_fragment(None);

	if landed == requested {
		return false;
	}

	response
		.headers()
		.get(CONTENT_TYPE)
		.and_then(|value| value.to_str().ok())
		.is_some_and(|value| value.to_ascii_lowercase().contains("text/html"))
}
