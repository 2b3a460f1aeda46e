//! Transport primitives for session-aware API calls.
//!
//! The module exposes [`HttpTransport`] alongside the [`ApiRequest`] descriptor and the
//! [`ApiResponse`] it resolves to, so downstream crates can plug in their own HTTP stack
//! without touching the refresh coordinator. Transports attach the bearer token they are
//! handed, classify the outcome (2xx, non-2xx, network failure), and never retry.

// crates.io
use http::Method;
#[cfg(feature = "reqwest")] use http::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
// self
use crate::{_prelude::*, auth::AccessToken, error::HttpError};
#[cfg(feature = "reqwest")]
use crate::{
	config::ClientConfig,
	error::{ConfigError, TransportError},
};

/// Boxed future returned by [`HttpTransport::send`].
pub type TransportFuture<'a> = Pin<Box<dyn Future<Output = Result<ApiResponse>> + 'a + Send>>;

/// Abstraction over HTTP stacks capable of executing API calls on behalf of the session
/// client.
///
/// Implementations must:
///
/// - attach `Authorization: Bearer <token>` when `token` is `Some`, and send no authorization
///   header otherwise;
/// - carry whatever ambient credential the deployment uses for refreshes (for browsers and
///   reqwest this is the httpOnly refresh cookie kept in the cookie store);
/// - resolve to `Ok` only for 2xx responses, to [`Error::Http`] for any other status, and to
///   [`Error::Transport`] when no response arrived.
///
/// Retrying is the coordinator's job; transports issue exactly one call per `send`.
pub trait HttpTransport
where
	Self: 'static + Send + Sync,
{
	/// Sends `request`, attaching `token` as a bearer credential when present.
	fn send<'a>(
		&'a self,
		request: &'a ApiRequest,
		token: Option<&'a AccessToken>,
	) -> TransportFuture<'a>;
}
impl<T> HttpTransport for Arc<T>
where
	T: ?Sized + HttpTransport,
{
	fn send<'a>(
		&'a self,
		request: &'a ApiRequest,
		token: Option<&'a AccessToken>,
	) -> TransportFuture<'a> {
		(**self).send(request, token)
	}
}

/// Method, path, headers, and body of an API call, plus its retry marker.
///
/// The descriptor is everything needed to replay the call after a refresh. The retry
/// marker is set by the coordinator before the single permitted replay, which caps every
/// logical request at one retry.
#[derive(Clone, Debug, PartialEq)]
pub struct ApiRequest {
	/// HTTP method.
	pub method: Method,
	/// Path relative to the configured base URL.
	pub path: String,
	/// Extra request headers.
	pub headers: BTreeMap<String, String>,
	/// Optional JSON body.
	pub body: Option<serde_json::Value>,
	retried: bool,
}
impl ApiRequest {
	/// Creates a request descriptor for the provided method and path.
	pub fn new(method: Method, path: impl Into<String>) -> Self {
		Self { method, path: path.into(), headers: BTreeMap::new(), body: None, retried: false }
	}

	/// Shorthand for a `GET` descriptor.
	pub fn get(path: impl Into<String>) -> Self {
		Self::new(Method::GET, path)
	}

	/// Shorthand for a `POST` descriptor.
	pub fn post(path: impl Into<String>) -> Self {
		Self::new(Method::POST, path)
	}

	/// Shorthand for a `PUT` descriptor.
	pub fn put(path: impl Into<String>) -> Self {
		Self::new(Method::PUT, path)
	}

	/// Shorthand for a `PATCH` descriptor.
	pub fn patch(path: impl Into<String>) -> Self {
		Self::new(Method::PATCH, path)
	}

	/// Shorthand for a `DELETE` descriptor.
	pub fn delete(path: impl Into<String>) -> Self {
		Self::new(Method::DELETE, path)
	}

	/// Adds or replaces a request header.
	pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
		self.headers.insert(name.into(), value.into());

		self
	}

	/// Sets a raw JSON body.
	pub fn with_body(mut self, body: serde_json::Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Serializes `body` as the JSON payload.
	pub fn with_json<T>(self, body: &T) -> Result<Self>
	where
		T: ?Sized + Serialize,
	{
		let value = serde_json::to_value(body).map_err(Error::Encode)?;

		Ok(self.with_body(value))
	}

	/// Returns `true` once the request has used its single retry.
	pub fn is_retried(&self) -> bool {
		self.retried
	}

	/// Marks the request as having used its single retry.
	pub fn mark_retried(&mut self) {
		self.retried = true;
	}
}

/// Successful (2xx) response returned by a transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ApiResponse {
	/// HTTP status code.
	pub status: u16,
	/// Request path that produced this response.
	pub path: String,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl ApiResponse {
	/// Classifies a raw status + body pair into a response or an [`HttpError`].
	pub fn from_parts(status: u16, path: impl Into<String>, body: Vec<u8>) -> Result<Self> {
		let path = path.into();

		if (200..300).contains(&status) {
			Ok(Self { status, path, body })
		} else {
			Err(HttpError::new(status, path, body).into())
		}
	}

	/// Decodes the body as JSON, reporting the failing field path on error.
	pub fn json<T>(&self) -> Result<T>
	where
		T: for<'de> Deserialize<'de>,
	{
		let body: &[u8] = if self.body.is_empty() { b"null" } else { &self.body };
		let deserializer = &mut serde_json::Deserializer::from_slice(body);

		serde_path_to_error::deserialize(deserializer)
			.map_err(|source| Error::Decode { path: self.path.clone(), source })
	}
}

/// Reqwest-backed [`HttpTransport`] with a cookie store for the refresh credential.
///
/// Redirects are disabled so a `302` to a login page is surfaced as a status instead of
/// silently followed.
#[cfg(feature = "reqwest")]
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
	client: ReqwestClient,
	config: ClientConfig,
}
#[cfg(feature = "reqwest")]
impl ReqwestTransport {
	/// Builds a transport with a fresh cookie-enabled reqwest client.
	pub fn new(config: &ClientConfig) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.cookie_store(true)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self::with_client(client, config))
	}

	/// Wraps an existing reqwest client; enable its cookie store for cookie-based refresh.
	pub fn with_client(client: ReqwestClient, config: &ClientConfig) -> Self {
		Self { client, config: config.clone() }
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestTransport {
	fn as_ref(&self) -> &ReqwestClient {
		&self.client
	}
}
#[cfg(feature = "reqwest")]
impl HttpTransport for ReqwestTransport {
	fn send<'a>(
		&'a self,
		request: &'a ApiRequest,
		token: Option<&'a AccessToken>,
	) -> TransportFuture<'a> {
		Box::pin(async move {
			let url = self.config.resolve(&request.path)?;
			let mut builder = self
				.client
				.request(request.method.clone(), url)
				.header(ACCEPT, "application/json");

			for (name, value) in &request.headers {
				builder = builder.header(name.as_str(), value.as_str());
			}
			if let Some(token) = token {
				builder = builder.header(AUTHORIZATION, token.bearer());
			}
			if let Some(body) = &request.body {
				let payload = serde_json::to_vec(body).map_err(Error::Encode)?;

				builder = builder.header(CONTENT_TYPE, "application/json").body(payload);
			}

			let response = builder
				.send()
				.await
				.map_err(|e| TransportError::network(request.path.as_str(), e))?;
			let status = response.status().as_u16();
			let body = response
				.bytes()
				.await
				.map_err(|e| TransportError::network(request.path.as_str(), e))?
				.to_vec();

			ApiResponse::from_parts(status, request.path.as_str(), body)
		})
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn request_builders_set_method_headers_and_body() {
		let request = ApiRequest::post("/boards")
			.with_header("X-Trace", "abc")
			.with_json(&serde_json::json!({ "name": "Roadmap" }))
			.expect("JSON body should serialize.");

		assert_eq!(request.method, Method::POST);
		assert_eq!(request.headers.get("X-Trace").map(String::as_str), Some("abc"));
		assert_eq!(request.body, Some(serde_json::json!({ "name": "Roadmap" })));
		assert!(!request.is_retried());
	}

	#[test]
	fn retry_marker_survives_clone() {
		let mut request = ApiRequest::get("/users/me");

		request.mark_retried();

		assert!(request.clone().is_retried());
	}

	#[test]
	fn from_parts_classifies_statuses() {
		let ok = ApiResponse::from_parts(204, "/auth/logout", Vec::new())
			.expect("2xx statuses should be accepted.");
		let err = ApiResponse::from_parts(401, "/users/me", b"nope".to_vec())
			.expect_err("Non-2xx statuses should be rejected.");

		assert_eq!(ok.status, 204);
		assert!(matches!(err, Error::Http(HttpError { status: 401, ref body, .. }) if body == b"nope"));
	}

	#[test]
	fn json_decoding_reports_field_path() {
		#[derive(Debug, Deserialize)]
		#[allow(dead_code)]
		struct Payload {
			count: u32,
		}

		let response = ApiResponse::from_parts(200, "/stats", br#"{"count":"many"}"#.to_vec())
			.expect("Fixture response should be accepted.");
		let err = response.json::<Payload>().expect_err("Mistyped field should fail decoding.");

		match err {
			Error::Decode { path, source } => {
				assert_eq!(path, "/stats");
				assert_eq!(source.path().to_string(), "count");
			},
			other => panic!("Unexpected error: {other:?}"),
		}
	}
}
