//! Client-level error types shared across the transport, coordinator, guards, and facade.

// self
use crate::{_prelude::*, guard::LinkGateKind};

/// Client-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical client error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS); no response reached the caller.
	#[error(transparent)]
	Transport(#[from] TransportError),
	/// Server answered with a non-2xx status.
	#[error(transparent)]
	Http(#[from] HttpError),
	/// Session could not be recovered; the local session has been cleared.
	#[error(transparent)]
	SessionExpired(#[from] SessionExpired),
	/// One-time link token (email verification, password reset) was rejected.
	#[error("The {gate} link is invalid or has expired.")]
	ValidationTokenExpired {
		/// Which link family rejected the token.
		gate: LinkGateKind,
	},
	/// Login succeeded but the response carried no usable access token.
	#[error("Response from {path} carried no access token.")]
	MissingAccessToken {
		/// Request path that produced the body.
		path: String,
	},
	/// A 2xx response body could not be decoded.
	#[error("Response from {path} could not be decoded.")]
	Decode {
		/// Request path that produced the body.
		path: String,
		/// Structured parsing failure.
		#[source]
		source: serde_path_to_error::Error<serde_json::Error>,
	},
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Encode(#[source] serde_json::Error),
}
impl Error {
	/// Returns the HTTP status when the server produced a response.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Http(e) => Some(e.status),
			_ => None,
		}
	}

	/// Returns `true` when the server rejected the credential with `401 Unauthorized`.
	pub fn is_unauthorized(&self) -> bool {
		self.status() == Some(401)
	}
}

/// Configuration and validation failures raised while building a client.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// Base URL cannot carry relative endpoint paths.
	#[error("Base URL `{url}` cannot be used as a base for endpoint paths.")]
	CannotBeBase {
		/// Offending URL.
		url: String,
	},
	/// Base URL must use HTTPS unless it points at a loopback host.
	#[error("Base URL must use HTTPS outside loopback hosts: {url}.")]
	InsecureBaseUrl {
		/// Offending URL.
		url: String,
	},
	/// Endpoint path is empty or not absolute.
	#[error("The {endpoint} endpoint path must start with `/`: {path:?}.")]
	InvalidEndpointPath {
		/// Endpoint label.
		endpoint: &'static str,
		/// Supplied path.
		path: String,
	},
	/// Endpoint path cannot be joined onto the base URL.
	#[error("Request path `{path}` cannot be joined onto the base URL.")]
	InvalidRequestPath {
		/// Supplied path.
		path: String,
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Request path names its own origin instead of a path under the base URL.
	#[error("Request path `{path}` must stay on the configured base URL.")]
	ForeignRequestPath {
		/// Supplied path.
		path: String,
	},
	/// Refresh timeout must be positive.
	#[error("Refresh timeout must be greater than zero.")]
	ZeroRefreshTimeout,
	/// Storage key must not be blank.
	#[error("Storage key cannot be empty.")]
	EmptyStorageKey,
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling {path}.")]
	Network {
		/// Request path being called.
		path: String,
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred during transport.")]
	Io(#[from] std::io::Error),
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(
		path: impl Into<String>,
		src: impl 'static + Send + Sync + std::error::Error,
	) -> Self {
		Self::Network { path: path.into(), source: Box::new(src) }
	}
}

/// Non-2xx response surfaced by the transport.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Server responded to {path} with HTTP {status}.")]
pub struct HttpError {
	/// HTTP status code.
	pub status: u16,
	/// Request path that produced the response.
	pub path: String,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl HttpError {
	/// Builds a new error for the provided status, path, and body.
	pub fn new(status: u16, path: impl Into<String>, body: impl Into<Vec<u8>>) -> Self {
		Self { status, path: path.into(), body: body.into() }
	}

	/// Returns the body as UTF-8 text, replacing invalid sequences.
	pub fn body_text(&self) -> String {
		String::from_utf8_lossy(&self.body).into_owned()
	}

	/// Returns the backend's `message` field, if the body is a JSON envelope.
	pub fn api_message(&self) -> Option<String> {
		self.envelope().and_then(|body| body.message)
	}

	/// Returns field-level validation messages reported by the backend.
	///
	/// The user service reports them either as an `errors` object or as a `data` object
	/// mapping field names to messages.
	pub fn field_errors(&self) -> BTreeMap<String, String> {
		let Some(body) = self.envelope() else {
			return BTreeMap::new();
		};

		body.errors
			.or(body.data)
			.and_then(|value| match value {
				serde_json::Value::Object(map) => Some(map),
				_ => None,
			})
			.map(|map| {
				map.into_iter()
					.filter_map(|(field, message)| match message {
						serde_json::Value::String(message) => Some((field, message)),
						_ => None,
					})
					.collect()
			})
			.unwrap_or_default()
	}

	fn envelope(&self) -> Option<ErrorEnvelope> {
		serde_json::from_slice(&self.body).ok()
	}
}

#[derive(Deserialize)]
struct ErrorEnvelope {
	#[serde(default)]
	message: Option<String>,
	#[serde(default)]
	errors: Option<serde_json::Value>,
	#[serde(default)]
	data: Option<serde_json::Value>,
}

/// The session is gone and cannot be recovered without re-authenticating.
///
/// The value is cloned to every request that was waiting on the same refresh, so it
/// only carries owned, cheap-to-clone data.
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
#[error("Session expired: {reason}.")]
pub struct SessionExpired {
	/// Why recovery was impossible.
	pub reason: ExpiryReason,
}
impl SessionExpired {
	/// Builds a new error for the given reason.
	pub fn new(reason: ExpiryReason) -> Self {
		Self { reason }
	}
}
impl From<ExpiryReason> for SessionExpired {
	fn from(reason: ExpiryReason) -> Self {
		Self::new(reason)
	}
}

/// Reasons a session could not be recovered.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExpiryReason {
	/// Refresh endpoint answered with a non-2xx status.
	RefreshRejected {
		/// HTTP status returned by the refresh endpoint.
		status: u16,
	},
	/// Refresh call failed before a response arrived.
	RefreshUnreachable {
		/// Rendered transport failure.
		message: String,
	},
	/// Refresh call exceeded the configured timeout.
	RefreshTimedOut,
	/// Refresh succeeded but returned no usable access token.
	RefreshReturnedNoToken,
	/// The leader task was dropped before the refresh settled.
	RefreshAbandoned,
	/// A request was rejected again after its single retry.
	RetryRejected,
}
impl Display for ExpiryReason {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		match self {
			Self::RefreshRejected { status } =>
				write!(f, "refresh endpoint responded with HTTP {status}"),
			Self::RefreshUnreachable { message } =>
				write!(f, "refresh endpoint unreachable ({message})"),
			Self::RefreshTimedOut => f.write_str("refresh timed out"),
			Self::RefreshReturnedNoToken => f.write_str("refresh returned no access token"),
			Self::RefreshAbandoned => f.write_str("refresh was abandoned"),
			Self::RetryRejected => f.write_str("request was rejected after its retry"),
		}
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn http_error_exposes_backend_message_and_field_errors() {
		let body = br#"{"success":false,"message":"Validation failed","errors":{"email":"Invalid email","password":"Password is required","code":42}}"#;
		let err = HttpError::new(400, "/auth/register", body.to_vec());
		let fields = err.field_errors();

		assert_eq!(err.api_message().as_deref(), Some("Validation failed"));
		assert_eq!(fields.len(), 2);
		assert_eq!(fields.get("email").map(String::as_str), Some("Invalid email"));
	}

	#[test]
	fn http_error_tolerates_non_json_bodies() {
		let err = HttpError::new(502, "/auth/login", b"<html>bad gateway</html>".to_vec());

		assert!(err.api_message().is_none());
		assert!(err.field_errors().is_empty());
		assert_eq!(err.body_text(), "<html>bad gateway</html>");
	}

	#[test]
	fn status_helpers_only_match_http_errors() {
		let unauthorized: Error = HttpError::new(401, "/users/me", Vec::new()).into();
		let expired: Error = SessionExpired::new(ExpiryReason::RetryRejected).into();

		assert!(unauthorized.is_unauthorized());
		assert_eq!(expired.status(), None);
		assert!(!expired.is_unauthorized());
	}

	#[test]
	fn session_expired_renders_reason() {
		let err = SessionExpired::new(ExpiryReason::RefreshRejected { status: 403 });

		assert_eq!(err.to_string(), "Session expired: refresh endpoint responded with HTTP 403.");
	}
}
