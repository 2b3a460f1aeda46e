//! Client configuration: base URL, endpoint paths, guard redirect targets, and timeouts.
//!
//! Configurations are assembled through [`ClientConfigBuilder`], which validates the base
//! URL and every endpoint path before a transport is ever constructed. The defaults mirror
//! the Collabri user service (`/auth/*` under the API base).

// std
use std::time::Duration;
// self
use crate::{_prelude::*, error::ConfigError};

/// Endpoint paths consumed by the session client, relative to the base URL.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthEndpoints {
	/// Credential exchange.
	pub login: String,
	/// Account creation.
	pub register: String,
	/// Server-side session revocation.
	pub logout: String,
	/// Access-token refresh backed by the httpOnly refresh cookie.
	pub refresh: String,
	/// Authenticated user's profile.
	pub me: String,
	/// Email verification confirmation.
	pub verify_email: String,
	/// Re-send of the verification email.
	pub resend_verification: String,
	/// Password-reset email request.
	pub forgot_password: String,
	/// Password reset using a one-time token.
	pub reset_password: String,
	/// One-time email-verification token check.
	pub validate_email_verification_token: String,
	/// One-time password-reset token check.
	pub validate_password_reset_token: String,
}
impl AuthEndpoints {
	fn entries(&self) -> [(&'static str, &str); 11] {
		[
			("login", self.login.as_str()),
			("register", self.register.as_str()),
			("logout", self.logout.as_str()),
			("refresh", self.refresh.as_str()),
			("me", self.me.as_str()),
			("verify_email", self.verify_email.as_str()),
			("resend_verification", self.resend_verification.as_str()),
			("forgot_password", self.forgot_password.as_str()),
			("reset_password", self.reset_password.as_str()),
			("validate_email_verification_token", self.validate_email_verification_token.as_str()),
			("validate_password_reset_token", self.validate_password_reset_token.as_str()),
		]
	}

	fn validate(&self) -> Result<(), ConfigError> {
		for (endpoint, path) in self.entries() {
			if !path.starts_with('/') || path.trim() != path {
				return Err(ConfigError::InvalidEndpointPath { endpoint, path: path.to_owned() });
			}
		}

		Ok(())
	}
}
impl Default for AuthEndpoints {
	fn default() -> Self {
		Self {
			login: "/auth/login".into(),
			register: "/auth/register".into(),
			logout: "/auth/logout".into(),
			refresh: "/auth/refresh-token".into(),
			me: "/users/me".into(),
			verify_email: "/auth/verify-email".into(),
			resend_verification: "/auth/resend-verification".into(),
			forgot_password: "/auth/forgot-password".into(),
			reset_password: "/auth/reset-password".into(),
			validate_email_verification_token: "/auth/validate-email-verification-token".into(),
			validate_password_reset_token: "/auth/validate-password-reset-token".into(),
		}
	}
}

/// Views the route guard redirects to.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GuardRoutes {
	/// Sign-in view for unauthenticated users.
	pub sign_in: String,
	/// Landing view for authenticated users hitting guest-only routes.
	pub home: String,
	/// View shown when a one-time link token is rejected.
	pub expired_link: String,
}
impl Default for GuardRoutes {
	fn default() -> Self {
		Self {
			sign_in: "/login".into(),
			home: "/home".into(),
			expired_link: "/link-expired".into(),
		}
	}
}

/// Immutable client configuration consumed by transports, the store, and the coordinator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
	/// API base URL every endpoint path is joined onto.
	pub base_url: Url,
	/// Endpoint paths.
	#[serde(default)]
	pub endpoints: AuthEndpoints,
	/// Guard redirect targets.
	#[serde(default)]
	pub routes: GuardRoutes,
	/// Upper bound on a single refresh call; expiry counts as a refresh failure.
	#[serde(default = "ClientConfig::default_refresh_timeout", with = "duration_millis")]
	pub refresh_timeout: Duration,
	/// Key the persisted session record is stored under.
	#[serde(default = "ClientConfig::default_storage_key")]
	pub storage_key: String,
}
impl ClientConfig {
	/// Default refresh timeout.
	pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);
	/// Default storage key for the persisted session record.
	pub const DEFAULT_STORAGE_KEY: &'static str = "collabri.session";

	/// Creates a new builder for the provided base URL.
	pub fn builder(base_url: Url) -> ClientConfigBuilder {
		ClientConfigBuilder::new(base_url)
	}

	/// Resolves a request path against the base URL, keeping the base URL's own path prefix.
	///
	/// Absolute and scheme-relative URLs are rejected, and so is anything that would leave
	/// the base URL's origin; the bearer token is only ever sent to the configured backend.
	pub fn resolve(&self, path: &str) -> Result<Url, ConfigError> {
		let foreign = || ConfigError::ForeignRequestPath { path: path.to_owned() };

		if path.starts_with("//") || path.starts_with("\\\\") || Url::parse(path).is_ok() {
			return Err(foreign());
		}

		let mut base = self.base_url.clone();

		if !base.path().ends_with('/') {
			let prefixed = format!("{}/", base.path());

			base.set_path(&prefixed);
		}

		let url = base
			.join(path.trim_start_matches('/'))
			.map_err(|source| ConfigError::InvalidRequestPath { path: path.to_owned(), source })?;

		if url.origin() != self.base_url.origin() {
			return Err(foreign());
		}

		Ok(url)
	}

	/// Validates invariants for the configuration.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.base_url.cannot_be_a_base() {
			return Err(ConfigError::CannotBeBase { url: self.base_url.to_string() });
		}
		if self.base_url.scheme() != "https" && !is_loopback(&self.base_url) {
			return Err(ConfigError::InsecureBaseUrl { url: self.base_url.to_string() });
		}
		if self.refresh_timeout.is_zero() {
			return Err(ConfigError::ZeroRefreshTimeout);
		}
		if self.storage_key.trim().is_empty() {
			return Err(ConfigError::EmptyStorageKey);
		}

		self.endpoints.validate()
	}

	fn default_refresh_timeout() -> Duration {
		Self::DEFAULT_REFRESH_TIMEOUT
	}

	fn default_storage_key() -> String {
		Self::DEFAULT_STORAGE_KEY.into()
	}
}

/// Builder for [`ClientConfig`] values.
#[derive(Debug)]
pub struct ClientConfigBuilder {
	base_url: Url,
	endpoints: AuthEndpoints,
	routes: GuardRoutes,
	refresh_timeout: Duration,
	storage_key: String,
}
impl ClientConfigBuilder {
	/// Creates a new builder seeded with the provided base URL and default endpoints.
	pub fn new(base_url: Url) -> Self {
		Self {
			base_url,
			endpoints: AuthEndpoints::default(),
			routes: GuardRoutes::default(),
			refresh_timeout: ClientConfig::DEFAULT_REFRESH_TIMEOUT,
			storage_key: ClientConfig::DEFAULT_STORAGE_KEY.into(),
		}
	}

	/// Overrides every endpoint path.
	pub fn endpoints(mut self, endpoints: AuthEndpoints) -> Self {
		self.endpoints = endpoints;

		self
	}

	/// Overrides the refresh endpoint path only.
	pub fn refresh_path(mut self, path: impl Into<String>) -> Self {
		self.endpoints.refresh = path.into();

		self
	}

	/// Overrides the guard redirect targets.
	pub fn routes(mut self, routes: GuardRoutes) -> Self {
		self.routes = routes;

		self
	}

	/// Overrides the refresh timeout (defaults to 10 seconds).
	pub fn refresh_timeout(mut self, timeout: Duration) -> Self {
		self.refresh_timeout = timeout;

		self
	}

	/// Overrides the persisted-session storage key.
	pub fn storage_key(mut self, key: impl Into<String>) -> Self {
		self.storage_key = key.into();

		self
	}

	/// Consumes the builder and validates the resulting configuration.
	pub fn build(self) -> Result<ClientConfig, ConfigError> {
		let config = ClientConfig {
			base_url: self.base_url,
			endpoints: self.endpoints,
			routes: self.routes,
			refresh_timeout: self.refresh_timeout,
			storage_key: self.storage_key,
		};

		config.validate()?;

		Ok(config)
	}
}

fn is_loopback(url: &Url) -> bool {
	match url.host() {
		Some(url::Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	}
}

mod duration_millis {
	// std
	use std::time::Duration;
	// crates.io
	use serde::{Deserialize, Deserializer, Serializer};

	pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
	where
		S: Serializer,
	{
		serializer.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
	}

	pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
	where
		D: Deserializer<'de>,
	{
		u64::deserialize(deserializer).map(Duration::from_millis)
	}
}
