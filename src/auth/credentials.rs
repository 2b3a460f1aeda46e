//! Request and response payloads exchanged with the user service's auth endpoints.

// self
use crate::_prelude::*;

/// Email + password pair submitted to the login endpoint.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct LoginCredentials {
	/// Account email.
	pub email: String,
	/// Account password; never logged.
	pub password: String,
}
impl LoginCredentials {
	/// Creates a new credential pair.
	pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
		Self { email: email.into(), password: password.into() }
	}
}
impl Debug for LoginCredentials {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("LoginCredentials")
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Sign-up payload submitted to the register endpoint.
#[derive(Clone, PartialEq, Eq, Serialize)]
pub struct Registration {
	/// Given name.
	pub firstname: String,
	/// Family name.
	pub lastname: String,
	/// Account email.
	pub email: String,
	/// Chosen password; never logged.
	pub password: String,
}
impl Debug for Registration {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("Registration")
			.field("firstname", &self.firstname)
			.field("lastname", &self.lastname)
			.field("email", &self.email)
			.field("password", &"<redacted>")
			.finish()
	}
}

/// Password-reset payload pairing the emailed one-time token with the new password.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordReset {
	/// One-time reset token from the emailed link.
	pub token: String,
	/// Replacement password; never logged.
	pub new_password: String,
}
impl Debug for PasswordReset {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PasswordReset").field("new_password", &"<redacted>").finish()
	}
}

/// Profile returned by the `me` endpoint for the authenticated user.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
	/// Server-side identifier, when exposed.
	#[serde(default)]
	pub id: Option<serde_json::Value>,
	/// Given name.
	#[serde(default)]
	pub firstname: Option<String>,
	/// Family name.
	#[serde(default)]
	pub lastname: Option<String>,
	/// Account email.
	pub email: String,
	/// Any additional fields the service returns.
	#[serde(flatten)]
	pub extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Serialize)]
pub(crate) struct TokenPayload<'a> {
	pub(crate) token: &'a str,
}

#[derive(Serialize)]
pub(crate) struct EmailPayload<'a> {
	pub(crate) email: &'a str,
}
