//! Redacted access-token wrapper that keeps bearer credentials out of logs.

// self
use crate::{_prelude::*, http::ApiResponse};

/// Short-lived bearer credential attached to authenticated requests.
///
/// Construction through [`AccessToken::parse`] rejects blank values, so a held token is
/// always usable as a bearer credential.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccessToken(String);
impl AccessToken {
	/// Wraps a token value, returning `None` for empty or whitespace-only input.
	pub fn parse(value: impl Into<String>) -> Option<Self> {
		let value = value.into();

		if value.trim().is_empty() { None } else { Some(Self(value)) }
	}

	/// Returns the inner token value. Callers must avoid logging this string.
	pub fn expose(&self) -> &str {
		&self.0
	}

	/// Renders the `Authorization` header value.
	pub fn bearer(&self) -> String {
		format!("Bearer {}", self.0)
	}
}
impl AsRef<str> for AccessToken {
	fn as_ref(&self) -> &str {
		self.expose()
	}
}
impl Debug for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_tuple("AccessToken").field(&"<redacted>").finish()
	}
}
impl Display for AccessToken {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str("<redacted>")
	}
}
impl From<AccessToken> for String {
	fn from(value: AccessToken) -> Self {
		value.0
	}
}
impl TryFrom<String> for AccessToken {
	type Error = BlankTokenError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(value).ok_or(BlankTokenError)
	}
}

/// Error returned when a blank string is deserialized as an [`AccessToken`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, ThisError)]
#[error("Access token cannot be empty.")]
pub struct BlankTokenError;

/// Extracts the access token from a login or refresh response.
///
/// The user service wraps payloads in `{ success, message, data }`; bare
/// `{ "accessToken": .. }` bodies are accepted as well. A blank token yields `Ok(None)`.
pub(crate) fn decode_grant(response: &ApiResponse) -> Result<Option<AccessToken>> {
	let grant = match response.json::<GrantEnvelope>()? {
		GrantEnvelope::Wrapped { data } => data,
		GrantEnvelope::Bare(grant) => grant,
	};

	Ok(AccessToken::parse(grant.access_token))
}

#[derive(Deserialize)]
#[serde(untagged)]
enum GrantEnvelope {
	Wrapped { data: GrantBody },
	Bare(GrantBody),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GrantBody {
	#[serde(alias = "access_token", alias = "token")]
	access_token: String,
}
