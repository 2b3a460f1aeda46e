//! Persistence contracts and built-in backends for the serialized session record.
//!
//! Persistence is advisory: the session store treats every failure here as "start
//! unauthenticated" and never surfaces it to callers. Backends still report precise
//! [`StoreError`]s so they can be tested and logged.

pub mod file;
pub mod memory;

pub use file::FilePersistence;
pub use memory::MemoryPersistence;

// self
use crate::{_prelude::*, auth::AccessToken};

/// Durable client-side storage for the session record, keyed by a fixed storage key.
pub trait SessionPersistence
where
	Self: Send + Sync,
{
	/// Loads the record stored under `key`, if present.
	fn load(&self, key: &str) -> Result<Option<PersistedSession>, StoreError>;

	/// Persists or replaces the record stored under `key`.
	fn save(&self, key: &str, record: &PersistedSession) -> Result<(), StoreError>;

	/// Removes the record stored under `key`; removing a missing record succeeds.
	fn remove(&self, key: &str) -> Result<(), StoreError>;
}

/// Serialized session record.
///
/// `is_authenticated` is written for readers of the raw storage but never trusted on
/// rehydration; the flag is always recomputed from the token.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
	/// Access token, if any.
	#[serde(default)]
	pub access_token: Option<AccessToken>,
	/// Authenticated flag as written.
	#[serde(default)]
	pub is_authenticated: bool,
	/// Instant the record was written.
	#[serde(default, with = "time::serde::rfc3339::option")]
	pub updated_at: Option<OffsetDateTime>,
}
impl PersistedSession {
	/// Builds a record for the given token, stamped with the current UTC instant.
	pub fn new(access_token: Option<AccessToken>) -> Self {
		Self {
			is_authenticated: access_token.is_some(),
			access_token,
			updated_at: Some(OffsetDateTime::now_utc()),
		}
	}
}
impl Debug for PersistedSession {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PersistedSession")
			.field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
			.field("is_authenticated", &self.is_authenticated)
			.field("updated_at", &self.updated_at)
			.finish()
	}
}

/// Error type produced by [`SessionPersistence`] implementations.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, ThisError)]
pub enum StoreError {
	/// Serialization failures surfaced by the backend.
	#[error("Serialization error: {message}.")]
	Serialization {
		/// Human-readable error payload.
		message: String,
	},
	/// Backend-level failure for the storage engine.
	#[error("Backend failure: {message}.")]
	Backend {
		/// Human-readable error payload.
		message: String,
	},
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn blank_persisted_tokens_fail_to_decode() {
		let result = serde_json::from_str::<PersistedSession>(
			r#"{"accessToken":"   ","isAuthenticated":true}"#,
		);

		assert!(result.is_err());
	}

	#[test]
	fn persisted_session_uses_camel_case_and_rfc3339() {
		let record = PersistedSession {
			access_token: AccessToken::parse("tok"),
			is_authenticated: true,
			updated_at: Some(time::macros::datetime!(2026-01-02 03:04:05 UTC)),
		};
		let json = serde_json::to_value(&record).expect("Persisted session should serialize.");

		assert_eq!(
			json,
			serde_json::json!({
				"accessToken": "tok",
				"isAuthenticated": true,
				"updatedAt": "2026-01-02T03:04:05Z",
			}),
		);
	}

	#[test]
	fn debug_output_redacts_token() {
		let record = PersistedSession::new(AccessToken::parse("secret-token"));

		assert!(!format!("{record:?}").contains("secret-token"));
		assert!(record.is_authenticated);
	}
}
