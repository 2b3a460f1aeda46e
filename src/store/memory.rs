//! Thread-safe in-memory [`SessionPersistence`] backend for local development and tests.

// self
use crate::{
	_prelude::*,
	store::{PersistedSession, SessionPersistence, StoreError},
};

type RawMap = Arc<RwLock<HashMap<String, String>>>;

/// Keeps serialized records in-process, mirroring a browser's key/value storage.
#[derive(Clone, Debug, Default)]
pub struct MemoryPersistence(RawMap);
impl MemoryPersistence {
	/// Returns the raw serialized value stored under `key`.
	pub fn raw(&self, key: &str) -> Option<String> {
		self.0.read().get(key).cloned()
	}

	/// Stores a raw value under `key`, bypassing serialization.
	pub fn insert_raw(&self, key: impl Into<String>, raw: impl Into<String>) {
		self.0.write().insert(key.into(), raw.into());
	}

	/// Returns `true` when nothing is stored under `key`.
	pub fn is_empty_at(&self, key: &str) -> bool {
		!self.0.read().contains_key(key)
	}
}
impl SessionPersistence for MemoryPersistence {
	fn load(&self, key: &str) -> Result<Option<PersistedSession>, StoreError> {
		let Some(raw) = self.raw(key) else {
			return Ok(None);
		};

		serde_json::from_str(&raw).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to parse session record `{key}`: {e}"),
		})
	}

	fn save(&self, key: &str, record: &PersistedSession) -> Result<(), StoreError> {
		let raw = serde_json::to_string(record).map_err(|e| StoreError::Serialization {
			message: format!("Failed to serialize session record `{key}`: {e}"),
		})?;

		self.0.write().insert(key.to_owned(), raw);

		Ok(())
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		self.0.write().remove(key);

		Ok(())
	}
}
