//! JSON-file [`SessionPersistence`] for desktop and CLI hosts.
//!
//! Every storage key lives in one pretty-printed JSON object. Writes go to a sibling
//! `.tmp` file first and are renamed over the original, so a crash mid-write leaves the
//! previous session intact. Records are decoded per key on load: a corrupt record only
//! fails its own key, and a file that is not a JSON object at all is treated as empty.

// std
use std::{
	fs::{self, File},
	io::Write,
	path::{Path, PathBuf},
};
// self
use crate::{
	_prelude::*,
	obs,
	store::{PersistedSession, SessionPersistence, StoreError},
};

type Records = serde_json::Map<String, serde_json::Value>;

/// Keeps session records in a JSON file, rewriting it on every mutation.
#[derive(Clone, Debug)]
pub struct FilePersistence {
	path: PathBuf,
	records: Arc<RwLock<Records>>,
}
impl FilePersistence {
	/// Opens the session file at `path`, creating missing parent directories.
	///
	/// A missing, blank, or undecodable file starts with no records; only I/O failures are
	/// reported.
	pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
		let path = path.into();

		create_parent(&path)?;

		let records = read_records(&path)?;

		Ok(Self { path, records: Arc::new(RwLock::new(records)) })
	}

	/// Session file location.
	pub fn path(&self) -> &Path {
		&self.path
	}

	fn flush(&self, records: &Records) -> Result<(), StoreError> {
		let json = serde_json::to_vec_pretty(records).map_err(|e| StoreError::Serialization {
			message: format!("Failed to encode session records: {e}"),
		})?;

		create_parent(&self.path)?;
		write_atomically(&self.path, &json)
	}
}
impl SessionPersistence for FilePersistence {
	fn load(&self, key: &str) -> Result<Option<PersistedSession>, StoreError> {
		let Some(raw) = self.records.read().get(key).cloned() else {
			return Ok(None);
		};

		serde_json::from_value(raw).map(Some).map_err(|e| StoreError::Serialization {
			message: format!("Failed to decode session record `{key}`: {e}"),
		})
	}

	fn save(&self, key: &str, record: &PersistedSession) -> Result<(), StoreError> {
		let raw = serde_json::to_value(record).map_err(|e| StoreError::Serialization {
			message: format!("Failed to encode session record `{key}`: {e}"),
		})?;
		let mut records = self.records.write();

		records.insert(key.to_owned(), raw);

		self.flush(&records)
	}

	fn remove(&self, key: &str) -> Result<(), StoreError> {
		let mut records = self.records.write();

		match records.remove(key) {
			Some(_) => self.flush(&records),
			None => Ok(()),
		}
	}
}

fn backend_error(action: &str, path: &Path, e: std::io::Error) -> StoreError {
	StoreError::Backend {
		message: format!("Could not {action} session file {}: {e}", path.display()),
	}
}

fn create_parent(path: &Path) -> Result<(), StoreError> {
	match path.parent() {
		Some(dir) if !dir.as_os_str().is_empty() =>
			fs::create_dir_all(dir).map_err(|e| backend_error("create the directory of", path, e)),
		_ => Ok(()),
	}
}

fn read_records(path: &Path) -> Result<Records, StoreError> {
	let bytes = match fs::read(path) {
		Ok(bytes) => bytes,
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Records::new()),
		Err(e) => return Err(backend_error("read", path, e)),
	};

	if bytes.iter().all(u8::is_ascii_whitespace) {
		return Ok(Records::new());
	}

	match serde_json::from_slice(&bytes) {
		Ok(records) => Ok(records),
		Err(e) => {
			obs::trace_persistence_failure(
				"open",
				&StoreError::Serialization {
					message: format!("Session file {} is not a JSON object: {e}", path.display()),
				},
			);

			Ok(Records::new())
		},
	}
}

fn write_atomically(path: &Path, json: &[u8]) -> Result<(), StoreError> {
	let staging = path.with_extension("tmp");
	let mut file = File::create(&staging).map_err(|e| backend_error("stage", &staging, e))?;

	file.write_all(json)
		.and_then(|_| file.sync_all())
		.map_err(|e| backend_error("write", &staging, e))?;
	drop(file);

	fs::rename(&staging, path).map_err(|e| backend_error("replace", path, e))
}
