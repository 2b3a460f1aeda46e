//! In-memory session state with best-effort persistence and change subscriptions.
//!
//! [`SessionStore`] is the only owner of the current access token. Every mutation goes
//! through [`SessionStore::set_token`], [`SessionStore::clear`], or the coordinator's
//! refreshing toggle, each of which persists (best-effort) and then notifies subscribers
//! with a fresh [`Session`] snapshot.

// std
use std::sync::atomic::{AtomicU64, Ordering};
// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::ClientConfig,
	obs,
	store::{MemoryPersistence, PersistedSession, SessionPersistence, StoreError},
};

/// Callback invoked with the new session snapshot after every change.
pub type SessionListener = Arc<dyn Fn(&Session) + Send + Sync>;

/// Snapshot of the client session.
///
/// Authentication is derived from the token rather than stored, so the two can never
/// disagree.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Session {
	access_token: Option<AccessToken>,
	refreshing: bool,
}
impl Session {
	/// Returns the current access token, if any.
	pub fn access_token(&self) -> Option<&AccessToken> {
		self.access_token.as_ref()
	}

	/// Returns `true` when an access token is held.
	pub fn is_authenticated(&self) -> bool {
		self.access_token.is_some()
	}

	/// Returns `true` while a refresh call is in flight.
	pub fn is_refreshing(&self) -> bool {
		self.refreshing
	}
}

/// Handle returned by [`SessionStore::subscribe`]; pass it to
/// [`SessionStore::unsubscribe`] to stop receiving updates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Owner of the session state.
pub struct SessionStore {
	state: RwLock<Session>,
	persistence: Arc<dyn SessionPersistence>,
	// Serializes writes to `persistence` so they land in the same order as state changes.
	persist_order: Mutex<()>,
	storage_key: String,
	listeners: Mutex<Vec<(SubscriptionId, SessionListener)>>,
	next_listener: AtomicU64,
	persistence_failures: AtomicU64,
}
impl SessionStore {
	/// Creates a store rehydrated from `persistence`.
	///
	/// A missing, unreadable, or corrupt record yields a fresh unauthenticated session.
	pub fn init(persistence: Arc<dyn SessionPersistence>, storage_key: impl Into<String>) -> Self {
		let storage_key = storage_key.into();
		let store = Self {
			state: RwLock::new(Session::default()),
			persistence,
			persist_order: Mutex::new(()),
			storage_key,
			listeners: Mutex::new(Vec::new()),
			next_listener: AtomicU64::new(0),
			persistence_failures: AtomicU64::new(0),
		};

		store.rehydrate();

		store
	}

	/// Creates a store backed by a fresh [`MemoryPersistence`].
	pub fn in_memory() -> Self {
		Self::init(Arc::new(MemoryPersistence::default()), ClientConfig::DEFAULT_STORAGE_KEY)
	}

	/// Returns a snapshot of the current session. Never blocks on I/O.
	pub fn get(&self) -> Session {
		self.state.read().clone()
	}

	/// Returns a clone of the current access token, if any.
	pub fn access_token(&self) -> Option<AccessToken> {
		self.state.read().access_token.clone()
	}

	/// Returns `true` when an access token is held.
	pub fn is_authenticated(&self) -> bool {
		self.state.read().is_authenticated()
	}

	/// Stores `token` and marks the session authenticated.
	///
	/// Empty or whitespace-only input clears the session instead. Returns `true` when a
	/// token was stored.
	pub fn set_token(&self, token: impl Into<String>) -> bool {
		match AccessToken::parse(token) {
			Some(token) => {
				self.replace(Some(token));

				true
			},
			None => {
				self.clear();

				false
			},
		}
	}

	/// Wipes the token, the authenticated flag, and the persisted copy.
	pub fn clear(&self) {
		self.replace(None);
	}

	/// Registers `listener` for change notifications.
	pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
	where
		F: 'static + Fn(&Session) + Send + Sync,
	{
		let id = SubscriptionId(self.next_listener.fetch_add(1, Ordering::Relaxed));

		self.listeners.lock().push((id, Arc::new(listener)));

		id
	}

	/// Removes a listener; returns `false` when the id was unknown.
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		let mut listeners = self.listeners.lock();
		let before = listeners.len();

		listeners.retain(|(existing, _)| *existing != id);

		listeners.len() != before
	}

	/// Drops every listener. The session itself is left untouched.
	pub fn dispose(&self) {
		self.listeners.lock().clear();
	}

	/// Number of persistence operations that failed and were swallowed.
	pub fn persistence_failures(&self) -> u64 {
		self.persistence_failures.load(Ordering::Relaxed)
	}

	/// Swaps the token, then persists it with the state lock released so readers never
	/// wait on the backend.
	pub(crate) fn replace(&self, token: Option<AccessToken>) {
		let persist_order = self.persist_order.lock();
		let snapshot = {
			let mut state = self.state.write();

			state.access_token = token;

			state.clone()
		};

		self.persist(snapshot.access_token.as_ref());
		drop(persist_order);
		self.notify(&snapshot);
	}

	pub(crate) fn set_refreshing(&self, refreshing: bool) {
		let snapshot = {
			let mut state = self.state.write();

			if state.refreshing == refreshing {
				return;
			}

			state.refreshing = refreshing;

			state.clone()
		};

		self.notify(&snapshot);
	}

	fn rehydrate(&self) {
		let token = match self.persistence.load(&self.storage_key) {
			Ok(record) => record.and_then(|record| record.access_token),
			Err(e) => {
				self.record_failure("load", &e);

				None
			},
		};

		self.state.write().access_token = token;
	}

	fn persist(&self, token: Option<&AccessToken>) {
		let result = match token {
			Some(token) => self
				.persistence
				.save(&self.storage_key, &PersistedSession::new(Some(token.clone()))),
			None => self.persistence.remove(&self.storage_key),
		};

		if let Err(e) = result {
			self.record_failure(if token.is_some() { "save" } else { "remove" }, &e);
		}
	}

	fn record_failure(&self, operation: &'static str, error: &StoreError) {
		self.persistence_failures.fetch_add(1, Ordering::Relaxed);

		obs::trace_persistence_failure(operation, error);
		obs::record_persistence_failure(operation);
	}

	fn notify(&self, snapshot: &Session) {
		let listeners: Vec<SessionListener> =
			self.listeners.lock().iter().map(|(_, listener)| listener.clone()).collect();

		for listener in listeners {
			listener(snapshot);
		}
	}
}
impl Debug for SessionStore {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionStore")
			.field("session", &*self.state.read())
			.field("storage_key", &self.storage_key)
			.field("listeners", &self.listeners.lock().len())
			.finish()
	}
}
