//! Session client facade wiring the store, refresh coordinator, and route guard together.
//!
//! [`SessionClient`] is the single object UI code talks to. It owns the [`SessionStore`]
//! and shares one [`RefreshCoordinator`] between authenticated requests and the
//! [`RouteGuard`], so a navigation check and a burst of failing requests still produce one
//! refresh call. Account operations (login, logout, link validation) are implemented in the
//! `auth` submodule.

mod auth;

// self
use crate::{
	_prelude::*,
	auth::AccessToken,
	config::ClientConfig,
	guard::{GuardDecision, Route, RouteGuard},
	http::{ApiRequest, ApiResponse, HttpTransport},
	refresh::RefreshCoordinator,
	session::{Session, SessionStore, SubscriptionId},
	store::{MemoryPersistence, SessionPersistence},
};

/// Coordinates the session lifecycle for one client instance.
///
/// Wrap the client in an [`Arc`] to share it between tasks.
pub struct SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	config: ClientConfig,
	store: Arc<SessionStore>,
	coordinator: Arc<RefreshCoordinator<T>>,
	guard: RouteGuard<T>,
}
impl<T> SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	/// Builds a client, rehydrating the session from `persistence`.
	pub fn init(
		config: ClientConfig,
		transport: impl Into<Arc<T>>,
		persistence: Arc<dyn SessionPersistence>,
	) -> Self {
		let store = Arc::new(SessionStore::init(persistence, config.storage_key.as_str()));
		let coordinator = Arc::new(RefreshCoordinator::new(
			transport,
			store.clone(),
			config.endpoints.refresh.as_str(),
			config.refresh_timeout,
		));
		let guard =
			RouteGuard::new(coordinator.clone(), config.endpoints.clone(), config.routes.clone());

		Self { config, store, coordinator, guard }
	}

	/// Builds a client whose session lives only in memory.
	pub fn in_memory(config: ClientConfig, transport: impl Into<Arc<T>>) -> Self {
		Self::init(config, transport, Arc::new(MemoryPersistence::default()))
	}

	/// Returns the immutable configuration.
	pub fn config(&self) -> &ClientConfig {
		&self.config
	}

	/// Returns the session store.
	pub fn store(&self) -> &Arc<SessionStore> {
		&self.store
	}

	/// Returns the shared refresh coordinator.
	pub fn coordinator(&self) -> &Arc<RefreshCoordinator<T>> {
		&self.coordinator
	}

	/// Returns the route guard.
	pub fn route_guard(&self) -> &RouteGuard<T> {
		&self.guard
	}

	/// Returns a snapshot of the current session.
	pub fn session(&self) -> Session {
		self.store.get()
	}

	/// Registers a listener for session changes.
	pub fn subscribe<F>(&self, listener: F) -> SubscriptionId
	where
		F: 'static + Fn(&Session) + Send + Sync,
	{
		self.store.subscribe(listener)
	}

	/// Removes a listener registered through [`SessionClient::subscribe`].
	pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
		self.store.unsubscribe(id)
	}

	/// Drops every session listener. The session and persisted record are kept.
	pub fn dispose(&self) {
		self.store.dispose();
	}

	/// Sends an authenticated request, refreshing and replaying once on `401`.
	pub async fn request(&self, request: ApiRequest) -> Result<ApiResponse> {
		self.coordinator.execute(request).await
	}

	/// Sends an authenticated request and decodes the JSON body.
	pub async fn request_json<R>(&self, request: ApiRequest) -> Result<R>
	where
		R: for<'de> Deserialize<'de>,
	{
		self.request(request).await?.json()
	}

	/// Forces a refresh, joining one already in flight.
	pub async fn refresh_session(&self) -> Result<AccessToken> {
		self.coordinator.refresh_session().await
	}

	/// Evaluates the navigation guard for `route`.
	pub async fn guard(&self, route: &Route) -> GuardDecision {
		self.guard.check(route).await
	}

	fn transport(&self) -> &T {
		self.coordinator.transport()
	}
}
impl<T> Debug for SessionClient<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("SessionClient")
			.field("base_url", &self.config.base_url.as_str())
			.field("session", &self.store.get())
			.field("coordinator", &self.coordinator)
			.finish()
	}
}

#[cfg(all(test, feature = "reqwest"))]
mod tests {
	// crates.io
	use httpmock::prelude::*;
	// self
	use super::*;
	use crate::{_preludet::*, error::ConfigError, guard::LinkGate};

	#[tokio::test]
	async fn request_refreshes_with_cookie_and_replays() {
		let server = MockServer::start_async().await;
		let (client, persistence) = build_reqwest_test_client(&server.base_url());
		let stale = server
			.mock_async(|when, then| {
				when.method(GET).path("/boards").header("authorization", "Bearer stale");
				then.status(401);
			})
			.await;
		let refresh = server
			.mock_async(|when, then| {
				when.method(POST).path("/auth/refresh-token");
				then.status(200).json_body(serde_json::json!({
					"success": true,
					"message": "Token refreshed",
					"data": { "accessToken": "fresh" }
				}));
			})
			.await;
		let fresh = server
			.mock_async(|when, then| {
				when.method(GET).path("/boards").header("authorization", "Bearer fresh");
				then.status(200).json_body(serde_json::json!([{ "id": 1 }]));
			})
			.await;

		client.store().set_token("stale");

		let boards: Vec<serde_json::Value> = client
			.request_json(ApiRequest::get("/boards"))
			.await
			.expect("Request should succeed after refresh.");

		assert_eq!(boards.len(), 1);
		stale.assert_async().await;
		refresh.assert_async().await;
		fresh.assert_async().await;
		assert!(
			persistence
				.raw(ClientConfig::DEFAULT_STORAGE_KEY)
				.is_some_and(|raw| raw.contains("\"fresh\"")),
		);
	}

	#[tokio::test]
	async fn guard_uses_shared_coordinator() {
		let server = MockServer::start_async().await;
		let (client, _) = build_reqwest_test_client(&server.base_url());
		let refresh = server
			.mock_async(|when, then| {
				when.method(POST).path("/auth/refresh-token");
				then.status(401);
			})
			.await;
		let validation = server
			.mock_async(|when, then| {
				when.method(POST)
					.path("/auth/validate-password-reset-token")
					.json_body(serde_json::json!({ "token": "abc" }));
				then.status(200).json_body(serde_json::json!({ "success": true, "data": true }));
			})
			.await;

		assert_eq!(
			client.guard(&Route::authenticated("/boards")).await,
			GuardDecision::Redirect("/login".into()),
		);
		assert_eq!(
			client
				.guard(&Route::public("/reset").with_gate(LinkGate::password_reset(Some("abc"))))
				.await,
			GuardDecision::Allow,
		);
		refresh.assert_async().await;
		validation.assert_async().await;
		assert_eq!(client.coordinator().metrics().failures(), 1);
	}

	#[tokio::test]
	async fn bearer_is_never_sent_to_another_origin() {
		let server = MockServer::start_async().await;
		let (client, _) = build_reqwest_test_client(&server.base_url());
		let refresh = server
			.mock_async(|when, then| {
				when.method(POST).path("/auth/refresh-token");
				then.status(200).json_body(serde_json::json!({ "accessToken": "fresh" }));
			})
			.await;

		client.store().set_token("t1");

		let err = client
			.request(ApiRequest::get("https://evil.example/steal"))
			.await
			.expect_err("Absolute request URL should be refused.");

		assert!(matches!(err, Error::Config(ConfigError::ForeignRequestPath { .. })));
		assert!(client.session().is_authenticated());
		assert_eq!(client.coordinator().metrics().attempts(), 0);
		refresh.assert_calls_async(0).await;
	}
}
