#![allow(dead_code)]

// std
use std::{collections::VecDeque, sync::Arc, time::Duration};
// crates.io
use collabri_session::{
	auth::AccessToken,
	error::HttpError,
	http::{ApiRequest, ApiResponse, HttpTransport, TransportFuture},
	refresh::RefreshCoordinator,
	session::SessionStore,
};
use parking_lot::Mutex;

pub const REFRESH_PATH: &str = "/auth/refresh-token";

/// How the fake backend answers the next refresh call.
#[derive(Clone, Copy, Debug)]
pub enum RefreshStep {
	/// Issue the token and start accepting it.
	Issue(&'static str),
	/// Issue the token without accepting it, so replays are rejected.
	IssueStale(&'static str),
	/// Answer `200` with a blank token.
	Blank,
	/// Answer with the status.
	Reject(u16),
	/// Never answer.
	Hang,
}

/// Call observed by [`ScriptedTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
	pub path: String,
	pub token: Option<String>,
	pub retried: bool,
}

/// In-process backend: accepts one bearer token, scripts the refresh endpoint, and records
/// every call in arrival order.
///
/// Resource calls yield once before answering so concurrently spawned requests all reach
/// the server before the first `401` comes back. `/fail-500` always answers `500`.
pub struct ScriptedTransport {
	accepted: Mutex<Option<String>>,
	plan: Mutex<VecDeque<RefreshStep>>,
	refresh_delay: Duration,
	calls: Mutex<Vec<Call>>,
}
impl ScriptedTransport {
	pub fn new(accepted: Option<&str>, plan: impl IntoIterator<Item = RefreshStep>) -> Self {
		Self {
			accepted: Mutex::new(accepted.map(str::to_owned)),
			plan: Mutex::new(plan.into_iter().collect()),
			refresh_delay: Duration::from_millis(25),
			calls: Mutex::new(Vec::new()),
		}
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().clone()
	}

	pub fn refresh_calls(&self) -> usize {
		self.calls.lock().iter().filter(|call| call.path == REFRESH_PATH).count()
	}

	/// Paths of replayed calls, in the order they reached the server.
	pub fn replayed_paths(&self) -> Vec<String> {
		self.calls.lock().iter().filter(|call| call.retried).map(|call| call.path.clone()).collect()
	}

	async fn refresh(&self) -> collabri_session::error::Result<ApiResponse> {
		tokio::time::sleep(self.refresh_delay).await;

		let step = self.plan.lock().pop_front().unwrap_or(RefreshStep::Reject(401));
		let issued = match step {
			RefreshStep::Issue(token) => {
				*self.accepted.lock() = Some(token.to_owned());

				token
			},
			RefreshStep::IssueStale(token) => token,
			RefreshStep::Blank => "",
			RefreshStep::Reject(status) =>
				return Err(HttpError::new(status, REFRESH_PATH, Vec::new()).into()),
			RefreshStep::Hang => return std::future::pending().await,
		};
		let body = serde_json::json!({ "success": true, "data": { "accessToken": issued } });

		ApiResponse::from_parts(200, REFRESH_PATH, body.to_string().into_bytes())
	}
}
impl HttpTransport for ScriptedTransport {
	fn send<'a>(
		&'a self,
		request: &'a ApiRequest,
		token: Option<&'a AccessToken>,
	) -> TransportFuture<'a> {
		Box::pin(async move {
			let token = token.map(|token| token.expose().to_owned());

			self.calls.lock().push(Call {
				path: request.path.clone(),
				token: token.clone(),
				retried: request.is_retried(),
			});

			if request.path == REFRESH_PATH {
				return self.refresh().await;
			}

			tokio::task::yield_now().await;

			if request.path == "/fail-500" {
				return Err(HttpError::new(500, request.path.as_str(), Vec::new()).into());
			}

			let accepted = self.accepted.lock().clone();

			match (token, accepted) {
				(Some(sent), Some(accepted)) if sent == accepted => {
					let body = serde_json::json!({ "path": request.path });

					ApiResponse::from_parts(200, request.path.as_str(), body.to_string().into_bytes())
				},
				_ => Err(HttpError::new(401, request.path.as_str(), Vec::new()).into()),
			}
		})
	}
}

pub fn coordinator(
	transport: ScriptedTransport,
	refresh_timeout: Duration,
) -> Arc<RefreshCoordinator<ScriptedTransport>> {
	Arc::new(RefreshCoordinator::new(
		transport,
		Arc::new(SessionStore::in_memory()),
		REFRESH_PATH,
		refresh_timeout,
	))
}
