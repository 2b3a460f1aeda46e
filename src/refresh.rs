//! Refresh coordination with a singleflight leader, a FIFO pending queue, and retry-once
//! semantics.
//!
//! [`RefreshCoordinator::execute`] sends a request with the current access token. When the
//! server answers `401`, the coordinator either becomes the refresh leader (no refresh in
//! flight) or appends the request to the pending queue and suspends it. The leader calls the
//! refresh endpoint once, updates the [`SessionStore`], drains the queue under the same lock
//! that returns the phase to idle, and resumes every waiter in arrival order with the shared
//! outcome. Each request is replayed at most once; a second `401` clears the session.

mod metrics;

pub use metrics::{RefreshMetrics, RefreshStats};

// std
use std::{
	mem,
	sync::atomic::{AtomicU64, Ordering},
	time::Duration,
};
// crates.io
use futures::channel::oneshot;
// self
use crate::{
	_prelude::*,
	auth::{AccessToken, token::decode_grant},
	error::{ExpiryReason, SessionExpired},
	http::{ApiRequest, ApiResponse, HttpTransport},
	obs::{self, FlowKind, FlowOutcome, FlowSpan},
	session::SessionStore,
};

type RefreshOutcome = Result<AccessToken, SessionExpired>;

/// Caller suspended behind an in-flight refresh.
pub struct PendingRequest {
	ticket: u64,
	request: Option<ApiRequest>,
	resume: oneshot::Sender<RefreshOutcome>,
}
impl PendingRequest {
	/// Arrival sequence number; lower tickets resume first.
	pub fn ticket(&self) -> u64 {
		self.ticket
	}

	/// Descriptor of the suspended request, or `None` for a proactive refresh join
	/// (navigation guards, session restore).
	pub fn request(&self) -> Option<&ApiRequest> {
		self.request.as_ref()
	}
}
impl Debug for PendingRequest {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("PendingRequest")
			.field("ticket", &self.ticket)
			.field("method", &self.request.as_ref().map(|request| &request.method))
			.field("path", &self.request.as_ref().map(|request| request.path.as_str()))
			.finish()
	}
}

enum Phase {
	Idle,
	Refreshing { queue: VecDeque<PendingRequest> },
}

enum Role {
	Leader,
	Follower(oneshot::Receiver<RefreshOutcome>),
}

/// Singleflight refresh state machine shared by every request of a session.
pub struct RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	transport: Arc<T>,
	store: Arc<SessionStore>,
	refresh_path: String,
	refresh_timeout: Duration,
	phase: Mutex<Phase>,
	next_ticket: AtomicU64,
	metrics: Arc<RefreshMetrics>,
}
impl<T> RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	/// Creates an idle coordinator.
	pub fn new(
		transport: impl Into<Arc<T>>,
		store: Arc<SessionStore>,
		refresh_path: impl Into<String>,
		refresh_timeout: Duration,
	) -> Self {
		Self {
			transport: transport.into(),
			store,
			refresh_path: refresh_path.into(),
			refresh_timeout,
			phase: Mutex::new(Phase::Idle),
			next_ticket: AtomicU64::new(0),
			metrics: Default::default(),
		}
	}

	/// Returns the transport used for every call.
	pub fn transport(&self) -> &Arc<T> {
		&self.transport
	}

	/// Returns the session store the coordinator updates.
	pub fn store(&self) -> &Arc<SessionStore> {
		&self.store
	}

	/// Returns the refresh counters.
	pub fn metrics(&self) -> &RefreshMetrics {
		&self.metrics
	}

	/// Returns `true` while a refresh call is in flight.
	pub fn is_refreshing(&self) -> bool {
		matches!(*self.phase.lock(), Phase::Refreshing { .. })
	}

	/// Number of callers currently suspended behind the in-flight refresh.
	pub fn pending_len(&self) -> usize {
		match &*self.phase.lock() {
			Phase::Idle => 0,
			Phase::Refreshing { queue } => queue.len(),
		}
	}

	/// Sends `request` with the current token, refreshing and replaying once on `401`.
	///
	/// Errors other than `401` pass through untouched. A `401` on a request that already
	/// used its retry clears the session and fails with [`SessionExpired`] without
	/// starting or joining a refresh.
	///
	/// Queued callers are woken in arrival order, but each replays from its own task. On a
	/// current-thread runtime the backend therefore sees replays in arrival order; on a
	/// multi-thread runtime woken callers race and replays may reach the backend in any
	/// order.
	pub async fn execute(&self, request: ApiRequest) -> Result<ApiResponse> {
		obs::observe(FlowKind::Request, "execute", self.execute_with_retry(request)).await
	}

	/// Obtains a fresh access token, joining the in-flight refresh when there is one.
	pub async fn refresh_session(&self) -> Result<AccessToken> {
		Ok(self.await_refresh(None).await?)
	}

	async fn execute_with_retry(&self, mut request: ApiRequest) -> Result<ApiResponse> {
		let sent_with = self.store.access_token();

		match self.transport.send(&request, sent_with.as_ref()).await {
			Err(e) if e.is_unauthorized() => (),
			other => return other,
		}

		if request.is_retried() {
			return Err(self.expire(ExpiryReason::RetryRejected).into());
		}

		let token = match self.rotated_since(sent_with.as_ref()) {
			Some(current) => current,
			None => self.await_refresh(Some(&request)).await?,
		};

		request.mark_retried();

		match self.transport.send(&request, Some(&token)).await {
			Err(e) if e.is_unauthorized() => Err(self.expire(ExpiryReason::RetryRejected).into()),
			other => other,
		}
	}

	/// Token installed by a refresh that settled after `sent_with` was read, if any.
	///
	/// A request that raced a completed refresh is replayed with the newer token instead of
	/// starting another refresh.
	fn rotated_since(&self, sent_with: Option<&AccessToken>) -> Option<AccessToken> {
		if self.is_refreshing() {
			return None;
		}

		self.store.access_token().filter(|current| sent_with != Some(current))
	}

	async fn await_refresh(&self, request: Option<&ApiRequest>) -> RefreshOutcome {
		let role = {
			let mut phase = self.phase.lock();

			match &mut *phase {
				Phase::Refreshing { queue } => {
					let (resume, waiter) = oneshot::channel();

					queue.push_back(PendingRequest {
						ticket: self.next_ticket.fetch_add(1, Ordering::Relaxed),
						request: request.cloned(),
						resume,
					});
					self.metrics.record_joined(queue.len());
					obs::trace_refresh_event("joined", queue.len());

					Role::Follower(waiter)
				},
				Phase::Idle => {
					*phase = Phase::Refreshing { queue: VecDeque::new() };

					Role::Leader
				},
			}
		};

		match role {
			Role::Follower(waiter) => waiter
				.await
				.unwrap_or_else(|_| Err(SessionExpired::new(ExpiryReason::RefreshAbandoned))),
			Role::Leader => self.lead_refresh().await,
		}
	}

	async fn lead_refresh(&self) -> RefreshOutcome {
		const KIND: FlowKind = FlowKind::Refresh;

		let span = FlowSpan::new(KIND, "lead_refresh");
		let settle = SettleOnDrop { coordinator: self, armed: true };

		obs::record_flow_outcome(KIND, FlowOutcome::Attempt);
		obs::trace_refresh_event("leader_started", 0);
		self.store.set_refreshing(true);
		self.metrics.record_attempt();

		let outcome = span.instrument(self.call_refresh()).await;
		let flow_outcome =
			if outcome.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure };

		settle.disarm();
		self.settle(&outcome);
		span.record_outcome(flow_outcome);
		obs::record_flow_outcome(KIND, flow_outcome);

		outcome
	}

	async fn call_refresh(&self) -> RefreshOutcome {
		let request = ApiRequest::post(self.refresh_path.as_str());
		let response = match tokio::time::timeout(
			self.refresh_timeout,
			self.transport.send(&request, None),
		)
		.await
		{
			Err(_) => return Err(ExpiryReason::RefreshTimedOut.into()),
			Ok(Err(Error::Http(e))) =>
				return Err(ExpiryReason::RefreshRejected { status: e.status }.into()),
			Ok(Err(e)) =>
				return Err(ExpiryReason::RefreshUnreachable { message: e.to_string() }.into()),
			Ok(Ok(response)) => response,
		};

		match decode_grant(&response) {
			Ok(Some(token)) => Ok(token),
			Ok(None) => Err(ExpiryReason::RefreshReturnedNoToken.into()),
			Err(e) => Err(ExpiryReason::RefreshUnreachable { message: e.to_string() }.into()),
		}
	}

	/// Publishes the outcome to the store, returns the phase to idle, and resumes every
	/// queued caller in arrival order.
	fn settle(&self, outcome: &RefreshOutcome) {
		match outcome {
			Ok(token) => self.store.replace(Some(token.clone())),
			Err(_) => self.store.clear(),
		}

		self.metrics.record_settled(outcome.is_ok());

		let queue = match mem::replace(&mut *self.phase.lock(), Phase::Idle) {
			Phase::Refreshing { queue } => queue,
			Phase::Idle => VecDeque::new(),
		};

		self.store.set_refreshing(false);
		obs::trace_refresh_event("settled", queue.len());
		obs::record_refresh_waiters(
			if outcome.is_ok() { FlowOutcome::Success } else { FlowOutcome::Failure },
			queue.len(),
		);

		for pending in queue {
			// A dropped receiver means the caller gave up; nothing to resume.
			let _ = pending.resume.send(outcome.clone());
		}
	}

	fn expire(&self, reason: ExpiryReason) -> SessionExpired {
		self.store.clear();

		SessionExpired::new(reason)
	}
}
impl<T> Debug for RefreshCoordinator<T>
where
	T: ?Sized + HttpTransport,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("RefreshCoordinator")
			.field("refresh_path", &self.refresh_path)
			.field("refresh_timeout", &self.refresh_timeout)
			.field("refreshing", &self.is_refreshing())
			.field("pending", &self.pending_len())
			.finish()
	}
}

/// Fails the refresh if the leader future is dropped before it settles, so no queued
/// caller waits forever.
struct SettleOnDrop<'a, T>
where
	T: ?Sized + HttpTransport,
{
	coordinator: &'a RefreshCoordinator<T>,
	armed: bool,
}
impl<T> SettleOnDrop<'_, T>
where
	T: ?Sized + HttpTransport,
{
	fn disarm(mut self) {
		self.armed = false;
	}
}
impl<T> Drop for SettleOnDrop<'_, T>
where
	T: ?Sized + HttpTransport,
{
	fn drop(&mut self) {
		if self.armed {
			self.coordinator.settle(&Err(ExpiryReason::RefreshAbandoned.into()));
		}
	}
}
