mod common;

// std
use std::{sync::Arc, time::Duration};
// crates.io
use collabri_session::{
	error::{Error, ExpiryReason, SessionExpired},
	http::ApiRequest,
};
use parking_lot::Mutex;
// self
use common::{Call, REFRESH_PATH, RefreshStep, ScriptedTransport};

const TIMEOUT: Duration = Duration::from_secs(1);

fn expiry_reason(err: Error) -> ExpiryReason {
	match err {
		Error::SessionExpired(SessionExpired { reason }) => reason,
		other => panic!("Expected an expired session, got {other:?}."),
	}
}

#[tokio::test]
async fn concurrent_unauthorized_requests_share_one_refresh() {
	let coordinator =
		common::coordinator(ScriptedTransport::new(None, [RefreshStep::Issue("T2")]), TIMEOUT);

	coordinator.store().set_token("T1");

	let handles: Vec<_> = (0..5)
		.map(|i| {
			let coordinator = coordinator.clone();

			tokio::spawn(async move { coordinator.execute(ApiRequest::get(format!("/r{i}"))).await })
		})
		.collect();

	for handle in handles {
		handle.await.expect("Request task should not panic.").expect("Request should succeed.");
	}

	let transport = coordinator.transport();

	assert_eq!(transport.refresh_calls(), 1);
	assert_eq!(coordinator.metrics().attempts(), 1);
	assert_eq!(coordinator.metrics().joined(), 4);
	assert!(
		transport
			.calls()
			.iter()
			.filter(|call| call.retried)
			.all(|call| call.token.as_deref() == Some("T2"))
	);
	assert_eq!(coordinator.store().access_token().as_ref().map(|token| token.expose()), Some("T2"));
	assert_eq!(coordinator.pending_len(), 0);
	assert!(!coordinator.is_refreshing());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn worker_threads_share_one_refresh_and_replay_each_request_once() {
	let coordinator =
		common::coordinator(ScriptedTransport::new(None, [RefreshStep::Issue("T2")]), TIMEOUT);

	coordinator.store().set_token("T1");

	let handles: Vec<_> = (0..8)
		.map(|i| {
			let coordinator = coordinator.clone();

			tokio::spawn(async move { coordinator.execute(ApiRequest::get(format!("/m{i}"))).await })
		})
		.collect();

	for handle in handles {
		handle.await.expect("Request task should not panic.").expect("Request should succeed.");
	}

	let calls = coordinator.transport().calls();

	assert_eq!(coordinator.transport().refresh_calls(), 1);

	for i in 0..8 {
		let path = format!("/m{i}");
		let rejected = calls
			.iter()
			.filter(|call| call.path == path && call.token.as_deref() == Some("T1"))
			.count();
		let replays: Vec<_> =
			calls.iter().filter(|call| call.path == path && call.retried).collect();

		assert!(rejected <= 1, "{path} was sent with the stale token {rejected} times");
		assert_eq!(replays.len(), rejected, "{path} should be replayed once per rejection");
		assert!(replays.iter().all(|call| call.token.as_deref() == Some("T2")));
	}

	assert_eq!(coordinator.pending_len(), 0);
	assert!(!coordinator.is_refreshing());
}

#[tokio::test]
async fn queued_requests_resume_in_arrival_order() {
	let coordinator =
		common::coordinator(ScriptedTransport::new(None, [RefreshStep::Issue("T2")]), TIMEOUT);

	coordinator.store().set_token("T1");

	let handles: Vec<_> = ["/r1", "/r2", "/r3"]
		.into_iter()
		.map(|path| {
			let coordinator = coordinator.clone();

			tokio::spawn(async move { coordinator.execute(ApiRequest::get(path)).await })
		})
		.collect();

	tokio::time::sleep(Duration::from_millis(5)).await;

	assert!(coordinator.is_refreshing());
	assert!(coordinator.store().get().is_refreshing());
	assert_eq!(coordinator.pending_len(), 2);

	for handle in handles {
		handle.await.expect("Request task should not panic.").expect("Request should succeed.");
	}

	assert_eq!(coordinator.transport().replayed_paths(), ["/r1", "/r2", "/r3"]);
	assert_eq!(coordinator.transport().refresh_calls(), 1);
}

#[tokio::test]
async fn rejected_refresh_fails_every_waiter_and_clears_session() {
	let coordinator =
		common::coordinator(ScriptedTransport::new(None, [RefreshStep::Reject(401)]), TIMEOUT);

	coordinator.store().set_token("T1");

	let handles: Vec<_> = ["/r1", "/r2", "/r3"]
		.into_iter()
		.map(|path| {
			let coordinator = coordinator.clone();

			tokio::spawn(async move { coordinator.execute(ApiRequest::get(path)).await })
		})
		.collect();

	for handle in handles {
		let err = handle
			.await
			.expect("Request task should not panic.")
			.expect_err("Request should fail once the refresh is rejected.");

		assert_eq!(expiry_reason(err), ExpiryReason::RefreshRejected { status: 401 });
	}

	let transport = coordinator.transport();

	assert_eq!(transport.refresh_calls(), 1);
	assert!(transport.replayed_paths().is_empty());
	assert!(!coordinator.store().is_authenticated());
	assert_eq!(coordinator.pending_len(), 0);
	assert_eq!(coordinator.metrics().failures(), 1);
}

#[tokio::test]
async fn retried_request_fails_without_joining_refresh() {
	let coordinator =
		common::coordinator(ScriptedTransport::new(None, [RefreshStep::Issue("T2")]), TIMEOUT);
	let mut request = ApiRequest::get("/r1");

	coordinator.store().set_token("T1");
	request.mark_retried();

	let err = coordinator.execute(request).await.expect_err("Second 401 should be terminal.");

	assert_eq!(expiry_reason(err), ExpiryReason::RetryRejected);
	assert_eq!(coordinator.transport().refresh_calls(), 0);
	assert_eq!(coordinator.metrics().joined(), 0);
	assert!(!coordinator.store().is_authenticated());
}

#[tokio::test]
async fn replay_rejected_after_refresh_expires_session() {
	let coordinator =
		common::coordinator(ScriptedTransport::new(None, [RefreshStep::IssueStale("T2")]), TIMEOUT);

	coordinator.store().set_token("T1");

	let err = coordinator
		.execute(ApiRequest::get("/r1"))
		.await
		.expect_err("Rejected replay should expire the session.");

	assert_eq!(expiry_reason(err), ExpiryReason::RetryRejected);
	assert_eq!(
		coordinator.transport().calls(),
		[
			Call { path: "/r1".into(), token: Some("T1".into()), retried: false },
			Call { path: REFRESH_PATH.into(), token: None, retried: false },
			Call { path: "/r1".into(), token: Some("T2".into()), retried: true },
		],
	);
	assert!(!coordinator.store().is_authenticated());
}

#[tokio::test]
async fn refresh_timeout_counts_as_failure() {
	let coordinator = common::coordinator(
		ScriptedTransport::new(None, [RefreshStep::Hang]),
		Duration::from_millis(60),
	);

	coordinator.store().set_token("T1");

	let err = coordinator
		.execute(ApiRequest::get("/r1"))
		.await
		.expect_err("Hung refresh should time out.");

	assert_eq!(expiry_reason(err), ExpiryReason::RefreshTimedOut);
	assert!(!coordinator.store().is_authenticated());
	assert!(!coordinator.is_refreshing());
}

#[tokio::test]
async fn blank_refresh_token_counts_as_failure() {
	let coordinator =
		common::coordinator(ScriptedTransport::new(None, [RefreshStep::Blank]), TIMEOUT);

	coordinator.store().set_token("T1");

	let err = coordinator.refresh_session().await.expect_err("Blank token should be rejected.");

	assert_eq!(expiry_reason(err), ExpiryReason::RefreshReturnedNoToken);
	assert!(coordinator.store().get().access_token().is_none());
}

#[tokio::test]
async fn non_unauthorized_errors_pass_through() {
	let coordinator = common::coordinator(ScriptedTransport::new(Some("T1"), []), TIMEOUT);

	coordinator.store().set_token("T1");

	let err = coordinator
		.execute(ApiRequest::post("/fail-500"))
		.await
		.expect_err("Server error should surface.");

	assert_eq!(err.status(), Some(500));
	assert_eq!(coordinator.transport().refresh_calls(), 0);
	assert!(coordinator.store().is_authenticated());
}

#[tokio::test]
async fn subscribers_observe_refresh_lifecycle() {
	let coordinator =
		common::coordinator(ScriptedTransport::new(None, [RefreshStep::Issue("T2")]), TIMEOUT);
	let seen = Arc::new(Mutex::new(Vec::new()));
	let sink = seen.clone();

	coordinator.store().set_token("T1");
	coordinator.store().subscribe(move |session| {
		sink.lock().push((session.is_authenticated(), session.is_refreshing()));
	});
	coordinator.execute(ApiRequest::get("/r1")).await.expect("Request should succeed.");

	assert_eq!(*seen.lock(), [(true, true), (true, true), (true, false)]);
}

#[tokio::test]
async fn second_wave_after_settle_starts_a_new_refresh() {
	let coordinator = common::coordinator(
		ScriptedTransport::new(None, [RefreshStep::Issue("T2"), RefreshStep::Issue("T3")]),
		TIMEOUT,
	);

	coordinator.store().set_token("T1");
	coordinator.execute(ApiRequest::get("/r1")).await.expect("First wave should succeed.");

	// Server-side revocation of T2.
	coordinator.store().set_token("revoked");
	coordinator.execute(ApiRequest::get("/r2")).await.expect("Second wave should succeed.");

	assert_eq!(coordinator.transport().refresh_calls(), 2);
	assert_eq!(coordinator.store().access_token().as_ref().map(|token| token.expose()), Some("T3"));
}
