// self
use crate::obs::{FlowKind, FlowOutcome};

const FLOW_TOTAL: &str = "collabri_session_flow_total";
const PERSISTENCE_FAILURES_TOTAL: &str = "collabri_session_persistence_failures_total";
const REFRESH_WAITERS: &str = "collabri_session_refresh_waiters";

/// Counts one flow outcome, labeled by `flow` and `outcome`.
pub fn record_flow_outcome(kind: FlowKind, outcome: FlowOutcome) {
	#[cfg(feature = "metrics")]
	metrics::counter!(FLOW_TOTAL, "flow" => kind.as_str(), "outcome" => outcome.as_str())
		.increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (FLOW_TOTAL, kind, outcome);
}

/// Counts a persistence failure the session store swallowed, labeled by `operation`.
pub fn record_persistence_failure(operation: &'static str) {
	#[cfg(feature = "metrics")]
	metrics::counter!(PERSISTENCE_FAILURES_TOTAL, "operation" => operation).increment(1);
	#[cfg(not(feature = "metrics"))]
	let _ = (PERSISTENCE_FAILURES_TOTAL, operation);
}

/// Samples how many queued callers a settled refresh resumed.
pub fn record_refresh_waiters(outcome: FlowOutcome, waiters: usize) {
	#[cfg(feature = "metrics")]
	metrics::histogram!(REFRESH_WAITERS, "outcome" => outcome.as_str()).record(waiters as f64);
	#[cfg(not(feature = "metrics"))]
	let _ = (REFRESH_WAITERS, outcome, waiters);
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn recorders_accept_samples_without_recorder() {
		record_flow_outcome(FlowKind::Login, FlowOutcome::Failure);
		record_persistence_failure("remove");
		record_refresh_waiters(FlowOutcome::Success, 3);
	}
}
