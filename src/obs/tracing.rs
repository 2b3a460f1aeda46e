// self
use crate::{
	_prelude::*,
	obs::{FlowKind, FlowOutcome},
	store::StoreError,
};

/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without `tracing`.
#[cfg(feature = "tracing")]
pub type InstrumentedFlow<F> = tracing::instrument::Instrumented<F>;
/// Future returned by [`FlowSpan::instrument`]; a plain passthrough without `tracing`.
#[cfg(not(feature = "tracing"))]
pub type InstrumentedFlow<F> = F;

/// Span covering one session flow, carrying `flow`, `stage`, and a late-bound `outcome`.
#[derive(Clone, Debug)]
pub struct FlowSpan {
	#[cfg(feature = "tracing")]
	span: tracing::Span,
}
impl FlowSpan {
	/// Opens a span for `kind` at call site `stage`; the outcome is filled in later.
	pub fn new(kind: FlowKind, stage: &'static str) -> Self {
		#[cfg(feature = "tracing")]
		{
			Self {
				span: tracing::info_span!(
					"collabri_session.flow",
					flow = kind.as_str(),
					stage,
					outcome = tracing::field::Empty,
				),
			}
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = (kind, stage);

			Self {}
		}
	}

	/// Attaches the span to `fut` so every poll runs inside it.
	pub fn instrument<Fut>(&self, fut: Fut) -> InstrumentedFlow<Fut>
	where
		Fut: Future,
	{
		#[cfg(feature = "tracing")]
		{
			tracing::Instrument::instrument(fut, self.span.clone())
		}
		#[cfg(not(feature = "tracing"))]
		{
			fut
		}
	}

	/// Records how the flow ended.
	pub fn record_outcome(&self, outcome: FlowOutcome) {
		#[cfg(feature = "tracing")]
		{
			self.span.record("outcome", outcome.as_str());
		}
		#[cfg(not(feature = "tracing"))]
		{
			let _ = outcome;
		}
	}
}

/// Warns about a persistence failure the session store swallowed.
pub fn trace_persistence_failure(operation: &'static str, error: &StoreError) {
	#[cfg(feature = "tracing")]
	tracing::warn!(operation, %error, "session persistence failed; continuing in memory");
	#[cfg(not(feature = "tracing"))]
	let _ = (operation, error);
}

/// Logs why a start-up restore left the client signed out.
pub fn trace_restore_failure(error: &Error) {
	#[cfg(feature = "tracing")]
	tracing::info!(%error, "session restore left the client signed out");
	#[cfg(not(feature = "tracing"))]
	let _ = error;
}

/// Emits a debug event for a refresh coordinator transition with the current queue depth.
pub fn trace_refresh_event(event: &'static str, queued: usize) {
	#[cfg(feature = "tracing")]
	tracing::debug!(event, queued, "refresh coordinator transition");
	#[cfg(not(feature = "tracing"))]
	let _ = (event, queued);
}
