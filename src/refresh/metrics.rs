// std
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Live refresh counters owned by a [`RefreshCoordinator`](super::RefreshCoordinator).
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
	joined: AtomicU64,
	peak_queue: AtomicUsize,
}
impl RefreshMetrics {
	/// Refresh calls issued to the transport.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Refreshes that installed a new token.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Refreshes that were rejected, timed out, returned no token, or were abandoned.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// Callers that queued behind an in-flight refresh instead of starting one.
	pub fn joined(&self) -> u64 {
		self.joined.load(Ordering::Relaxed)
	}

	/// Deepest pending queue observed so far.
	pub fn peak_queue(&self) -> usize {
		self.peak_queue.load(Ordering::Relaxed)
	}

	/// Copies every counter at once.
	pub fn snapshot(&self) -> RefreshStats {
		RefreshStats {
			attempts: self.attempts(),
			successes: self.successes(),
			failures: self.failures(),
			joined: self.joined(),
			peak_queue: self.peak_queue(),
		}
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_joined(&self, queue_len: usize) {
		self.joined.fetch_add(1, Ordering::Relaxed);
		self.peak_queue.fetch_max(queue_len, Ordering::Relaxed);
	}

	pub(crate) fn record_settled(&self, refreshed: bool) {
		let counter = if refreshed { &self.successes } else { &self.failures };

		counter.fetch_add(1, Ordering::Relaxed);
	}
}

/// Point-in-time copy of [`RefreshMetrics`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RefreshStats {
	/// Refresh calls issued.
	pub attempts: u64,
	/// Refreshes that installed a new token.
	pub successes: u64,
	/// Refreshes that failed.
	pub failures: u64,
	/// Callers that queued behind an in-flight refresh.
	pub joined: u64,
	/// Deepest pending queue observed.
	pub peak_queue: usize,
}
