// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for renewal coordination.
#[derive(Debug, Default)]
pub struct RenewalMetrics {
	requested: AtomicU64,
	queued: AtomicU64,
	dispatched: AtomicU64,
	suppressed: AtomicU64,
	completed: AtomicU64,
}
impl RenewalMetrics {
	/// Returns the number of slot requests.
	pub fn requested(&self) -> u64 {
		self.requested.load(Ordering::Relaxed)
	}

	/// Returns the number of slot requests that had to wait for another resource server.
	pub fn queued(&self) -> u64 {
		self.queued.load(Ordering::Relaxed)
	}

	/// Returns the number of renewal commands actually sent downstream.
	pub fn dispatched(&self) -> u64 {
		self.dispatched.load(Ordering::Relaxed)
	}

	/// Returns the number of renewals coalesced by the cooldown.
	pub fn suppressed(&self) -> u64 {
		self.suppressed.load(Ordering::Relaxed)
	}

	/// Returns the number of completed renewals.
	pub fn completed(&self) -> u64 {
		self.completed.load(Ordering::Relaxed)
	}

	pub(crate) fn record_requested(&self) {
		self.requested.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_queued(&self) {
		self.queued.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_dispatched(&self) {
		self.dispatched.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_suppressed(&self) {
		self.suppressed.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_completed(&self) {
		self.completed.fetch_add(1, Ordering::Relaxed);
	}
}
