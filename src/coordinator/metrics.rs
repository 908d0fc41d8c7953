// std
use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe counters for renewal cycles.
#[derive(Debug, Default)]
pub struct RenewalMetrics {
	renewals: AtomicU64,
	success: AtomicU64,
	failure: AtomicU64,
	queued: AtomicU64,
	cached: AtomicU64,
}
impl RenewalMetrics {
	/// Returns the number of renewal cycles started (one per driver).
	pub fn renewals(&self) -> u64 {
		self.renewals.load(Ordering::Relaxed)
	}

	/// Returns the number of renewal cycles that produced a new credential.
	pub fn successes(&self) -> u64 {
		self.success.load(Ordering::Relaxed)
	}

	/// Returns the number of renewal cycles that failed.
	pub fn failures(&self) -> u64 {
		self.failure.load(Ordering::Relaxed)
	}

	/// Returns the number of callers queued behind an in-flight renewal.
	pub fn queued(&self) -> u64 {
		self.queued.load(Ordering::Relaxed)
	}

	/// Returns the number of callers served by an already-renewed credential.
	pub fn cached(&self) -> u64 {
		self.cached.load(Ordering::Relaxed)
	}

	pub(crate) fn record_renewal(&self) {
		self.renewals.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self) {
		self.success.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failure.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_queued(&self) {
		self.queued.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_cached(&self) {
		self.cached.fetch_add(1, Ordering::Relaxed);
	}
}
