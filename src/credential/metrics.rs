// std
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
// self
use crate::_prelude::*;

/// Per-credential token acquisition counters.
///
/// Only network acquisitions count; tokens served from the cache or adopted from a store do not.
#[derive(Debug, Default)]
pub struct RefreshMetrics {
	attempts: AtomicU64,
	successes: AtomicU64,
	failures: AtomicU64,
	// Unix seconds of the last success; zero until one happens.
	last_success: AtomicI64,
}
impl RefreshMetrics {
	/// Acquisitions started.
	pub fn attempts(&self) -> u64 {
		self.attempts.load(Ordering::Relaxed)
	}

	/// Acquisitions that produced (and, with a store attached, persisted) a token.
	pub fn successes(&self) -> u64 {
		self.successes.load(Ordering::Relaxed)
	}

	/// Acquisitions that failed at the token endpoint or while persisting.
	pub fn failures(&self) -> u64 {
		self.failures.load(Ordering::Relaxed)
	}

	/// When the last successful acquisition finished.
	pub fn last_refreshed_at(&self) -> Option<OffsetDateTime> {
		match self.last_success.load(Ordering::Relaxed) {
			0 => None,
			secs => OffsetDateTime::from_unix_timestamp(secs).ok(),
		}
	}

	pub(crate) fn record_attempt(&self) {
		self.attempts.fetch_add(1, Ordering::Relaxed);
	}

	pub(crate) fn record_success(&self, at: OffsetDateTime) {
		self.successes.fetch_add(1, Ordering::Relaxed);
		self.last_success.store(at.unix_timestamp(), Ordering::Relaxed);
	}

	pub(crate) fn record_failure(&self) {
		self.failures.fetch_add(1, Ordering::Relaxed);
	}
}
