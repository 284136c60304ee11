//! Counters for messenger activity
//!
//! Thread-safe counters updated on every registration, removal and dispatch.
//! Exporting them (e.g. to Prometheus) is left to the caller via
//! [`MessengerMetrics::snapshot`].

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters owned by a messenger.
#[derive(Default)]
pub struct MessengerMetrics {
    /// Messages handed to `dispatch` that completed without error
    pub messages_dispatched: AtomicU64,
    /// Delegate invocations that accepted a message
    pub deliveries: AtomicU64,
    /// Dispatches aborted by a delegate error
    pub failed_dispatches: AtomicU64,
    /// Dispatches no delegate accepted
    pub unreceived_messages: AtomicU64,
    /// Delegates registered
    pub delegates_registered: AtomicU64,
    /// Delegates removed
    pub delegates_removed: AtomicU64,
}

impl MessengerMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_dispatch(&self, accepted: usize) {
        self.messages_dispatched.fetch_add(1, Ordering::Relaxed);
        self.deliveries.fetch_add(accepted as u64, Ordering::Relaxed);
        if accepted == 0 {
            self.unreceived_messages.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub(crate) fn record_failure(&self) {
        self.failed_dispatches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_registered(&self) {
        self.delegates_registered.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_removed(&self) {
        self.delegates_removed.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of all counters.
    pub fn snapshot(&self) -> MessengerStats {
        MessengerStats {
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            failed_dispatches: self.failed_dispatches.load(Ordering::Relaxed),
            unreceived_messages: self.unreceived_messages.load(Ordering::Relaxed),
            delegates_registered: self.delegates_registered.load(Ordering::Relaxed),
            delegates_removed: self.delegates_removed.load(Ordering::Relaxed),
        }
    }
}

/// Copy of [`MessengerMetrics`] at one point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MessengerStats {
    pub messages_dispatched: u64,
    pub deliveries: u64,
    pub failed_dispatches: u64,
    pub unreceived_messages: u64,
    pub delegates_registered: u64,
    pub delegates_removed: u64,
}

impl MessengerStats {
    /// Delegates currently registered according to the counters.
    pub fn active_delegates(&self) -> u64 {
        self.delegates_registered.saturating_sub(self.delegates_removed)
    }
}
