//! Subscription statistics.
//!
//! Stats interception is an explicit decorator: wrap the application's
//! watcher in a [`StatsWatcher`] at construction time and hand the wrapper
//! to the subscription. The subscription itself never touches counters.

use std::cell::Cell;
use std::rc::Rc;

use crate::error::{Error, Result};
use crate::message::Resource;
use crate::watch::{ConfigUpdateFailure, ConfigWatcher};

/// Counters for one subscription.
///
/// Cheap to clone; clones share the same counters, so the application can
/// keep a handle while the decorator holds another. Single-threaded, like
/// the state machine it observes.
#[derive(Clone, Debug, Default)]
pub struct SubscriptionStats {
    inner: Rc<Counters>,
}

#[derive(Debug, Default)]
struct Counters {
    update_attempt: Cell<u64>,
    update_success: Cell<u64>,
    update_rejected: Cell<u64>,
    update_failure: Cell<u64>,
    init_fetch_timeout: Cell<u64>,
}

impl SubscriptionStats {
    /// Create a fresh set of counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Config updates offered to the watcher.
    pub fn update_attempt(&self) -> u64 {
        self.inner.update_attempt.get()
    }

    /// Config updates the watcher accepted.
    pub fn update_success(&self) -> u64 {
        self.inner.update_success.get()
    }

    /// Updates rejected, by validation or by the watcher.
    pub fn update_rejected(&self) -> u64 {
        self.inner.update_rejected.get()
    }

    /// Stream establishment failures.
    pub fn update_failure(&self) -> u64 {
        self.inner.update_failure.get()
    }

    /// Initial fetches that timed out.
    pub fn init_fetch_timeout(&self) -> u64 {
        self.inner.init_fetch_timeout.get()
    }
}

fn inc(cell: &Cell<u64>) {
    cell.set(cell.get() + 1);
}

/// Wraps a [`ConfigWatcher`], bumping [`SubscriptionStats`] around every
/// callback before forwarding it.
#[derive(Debug)]
pub struct StatsWatcher<W> {
    inner: W,
    stats: SubscriptionStats,
}

impl<W: ConfigWatcher> StatsWatcher<W> {
    /// Wrap `inner`, recording into `stats`.
    pub fn new(inner: W, stats: SubscriptionStats) -> Self {
        Self { inner, stats }
    }

    /// The shared counters.
    pub fn stats(&self) -> &SubscriptionStats {
        &self.stats
    }

    /// Unwrap the inner watcher.
    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: ConfigWatcher> ConfigWatcher for StatsWatcher<W> {
    fn on_config_update(
        &mut self,
        added_or_updated: &[Resource],
        removed: &[String],
        system_version: &str,
    ) -> Result<()> {
        inc(&self.stats.inner.update_attempt);
        let result = self
            .inner
            .on_config_update(added_or_updated, removed, system_version);
        if result.is_ok() {
            inc(&self.stats.inner.update_success);
        }
        result
    }

    fn on_update_failed(&mut self, reason: ConfigUpdateFailure, error: Option<&Error>) {
        match reason {
            ConfigUpdateFailure::UpdateRejected => inc(&self.stats.inner.update_rejected),
            ConfigUpdateFailure::ConnectionFailure => inc(&self.stats.inner.update_failure),
            ConfigUpdateFailure::FetchTimedOut => inc(&self.stats.inner.init_fetch_timeout),
        }
        self.inner.on_update_failed(reason, error);
    }
}
