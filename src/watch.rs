//! Watcher interface through which config updates are delivered.

use crate::error::{Error, Result};
use crate::message::Resource;

/// Reasons a config update could not be delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigUpdateFailure {
    /// The server sent a malformed response, or the watcher refused the
    /// update. A NACK is on its way to the server.
    UpdateRejected,
    /// The stream to the management server could not be established.
    ConnectionFailure,
    /// No configuration arrived within the initial fetch timeout.
    FetchTimedOut,
}

/// Consumer of add/remove notifications for one subscription.
///
/// All callbacks run inline on the subscription's thread. They must not
/// re-enter the subscription's mutating entry points.
pub trait ConfigWatcher {
    /// Deliver added/updated resources and removed resource names.
    ///
    /// `system_version` is the server's system-wide version, or empty for
    /// synthetic updates such as TTL expiry.
    ///
    /// Returning `Err` rejects the update: the subscription turns the error
    /// into a NACK carrying its message. State already applied before the
    /// callback is retained; the watcher owns any rollback it needs.
    fn on_config_update(
        &mut self,
        added_or_updated: &[Resource],
        removed: &[String],
        system_version: &str,
    ) -> Result<()>;

    /// Report that an update could not be delivered.
    ///
    /// `error` is present for [`ConfigUpdateFailure::UpdateRejected`] and
    /// absent for the other reasons.
    fn on_update_failed(&mut self, reason: ConfigUpdateFailure, error: Option<&Error>);
}
