//! Pending subscribe/unsubscribe deltas accumulated between requests.

use std::collections::HashSet;

/// Names whose interest changed since the last discovery request was built.
///
/// The two sets are disjoint at all times: recording a name on one side
/// clears it from the other, so consecutive interest updates collapse with
/// last-writer-wins semantics.
#[derive(Debug, Default)]
pub(crate) struct PendingDeltas {
    to_subscribe: HashSet<String>,
    to_unsubscribe: HashSet<String>,
}

impl PendingDeltas {
    /// Record added interest. A removed-then-added name must go back out as
    /// a subscribe: the user may have dropped its copy in between.
    pub(crate) fn subscribe(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.to_unsubscribe.remove(&name);
        self.to_subscribe.insert(name);
    }

    /// Record removed interest.
    pub(crate) fn unsubscribe(&mut self, name: impl Into<String>) {
        let name = name.into();
        self.to_subscribe.remove(&name);
        self.to_unsubscribe.insert(name);
    }

    /// Drop every pending unsubscribe. A brand-new stream has nothing to
    /// unsubscribe from.
    pub(crate) fn clear_unsubscribes(&mut self) {
        self.to_unsubscribe.clear();
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.to_subscribe.is_empty() && self.to_unsubscribe.is_empty()
    }

    /// Drain both sets, in unspecified order, for placement into a request.
    pub(crate) fn take(&mut self) -> (Vec<String>, Vec<String>) {
        (
            self.to_subscribe.drain().collect(),
            self.to_unsubscribe.drain().collect(),
        )
    }
}
