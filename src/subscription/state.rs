//! Per-resource version bookkeeping.

use std::collections::hash_map;
use std::collections::HashMap;

/// What the subscription knows about a single resource name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceState {
    /// Subscribed, but no version received yet. Also the retained state of
    /// a resource the server removed, until interest is dropped.
    Waiting,
    /// The last version acknowledged from the server.
    Known {
        /// The acknowledged version string.
        version: String,
    },
}

impl ResourceState {
    /// Whether the subscription is still waiting for a version.
    pub fn is_waiting(&self) -> bool {
        matches!(self, ResourceState::Waiting)
    }

    /// The acknowledged version, if any.
    pub fn version(&self) -> Option<&str> {
        match self {
            ResourceState::Waiting => None,
            ResourceState::Known { version } => Some(version),
        }
    }
}

/// Maps every resource name the subscription tracks to its state.
///
/// A name is present iff the user currently has interest in it, or the
/// server last sent it as an explicit removal. Versions only, never
/// payloads.
#[derive(Debug, Default)]
pub(crate) struct ResourceTable {
    entries: HashMap<String, ResourceState>,
}

impl ResourceTable {
    pub(crate) fn get(&self, name: &str) -> Option<&ResourceState> {
        self.entries.get(name)
    }

    pub(crate) fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub(crate) fn set_waiting(&mut self, name: impl Into<String>) {
        self.entries.insert(name.into(), ResourceState::Waiting);
    }

    pub(crate) fn set_known(&mut self, name: impl Into<String>, version: impl Into<String>) {
        self.entries.insert(
            name.into(),
            ResourceState::Known {
                version: version.into(),
            },
        );
    }

    pub(crate) fn remove(&mut self, name: &str) {
        self.entries.remove(name);
    }

    /// Iterate entries in unspecified order.
    pub(crate) fn iter(&self) -> hash_map::Iter<'_, String, ResourceState> {
        self.entries.iter()
    }
}
