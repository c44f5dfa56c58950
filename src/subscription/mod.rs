//! The delta xDS subscription state machine.
//!
//! [`DeltaSubscriptionState`] tracks a single subscription (one type URL)
//! as it converts the user's evolving interest set into incremental
//! discovery requests, applies incremental discovery responses, and
//! delivers add/remove events to a [`ConfigWatcher`].
//!
//! The state machine is single-threaded and sans-IO: it performs no
//! network or timer I/O of its own. The caller (typically a multiplexer
//! that fans one gRPC stream across several subscriptions) sends the
//! requests it emits, feeds it decoded responses, and drives time by
//! sleeping until [`next_timeout`](DeltaSubscriptionState::next_timeout)
//! and then calling
//! [`handle_timeout`](DeltaSubscriptionState::handle_timeout).

mod pending;
mod state;
mod ttl;

pub use self::state::ResourceState;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use self::pending::PendingDeltas;
use self::state::ResourceTable;
use self::ttl::TtlTracker;
use crate::error::{truncate_error_message, Error, Result};
use crate::message::{DeltaDiscoveryRequest, DeltaDiscoveryResponse, ErrorDetail, Resource};
use crate::watch::{ConfigUpdateFailure, ConfigWatcher};

/// gRPC status code carried by NACK error details.
const GRPC_STATUS_INTERNAL: i32 = 13;

/// Construction-time options for a subscription.
#[derive(Debug, Clone)]
pub struct SubscriptionOptions {
    supports_heartbeats: bool,
    init_fetch_timeout: Option<Duration>,
}

impl SubscriptionOptions {
    /// Default options: heartbeats enabled, no initial-fetch timeout.
    pub fn new() -> Self {
        Self {
            supports_heartbeats: true,
            init_fetch_timeout: None,
        }
    }

    /// Enable or disable heartbeat classification for this type.
    pub fn with_heartbeats(mut self, enabled: bool) -> Self {
        self.supports_heartbeats = enabled;
        self
    }

    /// Report [`ConfigUpdateFailure::FetchTimedOut`] if no response is
    /// handled within `timeout` of [`DeltaSubscriptionState::start`].
    pub fn with_init_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.init_fetch_timeout = Some(timeout);
        self
    }
}

impl Default for SubscriptionOptions {
    fn default() -> Self {
        Self::new()
    }
}

/// Acknowledgement produced by
/// [`DeltaSubscriptionState::handle_response`].
///
/// The nonce is always copied verbatim from the response, even when the
/// response was rejected. Feed the ack to the next
/// [`next_request`](DeltaSubscriptionState::next_request) call so the
/// server can correlate it.
#[derive(Debug, Clone)]
pub struct UpdateAck {
    /// Nonce of the response this ack answers.
    pub nonce: String,
    /// Type URL of the subscription.
    pub type_url: String,
    /// Present iff the ack is a NACK.
    pub error_detail: Option<ErrorDetail>,
}

impl UpdateAck {
    fn new(nonce: &str, type_url: &str) -> Self {
        Self {
            nonce: nonce.to_string(),
            type_url: type_url.to_string(),
            error_detail: None,
        }
    }

    /// Whether this ack rejects the response it answers.
    pub fn is_nack(&self) -> bool {
        self.error_detail.is_some()
    }
}

/// Per-type-URL state machine for the incremental (delta) xDS protocol.
///
/// The watcher is borrowed, not owned: its lifetime must exceed the state
/// machine's, and dropping the state machine severs the reference and
/// cancels all pending deadlines.
pub struct DeltaSubscriptionState<'w> {
    type_url: String,
    watcher: &'w mut dyn ConfigWatcher,
    table: ResourceTable,
    pending: PendingDeltas,
    ttl: TtlTracker,
    supports_heartbeats: bool,
    init_fetch_timeout: Option<Duration>,
    init_fetch_deadline: Option<Instant>,
    any_request_sent_yet: bool,
    dynamic_context_changed: bool,
}

impl fmt::Debug for DeltaSubscriptionState<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeltaSubscriptionState")
            .field("type_url", &self.type_url)
            .field("watcher", &"<watcher>")
            .field("table", &self.table)
            .field("pending", &self.pending)
            .field("any_request_sent_yet", &self.any_request_sent_yet)
            .field("dynamic_context_changed", &self.dynamic_context_changed)
            .finish()
    }
}

impl<'w> DeltaSubscriptionState<'w> {
    /// Create a state machine for `type_url` delivering to `watcher`.
    pub fn new(
        type_url: impl Into<String>,
        watcher: &'w mut dyn ConfigWatcher,
        options: SubscriptionOptions,
    ) -> Self {
        Self {
            type_url: type_url.into(),
            watcher,
            table: ResourceTable::default(),
            pending: PendingDeltas::default(),
            ttl: TtlTracker::default(),
            supports_heartbeats: options.supports_heartbeats,
            init_fetch_timeout: options.init_fetch_timeout,
            init_fetch_deadline: None,
            any_request_sent_yet: false,
            dynamic_context_changed: false,
        }
    }

    /// The type URL this subscription covers.
    pub fn type_url(&self) -> &str {
        &self.type_url
    }

    /// Whether heartbeat classification is enabled for this type.
    pub fn supports_heartbeats(&self) -> bool {
        self.supports_heartbeats
    }

    /// The tracked state of `name`, if the table holds it.
    pub fn resource_state(&self, name: &str) -> Option<&ResourceState> {
        self.table.get(name)
    }

    /// Begin the initial-fetch window, if one was configured.
    pub fn start(&mut self, now: Instant) {
        if let Some(timeout) = self.init_fetch_timeout {
            self.init_fetch_deadline = Some(now + timeout);
        }
    }

    /// Record interest gained (`added`) and lost (`removed`).
    ///
    /// Additions are applied first; a name in both sets ends up removed.
    pub fn update_interest<A, R>(&mut self, added: A, removed: R)
    where
        A: IntoIterator<Item = String>,
        R: IntoIterator<Item = String>,
    {
        for name in added {
            // Re-adding forgets any cached version: the user may have
            // dropped its copy while unsubscribed and needs the resource
            // resent.
            self.table.set_waiting(name.clone());
            self.pending.subscribe(name);
        }
        for name in removed {
            self.table.remove(&name);
            self.ttl.clear(&name);
            self.pending.unsubscribe(name);
        }
    }

    /// Whether a request is worth sending right now.
    ///
    /// Not having sent any request yet on the current stream counts: the
    /// entirety of the interest set must be restated at stream start, even
    /// if nothing changed.
    pub fn subscription_update_pending(&self) -> bool {
        !self.pending.is_empty() || !self.any_request_sent_yet || self.dynamic_context_changed
    }

    /// Build the next discovery request, consuming the pending deltas.
    ///
    /// Pass the [`UpdateAck`] from the most recent
    /// [`handle_response`](Self::handle_response), or `None` on a fresh
    /// stream. The caller sends the request and, once the send succeeds,
    /// calls [`clear_dynamic_context_changed`](Self::clear_dynamic_context_changed).
    pub fn next_request(&mut self, ack: Option<UpdateAck>) -> DeltaDiscoveryRequest {
        let mut initial_resource_versions = HashMap::new();
        if !self.any_request_sent_yet {
            self.any_request_sent_yet = true;
            // The first request on a stream restates the complete interest
            // set; the server may be brand new. Names still waiting for a
            // version go in the subscribe list but not the version map.
            for (name, state) in self.table.iter() {
                if let Some(version) = state.version() {
                    initial_resource_versions.insert(name.clone(), version.to_string());
                }
                self.pending.subscribe(name.clone());
            }
            self.pending.clear_unsubscribes();
        }

        let (resource_names_subscribe, resource_names_unsubscribe) = self.pending.take();
        let (response_nonce, error_detail) = match ack {
            Some(ack) => (Some(ack.nonce), ack.error_detail),
            None => (None, None),
        };

        DeltaDiscoveryRequest {
            type_url: self.type_url.clone(),
            initial_resource_versions,
            resource_names_subscribe,
            resource_names_unsubscribe,
            response_nonce,
            error_detail,
        }
    }

    /// Apply a decoded delta response and produce the ack to send back.
    ///
    /// `now` anchors any TTL deadlines the response arms. A validation
    /// failure leaves all state untouched and returns a NACK; a watcher
    /// rejection returns a NACK but retains the state already applied.
    pub fn handle_response(
        &mut self,
        response: &DeltaDiscoveryResponse,
        now: Instant,
    ) -> UpdateAck {
        let mut ack = UpdateAck::new(&response.nonce, &self.type_url);
        // The server has spoken; the initial fetch is no longer pending,
        // whatever we think of the answer.
        self.init_fetch_deadline = None;

        match self.apply_response(response, now) {
            Ok(()) => {
                debug!(
                    "delta config for {} accepted with {} resources added, {} removed",
                    self.type_url,
                    response.resources.len(),
                    response.removed_resources.len()
                );
            }
            Err(err) => {
                warn!("delta config for {} rejected: {}", self.type_url, err);
                ack.error_detail = Some(ErrorDetail {
                    code: GRPC_STATUS_INTERNAL,
                    message: truncate_error_message(&err.to_string()),
                });
                self.watcher
                    .on_update_failed(ConfigUpdateFailure::UpdateRejected, Some(&err));
            }
        }
        ack
    }

    /// Report that the stream could not be established.
    ///
    /// The table is untouched; the next request restates the full interest
    /// set with the versions already held.
    pub fn handle_establishment_failure(&mut self) {
        warn!("delta stream for {} failed to establish", self.type_url);
        self.watcher
            .on_update_failed(ConfigUpdateFailure::ConnectionFailure, None);
        self.mark_stream_fresh();
    }

    /// Reset stream-scoped request state. Call whenever the transport opens
    /// a fresh stream.
    pub fn mark_stream_fresh(&mut self) {
        self.any_request_sent_yet = false;
    }

    /// Note that dynamic context the server should see has changed; the
    /// next request becomes worth sending.
    pub fn set_dynamic_context_changed(&mut self) {
        self.dynamic_context_changed = true;
    }

    /// Call after a request reflecting the new dynamic context was sent.
    pub fn clear_dynamic_context_changed(&mut self) {
        self.dynamic_context_changed = false;
    }

    /// Earliest pending deadline (TTL expiry or initial-fetch timeout) for
    /// the driver to sleep on.
    pub fn next_timeout(&mut self) -> Option<Instant> {
        match (self.init_fetch_deadline, self.ttl.next_deadline()) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Fire every deadline that has lapsed at `now`.
    ///
    /// Expired TTLs are treated as server-driven removals, batched into a
    /// single watcher update with no network action: the server already
    /// signalled the removal implicitly via the TTL.
    pub fn handle_timeout(&mut self, now: Instant) {
        if let Some(deadline) = self.init_fetch_deadline {
            if deadline <= now {
                self.init_fetch_deadline = None;
                warn!("timed out waiting for initial config for {}", self.type_url);
                self.watcher
                    .on_update_failed(ConfigUpdateFailure::FetchTimedOut, None);
            }
        }

        let expired = self.ttl.take_expired(now);
        if !expired.is_empty() {
            self.on_ttl_expired(expired);
        }
    }

    fn on_ttl_expired(&mut self, expired: Vec<String>) {
        let mut removed = Vec::new();
        for name in expired {
            // Names the user dropped since the timer was armed stay gone.
            if self.table.contains(&name) {
                self.table.set_waiting(name.clone());
                removed.push(name);
            }
        }
        if removed.is_empty() {
            return;
        }
        debug!(
            "{} resources of {} expired via TTL",
            removed.len(),
            self.type_url
        );
        if let Err(err) = self.watcher.on_config_update(&[], &removed, "") {
            warn!(
                "watcher rejected TTL expiry update for {}: {}",
                self.type_url, err
            );
        }
    }

    fn apply_response(&mut self, response: &DeltaDiscoveryResponse, now: Instant) -> Result<()> {
        // Validation runs to completion before any mutation, so a rejected
        // response leaves no trace.
        let heartbeats = self.validate(response)?;

        // All table and TTL mutation happens before the watcher sees the
        // update. Heartbeats refresh their TTL but change nothing else.
        for resource in &response.resources {
            match resource.ttl {
                Some(ttl) => self.ttl.set(&resource.name, ttl, now),
                None => self.ttl.clear(&resource.name),
            }
        }
        for name in &response.removed_resources {
            self.ttl.clear(name);
        }

        let mut forwarded = Vec::new();
        for (resource, &is_heartbeat) in response.resources.iter().zip(heartbeats.iter()) {
            if !is_heartbeat {
                self.table
                    .set_known(resource.name.clone(), resource.version.clone());
                forwarded.push(resource.clone());
            }
        }

        if !forwarded.is_empty() || !response.removed_resources.is_empty() {
            self.watcher.on_config_update(
                &forwarded,
                &response.removed_resources,
                &response.system_version_info,
            )?;
        }

        // A removed resource has no version worth reporting on reconnect,
        // but the entry must survive so that the eventual loss of interest
        // still sends an explicit unsubscribe. Keep it, blank.
        for name in &response.removed_resources {
            if self.table.contains(name) {
                self.table.set_waiting(name.clone());
            }
        }
        Ok(())
    }

    fn validate(&self, response: &DeltaDiscoveryResponse) -> Result<Vec<bool>> {
        let mut seen: HashSet<&str> = HashSet::with_capacity(
            response.resources.len() + response.removed_resources.len(),
        );
        let mut heartbeats = Vec::with_capacity(response.resources.len());

        for resource in &response.resources {
            if !seen.insert(&resource.name) {
                return Err(Error::DuplicateResourceName(resource.name.clone()));
            }
            let is_heartbeat = self.is_heartbeat(resource);
            heartbeats.push(is_heartbeat);
            if is_heartbeat {
                continue;
            }
            // Entries for unresolved aliases carry no body; nothing to check.
            if resource.payload.is_none() && !resource.aliases.is_empty() {
                continue;
            }
            if let Some(payload) = &resource.payload {
                if payload.type_url != response.type_url {
                    return Err(Error::TypeUrlMismatch {
                        expected: response.type_url.clone(),
                        found: payload.type_url.clone(),
                    });
                }
            }
        }
        for name in &response.removed_resources {
            if !seen.insert(name) {
                return Err(Error::DuplicateRemovedName(name.clone()));
            }
        }
        Ok(heartbeats)
    }

    /// A heartbeat keeps the connection warm without carrying config: no
    /// payload, and a version equal to the one already acknowledged.
    fn is_heartbeat(&self, resource: &Resource) -> bool {
        if !self.supports_heartbeats {
            return false;
        }
        match self.table.get(&resource.name) {
            Some(ResourceState::Known { version }) => {
                resource.payload.is_none() && *version == resource.version
            }
            _ => false,
        }
    }
}
