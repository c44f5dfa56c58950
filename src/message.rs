//! Crate-owned delta xDS message types.
//!
//! These types are codec-agnostic and serve as the interface between the
//! subscription state machine and the codec layer. The codec converts them
//! to/from the wire format (e.g., prost/envoy-types).

use bytes::Bytes;
use std::collections::HashMap;
use std::time::Duration;

/// An incremental discovery request to send to the xDS server.
#[derive(Debug, Clone, Default)]
pub struct DeltaDiscoveryRequest {
    /// Type URL of the resources being requested.
    pub type_url: String,
    /// Versions of resources the client already holds, keyed by name.
    /// Populated only on the first request of a stream, and only with names
    /// for which a version was acknowledged.
    pub initial_resource_versions: HashMap<String, String>,
    /// Resource names to add to the subscription.
    pub resource_names_subscribe: Vec<String>,
    /// Resource names to drop from the subscription.
    pub resource_names_unsubscribe: Vec<String>,
    /// Nonce of the response this request acknowledges, if any.
    pub response_nonce: Option<String>,
    /// Error details when this request is a NACK.
    pub error_detail: Option<ErrorDetail>,
}

/// An incremental discovery response from the xDS server.
#[derive(Debug, Clone, Default)]
pub struct DeltaDiscoveryResponse {
    /// Type URL of the resources in this response.
    pub type_url: String,
    /// The server's system-wide version, passed through to the watcher.
    pub system_version_info: String,
    /// Nonce for this response, to be echoed back in the next request.
    pub nonce: String,
    /// Added or updated resources.
    pub resources: Vec<Resource>,
    /// Names of resources the server removed.
    pub removed_resources: Vec<String>,
}

/// A single resource entry in a delta discovery response.
#[derive(Debug, Clone, Default)]
pub struct Resource {
    /// The resource name, unique within a subscription.
    pub name: String,
    /// The server's version for this resource.
    pub version: String,
    /// Alternative names this entry resolves. An entry with aliases but no
    /// payload reports that the aliases resolved to nothing.
    pub aliases: Vec<String>,
    /// Time-to-live after which the client treats the resource as removed
    /// unless refreshed.
    pub ttl: Option<Duration>,
    /// The resource body. Absent for heartbeats and unresolved aliases.
    pub payload: Option<ResourceAny>,
}

/// A resource payload wrapped as `google.protobuf.Any`.
#[derive(Debug, Clone, Default)]
pub struct ResourceAny {
    /// Type URL of the payload.
    pub type_url: String,
    /// Serialized resource bytes.
    pub value: Bytes,
}

/// Error details for NACK requests.
#[derive(Debug, Clone)]
pub struct ErrorDetail {
    /// gRPC status code.
    pub code: i32,
    /// Error message.
    pub message: String,
}
