//! A transport-agnostic implementation of the incremental (delta) [xDS]
//! subscription protocol.
//!
//! The heart of this crate is [`DeltaSubscriptionState`]: the per-type-URL
//! state machine that turns the user's evolving set of interested resource
//! names into a well-formed sequence of incremental discovery requests,
//! applies incremental discovery responses, and delivers coherent add/remove
//! events to a [`ConfigWatcher`], preserving the acknowledgement and
//! resumption semantics an xDS management server expects across stream
//! reconnects.
//!
//! The gRPC transport and the multiplexer that fans one stream across many
//! subscriptions are external collaborators: the state machine consumes
//! decoded [`DeltaDiscoveryResponse`] records and emits decoded
//! [`DeltaDiscoveryRequest`] records. The [`codec`] module converts those
//! records to and from their wire form.
//!
//! # Feature Flags
//!
//! - `codegen-prost`: Enables the `prost`/`envoy-types` based wire codec.
//!   Enabled by default.
//!
//! [xDS]: https://www.envoyproxy.io/docs/envoy/latest/api-docs/xds_protocol

pub mod codec;
pub mod error;
pub mod message;
pub mod stats;
pub mod subscription;
pub mod watch;

pub use error::{Error, Result};
pub use message::{
    DeltaDiscoveryRequest, DeltaDiscoveryResponse, ErrorDetail, Resource, ResourceAny,
};
pub use subscription::{DeltaSubscriptionState, SubscriptionOptions, UpdateAck};
pub use watch::{ConfigUpdateFailure, ConfigWatcher};
