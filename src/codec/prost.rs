//! Prost-based codec using envoy-types.

use crate::codec::DeltaCodec;
use crate::error::{Error, Result};
use crate::message::{DeltaDiscoveryRequest, DeltaDiscoveryResponse, Resource, ResourceAny};
use bytes::Bytes;
use prost::Message;
use std::time::Duration;

/// A codec that uses prost/envoy-types for serialization.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProstCodec;

impl DeltaCodec for ProstCodec {
    fn encode_request(&self, request: &DeltaDiscoveryRequest) -> Result<Bytes> {
        use envoy_types::pb::envoy::service::discovery::v3 as discovery;
        use envoy_types::pb::google::rpc::Status;

        let proto_request = discovery::DeltaDiscoveryRequest {
            type_url: request.type_url.clone(),
            resource_names_subscribe: request.resource_names_subscribe.clone(),
            resource_names_unsubscribe: request.resource_names_unsubscribe.clone(),
            initial_resource_versions: request.initial_resource_versions.clone(),
            response_nonce: request.response_nonce.clone().unwrap_or_default(),
            error_detail: request.error_detail.as_ref().map(|e| Status {
                code: e.code,
                message: e.message.clone(),
                details: vec![],
            }),
            ..Default::default()
        };

        Ok(proto_request.encode_to_vec().into())
    }

    fn decode_response(&self, bytes: Bytes) -> Result<DeltaDiscoveryResponse> {
        use envoy_types::pb::envoy::service::discovery::v3 as discovery;

        let proto_response =
            discovery::DeltaDiscoveryResponse::decode(bytes).map_err(Error::Decode)?;

        Ok(DeltaDiscoveryResponse {
            type_url: proto_response.type_url,
            system_version_info: proto_response.system_version_info,
            nonce: proto_response.nonce,
            resources: proto_response
                .resources
                .into_iter()
                .map(resource_from_proto)
                .collect(),
            removed_resources: proto_response.removed_resources,
        })
    }
}

fn resource_from_proto(
    proto: envoy_types::pb::envoy::service::discovery::v3::Resource,
) -> Resource {
    Resource {
        name: proto.name,
        version: proto.version,
        aliases: proto.aliases,
        ttl: proto.ttl.map(duration_from_proto),
        payload: proto.resource.map(|any| ResourceAny {
            type_url: any.type_url,
            value: any.value.into(),
        }),
    }
}

/// Negative proto durations are clamped to zero; a TTL already in the past
/// fires on the next timeout poll.
fn duration_from_proto(proto: envoy_types::pb::google::protobuf::Duration) -> Duration {
    Duration::new(proto.seconds.max(0) as u64, proto.nanos.max(0) as u32)
}
