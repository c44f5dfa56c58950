//! Error types for the delta subscription state machine.

use thiserror::Error;

/// Maximum byte length of an error message echoed back to the server inside
/// a NACK's error detail.
pub(crate) const MAX_ERROR_MESSAGE_LEN: usize = 4096;

/// Error type for delta subscription operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A response listed the same resource name twice among its
    /// added/updated resources.
    #[error("duplicate resource name {0} found among added/updated resources")]
    DuplicateResourceName(String),

    /// A response listed the same name in both its added/updated resources
    /// and its removed resources.
    #[error("duplicate resource name {0} found in the union of added and removed resources")]
    DuplicateRemovedName(String),

    /// A resource payload's embedded type URL did not match the
    /// response-wide type URL.
    #[error(
        "type URL {found} embedded in an individual resource does not match \
         the response type URL {expected}"
    )]
    TypeUrlMismatch {
        /// The response-wide type URL.
        expected: String,
        /// The type URL embedded in the offending resource payload.
        found: String,
    },

    /// The watcher refused an otherwise valid config update.
    #[error("config update rejected: {0}")]
    Rejected(String),

    /// Failed to decode a protobuf message.
    #[cfg(feature = "codegen-prost")]
    #[error("decode error: {0}")]
    Decode(#[from] prost::DecodeError),
}

/// Result type alias for delta subscription operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Bound an error message before it is placed in a NACK, so a pathological
/// error cannot blow the protocol message size. Truncation lands on a char
/// boundary.
pub(crate) fn truncate_error_message(message: &str) -> String {
    if message.len() <= MAX_ERROR_MESSAGE_LEN {
        return message.to_string();
    }
    let mut end = MAX_ERROR_MESSAGE_LEN;
    while !message.is_char_boundary(end) {
        end -= 1;
    }
    message[..end].to_string()
}
