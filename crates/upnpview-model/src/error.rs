use crate::forest::NodeId;

/// Errors raised by forest operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ModelError {
    /// The node handle does not belong to this forest.
    #[error("unknown node {0}")]
    UnknownNode(NodeId),

    /// A replayed node does not land on the id the writer assigned.
    #[error("node update out of order (expected {expected}, got {actual})")]
    OutOfOrder { expected: NodeId, actual: NodeId },
}

/// Errors raised while decoding an icon payload.
#[derive(Debug, thiserror::Error)]
pub enum IconError {
    /// The payload is not valid base64.
    #[error("malformed base64 icon payload: {0}")]
    MalformedBase64(#[source] base64::DecodeError),

    /// The decoded bytes are not a valid PNG image.
    #[error("malformed PNG icon: {0}")]
    MalformedImage(#[source] image::ImageError),
}

pub type Result<T> = std::result::Result<T, ModelError>;
