use upnpview_line::LineError;
use upnpview_model::ModelError;

/// Errors returned by [`Parser::feed`](crate::Parser::feed).
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// A `SUBDEVICE` line arrived before any `DEVICE` line.
    ///
    /// The line is not applied and the parser context is unchanged.
    #[error("SUBDEVICE {id:?} received before any DEVICE")]
    NoActiveRoot { id: String },

    /// The parser context refers to nodes the given forest does not have.
    ///
    /// Only happens when one parser is fed with different forests.
    #[error("model error: {0}")]
    Model(#[from] ModelError),
}

/// Errors that end a [`Session`](crate::Session) read loop.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The line stream failed (I/O error or an oversized line).
    #[error("line error: {0}")]
    Line(#[from] LineError),

    /// The parser and its forest went out of sync.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

/// Errors raised while writing a forest as protocol lines.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    /// The node handle does not belong to the forest.
    #[error("model error: {0}")]
    Model(#[from] ModelError),

    /// A metadata key contains `:` and would split differently when read back.
    #[error("metadata key {key:?} contains ':'")]
    KeyContainsColon { key: String },

    /// The protocol only nests sub-devices one level under a root.
    #[error("device {id:?} is nested below a sub-device")]
    NestedSubDevice { id: String },

    /// Writing a line failed.
    #[error("line error: {0}")]
    Line(#[from] LineError),
}
