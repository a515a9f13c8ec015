use upnpview_model::{IconError, NodeId, Update};

/// A non-fatal problem found while parsing.
///
/// Diagnostics never stop the line stream; they exist so the caller can log
/// or display them.
#[derive(Debug, thiserror::Error)]
pub enum Diagnostic {
    /// The stream ended mid-line and the partial line was discarded.
    #[error("stream ended mid-line, {len} bytes discarded")]
    Truncated { len: usize },

    /// A `SUBDEVICE` line arrived before any `DEVICE` line and was dropped.
    #[error("SUBDEVICE {id:?} dropped: no root device yet")]
    NoActiveRoot { id: String },

    /// An icon payload failed to decode; the node keeps its previous icon.
    #[error("icon for node {node} rejected: {source}")]
    MalformedIcon {
        node: NodeId,
        #[source]
        source: IconError,
    },
}

impl Diagnostic {
    /// Stable short name, suitable for structured logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::Truncated { .. } => "truncation",
            Diagnostic::NoActiveRoot { .. } => "no-active-root",
            Diagnostic::MalformedIcon {
                source: IconError::MalformedBase64(_),
                ..
            } => "malformed-base64",
            Diagnostic::MalformedIcon {
                source: IconError::MalformedImage(_),
                ..
            } => "malformed-image",
        }
    }
}

/// Change notification delivered by a [`Session`](crate::Session), one per
/// mutation or diagnostic, in line order.
#[derive(Debug)]
pub enum SessionEvent {
    Update(Update),
    Diagnostic(Diagnostic),
}

/// Receiver of session events.
///
/// Implementations must not block: the reader loop calls `emit` inline.
pub trait EventSink {
    fn emit(&mut self, event: SessionEvent);
}

impl EventSink for Vec<SessionEvent> {
    fn emit(&mut self, event: SessionEvent) {
        self.push(event);
    }
}

impl EventSink for std::sync::mpsc::Sender<SessionEvent> {
    fn emit(&mut self, event: SessionEvent) {
        if self.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}

#[cfg(feature = "async")]
impl EventSink for tokio::sync::mpsc::UnboundedSender<SessionEvent> {
    fn emit(&mut self, event: SessionEvent) {
        if self.send(event).is_err() {
            tracing::trace!("event receiver dropped");
        }
    }
}
