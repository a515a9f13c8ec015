//! Incremental parser for the device discovery line protocol.
//!
//! The discovery daemon streams directives and payload lines:
//!
//! ```text
//! DEVICE <id>
//! SUBDEVICE <id>
//! META
//! <key>:<value>
//! ICON
//! <base64-png>
//! ```
//!
//! [`Parser`] is the state machine: it classifies one line at a time and
//! applies it to a [`DeviceForest`](upnpview_model::DeviceForest).
//! [`Session`] is the single-writer reader loop that drives the parser from a
//! line stream and reports every mutation and diagnostic to an [`EventSink`].
//! [`emit`] is the producer side, writing a forest back out as lines.

pub mod classify;
pub mod emit;
pub mod error;
pub mod event;
pub mod machine;
pub mod session;

pub use classify::{LineKind, DEVICE, ICON, META, SUBDEVICE};
pub use emit::{write_forest, write_node};
pub use error::{EmitError, ProtocolError, SessionError};
pub use event::{Diagnostic, EventSink, SessionEvent};
pub use machine::{Mode, Outcome, Parser, ParserContext};
pub use session::{EndReason, Session, SessionReport};

#[cfg(test)]
mod testutil;
