//! Client side of the UPnP discovery daemon's line protocol.
//!
//! The daemon streams discovered devices over a Unix socket as newline
//! terminated text: `DEVICE`/`SUBDEVICE` lines open nodes, `META` blocks carry
//! `key:value` metadata and `ICON` blocks carry a base64 PNG. This crate
//! rebuilds that stream into a device forest.
//!
//! # Crate Structure
//!
//! - [`line`]: incremental line decoding over arbitrary byte chunks
//! - [`model`]: the device forest, icons and change notifications
//! - [`proto`]: directive classification, the parser state machine and read loops
//!
//! # Example
//!
//! ```
//! use std::sync::atomic::AtomicBool;
//!
//! use upnpview::line::LineReader;
//! use upnpview::proto::{Session, SessionEvent};
//!
//! let wire = "DEVICE uuid:1\nMETA\nfriendlyName:Lamp\nSUBDEVICE uuid:1::svc\n";
//! let mut reader = LineReader::new(wire.as_bytes());
//! let mut session = Session::new();
//! let mut events: Vec<SessionEvent> = Vec::new();
//! session
//!     .run(&mut reader, &mut events, &AtomicBool::new(true))
//!     .unwrap();
//!
//! let forest = session.forest();
//! let root = forest.roots()[0];
//! assert_eq!(forest.properties(root)[0].value, "Lamp");
//! assert_eq!(forest.children(root).len(), 1);
//! assert_eq!(events.len(), 3);
//! ```

/// Re-export line decoding types.
pub mod line {
    pub use upnpview_line::*;
}

/// Re-export device model types.
pub mod model {
    pub use upnpview_model::*;
}

/// Re-export protocol types.
pub mod proto {
    pub use upnpview_proto::*;
}
