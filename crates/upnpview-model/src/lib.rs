//! In-memory model of discovered devices.
//!
//! A [`DeviceForest`] holds root devices in discovery order, each owning its
//! sub-devices. Every node carries insertion-ordered metadata and at most one
//! decoded [`Icon`]. Nodes and properties are never removed; the only
//! overwriting operation is [`DeviceForest::set_icon`].
//!
//! Mutations are described by [`Update`] values so a display layer can keep
//! its own mirror with [`DeviceForest::apply`] instead of sharing the writer's
//! forest.

pub mod error;
pub mod forest;
pub mod icon;
pub mod update;

pub use error::{IconError, ModelError, Result};
pub use forest::{DeviceForest, DeviceNode, IconView, NodeId, NodeView, Property, Walk};
pub use icon::Icon;
pub use update::Update;
