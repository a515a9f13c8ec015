use std::sync::Arc;

use crate::forest::NodeId;
use crate::icon::Icon;

/// One mutation of a [`DeviceForest`](crate::DeviceForest).
///
/// Emitted by the single writer after it has applied the change, in the same
/// order. Replaying the sequence with [`DeviceForest::apply`](crate::DeviceForest::apply)
/// yields an identical forest.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// A root (`parent == None`) or sub-device was appended.
    NodeAdded {
        node: NodeId,
        parent: Option<NodeId>,
        id: String,
    },

    /// A metadata entry was appended to `node`.
    PropertyAdded {
        node: NodeId,
        key: String,
        value: String,
    },

    /// `node`'s icon was set or replaced.
    IconSet { node: NodeId, icon: Arc<Icon> },
}

impl Update {
    /// The node this update touches.
    pub fn node(&self) -> NodeId {
        match self {
            Update::NodeAdded { node, .. }
            | Update::PropertyAdded { node, .. }
            | Update::IconSet { node, .. } => *node,
        }
    }
}
