use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{ModelError, Result};
use crate::icon::Icon;
use crate::update::Update;

/// Handle to a node in a [`DeviceForest`].
///
/// Stays valid for the lifetime of the forest that returned it; nodes are
/// never removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    /// Position of the node in discovery order.
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One metadata entry. Keys may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Property {
    pub key: String,
    pub value: String,
}

/// A root device or sub-device.
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceNode {
    id: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    properties: Vec<Property>,
    icon: Option<Arc<Icon>>,
}

impl DeviceNode {
    fn new(id: String, parent: Option<NodeId>) -> Self {
        Self {
            id,
            parent,
            children: Vec::new(),
            properties: Vec::new(),
            icon: None,
        }
    }

    /// Identifier from the `DEVICE`/`SUBDEVICE` line (typically a USN).
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Parent device, `None` for a root.
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Sub-devices in discovery order.
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// Metadata in insertion order.
    pub fn properties(&self) -> &[Property] {
        &self.properties
    }

    pub fn icon(&self) -> Option<&Arc<Icon>> {
        self.icon.as_ref()
    }
}

/// The forest of discovered devices for one connection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DeviceForest {
    nodes: Vec<DeviceNode>,
    roots: Vec<NodeId>,
}

impl DeviceForest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new root device.
    pub fn append_root(&mut self, id: impl Into<String>) -> NodeId {
        let node = NodeId(self.nodes.len());
        self.nodes.push(DeviceNode::new(id.into(), None));
        self.roots.push(node);
        node
    }

    /// Append a new device as the last child of `parent`.
    pub fn append_child(&mut self, parent: NodeId, id: impl Into<String>) -> Result<NodeId> {
        self.check(parent)?;
        let node = NodeId(self.nodes.len());
        self.nodes.push(DeviceNode::new(id.into(), Some(parent)));
        self.nodes[parent.0].children.push(node);
        Ok(node)
    }

    /// Append a metadata entry; earlier entries with the same key are kept.
    pub fn append_property(
        &mut self,
        node: NodeId,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<()> {
        let entry = self.node_mut(node)?;
        entry.properties.push(Property {
            key: key.into(),
            value: value.into(),
        });
        Ok(())
    }

    /// Set the node's icon, returning the one it replaces.
    pub fn set_icon(
        &mut self,
        node: NodeId,
        icon: impl Into<Arc<Icon>>,
    ) -> Result<Option<Arc<Icon>>> {
        let entry = self.node_mut(node)?;
        let previous = entry.icon.replace(icon.into());
        if previous.is_some() {
            tracing::debug!(%node, id = %entry.id, "replacing icon");
        }
        Ok(previous)
    }

    /// Root devices in discovery order.
    pub fn roots(&self) -> &[NodeId] {
        &self.roots
    }

    pub fn node(&self, node: NodeId) -> Option<&DeviceNode> {
        self.nodes.get(node.0)
    }

    /// Children of `node`; empty for unknown handles.
    pub fn children(&self, node: NodeId) -> &[NodeId] {
        self.node(node)
            .map(DeviceNode::children)
            .unwrap_or_default()
    }

    /// Properties of `node`; empty for unknown handles.
    pub fn properties(&self, node: NodeId) -> &[Property] {
        self.node(node)
            .map(DeviceNode::properties)
            .unwrap_or_default()
    }

    pub fn icon(&self, node: NodeId) -> Option<&Arc<Icon>> {
        self.node(node).and_then(DeviceNode::icon)
    }

    /// Total number of nodes, roots and sub-devices.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Pre-order traversal yielding `(depth, node)`, roots at depth 0.
    pub fn walk(&self) -> Walk<'_> {
        Walk {
            forest: self,
            stack: self.roots.iter().rev().map(|root| (0, *root)).collect(),
        }
    }

    /// Replay a mutation produced by another forest's writer.
    ///
    /// Node ids are positional, so `NodeAdded` updates must be applied in the
    /// order they were produced.
    pub fn apply(&mut self, update: &Update) -> Result<()> {
        match update {
            Update::NodeAdded { node, parent, id } => {
                let expected = NodeId(self.nodes.len());
                if *node != expected {
                    return Err(ModelError::OutOfOrder {
                        expected,
                        actual: *node,
                    });
                }
                match parent {
                    Some(parent) => self.append_child(*parent, id.as_str()).map(|_| ()),
                    None => {
                        self.append_root(id.as_str());
                        Ok(())
                    }
                }
            }
            Update::PropertyAdded { node, key, value } => {
                self.append_property(*node, key.as_str(), value.as_str())
            }
            Update::IconSet { node, icon } => self.set_icon(*node, Arc::clone(icon)).map(|_| ()),
        }
    }

    /// Nested, serializable view of the whole forest.
    pub fn to_tree(&self) -> Vec<NodeView<'_>> {
        self.roots.iter().map(|root| self.view(*root)).collect()
    }

    fn view(&self, node: NodeId) -> NodeView<'_> {
        let entry = &self.nodes[node.0];
        NodeView {
            id: &entry.id,
            properties: &entry.properties,
            icon: entry.icon.as_deref().map(IconView::from),
            children: entry.children.iter().map(|child| self.view(*child)).collect(),
        }
    }

    fn check(&self, node: NodeId) -> Result<()> {
        if node.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(ModelError::UnknownNode(node))
        }
    }

    fn node_mut(&mut self, node: NodeId) -> Result<&mut DeviceNode> {
        self.nodes
            .get_mut(node.0)
            .ok_or(ModelError::UnknownNode(node))
    }
}

/// Iterator returned by [`DeviceForest::walk`].
#[derive(Debug)]
pub struct Walk<'a> {
    forest: &'a DeviceForest,
    stack: Vec<(usize, NodeId)>,
}

impl Iterator for Walk<'_> {
    type Item = (usize, NodeId);

    fn next(&mut self) -> Option<Self::Item> {
        let (depth, node) = self.stack.pop()?;
        let children = self.forest.children(node);
        self.stack
            .extend(children.iter().rev().map(|child| (depth + 1, *child)));
        Some((depth, node))
    }
}

/// Serializable view of one node and its subtree.
#[derive(Debug, Serialize)]
pub struct NodeView<'a> {
    pub id: &'a str,
    pub properties: &'a [Property],
    pub icon: Option<IconView>,
    pub children: Vec<NodeView<'a>>,
}

/// Icon summary; pixel data is not serialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IconView {
    pub width: u32,
    pub height: u32,
    pub encoded_len: usize,
}

impl From<&Icon> for IconView {
    fn from(icon: &Icon) -> Self {
        Self {
            width: icon.width(),
            height: icon.height(),
            encoded_len: icon.encoded().len(),
        }
    }
}
