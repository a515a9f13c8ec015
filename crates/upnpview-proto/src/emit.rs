//! Producer side: write devices as protocol lines.
//!
//! Mirrors what the discovery daemon sends to a newly connected listener:
//! each device line, then its metadata block, then its icon, then its
//! sub-devices.

use std::io::Write;

use upnpview_line::LineWriter;
use upnpview_model::{DeviceForest, ModelError, NodeId};

use crate::classify::{DEVICE, ICON, META, SUBDEVICE};
use crate::error::EmitError;

/// Queue the lines for `node` and its sub-devices.
///
/// Nothing is flushed; call [`LineWriter::flush`] once the block is complete.
pub fn write_node<W: Write>(
    forest: &DeviceForest,
    node: NodeId,
    out: &mut LineWriter<W>,
) -> Result<(), EmitError> {
    let entry = forest.node(node).ok_or(ModelError::UnknownNode(node))?;

    let prefix = match entry.parent() {
        None => DEVICE,
        Some(parent) if forest.node(parent).is_some_and(|p| p.is_root()) => SUBDEVICE,
        Some(_) => {
            return Err(EmitError::NestedSubDevice {
                id: entry.id().to_owned(),
            })
        }
    };
    out.write_line(&format!("{prefix}{}", entry.id()))?;

    if !entry.properties().is_empty() {
        out.write_line(&format!("{META} {}", entry.id()))?;
        for property in entry.properties() {
            if property.key.contains(':') {
                return Err(EmitError::KeyContainsColon {
                    key: property.key.clone(),
                });
            }
            out.write_line(&format!("{}:{}", property.key, property.value))?;
        }
    }

    if let Some(icon) = entry.icon() {
        out.write_line(&format!("{ICON} {}", entry.id()))?;
        out.write_line(&icon.to_base64())?;
    }

    for child in entry.children() {
        write_node(forest, *child, out)?;
    }
    Ok(())
}

/// Write the whole forest, roots in discovery order, and flush.
pub fn write_forest<W: Write>(
    forest: &DeviceForest,
    out: &mut LineWriter<W>,
) -> Result<(), EmitError> {
    for root in forest.roots() {
        write_node(forest, *root, out)?;
    }
    out.flush()?;
    tracing::debug!(devices = forest.len(), "forest written");
    Ok(())
}
