use std::sync::Arc;

use tracing::{debug, trace};
use upnpview_model::{DeviceForest, Icon, NodeId, Update};

use crate::classify::LineKind;
use crate::error::ProtocolError;
use crate::event::Diagnostic;

/// How payload lines are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Mode {
    /// Payload lines are ignored.
    #[default]
    Idle,
    /// Payload lines are `key:value` metadata for the current node.
    CapturingMeta,
    /// Payload lines are base64 PNG icons for the current node.
    CapturingIcon,
}

impl Mode {
    /// Transition table: every directive picks the next mode outright,
    /// payload lines keep the current one.
    pub fn next(self, kind: &LineKind<'_>) -> Mode {
        match kind {
            LineKind::Device(_) | LineKind::SubDevice(_) => Mode::Idle,
            LineKind::Meta { .. } => Mode::CapturingMeta,
            LineKind::Icon { .. } => Mode::CapturingIcon,
            LineKind::Payload(_) => self,
        }
    }
}

/// Per-connection parse state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserContext {
    /// Node that metadata and icon lines apply to.
    pub current_node: Option<NodeId>,
    /// Most recent root, parent for subsequent `SUBDEVICE` lines.
    pub current_root: Option<NodeId>,
    pub mode: Mode,
}

/// Result of feeding one line.
#[derive(Debug)]
pub enum Outcome {
    /// The line mutated the forest.
    Applied(Update),
    /// A `META`/`ICON` directive switched the capture mode.
    ModeChanged(Mode),
    /// The line had no effect.
    Ignored,
    /// The line was a bad payload; the forest is unchanged.
    Rejected(Diagnostic),
}

/// The protocol state machine.
///
/// Feed it lines in stream order together with the forest they build. The
/// same forest must be passed on every call.
#[derive(Debug, Default)]
pub struct Parser {
    ctx: ParserContext,
}

impl Parser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resume from an existing context.
    pub fn with_context(ctx: ParserContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ParserContext {
        &self.ctx
    }

    /// Process one line (terminator already stripped).
    ///
    /// Only a `SUBDEVICE` before any `DEVICE` is an error; bad icon payloads
    /// come back as [`Outcome::Rejected`].
    pub fn feed(
        &mut self,
        forest: &mut DeviceForest,
        line: &str,
    ) -> Result<Outcome, ProtocolError> {
        let kind = LineKind::classify(line);
        let outcome = match kind {
            LineKind::Device(id) => {
                let node = forest.append_root(id);
                debug!(%node, id, "device");
                self.ctx.current_root = Some(node);
                self.ctx.current_node = Some(node);
                Outcome::Applied(Update::NodeAdded {
                    node,
                    parent: None,
                    id: id.to_owned(),
                })
            }
            LineKind::SubDevice(id) => {
                let Some(root) = self.ctx.current_root else {
                    return Err(ProtocolError::NoActiveRoot { id: id.to_owned() });
                };
                let node = forest.append_child(root, id)?;
                debug!(%node, %root, id, "sub-device");
                self.ctx.current_node = Some(node);
                Outcome::Applied(Update::NodeAdded {
                    node,
                    parent: Some(root),
                    id: id.to_owned(),
                })
            }
            LineKind::Meta { target } | LineKind::Icon { target } => {
                let mode = self.ctx.mode.next(&kind);
                self.check_target(forest, target);
                debug!(?mode, "capture");
                Outcome::ModeChanged(mode)
            }
            LineKind::Payload(payload) => self.payload(forest, payload)?,
        };
        self.ctx.mode = self.ctx.mode.next(&kind);
        Ok(outcome)
    }

    fn payload(
        &self,
        forest: &mut DeviceForest,
        payload: &str,
    ) -> Result<Outcome, ProtocolError> {
        let Some(node) = self.ctx.current_node else {
            return Ok(Outcome::Ignored);
        };

        match self.ctx.mode {
            Mode::Idle => Ok(Outcome::Ignored),
            Mode::CapturingMeta => {
                let Some((key, value)) = payload.split_once(':') else {
                    trace!(%node, "metadata line without ':' ignored");
                    return Ok(Outcome::Ignored);
                };
                forest.append_property(node, key, value)?;
                Ok(Outcome::Applied(Update::PropertyAdded {
                    node,
                    key: key.to_owned(),
                    value: value.to_owned(),
                }))
            }
            Mode::CapturingIcon => match Icon::decode(payload) {
                Ok(icon) => {
                    let icon = Arc::new(icon);
                    forest.set_icon(node, Arc::clone(&icon))?;
                    debug!(%node, width = icon.width(), height = icon.height(), "icon");
                    Ok(Outcome::Applied(Update::IconSet { node, icon }))
                }
                Err(source) => Ok(Outcome::Rejected(Diagnostic::MalformedIcon { node, source })),
            },
        }
    }

    /// The daemon names the device again on `META`/`ICON`; it should be the
    /// current node, but payloads always go to the current node regardless.
    fn check_target(&self, forest: &DeviceForest, target: Option<&str>) {
        let (Some(target), Some(node)) = (target, self.ctx.current_node) else {
            return;
        };
        if let Some(current) = forest.node(node) {
            if current.id() != target {
                debug!(
                    %node,
                    current = current.id(),
                    target,
                    "capture target differs from current node"
                );
            }
        }
    }
}
