//! Directive classification.
//!
//! Prefix checks always win over the current capture mode, so a directive
//! is never mistaken for payload even inside a `META` or `ICON` block.

/// Prefix introducing a root device.
pub const DEVICE: &str = "DEVICE ";

/// Prefix introducing a sub-device of the most recent root.
pub const SUBDEVICE: &str = "SUBDEVICE ";

/// Keyword opening a metadata block.
pub const META: &str = "META";

/// Keyword opening an icon block.
pub const ICON: &str = "ICON";

/// What a single line means, independent of parser state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind<'a> {
    /// `DEVICE <id>`; the id is the rest of the line and may contain spaces.
    Device(&'a str),
    /// `SUBDEVICE <id>`.
    SubDevice(&'a str),
    /// `META`, or `META <id>` as written by the discovery daemon.
    Meta { target: Option<&'a str> },
    /// `ICON`, or `ICON <id>`.
    Icon { target: Option<&'a str> },
    /// Anything else; interpreted by the current mode.
    Payload(&'a str),
}

impl<'a> LineKind<'a> {
    /// Classify a line, first match wins.
    pub fn classify(line: &'a str) -> Self {
        if let Some(id) = line.strip_prefix(DEVICE) {
            return LineKind::Device(id);
        }
        if let Some(id) = line.strip_prefix(SUBDEVICE) {
            return LineKind::SubDevice(id);
        }
        if let Some(target) = keyword(line, META) {
            return LineKind::Meta { target };
        }
        if let Some(target) = keyword(line, ICON) {
            return LineKind::Icon { target };
        }
        LineKind::Payload(line)
    }

    pub fn is_directive(&self) -> bool {
        !matches!(self, LineKind::Payload(_))
    }
}

/// Match `keyword` alone or followed by a space and a target.
fn keyword<'a>(line: &'a str, keyword: &str) -> Option<Option<&'a str>> {
    let rest = line.strip_prefix(keyword)?;
    if rest.is_empty() {
        return Some(None);
    }
    rest.strip_prefix(' ').map(Some)
}
