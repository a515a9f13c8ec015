use std::fs;
use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use upnpview_model::{DeviceForest, IconView, NodeId, NodeView, Update};
use upnpview_proto::{EventSink, SessionEvent, SessionReport};

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
enum EventOutput<'a> {
    NodeAdded {
        node: NodeId,
        parent: Option<NodeId>,
        id: &'a str,
    },
    PropertyAdded {
        node: NodeId,
        device: &'a str,
        key: &'a str,
        value: &'a str,
    },
    IconSet {
        node: NodeId,
        device: &'a str,
        icon: IconView,
    },
    Diagnostic {
        kind: &'static str,
        message: String,
    },
}

#[derive(Serialize)]
struct ForestOutput<'a> {
    report: &'a SessionReport,
    devices: Vec<NodeView<'a>>,
}

#[derive(Serialize)]
struct ServedOutput<'a> {
    socket: &'a Path,
    clients: usize,
    devices: usize,
}

/// Prints change notifications as they arrive.
///
/// Keeps its own copy of the forest, rebuilt from the updates, to name the
/// device each update refers to. Table output has no streaming form and
/// prints nothing here.
pub struct EventPrinter {
    mirror: DeviceForest,
    format: Option<OutputFormat>,
}

impl EventPrinter {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            mirror: DeviceForest::new(),
            format: Some(format),
        }
    }

    pub fn silent() -> Self {
        Self {
            mirror: DeviceForest::new(),
            format: None,
        }
    }

    fn device(&self, node: NodeId) -> &str {
        self.mirror.node(node).map_or("?", |entry| entry.id())
    }

    fn render<'a>(&'a self, event: &'a SessionEvent) -> EventOutput<'a> {
        match event {
            SessionEvent::Update(Update::NodeAdded { node, parent, id }) => EventOutput::NodeAdded {
                node: *node,
                parent: *parent,
                id,
            },
            SessionEvent::Update(Update::PropertyAdded { node, key, value }) => {
                EventOutput::PropertyAdded {
                    node: *node,
                    device: self.device(*node),
                    key,
                    value,
                }
            }
            SessionEvent::Update(Update::IconSet { node, icon }) => EventOutput::IconSet {
                node: *node,
                device: self.device(*node),
                icon: IconView::from(icon.as_ref()),
            },
            SessionEvent::Diagnostic(diagnostic) => EventOutput::Diagnostic {
                kind: diagnostic.kind(),
                message: diagnostic.to_string(),
            },
        }
    }
}

impl EventSink for EventPrinter {
    fn emit(&mut self, event: SessionEvent) {
        if let SessionEvent::Update(update) = &event {
            if let Err(err) = self.mirror.apply(update) {
                tracing::warn!(error = %err, "event out of order");
            }
        }

        let Some(format) = self.format else {
            return;
        };
        match (format, self.render(&event)) {
            (OutputFormat::Json, out) => println!("{}", to_json(&out)),
            (OutputFormat::Table, _) => {}
            (OutputFormat::Pretty, out) => println!("{}", pretty_event(&out)),
        }
    }
}

fn pretty_event(event: &EventOutput<'_>) -> String {
    match event {
        EventOutput::NodeAdded {
            node,
            parent: None,
            id,
        } => format!("+ device {id} ({node})"),
        EventOutput::NodeAdded {
            node,
            parent: Some(parent),
            id,
        } => format!("+ sub-device {id} ({node}, parent {parent})"),
        EventOutput::PropertyAdded {
            device, key, value, ..
        } => format!("  {device} {key}={value}"),
        EventOutput::IconSet { device, icon, .. } => {
            format!("  {device} icon {}x{}", icon.width, icon.height)
        }
        EventOutput::Diagnostic { kind, message } => format!("! {kind}: {message}"),
    }
}

pub fn print_forest(forest: &DeviceForest, report: &SessionReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ForestOutput {
                report,
                devices: forest.to_tree(),
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["DEVICE", "KEY", "VALUE", "ICON"]);
            for (depth, node) in forest.walk() {
                let Some(entry) = forest.node(node) else {
                    continue;
                };
                let name = format!("{}{}", "  ".repeat(depth), entry.id());
                let icon = entry.icon().map(|icon| format!("{}x{}", icon.width(), icon.height()));
                let mut properties = entry.properties().iter();
                let first = properties.next();
                table.add_row(vec![
                    name,
                    first.map(|p| p.key.clone()).unwrap_or_default(),
                    first.map(|p| p.value.clone()).unwrap_or_default(),
                    icon.unwrap_or_default(),
                ]);
                for property in properties {
                    table.add_row(vec![
                        String::new(),
                        property.key.clone(),
                        property.value.clone(),
                        String::new(),
                    ]);
                }
            }
            println!("{table}");
            println!("{}", summary(report));
        }
        OutputFormat::Pretty => {
            for (depth, node) in forest.walk() {
                let Some(entry) = forest.node(node) else {
                    continue;
                };
                let indent = "  ".repeat(depth * 2);
                let kind = if entry.is_root() { "DEVICE" } else { "SUBDEVICE" };
                match entry.icon() {
                    Some(icon) => println!(
                        "{indent}{kind} {} [icon {}x{}]",
                        entry.id(),
                        icon.width(),
                        icon.height()
                    ),
                    None => println!("{indent}{kind} {}", entry.id()),
                }
                for property in entry.properties() {
                    println!("{indent}  {}: {}", property.key, property.value);
                }
            }
            println!("{}", summary(report));
        }
    }
}

pub fn print_served(socket: &Path, clients: usize, devices: usize, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let out = ServedOutput {
                socket,
                clients,
                devices,
            };
            println!("{}", to_json(&out));
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "served {clients} clients with {devices} devices on {}",
                socket.display()
            );
        }
    }
}

/// Write every icon's PNG bytes into `dir`, one file per node.
///
/// File names are `<index>-<id>.png` with characters outside
/// `[A-Za-z0-9._-]` replaced, so distinct nodes never collide.
pub fn write_icons(forest: &DeviceForest, dir: &Path) -> io::Result<usize> {
    fs::create_dir_all(dir)?;
    let mut written = 0;
    for (_, node) in forest.walk() {
        let Some(icon) = forest.icon(node) else {
            continue;
        };
        let Some(entry) = forest.node(node) else {
            continue;
        };
        fs::write(icon_path(dir, node, entry.id()), icon.encoded())?;
        written += 1;
    }
    Ok(written)
}

fn icon_path(dir: &Path, node: NodeId, id: &str) -> PathBuf {
    let name: String = id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    dir.join(format!("{}-{name}.png", node.index()))
}

fn summary(report: &SessionReport) -> String {
    let end = match report.end {
        upnpview_proto::EndReason::Eof => "end of stream",
        upnpview_proto::EndReason::Cancelled => "cancelled",
    };
    format!(
        "{} devices, {} lines, {} diagnostics ({end})",
        report.devices, report.lines, report.diagnostics
    )
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
}
