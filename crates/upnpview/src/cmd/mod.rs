use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use upnpview_line::{LineConfig, DEFAULT_MAX_LINE};
use upnpview_model::DeviceForest;
use upnpview_proto::SessionReport;

use crate::exit::{io_error, CliError, CliResult, INTERNAL};
use crate::output::{print_forest, write_icons, OutputFormat};

pub mod parse;
pub mod serve;
pub mod version;
pub mod watch;

/// Socket the discovery daemon listens on by default.
pub const DEFAULT_SOCKET: &str = "/tmp/upnpy.sock";

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Connect to the discovery daemon and follow its device stream.
    Watch(WatchArgs),
    /// Parse a captured stream and print the device forest.
    Parse(ParseArgs),
    /// Replay a captured stream to every client that connects.
    Serve(ServeArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Watch(args) => watch::run(args, format),
        Command::Parse(args) => parse::run(args, format),
        Command::Serve(args) => serve::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct LineArgs {
    /// Longest accepted line in bytes; longer lines end the stream.
    #[arg(long, value_name = "BYTES", default_value_t = default_line_limit())]
    pub max_line_length: NonZeroUsize,
}

fn default_line_limit() -> NonZeroUsize {
    NonZeroUsize::new(DEFAULT_MAX_LINE).unwrap_or(NonZeroUsize::MIN)
}

impl LineArgs {
    pub fn config(&self) -> LineConfig {
        LineConfig {
            max_line_length: self.max_line_length.get(),
        }
    }
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    /// Daemon socket to connect to.
    #[arg(env = "UPNPVIEW_SOCKET", default_value = DEFAULT_SOCKET)]
    pub socket: PathBuf,
    /// Write each device icon as a PNG file into this directory.
    #[arg(long, value_name = "DIR")]
    pub icons_dir: Option<PathBuf>,
    #[command(flatten)]
    pub line: LineArgs,
}

#[derive(Args, Debug)]
pub struct ParseArgs {
    /// Captured stream to parse; stdin when omitted or `-`.
    pub file: Option<PathBuf>,
    /// Write each device icon as a PNG file into this directory.
    #[arg(long, value_name = "DIR")]
    pub icons_dir: Option<PathBuf>,
    /// Print change notifications while parsing.
    #[arg(long)]
    pub events: bool,
    /// Exit with status 60 if any diagnostic was reported.
    #[arg(long)]
    pub strict: bool,
    #[command(flatten)]
    pub line: LineArgs,
}

#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Socket path to bind. A stale socket at this path is replaced.
    pub socket: PathBuf,
    /// Captured stream to replay.
    pub transcript: PathBuf,
    /// Exit after serving N clients.
    #[arg(long)]
    pub count: Option<NonZeroUsize>,
    /// Drop a client that stops reading for this long (e.g. 10s, 500ms).
    #[arg(long, value_name = "DURATION", default_value = "10s", value_parser = parse_timeout)]
    pub write_timeout: Duration,
    #[command(flatten)]
    pub line: LineArgs,
}

/// `<n>ms`, `<n>s` or a bare number of seconds; zero is rejected.
fn parse_timeout(input: &str) -> Result<Duration, String> {
    let input = input.trim();
    let (number, millis) = match input.strip_suffix("ms") {
        Some(number) => (number, true),
        None => (input.strip_suffix('s').unwrap_or(input), false),
    };
    let value: u64 = number
        .parse()
        .map_err(|_| format!("invalid duration: {input:?}"))?;
    if value == 0 {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Export icons if asked, then print the forest.
fn finish(
    forest: &DeviceForest,
    report: &SessionReport,
    icons_dir: Option<&Path>,
    format: OutputFormat,
) -> CliResult<()> {
    if let Some(dir) = icons_dir {
        let written = write_icons(forest, dir)
            .map_err(|err| io_error(&format!("writing icons to {}", dir.display()), err))?;
        tracing::info!(count = written, dir = %dir.display(), "icons written");
    }
    print_forest(forest, report, format);
    Ok(())
}

fn install_ctrlc_handler<F>(running: Arc<AtomicBool>, on_stop: F) -> CliResult<()>
where
    F: Fn() + Send + 'static,
{
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        on_stop();
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
