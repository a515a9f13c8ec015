use std::net::Shutdown;
use std::os::unix::net::UnixStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::{debug, info};
use upnpview_line::LineReader;
use upnpview_proto::{EndReason, Session};

use crate::cmd::{finish, install_ctrlc_handler, WatchArgs};
use crate::exit::{io_error, session_error, socket_error, CliResult, SUCCESS};
use crate::output::{EventPrinter, OutputFormat};

pub fn run(args: WatchArgs, format: OutputFormat) -> CliResult<i32> {
    let stream = UnixStream::connect(&args.socket).map_err(|err| {
        socket_error(&format!("connect to {} failed", args.socket.display()), err)
    })?;
    info!(socket = %args.socket.display(), "connected");

    // A blocked read only returns once the socket is shut down.
    let shutdown = stream
        .try_clone()
        .map_err(|err| io_error("socket clone failed", err))?;
    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), move || {
        if let Err(err) = shutdown.shutdown(Shutdown::Both) {
            debug!(error = %err, "socket shutdown failed");
        }
    })?;

    let mut reader = LineReader::with_config(stream, args.line.config());
    let mut session = Session::new();
    let mut printer = EventPrinter::new(format);

    let report = session
        .run(&mut reader, &mut printer, &running)
        .map_err(|err| session_error("stream failed", err))?;
    let report = if running.load(Ordering::SeqCst) {
        report
    } else {
        session.report(EndReason::Cancelled)
    };
    info!(end = ?report.end, devices = report.devices, "disconnected");

    finish(session.forest(), &report, args.icons_dir.as_deref(), format)?;
    Ok(SUCCESS)
}
