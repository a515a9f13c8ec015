use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::os::unix::fs::FileTypeExt;
use std::os::unix::net::{UnixListener, UnixStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, info, warn};
use upnpview_line::{LineReader, LineWriter};
use upnpview_model::DeviceForest;
use upnpview_proto::{write_forest, Session};

use crate::cmd::parse::open_input;
use crate::cmd::{install_ctrlc_handler, ServeArgs};
use crate::exit::{
    emit_error, io_error, session_error, socket_error, CliError, CliResult, SUCCESS, USAGE,
};
use crate::output::{print_served, EventPrinter, OutputFormat};

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let forest = load(&args)?;
    // Anything write_forest rejects is rejected here, before any client waits on it.
    write_forest(&forest, &mut LineWriter::new(io::sink()))
        .map_err(|err| emit_error("transcript cannot be replayed", err))?;
    remove_stale_socket(&args.socket)?;

    // accept() only returns on a connection, so the handler makes one.
    // Installed before bind: once the socket exists, Ctrl-C is handled.
    let running = Arc::new(AtomicBool::new(true));
    let wake = args.socket.clone();
    install_ctrlc_handler(running.clone(), move || {
        let _ = UnixStream::connect(&wake);
    })?;

    let listener = UnixListener::bind(&args.socket).map_err(|err| {
        socket_error(&format!("bind {} failed", args.socket.display()), err)
    })?;
    info!(socket = %args.socket.display(), devices = forest.len(), "serving");

    let result = serve(&listener, &forest, &running, args.count, args.write_timeout);
    if let Err(err) = fs::remove_file(&args.socket) {
        debug!(error = %err, "socket cleanup failed");
    }

    let served = result?;
    print_served(&args.socket, served, forest.len(), format);
    Ok(SUCCESS)
}

fn load(args: &ServeArgs) -> CliResult<DeviceForest> {
    let input = open_input(Some(&args.transcript))?;
    let mut reader = LineReader::with_config(input, args.line.config());
    let mut session = Session::new();
    let report = session
        .run(&mut reader, &mut EventPrinter::silent(), &AtomicBool::new(true))
        .map_err(|err| session_error("transcript parse failed", err))?;
    if report.diagnostics > 0 {
        warn!(
            diagnostics = report.diagnostics,
            "transcript has diagnostics; replaying what was parsed"
        );
    }
    Ok(session.into_forest())
}

/// Accept clients until `count` is reached or `running` clears.
///
/// Each client is replayed on its own thread; all of them are joined before
/// returning.
fn serve(
    listener: &UnixListener,
    forest: &DeviceForest,
    running: &AtomicBool,
    count: Option<NonZeroUsize>,
    write_timeout: Duration,
) -> CliResult<usize> {
    thread::scope(|scope| {
        let mut served = 0usize;

        while running.load(Ordering::SeqCst) {
            let (stream, _) = listener
                .accept()
                .map_err(|err| io_error("accept failed", err))?;
            if !running.load(Ordering::SeqCst) {
                break;
            }

            let client = served;
            scope.spawn(move || replay(forest, stream, client, write_timeout));

            served = served.saturating_add(1);
            if count.is_some_and(|count| served >= count.get()) {
                break;
            }
        }

        Ok(served)
    })
}

/// Write the forest to one client, then close the connection.
fn replay(forest: &DeviceForest, stream: UnixStream, client: usize, write_timeout: Duration) {
    if let Err(err) = stream.set_write_timeout(Some(write_timeout)) {
        warn!(client, error = %err, "cannot set write timeout");
    }
    let mut writer = LineWriter::new(stream);
    match write_forest(forest, &mut writer) {
        Ok(()) => debug!(client, "replay complete"),
        // Only I/O can fail here: the forest was checked up front.
        Err(err) => warn!(client, error = %err, "client dropped during replay"),
    }
}

fn remove_stale_socket(path: &Path) -> CliResult<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.file_type().is_socket() => fs::remove_file(path)
            .map_err(|err| io_error(&format!("remove {} failed", path.display()), err)),
        Ok(_) => Err(CliError::new(
            USAGE,
            format!("{} exists and is not a socket", path.display()),
        )),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_error(&format!("stat {} failed", path.display()), err)),
    }
}
