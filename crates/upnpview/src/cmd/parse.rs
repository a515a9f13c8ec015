use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::AtomicBool;

use upnpview_line::LineReader;
use upnpview_proto::Session;

use crate::cmd::{finish, ParseArgs};
use crate::exit::{io_error, session_error, CliError, CliResult, DATA_INVALID, SUCCESS};
use crate::output::{EventPrinter, OutputFormat};

pub fn run(args: ParseArgs, format: OutputFormat) -> CliResult<i32> {
    let input = open_input(args.file.as_deref())?;
    let mut reader = LineReader::with_config(input, args.line.config());
    let mut session = Session::new();
    let mut printer = if args.events {
        EventPrinter::new(format)
    } else {
        EventPrinter::silent()
    };

    let report = session
        .run(&mut reader, &mut printer, &AtomicBool::new(true))
        .map_err(|err| session_error("parse failed", err))?;

    finish(session.forest(), &report, args.icons_dir.as_deref(), format)?;
    if args.strict && report.diagnostics > 0 {
        return Err(CliError::new(
            DATA_INVALID,
            format!("{} diagnostics reported", report.diagnostics),
        ));
    }
    Ok(SUCCESS)
}

/// `None` and `-` read stdin.
pub(crate) fn open_input(path: Option<&Path>) -> CliResult<Box<dyn Read>> {
    match path {
        Some(path) if path != Path::new("-") => {
            let file = File::open(path)
                .map_err(|err| io_error(&format!("open {} failed", path.display()), err))?;
            Ok(Box::new(file))
        }
        _ => Ok(Box::new(io::stdin().lock())),
    }
}
