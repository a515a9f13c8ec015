use std::fmt;
use std::io;

use upnpview_line::LineError;
use upnpview_proto::{EmitError, SessionError};

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::NotFound => FAILURE,
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrInUse => TRANSPORT_ERROR,
        io::ErrorKind::InvalidData => DATA_INVALID,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

/// Socket setup failures. A missing socket file means no daemon, not a
/// missing input file.
pub fn socket_error(context: &str, err: io::Error) -> CliError {
    match err.kind() {
        io::ErrorKind::PermissionDenied => io_error(context, err),
        _ => CliError::new(TRANSPORT_ERROR, format!("{context}: {err}")),
    }
}

pub fn line_error(context: &str, err: LineError) -> CliError {
    match err {
        LineError::Io(source) => io_error(context, source),
        LineError::LineTooLong { .. }
        | LineError::Truncated { .. }
        | LineError::EmbeddedTerminator
        | LineError::TrailingCarriageReturn => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
    }
}

pub fn session_error(context: &str, err: SessionError) -> CliError {
    match err {
        SessionError::Line(err) => line_error(context, err),
        // Protocol violations become diagnostics; what reaches here is misuse.
        SessionError::Protocol(err) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}

pub fn emit_error(context: &str, err: EmitError) -> CliError {
    match err {
        EmitError::Line(err) => line_error(context, err),
        EmitError::KeyContainsColon { .. } | EmitError::NestedSubDevice { .. } => {
            CliError::new(DATA_INVALID, format!("{context}: {err}"))
        }
        EmitError::Model(_) => CliError::new(INTERNAL, format!("{context}: {err}")),
    }
}
