//! Newline-delimited text framing for discovery status streams.
//!
//! The discovery daemon writes one directive or payload per line. This crate
//! turns arbitrarily chunked bytes into complete lines:
//! - `\n` terminates a line, and a preceding `\r` is stripped
//! - empty lines are forwarded as `""`
//! - a partial line at end of stream is reported, never silently completed
//!
//! Callers never see partial lines and never manage buffers.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub use codec::LineCodec;
pub use codec::{decode_line, encode_line, LineConfig, LineDecoder, DEFAULT_MAX_LINE};
pub use error::{LineError, Result};
pub use reader::{LineReader, Lines};
pub use writer::LineWriter;
