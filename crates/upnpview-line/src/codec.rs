use bytes::{BufMut, BytesMut};

use crate::error::{LineError, Result};

/// Line terminator.
pub const TERMINATOR: u8 = b'\n';

/// Default maximum line length: 16 MiB.
///
/// Icon payloads travel as a single base64 line, so this is sized for images,
/// not for metadata.
pub const DEFAULT_MAX_LINE: usize = 16 * 1024 * 1024;

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Configuration for line decoding.
#[derive(Debug, Clone)]
pub struct LineConfig {
    /// Maximum line length in bytes, terminator excluded. Default: 16 MiB.
    pub max_line_length: usize,
}

impl Default for LineConfig {
    fn default() -> Self {
        Self {
            max_line_length: DEFAULT_MAX_LINE,
        }
    }
}

/// Incremental terminator search over a growing buffer.
///
/// Remembers how far the buffer has been scanned so a long icon line arriving
/// in many chunks is not rescanned from the start on every chunk.
#[derive(Debug, Clone)]
struct Scanner {
    scanned: usize,
    max_line_length: usize,
}

impl Scanner {
    fn new(max_line_length: usize) -> Self {
        Self {
            scanned: 0,
            max_line_length,
        }
    }

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        let from = self.scanned.min(src.len());
        match src[from..].iter().position(|b| *b == TERMINATOR) {
            Some(offset) => {
                let pos = from + offset;
                self.scanned = 0;
                let size = content_len(&src[..pos]);
                if size > self.max_line_length {
                    return Err(LineError::LineTooLong {
                        size,
                        max: self.max_line_length,
                    });
                }
                Ok(Some(take_line(src, pos)))
            }
            None => {
                self.scanned = src.len();
                // A trailing '\r' may still turn out to be half of a CR/LF.
                let size = content_len(src);
                if size > self.max_line_length {
                    return Err(LineError::LineTooLong {
                        size,
                        max: self.max_line_length,
                    });
                }
                Ok(None) // Need more data
            }
        }
    }

    fn reset(&mut self) {
        self.scanned = 0;
    }
}

/// Length of `line` without a trailing `\r`.
fn content_len(line: &[u8]) -> usize {
    match line.last() {
        Some(b'\r') => line.len() - 1,
        _ => line.len(),
    }
}

/// Split the line ending at `pos` off the front of `src`, terminator stripped.
fn take_line(src: &mut BytesMut, pos: usize) -> String {
    let mut line = src.split_to(pos + 1);
    line.truncate(pos);
    if line.last() == Some(&b'\r') {
        line.truncate(pos - 1);
    }
    String::from_utf8_lossy(&line).into_owned()
}

/// Encode a single line into the wire format.
///
/// Fails if `line` contains a newline or ends in `\r`: the protocol has no
/// escaping, and a trailing `\r` would not survive decoding.
pub fn encode_line(line: &str, dst: &mut BytesMut) -> Result<()> {
    if line.as_bytes().contains(&TERMINATOR) {
        return Err(LineError::EmbeddedTerminator);
    }
    if line.ends_with('\r') {
        return Err(LineError::TrailingCarriageReturn);
    }
    dst.reserve(line.len() + 1);
    dst.put_slice(line.as_bytes());
    dst.put_u8(TERMINATOR);
    Ok(())
}

/// Decode one complete line from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete line yet.
/// On success, consumes the line and its terminator from the buffer.
pub fn decode_line(src: &mut BytesMut, max_line_length: usize) -> Result<Option<String>> {
    Scanner::new(max_line_length).decode(src)
}

/// Sans-io line decoder: feed it chunks, pull complete lines out.
///
/// Chunk boundaries are irrelevant; a line may span many chunks and one
/// chunk may carry many lines.
#[derive(Debug)]
pub struct LineDecoder {
    buf: BytesMut,
    scanner: Scanner,
    config: LineConfig,
}

impl LineDecoder {
    /// Create a decoder with default configuration.
    pub fn new() -> Self {
        Self::with_config(LineConfig::default())
    }

    /// Create a decoder with explicit configuration.
    pub fn with_config(config: LineConfig) -> Self {
        Self {
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            scanner: Scanner::new(config.max_line_length),
            config,
        }
    }

    /// Append a chunk of stream bytes.
    pub fn extend(&mut self, chunk: &[u8]) {
        self.buf.extend_from_slice(chunk);
    }

    /// Pull the next complete line, if one is buffered.
    pub fn decode(&mut self) -> Result<Option<String>> {
        self.scanner.decode(&mut self.buf)
    }

    /// Signal end of stream.
    ///
    /// Fails with [`LineError::Truncated`] when a partial line is still
    /// buffered. The partial line is discarded either way.
    pub fn finish(&mut self) -> Result<()> {
        self.scanner.reset();
        if self.buf.is_empty() {
            return Ok(());
        }
        let len = self.buf.len();
        self.buf.clear();
        tracing::debug!(len, "discarding partial line at end of stream");
        Err(LineError::Truncated { len })
    }

    /// Number of bytes buffered but not yet returned as a line.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Current decoder configuration.
    pub fn config(&self) -> &LineConfig {
        &self.config
    }
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// `tokio_util` codec with the same semantics as [`LineDecoder`].
#[cfg(feature = "async")]
#[derive(Debug, Clone)]
pub struct LineCodec {
    scanner: Scanner,
}

#[cfg(feature = "async")]
impl LineCodec {
    /// Create a codec with default configuration.
    pub fn new() -> Self {
        Self::with_config(&LineConfig::default())
    }

    /// Create a codec with explicit configuration.
    pub fn with_config(config: &LineConfig) -> Self {
        Self {
            scanner: Scanner::new(config.max_line_length),
        }
    }
}

#[cfg(feature = "async")]
impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "async")]
impl tokio_util::codec::Decoder for LineCodec {
    type Item = String;
    type Error = LineError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        self.scanner.decode(src)
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        if let Some(line) = self.scanner.decode(src)? {
            return Ok(Some(line));
        }
        self.scanner.reset();
        if src.is_empty() {
            return Ok(None);
        }
        let len = src.len();
        src.clear();
        Err(LineError::Truncated { len })
    }
}

#[cfg(feature = "async")]
impl<'a> tokio_util::codec::Encoder<&'a str> for LineCodec {
    type Error = LineError;

    fn encode(&mut self, item: &'a str, dst: &mut BytesMut) -> Result<()> {
        encode_line(item, dst)
    }
}
