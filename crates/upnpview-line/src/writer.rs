use std::io::{ErrorKind, Write};

use bytes::BytesMut;

use crate::codec::encode_line;
use crate::error::{LineError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;

/// Writes newline-terminated lines to any `Write` stream.
///
/// Lines are buffered until [`LineWriter::flush`], so a whole device block
/// reaches the listener in as few writes as possible.
pub struct LineWriter<T> {
    inner: T,
    buf: BytesMut,
}

impl<T: Write> LineWriter<T> {
    /// Create a new line writer.
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
        }
    }

    /// Queue one line. Nothing reaches the stream until `flush`.
    pub fn write_line(&mut self, line: &str) -> Result<()> {
        encode_line(line, &mut self.buf)
    }

    /// Write all queued lines and flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        let mut offset = 0usize;
        while offset < self.buf.len() {
            match self.inner.write(&self.buf[offset..]) {
                Ok(0) => return Err(LineError::Io(ErrorKind::WriteZero.into())),
                Ok(n) => offset += n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(LineError::Io(err)),
            }
        }
        self.buf.clear();

        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(LineError::Io(err)),
            }
        }
    }

    /// Number of queued bytes not yet written.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream. Queued lines are dropped.
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T> std::fmt::Debug for LineWriter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineWriter")
            .field("pending", &self.buf.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::LineReader;

    #[test]
    fn lines_are_buffered_until_flush() {
        let mut writer = LineWriter::new(Vec::new());
        writer.write_line("DEVICE root1").unwrap();
        writer.write_line("META").unwrap();

        assert!(writer.get_ref().is_empty());
        assert_eq!(writer.pending(), 18);

        writer.flush().unwrap();
        assert_eq!(writer.pending(), 0);
        assert_eq!(writer.into_inner(), b"DEVICE root1\nMETA\n");
    }

    #[test]
    fn rejected_line_leaves_queue_untouched() {
        let mut writer = LineWriter::new(Vec::new());
        writer.write_line("ok").unwrap();
        assert!(matches!(
            writer.write_line("bad\nline"),
            Err(LineError::EmbeddedTerminator)
        ));
        writer.flush().unwrap();
        assert_eq!(writer.get_ref().as_slice(), b"ok\n");
    }

    #[test]
    fn zero_length_write_is_an_error() {
        let mut writer = LineWriter::new(ZeroWriter);
        writer.write_line("ICON").unwrap();
        let err = writer.flush().unwrap_err();
        assert!(matches!(err, LineError::Io(e) if e.kind() == ErrorKind::WriteZero));
    }

    #[test]
    fn write_then_read_over_socket_pair() {
        let (left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut writer = LineWriter::new(left);
        let mut reader = LineReader::new(right);

        writer.write_line("SUBDEVICE sub1").unwrap();
        writer.write_line("").unwrap();
        writer.flush().unwrap();

        assert_eq!(
            reader.read_line().unwrap().as_deref(),
            Some("SUBDEVICE sub1")
        );
        assert_eq!(reader.read_line().unwrap().as_deref(), Some(""));
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }
}
