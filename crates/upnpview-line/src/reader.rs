use std::io::{ErrorKind, Read};

use crate::codec::{LineConfig, LineDecoder};
use crate::error::{LineError, Result};

const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete lines from any `Read` stream.
///
/// Handles partial reads internally — callers always get complete lines.
pub struct LineReader<T> {
    inner: T,
    decoder: LineDecoder,
}

impl<T: Read> LineReader<T> {
    /// Create a new line reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, LineConfig::default())
    }

    /// Create a new line reader with explicit configuration.
    pub fn with_config(inner: T, config: LineConfig) -> Self {
        Self {
            inner,
            decoder: LineDecoder::with_config(config),
        }
    }

    /// Read the next complete line (blocking).
    ///
    /// Returns `Ok(None)` on a clean end of stream, and
    /// `Err(LineError::Truncated)` when the stream ends mid-line.
    pub fn read_line(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(line) = self.decoder.decode()? {
                return Ok(Some(line));
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(LineError::Io(err)),
            };

            if read == 0 {
                self.decoder.finish()?;
                return Ok(None);
            }

            self.decoder.extend(&chunk[..read]);
        }
    }

    /// Lazy iterator over the remaining lines.
    ///
    /// The iterator ends after end of stream or after yielding an error.
    pub fn lines(&mut self) -> Lines<'_, T> {
        Lines {
            reader: self,
            done: false,
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Current line reader configuration.
    pub fn config(&self) -> &LineConfig {
        self.decoder.config()
    }
}

impl<T> std::fmt::Debug for LineReader<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LineReader")
            .field("buffered", &self.decoder.buffered())
            .finish_non_exhaustive()
    }
}

/// Iterator returned by [`LineReader::lines`].
pub struct Lines<'a, T> {
    reader: &'a mut LineReader<T>,
    done: bool,
}

impl<T: Read> Iterator for Lines<'_, T> {
    type Item = Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.reader.read_line() {
            Ok(Some(line)) => Some(Ok(line)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(err) => {
                self.done = true;
                Some(Err(err))
            }
        }
    }
}

impl<T: Read> std::iter::FusedIterator for Lines<'_, T> {}

#[cfg(test)]
mod tests {
    use std::io::{Cursor, Write};

    use super::*;

    #[test]
    fn read_single_line() {
        let mut reader = LineReader::new(Cursor::new(b"DEVICE root1\n".to_vec()));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("DEVICE root1"));
        assert!(reader.read_line().unwrap().is_none());
    }

    #[test]
    fn read_multiple_lines() {
        let wire = b"DEVICE root1\nMETA\nname:Printer\n".to_vec();
        let mut reader = LineReader::new(Cursor::new(wire));

        let lines: Vec<String> = reader.lines().map(|l| l.unwrap()).collect();
        assert_eq!(lines, vec!["DEVICE root1", "META", "name:Printer"]);
    }

    #[test]
    fn read_large_line() {
        let payload = "A".repeat(64 * 1024);
        let wire = format!("{payload}\n");
        let mut reader = LineReader::new(Cursor::new(wire.into_bytes()));
        assert_eq!(reader.read_line().unwrap().unwrap().len(), payload.len());
    }

    #[test]
    fn partial_read_handling() {
        let byte_reader = ByteByByteReader {
            bytes: b"SUBDEVICE sub1\r\nport:9100\n".to_vec(),
            pos: 0,
        };
        let mut reader = LineReader::new(byte_reader);

        assert_eq!(
            reader.read_line().unwrap().as_deref(),
            Some("SUBDEVICE sub1")
        );
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("port:9100"));
        assert!(reader.read_line().unwrap().is_none());
    }

    #[test]
    fn empty_stream_is_clean_eof() {
        let mut reader = LineReader::new(Cursor::new(Vec::<u8>::new()));
        assert!(reader.read_line().unwrap().is_none());
    }

    #[test]
    fn eof_mid_line_is_truncation() {
        let mut reader = LineReader::new(Cursor::new(b"META\nname:Prin".to_vec()));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("META"));

        let err = reader.read_line().unwrap_err();
        assert!(matches!(err, LineError::Truncated { len: 9 }));
        assert!(reader.read_line().unwrap().is_none());
    }

    #[test]
    fn lines_iterator_stops_after_error() {
        let mut reader = LineReader::new(Cursor::new(b"one\ntwo".to_vec()));
        let mut lines = reader.lines();

        assert_eq!(lines.next().unwrap().unwrap(), "one");
        assert!(matches!(
            lines.next(),
            Some(Err(LineError::Truncated { .. }))
        ));
        assert!(lines.next().is_none());
    }

    #[test]
    fn oversized_line_in_stream() {
        let cfg = LineConfig { max_line_length: 16 };
        let mut reader = LineReader::with_config(Cursor::new(vec![b'x'; 1024]), cfg);
        let err = reader.read_line().unwrap_err();
        assert!(matches!(err, LineError::LineTooLong { .. }));
        assert!(!err.is_recoverable());
    }

    #[test]
    fn interrupted_read_retries() {
        let reader = InterruptedThenData {
            state: 0,
            bytes: b"ICON\n".to_vec(),
            pos: 0,
        };
        let mut lines = LineReader::new(reader);
        assert_eq!(lines.read_line().unwrap().as_deref(), Some("ICON"));
    }

    #[test]
    fn read_over_socket_pair() {
        let (mut left, right) = std::os::unix::net::UnixStream::pair().unwrap();
        let mut reader = LineReader::new(right);

        let writer = std::thread::spawn(move || {
            for chunk in [&b"DEVICE ro"[..], b"ot1\nME", b"TA\nname:Printer\n"] {
                left.write_all(chunk).unwrap();
                left.flush().unwrap();
            }
        });

        assert_eq!(reader.read_line().unwrap().as_deref(), Some("DEVICE root1"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("META"));
        assert_eq!(reader.read_line().unwrap().as_deref(), Some("name:Printer"));

        writer.join().unwrap();
        assert!(reader.read_line().unwrap().is_none());
    }

    #[test]
    fn accessors_and_into_inner() {
        let cursor = Cursor::new(Vec::<u8>::new());
        let mut reader = LineReader::new(cursor);

        let _ = reader.get_ref();
        let _ = reader.get_mut();
        assert!(format!("{reader:?}").contains("LineReader"));
        let _inner = reader.into_inner();
    }

    #[derive(Debug)]
    struct ByteByByteReader {
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for ByteByByteReader {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.pos >= self.bytes.len() || buf.is_empty() {
                return Ok(0);
            }

            buf[0] = self.bytes[self.pos];
            self.pos += 1;
            Ok(1)
        }
    }

    struct InterruptedThenData {
        state: u8,
        bytes: Vec<u8>,
        pos: usize,
    }

    impl Read for InterruptedThenData {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.state == 0 {
                self.state = 1;
                return Err(std::io::Error::from(ErrorKind::Interrupted));
            }
            if self.pos >= self.bytes.len() {
                return Ok(0);
            }
            let remaining = self.bytes.len() - self.pos;
            let n = remaining.min(buf.len());
            buf[..n].copy_from_slice(&self.bytes[self.pos..self.pos + n]);
            self.pos += n;
            Ok(n)
        }
    }
}
