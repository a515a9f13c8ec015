/// Errors that can occur while splitting a byte stream into lines.
#[derive(Debug, thiserror::Error)]
pub enum LineError {
    /// A line grew past the configured maximum without a terminator.
    #[error("line too long ({size} bytes, max {max})")]
    LineTooLong { size: usize, max: usize },

    /// The stream ended in the middle of a line.
    #[error("stream ended mid-line ({len} bytes discarded)")]
    Truncated { len: usize },

    /// A line handed to the writer contains a newline.
    #[error("line contains an embedded terminator")]
    EmbeddedTerminator,

    /// A line handed to the writer ends in `\r`, which the reader would
    /// strip as part of a CR/LF terminator.
    #[error("line ends with a carriage return")]
    TrailingCarriageReturn,

    /// An I/O error occurred while reading or writing lines.
    #[error("line I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl LineError {
    /// Whether the stream can keep being read after this error.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, LineError::Truncated { .. })
    }
}

pub type Result<T> = std::result::Result<T, LineError>;
