//! Error types for bitstream operations.

use thiserror::Error;

/// Errors that can occur while extracting headers or rewriting a buffer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// SPS or PPS missing, or too short to be plausible.
    ///
    /// Recoverable: the stream keeps flowing without a new configuration record.
    #[error("malformed H.264 header: {0}")]
    MalformedHeader(String),

    /// The buffer cannot be accessed as one writable contiguous block.
    #[error("buffer cannot be mapped writable: {0}")]
    BufferUnmappable(String),

    /// The buffer is too short to hold a start code and a NAL header.
    #[error("unsupported buffer layout ({len} bytes)")]
    UnsupportedLayout { len: usize },

    /// An offset computed while rewriting fell outside the buffer.
    #[error("offset {offset} out of bounds for buffer of {len} bytes")]
    OutOfBounds { offset: usize, len: usize },
}

impl ParseError {
    /// Create a MalformedHeader error with a message.
    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedHeader(msg.into())
    }

    /// Create a BufferUnmappable error with a message.
    pub fn unmappable(msg: impl Into<String>) -> Self {
        Self::BufferUnmappable(msg.into())
    }

    /// Returns true if processing may continue with the current buffer.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::MalformedHeader(_) | Self::UnsupportedLayout { .. })
    }
}
