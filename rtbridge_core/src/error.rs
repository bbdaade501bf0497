//! Error types shared by the ring buffer, converters, and pipe reader.

use std::fmt;

/// Error codes for `rtbridge_core` operations.
///
/// Uses `#[repr(C)]` for a stable memory layout, matching the rest of
/// the workspace's error enums.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoreError {
    /// The upstream byte source ended.
    Eof,
    /// The format header magic did not match at the expected offset.
    HeaderDesync,
    /// A ring buffer capacity of zero or a non-power-of-two request was rejected.
    InvalidCapacity,
    /// I/O error while reading from the upstream pipe.
    Io,
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::Eof => write!(f, "end of stream"),
            CoreError::HeaderDesync => write!(f, "format header magic mismatch"),
            CoreError::InvalidCapacity => write!(f, "invalid ring buffer capacity"),
            CoreError::Io => write!(f, "I/O error"),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<std::io::Error> for CoreError {
    fn from(_: std::io::Error) -> Self {
        CoreError::Io
    }
}

/// Result type alias for `rtbridge_core` operations.
pub type Result<T> = std::result::Result<T, CoreError>;
