//! Error types for the producer loop.

use std::fmt;

use rtbridge_core::CoreError;
use rtbridge_sink::SinkError;

/// Failure kinds 4-5 of the bridge's error taxonomy: desync is fatal
/// (the wire contract is broken), everything else either bubbles up
/// from a lower layer or ends the stream cleanly.
#[derive(Debug)]
pub enum PipelineError {
    /// A format header failed to parse where one was expected.
    HeaderDesync,
    /// The upstream pipe closed.
    Eof,
    Core(CoreError),
    Sink(SinkError),
}

impl fmt::Display for PipelineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PipelineError::HeaderDesync => write!(f, "format header desync"),
            PipelineError::Eof => write!(f, "upstream pipe closed"),
            PipelineError::Core(e) => write!(f, "core error: {e}"),
            PipelineError::Sink(e) => write!(f, "sink error: {e}"),
        }
    }
}

impl std::error::Error for PipelineError {}

impl From<CoreError> for PipelineError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::Eof => PipelineError::Eof,
            CoreError::HeaderDesync => PipelineError::HeaderDesync,
            other => PipelineError::Core(other),
        }
    }
}

impl From<SinkError> for PipelineError {
    fn from(e: SinkError) -> Self {
        PipelineError::Sink(e)
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;
