//! Top-level error type the binary's `main` maps to a process exit code.

use std::fmt;

use rtbridge_pipeline::PipelineError;
use rtbridge_sink::SinkError;

#[derive(Debug)]
pub enum BridgeError {
    /// The decoder subprocess could not be spawned.
    DecoderSpawnFailed(std::io::Error),
    /// The config file existed but failed to parse.
    ConfigParseFailed(serde_json::Error),
    Io(std::io::Error),
    Pipeline(PipelineError),
    Sink(SinkError),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::DecoderSpawnFailed(e) => write!(f, "failed to spawn decoder subprocess: {e}"),
            BridgeError::ConfigParseFailed(e) => write!(f, "failed to parse config file: {e}"),
            BridgeError::Io(e) => write!(f, "io error: {e}"),
            BridgeError::Pipeline(e) => write!(f, "pipeline error: {e}"),
            BridgeError::Sink(e) => write!(f, "sink error: {e}"),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        BridgeError::Io(e)
    }
}

impl From<PipelineError> for BridgeError {
    fn from(e: PipelineError) -> Self {
        BridgeError::Pipeline(e)
    }
}

impl From<SinkError> for BridgeError {
    fn from(e: SinkError) -> Self {
        BridgeError::Sink(e)
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
