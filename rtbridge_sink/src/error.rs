//! Error types for the sink-side state machine.

use std::fmt;

/// Error codes for `rtbridge_sink` operations, following the structural
/// failure kinds 1-3 of the bridge's error taxonomy.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkError {
    /// No targets were discovered, or addressing was unavailable.
    DiscoveryFailed,
    /// The SDK declined to open after the bounded retry budget.
    TransportOpenFailed,
    /// No PCM bit depth or DSD encoding offered by the target was accepted.
    UnsupportedFormat,
    /// The target did not report online within the configured window.
    OnlineTimeout,
    /// A call into the SDK capability returned failure.
    SdkCallFailed,
}

impl fmt::Display for SinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkError::DiscoveryFailed => write!(f, "no sink targets discovered"),
            SinkError::TransportOpenFailed => write!(f, "sink transport failed to open"),
            SinkError::UnsupportedFormat => write!(f, "target accepts no offered encoding"),
            SinkError::OnlineTimeout => write!(f, "target did not report online in time"),
            SinkError::SdkCallFailed => write!(f, "sink SDK call failed"),
        }
    }
}

impl std::error::Error for SinkError {}

pub type Result<T> = std::result::Result<T, SinkError>;
