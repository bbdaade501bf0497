//! Sink-side state machine and wire-protocol SDK capability for the
//! real-time audio bridge.

pub mod config;
pub mod controller;
pub mod error;
pub mod sdk;
pub mod transition;

pub use config::SinkConfig;
pub use controller::SinkController;
pub use error::{Result, SinkError};
pub use sdk::{
    BitOrder, CapabilitySet, DsdEncodingCap, Endianness, FormatId, SinkSdk, SinkTarget, StreamCallback, ThreadMode,
    TransferMode,
};
pub use transition::{Transition, TransitionKind};
