//! The wire-protocol SDK modeled as an injected capability.
//!
//! The source this bridge is derived from integrates the transport SDK
//! by subclassing and overriding a callback. Here that contract becomes
//! a trait object the controller owns, mirroring `bbx_player`'s
//! `Box<dyn Backend<S>>` pattern: the controller is generic over *any*
//! wire implementation, and tests substitute [`NullSink`] for the real
//! one.

use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::error::Result;

/// A discovered sink target: a human name plus an opaque numeric and
/// string address, in the style of `bbx_net::address::NodeId` (a small
/// `Copy`-able identifier) without pulling in real network discovery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SinkTarget {
    pub name: String,
    pub id: u64,
    pub address: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThreadMode {
    Single,
    Dedicated,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransferMode {
    FixAuto,
    VarAuto,
    VarMax,
    Auto,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BitOrder {
    Lsb,
    Msb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endianness {
    Big,
    Little,
}

/// A DSD encoding the target advertises support for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DsdEncodingCap {
    pub bit_order: BitOrder,
    pub endianness: Endianness,
}

/// The capability set a target reports via `inquire_support`.
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    /// PCM bit depths accepted, in the target's preference order.
    pub pcm_bit_depths: Vec<u8>,
    pub dsd_encodings: Vec<DsdEncodingCap>,
    pub max_channels: u8,
}

impl CapabilitySet {
    pub fn supports_pcm_bit_depth(&self, bits: u8) -> bool {
        self.pcm_bit_depths.contains(&bits)
    }

    pub fn supports_dsd(&self, bit_order: BitOrder, endianness: Endianness) -> bool {
        self.dsd_encodings
            .iter()
            .any(|e| e.bit_order == bit_order && e.endianness == endianness)
    }
}

/// The fixed format-identifier enumeration the controller emits to
/// `check_sink_support`/`set_sink_configure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatId {
    Pcm { bits: u8, rate: u32, channels: u8 },
    Dsd { bit_order: BitOrder, endianness: Endianness, channels: u8 },
}

/// Invoked by the SDK's internal worker once per cycle tick; the
/// controller registers this to fill exactly `buf.len()` bytes.
pub type StreamCallback = Arc<dyn Fn(&mut [u8]) + Send + Sync>;

/// Capability the controller owns for all interaction with the
/// downstream wire transport. `Send + Sync` so it can be shared with
/// the worker thread the controller spawns.
pub trait SinkSdk: Send + Sync {
    fn discover(&self) -> Result<Vec<SinkTarget>>;
    fn measure_mtu(&self, target: &SinkTarget) -> Result<u32>;
    fn open(&self, thread_mode: ThreadMode, cycle_time_us: u32, name: &str, id: u64, ms_mode: bool) -> Result<()>;
    fn set_sink(&self, target: &SinkTarget, cycle_time_us: u32, mtu: u32) -> Result<()>;
    fn inquire_support(&self, target: &SinkTarget) -> Result<CapabilitySet>;
    fn check_sink_support(&self, format_id: FormatId) -> bool;
    fn set_sink_configure(&self, format_id: FormatId) -> Result<()>;
    fn config_transfer(&self, mode: TransferMode) -> Result<()>;
    fn connect_prepare(&self) -> Result<()>;
    fn connect(&self) -> Result<()>;
    /// Waits up to `timeout` for the target to report online; returns
    /// whether it did.
    fn connect_wait(&self, timeout: Duration) -> Result<bool>;
    fn disconnect(&self, immediate: bool) -> Result<()>;
    fn play(&self) -> Result<()>;
    fn stop(&self) -> Result<()>;
    fn is_online(&self) -> bool;

    /// Registers the controller's stream-fill callback.
    fn set_stream_callback(&self, callback: StreamCallback);

    /// Runs the SDK's internal transfer cycle until `stop` is observed.
    /// The controller spawns the thread that calls this (the
    /// "watchdog/worker" thread) so it can join it before closing.
    fn run_worker(&self, stop: Arc<AtomicBool>);
}
