//! Environmental/persisted configuration the CLI wrapper hands the
//! controller (out of scope for the core per spec.md §6.4).

use serde::{Deserialize, Serialize};

use crate::sdk::{ThreadMode, TransferMode};

fn default_cycle_time_us() -> u32 {
    1000
}

fn default_mtu_fallback() -> u32 {
    1500
}

fn default_dac_stabilization_ms() -> u32 {
    200
}

fn default_online_wait_ms() -> u32 {
    2000
}

fn default_format_switch_delay_ms() -> u32 {
    100
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    pub cycle_time_us: u32,
    pub cycle_time_auto: bool,
    pub transfer_mode: SerdeTransferMode,
    pub thread_mode: SerdeThreadMode,
    pub mtu: Option<u32>,
    pub mtu_fallback: u32,
    pub dac_stabilization_ms: u32,
    pub online_wait_ms: u32,
    pub format_switch_delay_ms: u32,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            cycle_time_us: default_cycle_time_us(),
            cycle_time_auto: true,
            transfer_mode: SerdeTransferMode(TransferMode::Auto),
            thread_mode: SerdeThreadMode(ThreadMode::Dedicated),
            mtu: None,
            mtu_fallback: default_mtu_fallback(),
            dac_stabilization_ms: default_dac_stabilization_ms(),
            online_wait_ms: default_online_wait_ms(),
            format_switch_delay_ms: default_format_switch_delay_ms(),
        }
    }
}

/// Thin serde wrapper so the SDK-facing enum doesn't need to derive
/// serde itself (`rtbridge_sink::sdk` stays serde-agnostic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerdeTransferMode(pub TransferMode);

impl Serialize for SerdeTransferMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let s = match self.0 {
            TransferMode::FixAuto => "fix_auto",
            TransferMode::VarAuto => "var_auto",
            TransferMode::VarMax => "var_max",
            TransferMode::Auto => "auto",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for SerdeTransferMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mode = match s.as_str() {
            "fix_auto" => TransferMode::FixAuto,
            "var_auto" => TransferMode::VarAuto,
            "var_max" => TransferMode::VarMax,
            _ => TransferMode::Auto,
        };
        Ok(SerdeTransferMode(mode))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerdeThreadMode(pub ThreadMode);

impl Serialize for SerdeThreadMode {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let s = match self.0 {
            ThreadMode::Single => "single",
            ThreadMode::Dedicated => "dedicated",
        };
        serializer.serialize_str(s)
    }
}

impl<'de> Deserialize<'de> for SerdeThreadMode {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let mode = match s.as_str() {
            "single" => ThreadMode::Single,
            _ => ThreadMode::Dedicated,
        };
        Ok(SerdeThreadMode(mode))
    }
}
