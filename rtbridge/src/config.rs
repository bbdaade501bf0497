//! Persisted configuration, layered under the CLI flags.
//!
//! Mirrors `rtbridge_sink::SinkConfig`'s `#[serde(default)]` pattern:
//! an absent or partial config file still produces a usable
//! `BridgeConfig`, and every field the CLI also exposes is optional
//! here so a flag can override it.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use rtbridge_sink::SinkConfig;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    pub decoder: Option<PathBuf>,
    pub decoder_args: Vec<String>,
    pub ring_capacity: Option<usize>,
    /// `sink.mtu`, if set, overrides measurement; CLI's `--mtu` takes
    /// precedence over whatever this holds.
    pub sink: SinkConfig,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            decoder: None,
            decoder_args: Vec::new(),
            ring_capacity: None,
            sink: SinkConfig::default(),
        }
    }
}

impl BridgeConfig {
    /// Loads a config file if one was given, defaulting otherwise.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let Some(path) = path else {
            return Ok(Self::default());
        };
        let text = std::fs::read_to_string(path)?;
        serde_json::from_str(&text).map_err(crate::error::BridgeError::ConfigParseFailed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_path_yields_defaults() {
        let config = BridgeConfig::load(None).unwrap();
        assert!(config.decoder.is_none());
        assert_eq!(config.sink.mtu_fallback, 1500);
    }

    #[test]
    fn partial_json_fills_remaining_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.json");
        std::fs::write(&path, r#"{"decoder": "/usr/bin/flac-decode"}"#).unwrap();

        let config = BridgeConfig::load(Some(&path)).unwrap();
        assert_eq!(config.decoder, Some(PathBuf::from("/usr/bin/flac-decode")));
        assert!(config.decoder_args.is_empty());
        assert_eq!(config.sink.thread_mode.0, rtbridge_sink::ThreadMode::Dedicated);
    }
}
