//! Engine tunables.
//!
//! Defaults match the Calliope mini utility service: 19 payload bytes per
//! notification, four notifications per window, 2s response watchdog.

use crate::error::ConfigError;
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Payload bytes carried by one notification after the sub-id byte
pub const DEFAULT_PACKET_PAYLOAD: u32 = 19;

/// Notifications per data window. Above 4, most windows stall waiting for a free slot.
pub const DEFAULT_PACKETS_PER_WINDOW: u32 = 4;

/// Per-packet response timeout
pub const DEFAULT_RESPONSE_TIMEOUT_MS: u64 = 2000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UtilityConfig {
    pub packet_payload: u32,
    pub packets_per_window: u32,
    pub response_timeout_ms: u64,
    /// Restart the sub-id counter at 0 for every request sent.
    pub sequence_reset_per_request: bool,
}

impl Default for UtilityConfig {
    fn default() -> Self {
        Self {
            packet_payload: DEFAULT_PACKET_PAYLOAD,
            packets_per_window: DEFAULT_PACKETS_PER_WINDOW,
            response_timeout_ms: DEFAULT_RESPONSE_TIMEOUT_MS,
            sequence_reset_per_request: false,
        }
    }
}

impl UtilityConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Invalid(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.window_ceiling() == 0 {
            return Err(ConfigError::Invalid(
                "packet_payload and packets_per_window must be non-zero".to_string(),
            ));
        }
        if self.response_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "response_timeout_ms must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Largest number of bytes requested in one Data-Read window.
    pub fn window_ceiling(&self) -> u32 {
        self.packet_payload.saturating_mul(self.packets_per_window)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}
