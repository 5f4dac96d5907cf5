//! Controller configuration.

use crate::error::{ControllerError, ControllerResult};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use zwave_serial::DEFAULT_TRANSMIT_OPTIONS;

/// Configuration for the controller engine.
///
/// Every field has a default, so a YAML document only needs the keys it
/// overrides:
///
/// ```yaml
/// transaction_timeout_ms: 2000
/// max_retries: 2
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Time to wait for a transaction to complete before retransmitting.
    pub transaction_timeout_ms: u64,
    /// Retransmissions allowed before a transaction fails.
    pub max_retries: u32,
    /// Time a partially received frame may wait for its remaining bytes.
    pub frame_timeout_ms: u64,
    /// Transmit options appended to every SendData request.
    pub tx_options: u8,
    /// Identify every node reported by the stick and request node info from
    /// listening nodes.
    pub interview_nodes: bool,
    /// Query command class versions as soon as a node's info frame arrives.
    pub auto_negotiate_versions: bool,
    /// Capacity of each subscriber's event channel.
    pub event_channel_capacity: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        ControllerConfig {
            transaction_timeout_ms: 5000,
            max_retries: 3,
            frame_timeout_ms: 1500,
            tx_options: DEFAULT_TRANSMIT_OPTIONS,
            interview_nodes: true,
            auto_negotiate_versions: true,
            event_channel_capacity: 256,
        }
    }
}

impl ControllerConfig {
    /// Parse a YAML document without validating it.
    pub fn parse_yaml(yaml: &str) -> ControllerResult<Self> {
        serde_yaml::from_str(yaml).map_err(|e| ControllerError::Config(e.to_string()))
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> ControllerResult<Self> {
        let config = Self::parse_yaml(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Read a YAML file without validating it, for callers that adjust the
    /// values before calling [`validate`](Self::validate).
    pub fn read_file(path: impl AsRef<Path>) -> ControllerResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::parse_yaml(&yaml)
    }

    /// Load and validate a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> ControllerResult<Self> {
        let config = Self::read_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that the values are usable.
    pub fn validate(&self) -> ControllerResult<()> {
        if self.transaction_timeout_ms == 0 {
            return Err(ControllerError::Config("transaction_timeout_ms must be greater than 0".into()));
        }
        if self.frame_timeout_ms == 0 {
            return Err(ControllerError::Config("frame_timeout_ms must be greater than 0".into()));
        }
        if self.event_channel_capacity == 0 {
            return Err(ControllerError::Config("event_channel_capacity must be greater than 0".into()));
        }
        Ok(())
    }

    /// Transaction timeout as a duration.
    pub fn transaction_timeout(&self) -> Duration {
        Duration::from_millis(self.transaction_timeout_ms)
    }

    /// Frame timeout as a duration.
    pub fn frame_timeout(&self) -> Duration {
        Duration::from_millis(self.frame_timeout_ms)
    }
}
