//! Repeater configuration.

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{Error, Result};
use crate::mdns::PACKET_SIZE;

/// Capture session tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CaptureSettings {
    /// Bytes captured per frame.
    #[serde(default = "default_snaplen")]
    pub snaplen: i32,

    /// Capture read timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: i32,

    /// Put the ingress interface in promiscuous mode.
    #[serde(default = "default_promiscuous")]
    pub promiscuous: bool,

    /// Captured packets buffered ahead of the pipeline.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
}

fn default_snaplen() -> i32 {
    PACKET_SIZE as i32
}

fn default_timeout_ms() -> i32 {
    1000
}

fn default_promiscuous() -> bool {
    true
}

fn default_queue_depth() -> usize {
    8
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            snaplen: default_snaplen(),
            timeout_ms: default_timeout_ms(),
            promiscuous: default_promiscuous(),
            queue_depth: default_queue_depth(),
        }
    }
}

/// Complete repeater configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RepeaterConfig {
    /// Interface mDNS traffic is captured on.
    #[serde(default)]
    pub receive_interface: String,

    /// Interfaces filtered traffic is relayed to, in send order.
    #[serde(default)]
    pub send_interfaces: Vec<String>,

    /// Trace every processed message.
    #[serde(default)]
    pub debug: bool,

    #[serde(default)]
    pub capture: CaptureSettings,
}

impl RepeaterConfig {
    /// Load configuration from a YAML file.
    pub fn from_yaml_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: RepeaterConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }

    /// Overlay command-line values on `self`.
    ///
    /// `send_interfaces` is the comma-separated list given on the command
    /// line; it replaces the configured list entirely.
    pub fn with_cli(
        mut self,
        receive_interface: Option<&str>,
        send_interfaces: Option<&str>,
        debug: bool,
    ) -> Self {
        if let Some(name) = receive_interface {
            self.receive_interface = name.trim().to_string();
        }
        if let Some(list) = send_interfaces {
            self.send_interfaces = split_interfaces(list);
        }
        self.debug |= debug;
        self
    }

    /// Whether both ingress and egress interfaces were supplied.
    pub fn has_interfaces(&self) -> bool {
        !self.receive_interface.is_empty() && !self.send_interfaces.is_empty()
    }

    /// Check the configuration for errors.
    pub fn validate(&self) -> Result<()> {
        if self.receive_interface.is_empty() {
            return Err(Error::ConfigError(
                "a receive interface is required".to_string(),
            ));
        }

        if self.send_interfaces.is_empty() {
            return Err(Error::ConfigError(
                "at least one send interface is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for name in &self.send_interfaces {
            if name.is_empty() {
                return Err(Error::ConfigError("empty send interface name".to_string()));
            }
            if !seen.insert(name.as_str()) {
                return Err(Error::ConfigError(format!(
                    "send interface {} listed more than once",
                    name
                )));
            }
        }

        if self.capture.queue_depth == 0 {
            return Err(Error::ConfigError(
                "capture.queue_depth must be at least 1".to_string(),
            ));
        }

        if self.capture.snaplen <= 0 || self.capture.timeout_ms <= 0 {
            return Err(Error::ConfigError(
                "capture.snaplen and capture.timeout_ms must be positive".to_string(),
            ));
        }

        if seen.contains(self.receive_interface.as_str()) {
            warn!(
                interface = %self.receive_interface,
                "receive interface is also a send interface; relayed traffic may loop"
            );
        }

        Ok(())
    }
}

/// Split a comma-separated interface list, dropping empty entries.
pub fn split_interfaces(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(String::from)
        .collect()
}
