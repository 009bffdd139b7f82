//! Error types for mdns-repeater.

use thiserror::Error;

/// Errors that can occur while capturing, decoding or relaying mDNS traffic.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to parse an mDNS/DNS message.
    #[error("failed to parse mDNS packet: {0}")]
    ParseError(String),

    /// Failed to encode an mDNS/DNS message.
    #[error("failed to encode mDNS packet: {0}")]
    EncodeError(String),

    /// Malformed or unsupported link/network/transport layer.
    #[error("malformed frame: {0}")]
    FrameError(String),

    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    ConfigError(String),

    /// Network I/O error.
    #[error("network error: {0}")]
    NetworkError(#[from] std::io::Error),

    /// Interface not found.
    #[error("interface not found: {0}")]
    InterfaceNotFound(String),

    /// BPF filter could not be compiled or applied.
    #[error("could not apply filter on {interface}: {reason}")]
    InvalidFilter { interface: String, reason: String },

    /// Error raised by libpcap.
    #[error("capture error: {0}")]
    CaptureError(#[from] pcap::Error),

    /// YAML parsing error.
    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),
}

/// Result type alias for mdns-repeater operations.
pub type Result<T> = std::result::Result<T, Error>;
