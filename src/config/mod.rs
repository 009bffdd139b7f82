//! Configuration loading and validation.

pub mod repeater;

pub use repeater::{split_interfaces, CaptureSettings, RepeaterConfig};
