//! Diagnostics for packets moving through the repeater.

use std::fmt;

use tracing::{debug, info, warn};

use crate::filter::DropRule;
use crate::mdns::{DnsMessage, RecordSection, ResourceRecord};
use crate::net::MacAddr;
use crate::repeater::SendOutcome;

/// Why a captured packet produced no sends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropReason {
    /// Not a UDP datagram with a payload.
    NoApplicationLayer(String),
    /// Payload did not decode as DNS.
    NotDns(String),
    /// Filtered message could not be re-encoded.
    EncodeFailed(String),
}

impl fmt::Display for DropReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DropReason::NoApplicationLayer(detail) => {
                write!(f, "no application layer ({})", detail)
            }
            DropReason::NotDns(detail) => write!(f, "not a DNS message ({})", detail),
            DropReason::EncodeFailed(detail) => write!(f, "encode failed ({})", detail),
        }
    }
}

/// Observer hook for pipeline events.
///
/// Implementations must not block; `on_sent` is called from the send tasks.
pub trait PacketObserver: Send + Sync {
    fn on_dropped(&self, _source: MacAddr, _reason: &DropReason) {}

    /// A message passed the policy and is about to be relayed.
    fn on_filtered(&self, _message: &DnsMessage, _source: MacAddr, _removed: usize) {}

    fn on_record_removed(
        &self,
        _section: RecordSection,
        _record: &ResourceRecord,
        _rule: DropRule,
    ) {
    }

    fn on_sent(&self, _outcome: &SendOutcome) {}
}

/// Observer that writes to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingReporter;

impl PacketObserver for TracingReporter {
    fn on_dropped(&self, source: MacAddr, reason: &DropReason) {
        info!(src = %source, "dropping packet: {}", reason);
    }

    fn on_filtered(&self, message: &DnsMessage, source: MacAddr, removed: usize) {
        info!(src = %source, removed, "{}", message.format_summary());
        debug!("{}", message.format_detailed());
    }

    fn on_record_removed(&self, section: RecordSection, record: &ResourceRecord, rule: DropRule) {
        debug!(section = section.label(), %rule, "removed {}", record);
    }

    fn on_sent(&self, outcome: &SendOutcome) {
        match &outcome.result {
            Ok(()) => debug!(interface = %outcome.interface, "sent"),
            Err(e) => warn!(interface = %outcome.interface, error = %e, "send failed"),
        }
    }
}
