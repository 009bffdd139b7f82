//! mdns-repeater - A filtering mDNS repeater.
//!
//! This library captures mDNS (multicast DNS) traffic on one network
//! interface, removes records that must not leave the local link, and
//! replays the result on other interfaces with the sender's link-layer
//! address intact.

pub mod config;
pub mod error;
pub mod filter;
pub mod mdns;
pub mod net;
pub mod repeater;
pub mod report;

pub use config::{CaptureSettings, RepeaterConfig};
pub use error::{Error, Result};
pub use filter::{DropRule, RecordPolicy};
pub use mdns::{
    DnsMessage, MdnsEncoder, MdnsParser, RecordSection, RecordType, ResourceRecord, BPF_FILTER,
    MDNS_PORT, MULTICAST_ADDRESS, PACKAGE, PACKET_SIZE,
};
pub use net::{open_ingress, BonjourPacket, CaptureStream, EgressInterface, MacAddr};
pub use repeater::{extract, Dispatch, Dispatcher, MdnsRepeater, RepeaterContext, SendOutcome};
pub use report::{DropReason, PacketObserver, TracingReporter};
