//! mDNS message types, decoding and encoding.

pub mod consts;
pub mod encoder;
pub mod packet;
pub mod parser;

pub use consts::{
    RecordSection, RecordType, BPF_FILTER, LINK_LOCAL_REVERSE_ZONE, MDNS_PORT, MULTICAST_ADDRESS,
    MULTICAST_ADDRESS_V6, PACKAGE, PACKET_SIZE,
};
pub use encoder::MdnsEncoder;
pub use packet::{DnsMessage, DnsName, HeaderCounts, Question, RecordData, ResourceRecord};
pub use parser::MdnsParser;
