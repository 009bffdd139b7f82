//! Constants and enums for mDNS operations.

use std::net::{Ipv4Addr, Ipv6Addr};

/// Package name.
pub const PACKAGE: &str = "mdns-repeater";

/// mDNS IPv4 multicast group.
pub const MULTICAST_ADDRESS: Ipv4Addr = Ipv4Addr::new(224, 0, 0, 251);

/// mDNS IPv6 multicast group.
pub const MULTICAST_ADDRESS_V6: Ipv6Addr = Ipv6Addr::new(0xff02, 0, 0, 0, 0, 0, 0, 0xfb);

/// mDNS port.
pub const MDNS_PORT: u16 = 5353;

/// Capture filter selecting mDNS traffic sent to either multicast group.
pub const BPF_FILTER: &str = "dst net (224.0.0.251 or ff02::fb) and udp dst port 5353";

/// Default capture snapshot length.
pub const PACKET_SIZE: usize = 65536;

/// Reverse-DNS zone of the IPv6 link-local prefix fe80::/10.
pub const LINK_LOCAL_REVERSE_ZONE: &str = "0.8.e.f.ip6.arpa";

/// Top bit of an mDNS record class: cache-flush.
pub const CACHE_FLUSH_BIT: u16 = 0x8000;

/// Top bit of an mDNS question class: unicast response requested.
pub const UNICAST_RESPONSE_BIT: u16 = 0x8000;

/// DNS record types understood by the codec.
///
/// Anything else decodes as [`RecordType::Unknown`]. Only types for which
/// [`RecordType::is_known`] holds are relayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[allow(clippy::upper_case_acronyms)]
pub enum RecordType {
    A,
    NS,
    MD,
    MF,
    CNAME,
    SOA,
    MB,
    MG,
    MR,
    NULL,
    WKS,
    PTR,
    HINFO,
    MINFO,
    MX,
    TXT,
    AAAA,
    SRV,
    OPT,
    NSEC,
    ANY,
    URI,
    /// Unknown record type with raw value.
    Unknown(u16),
}

impl RecordType {
    /// Convert from a raw u16 value.
    pub fn from_u16(value: u16) -> Self {
        match value {
            1 => RecordType::A,
            2 => RecordType::NS,
            3 => RecordType::MD,
            4 => RecordType::MF,
            5 => RecordType::CNAME,
            6 => RecordType::SOA,
            7 => RecordType::MB,
            8 => RecordType::MG,
            9 => RecordType::MR,
            10 => RecordType::NULL,
            11 => RecordType::WKS,
            12 => RecordType::PTR,
            13 => RecordType::HINFO,
            14 => RecordType::MINFO,
            15 => RecordType::MX,
            16 => RecordType::TXT,
            28 => RecordType::AAAA,
            33 => RecordType::SRV,
            41 => RecordType::OPT,
            47 => RecordType::NSEC,
            255 => RecordType::ANY,
            256 => RecordType::URI,
            _ => RecordType::Unknown(value),
        }
    }

    /// Convert to raw u16 value.
    pub fn to_u16(self) -> u16 {
        match self {
            RecordType::A => 1,
            RecordType::NS => 2,
            RecordType::MD => 3,
            RecordType::MF => 4,
            RecordType::CNAME => 5,
            RecordType::SOA => 6,
            RecordType::MB => 7,
            RecordType::MG => 8,
            RecordType::MR => 9,
            RecordType::NULL => 10,
            RecordType::WKS => 11,
            RecordType::PTR => 12,
            RecordType::HINFO => 13,
            RecordType::MINFO => 14,
            RecordType::MX => 15,
            RecordType::TXT => 16,
            RecordType::AAAA => 28,
            RecordType::SRV => 33,
            RecordType::OPT => 41,
            RecordType::NSEC => 47,
            RecordType::ANY => 255,
            RecordType::URI => 256,
            RecordType::Unknown(v) => v,
        }
    }

    /// Whether the type is one the repeater relays.
    ///
    /// NSEC and ANY are decoded but still count as unknown here, so records
    /// carrying them are stripped alongside unrecognized types.
    pub fn is_known(self) -> bool {
        !matches!(
            self,
            RecordType::NSEC | RecordType::ANY | RecordType::Unknown(_)
        )
    }

    /// Get human-readable name for the record type.
    pub fn name(&self) -> String {
        match self {
            RecordType::A => "A".to_string(),
            RecordType::NS => "NS".to_string(),
            RecordType::MD => "MD".to_string(),
            RecordType::MF => "MF".to_string(),
            RecordType::CNAME => "CNAME".to_string(),
            RecordType::SOA => "SOA".to_string(),
            RecordType::MB => "MB".to_string(),
            RecordType::MG => "MG".to_string(),
            RecordType::MR => "MR".to_string(),
            RecordType::NULL => "NULL".to_string(),
            RecordType::WKS => "WKS".to_string(),
            RecordType::PTR => "PTR".to_string(),
            RecordType::HINFO => "HINFO".to_string(),
            RecordType::MINFO => "MINFO".to_string(),
            RecordType::MX => "MX".to_string(),
            RecordType::TXT => "TXT".to_string(),
            RecordType::AAAA => "AAAA".to_string(),
            RecordType::SRV => "SRV".to_string(),
            RecordType::OPT => "OPT".to_string(),
            RecordType::NSEC => "NSEC".to_string(),
            RecordType::ANY => "ANY".to_string(),
            RecordType::URI => "URI".to_string(),
            RecordType::Unknown(v) => format!("TYPE{}", v),
        }
    }
}

impl From<u16> for RecordType {
    fn from(value: u16) -> Self {
        Self::from_u16(value)
    }
}

impl From<RecordType> for u16 {
    fn from(value: RecordType) -> Self {
        value.to_u16()
    }
}

impl std::fmt::Display for RecordType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name())
    }
}

/// Section of DNS message where a record appears.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordSection {
    Question,
    Answer,
    Authority,
    Additional,
}

impl RecordSection {
    /// Label used in diagnostics.
    pub fn label(self) -> &'static str {
        match self {
            RecordSection::Question => "Question",
            RecordSection::Answer => "Answer",
            RecordSection::Authority => "Authority",
            RecordSection::Additional => "Additional",
        }
    }
}
