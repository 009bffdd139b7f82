//! mDNS message data types.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::mdns::consts::{RecordSection, RecordType, CACHE_FLUSH_BIT, UNICAST_RESPONSE_BIT};

/// A domain name as a sequence of raw labels.
///
/// Labels are kept as bytes so that instance names containing dots, spaces or
/// non-ASCII text survive a decode/encode cycle unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DnsName {
    labels: Vec<Vec<u8>>,
}

impl DnsName {
    /// Create a name from raw labels.
    pub fn new(labels: Vec<Vec<u8>>) -> Self {
        Self { labels }
    }

    /// The root name (no labels).
    pub fn root() -> Self {
        Self::default()
    }

    /// Raw labels, most specific first.
    pub fn labels(&self) -> &[Vec<u8>] {
        &self.labels
    }

    /// Whether this is the root name.
    pub fn is_root(&self) -> bool {
        self.labels.is_empty()
    }

    /// Case-insensitive suffix test against the dotted presentation form.
    pub fn ends_with_ignore_case(&self, suffix: &str) -> bool {
        self.to_string()
            .to_ascii_lowercase()
            .ends_with(&suffix.to_ascii_lowercase())
    }
}

impl From<&str> for DnsName {
    /// Split a dotted name into labels. Escapes are not interpreted.
    fn from(name: &str) -> Self {
        Self {
            labels: name
                .split('.')
                .filter(|label| !label.is_empty())
                .map(|label| label.as_bytes().to_vec())
                .collect(),
        }
    }
}

impl fmt::Display for DnsName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.labels.is_empty() {
            return f.write_str(".");
        }
        for (idx, label) in self.labels.iter().enumerate() {
            if idx > 0 {
                f.write_str(".")?;
            }
            for ch in String::from_utf8_lossy(label).chars() {
                match ch {
                    '.' | '\\' => write!(f, "\\{}", ch)?,
                    c if c.is_control() => write!(f, "\\{:03}", c as u32)?,
                    c => write!(f, "{}", c)?,
                }
            }
        }
        Ok(())
    }
}

/// A question entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub name: DnsName,
    pub record_type: RecordType,
    /// Raw class, including the unicast-response bit.
    pub record_class: u16,
}

impl Question {
    /// Whether the querier asked for a unicast response.
    pub fn unicast_response(&self) -> bool {
        self.record_class & UNICAST_RESPONSE_BIT != 0
    }
}

/// Type-tagged resource record payload.
///
/// The variant is always the one implied by the record type; unknown types
/// carry [`RecordData::Opaque`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordData {
    A(Ipv4Addr),
    Aaaa(Ipv6Addr),
    Ptr(DnsName),
    /// NS and CNAME.
    Name(DnsName),
    Srv {
        priority: u16,
        weight: u16,
        port: u16,
        target: DnsName,
    },
    Txt(Vec<Vec<u8>>),
    Mx {
        preference: u16,
        exchange: DnsName,
    },
    Soa {
        mname: DnsName,
        rname: DnsName,
        serial: u32,
        refresh: u32,
        retry: u32,
        expire: u32,
        minimum: u32,
    },
    Nsec {
        next: DnsName,
        type_bitmaps: Vec<u8>,
    },
    Opaque(Vec<u8>),
}

impl fmt::Display for RecordData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordData::A(addr) => write!(f, "{}", addr),
            RecordData::Aaaa(addr) => write!(f, "{}", addr),
            RecordData::Ptr(name) | RecordData::Name(name) => write!(f, "{}", name),
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            } => write!(f, "{} {} {} {}", priority, weight, port, target),
            RecordData::Txt(strings) => {
                let parts: Vec<String> = strings
                    .iter()
                    .map(|s| format!("{:?}", String::from_utf8_lossy(s)))
                    .collect();
                write!(f, "[{}]", parts.join(" "))
            }
            RecordData::Mx {
                preference,
                exchange,
            } => write!(f, "{} {}", preference, exchange),
            RecordData::Soa {
                mname,
                rname,
                serial,
                ..
            } => write!(f, "{} {} {}", mname, rname, serial),
            RecordData::Nsec { next, .. } => write!(f, "{}", next),
            RecordData::Opaque(bytes) => write!(f, "<{} bytes>", bytes.len()),
        }
    }
}

/// A single DNS resource record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRecord {
    /// Owner name (e.g., "Living Room._googlecast._tcp.local").
    pub name: DnsName,
    /// Record type (A, PTR, TXT, etc.).
    pub record_type: RecordType,
    /// Raw class, including the cache-flush bit.
    pub record_class: u16,
    /// Time-to-live in seconds.
    pub ttl: u32,
    /// Decoded payload.
    pub data: RecordData,
}

impl ResourceRecord {
    /// Create a record with class IN and a default mDNS TTL.
    pub fn new(name: impl Into<DnsName>, record_type: RecordType, data: RecordData) -> Self {
        Self {
            name: name.into(),
            record_type,
            record_class: 1,
            ttl: 120,
            data,
        }
    }

    /// Get human-readable record type name.
    pub fn type_name(&self) -> String {
        self.record_type.name()
    }

    /// Whether the cache-flush bit is set.
    pub fn cache_flush(&self) -> bool {
        self.record_class & CACHE_FLUSH_BIT != 0
    }

    /// The address carried by A/AAAA records.
    pub fn address(&self) -> Option<IpAddr> {
        match self.data {
            RecordData::A(addr) => Some(IpAddr::V4(addr)),
            RecordData::Aaaa(addr) => Some(IpAddr::V6(addr)),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} ttl={} {}",
            self.name, self.record_type, self.ttl, self.data
        )?;
        if self.cache_flush() {
            f.write_str(" [cache-flush]")?;
        }
        Ok(())
    }
}

/// Header counts exactly as they appeared on the wire.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeaderCounts {
    pub questions: u16,
    pub answers: u16,
    pub authorities: u16,
    pub additionals: u16,
}

/// A decoded mDNS message.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DnsMessage {
    /// Transaction ID.
    pub id: u16,
    /// Raw flags field.
    pub flags: u16,
    /// Counts as decoded. Filtering leaves these untouched.
    pub counts: HeaderCounts,
    pub questions: Vec<Question>,
    pub answers: Vec<ResourceRecord>,
    pub authorities: Vec<ResourceRecord>,
    pub additionals: Vec<ResourceRecord>,
}

impl DnsMessage {
    /// Create a new empty message.
    pub fn new(id: u16, flags: u16) -> Self {
        Self {
            id,
            flags,
            ..Default::default()
        }
    }

    /// Whether this is a response (vs query).
    pub fn is_response(&self) -> bool {
        self.flags & 0x8000 != 0
    }

    /// Whether the response is authoritative.
    pub fn is_authoritative(&self) -> bool {
        self.flags & 0x0400 != 0
    }

    /// Whether the message is truncated.
    pub fn is_truncated(&self) -> bool {
        self.flags & 0x0200 != 0
    }

    /// Records of one resource-record section.
    pub fn section(&self, section: RecordSection) -> &[ResourceRecord] {
        match section {
            RecordSection::Answer => &self.answers,
            RecordSection::Authority => &self.authorities,
            RecordSection::Additional => &self.additionals,
            RecordSection::Question => &[],
        }
    }

    /// Get all resource records with their sections.
    pub fn all_records(&self) -> Vec<(RecordSection, &ResourceRecord)> {
        let mut result = Vec::new();
        for section in [
            RecordSection::Answer,
            RecordSection::Authority,
            RecordSection::Additional,
        ] {
            for rec in self.section(section) {
                result.push((section, rec));
            }
        }
        result
    }

    /// Total number of resource records in the message.
    pub fn record_count(&self) -> usize {
        self.answers.len() + self.authorities.len() + self.additionals.len()
    }

    /// Format message as a one-line summary (similar to tcpdump).
    pub fn format_summary(&self) -> String {
        let mut parts = Vec::new();

        parts.push(format!("id={}", self.id));

        if self.is_response() {
            let mut flags = Vec::new();
            if self.is_authoritative() {
                flags.push("authoritative");
            }
            if self.is_truncated() {
                flags.push("truncated");
            }
            let flag_str = if flags.is_empty() {
                String::new()
            } else {
                format!(" ({})", flags.join(", "))
            };
            parts.push(format!("response{}", flag_str));
        } else {
            parts.push("query".to_string());
        }

        let mut counts = Vec::new();
        if !self.questions.is_empty() {
            counts.push(format!("{}q", self.questions.len()));
        }
        if !self.answers.is_empty() {
            counts.push(format!("{}an", self.answers.len()));
        }
        if !self.authorities.is_empty() {
            counts.push(format!("{}ns", self.authorities.len()));
        }
        if !self.additionals.is_empty() {
            counts.push(format!("{}ar", self.additionals.len()));
        }
        if !counts.is_empty() {
            parts.push(format!("[{}]", counts.join("/")));
        }

        // Answers are the interesting part; fall back to questions.
        let mut record_strs: Vec<String> = self
            .answers
            .iter()
            .take(3)
            .map(|record| format!("{} {}", record.type_name(), record.name))
            .collect();

        if record_strs.is_empty() {
            record_strs = self
                .questions
                .iter()
                .take(3)
                .map(|q| format!("{}? {}", q.record_type, q.name))
                .collect();
        }

        if !record_strs.is_empty() {
            parts.push(format!(": {}", record_strs.join(", ")));
            if self.answers.len() > 3 {
                parts.push(format!("(+{} more)", self.answers.len() - 3));
            }
        }

        parts.join(" ")
    }

    /// Format message with full details of all records.
    pub fn format_detailed(&self) -> String {
        let mut lines = Vec::new();

        let msg_type = if self.is_response() {
            "Response"
        } else {
            "Query"
        };
        lines.push(format!("mDNS {} id={}", msg_type, self.id));
        lines.push(format!(
            "  Flags: AA={}, TC={}",
            self.is_authoritative(),
            self.is_truncated()
        ));
        lines.push(format!(
            "  Counts (as received): qd={} an={} ns={} ar={}",
            self.counts.questions,
            self.counts.answers,
            self.counts.authorities,
            self.counts.additionals
        ));

        if !self.questions.is_empty() {
            lines.push("  Questions:".to_string());
            for q in &self.questions {
                let qu = if q.unicast_response() { " (QU)" } else { "" };
                lines.push(format!("    {} {}{}", q.record_type, q.name, qu));
            }
        }

        fn format_records(
            lines: &mut Vec<String>,
            section: RecordSection,
            records: &[ResourceRecord],
        ) {
            if records.is_empty() {
                return;
            }
            lines.push(format!("  {}s:", section.label()));
            for record in records {
                lines.push(format!("    {}", record));
            }
        }

        format_records(&mut lines, RecordSection::Answer, &self.answers);
        format_records(&mut lines, RecordSection::Authority, &self.authorities);
        format_records(&mut lines, RecordSection::Additional, &self.additionals);

        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dns_name_display_escapes_dots() {
        let name = DnsName::new(vec![
            b"My.Printer".to_vec(),
            b"_ipp".to_vec(),
            b"_tcp".to_vec(),
            b"local".to_vec(),
        ]);
        assert_eq!(name.to_string(), "My\\.Printer._ipp._tcp.local");
        assert_eq!(DnsName::root().to_string(), ".");
    }

    #[test]
    fn test_dns_name_suffix_is_case_insensitive() {
        let name = DnsName::from(
            "1.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.E.F.ip6.arpa",
        );
        assert!(name.ends_with_ignore_case("0.8.e.f.ip6.arpa"));
        assert!(!DnsName::from("host.local").ends_with_ignore_case("0.8.e.f.ip6.arpa"));
    }

    #[test]
    fn test_message_all_records() {
        let mut message = DnsMessage::new(0, 0x8400);
        let record = ResourceRecord::new(
            "host.local",
            RecordType::A,
            RecordData::A(Ipv4Addr::new(10, 0, 0, 5)),
        );
        message.answers.push(record.clone());
        message.additionals.push(record.clone());
        message.additionals.push(record);

        let all = message.all_records();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].0, RecordSection::Answer);
        assert_eq!(all[1].0, RecordSection::Additional);
        assert_eq!(message.record_count(), 3);
    }

    #[test]
    fn test_format_summary_response() {
        let mut message = DnsMessage::new(7, 0x8400);
        message.answers.push(ResourceRecord::new(
            "_googlecast._tcp.local",
            RecordType::PTR,
            RecordData::Ptr(DnsName::from("Device._googlecast._tcp.local")),
        ));

        let summary = message.format_summary();
        assert!(summary.contains("response (authoritative)"));
        assert!(summary.contains("[1an]"));
        assert!(summary.contains("PTR _googlecast._tcp.local"));
    }

    #[test]
    fn test_format_detailed_lists_srv() {
        let mut message = DnsMessage::new(0, 0x8400);
        message.additionals.push(ResourceRecord::new(
            "Device._googlecast._tcp.local",
            RecordType::SRV,
            RecordData::Srv {
                priority: 0,
                weight: 0,
                port: 8009,
                target: DnsName::from("device.local"),
            },
        ));

        let detailed = message.format_detailed();
        assert!(detailed.contains("Additionals:"));
        assert!(detailed.contains("SRV ttl=120 0 0 8009 device.local"));
        assert!(!detailed.contains("[cache-flush]"));
    }

    #[test]
    fn test_record_display_marks_cache_flush() {
        let mut record = ResourceRecord::new(
            "host.local",
            RecordType::A,
            RecordData::A(Ipv4Addr::new(10, 0, 0, 5)),
        );
        assert!(!record.cache_flush());

        record.record_class = CACHE_FLUSH_BIT | 1;
        assert!(record.cache_flush());
        assert_eq!(
            record.to_string(),
            "host.local A ttl=120 10.0.0.5 [cache-flush]"
        );
    }
}
