//! Boundary-crossing record policy.
//!
//! Decides which resource records may be relayed off the segment they were
//! captured on. Every section is filtered independently with the same rules;
//! retained records keep their order and nothing else in the message changes.

use std::net::Ipv6Addr;

use ipnet::Ipv6Net;

use crate::mdns::{
    DnsMessage, RecordData, RecordSection, RecordType, ResourceRecord, LINK_LOCAL_REVERSE_ZONE,
};

/// IPv6 link-local unicast range.
const LINK_LOCAL_V6: Ipv6Net =
    Ipv6Net::new_assert(Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 0), 10);

/// Why a record was kept off the egress segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropRule {
    /// AAAA record carrying an fe80::/10 address.
    LinkLocalAddress,
    /// PTR record in the link-local reverse zone.
    LinkLocalReverseZone,
    /// Record type outside the relayed set, see [`RecordType::is_known`].
    UnknownType,
}

impl std::fmt::Display for DropRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let text = match self {
            DropRule::LinkLocalAddress => "link-local address",
            DropRule::LinkLocalReverseZone => "link-local reverse zone",
            DropRule::UnknownType => "unknown record type",
        };
        f.write_str(text)
    }
}

/// The record filtering policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordPolicy;

impl RecordPolicy {
    /// Create the policy.
    pub fn new() -> Self {
        Self
    }

    /// Return the first rule that excludes `record`, if any.
    pub fn verdict(&self, record: &ResourceRecord) -> Option<DropRule> {
        match (record.record_type, &record.data) {
            (RecordType::AAAA, RecordData::Aaaa(addr)) if LINK_LOCAL_V6.contains(addr) => {
                Some(DropRule::LinkLocalAddress)
            }
            (RecordType::PTR, _)
                if record.name.ends_with_ignore_case(LINK_LOCAL_REVERSE_ZONE) =>
            {
                Some(DropRule::LinkLocalReverseZone)
            }
            (rtype, _) if !rtype.is_known() => Some(DropRule::UnknownType),
            _ => None,
        }
    }

    /// Whether `record` may cross the boundary.
    pub fn allows(&self, record: &ResourceRecord) -> bool {
        self.verdict(record).is_none()
    }

    /// Filter one section, preserving the order of retained records.
    pub fn filter_section(&self, records: &[ResourceRecord]) -> Vec<ResourceRecord> {
        records
            .iter()
            .filter(|record| self.allows(record))
            .cloned()
            .collect()
    }

    /// Filter all three record sections of a message.
    ///
    /// ID, flags, questions and the decoded header counts are left as they
    /// were.
    pub fn filter_message(&self, message: &DnsMessage) -> DnsMessage {
        self.filter_message_with(message, |_, _, _| {})
    }

    /// Like [`filter_message`](Self::filter_message), calling `on_drop` for
    /// every removed record in message order.
    pub fn filter_message_with<F>(&self, message: &DnsMessage, mut on_drop: F) -> DnsMessage
    where
        F: FnMut(RecordSection, &ResourceRecord, DropRule),
    {
        let mut keep = |section: RecordSection| -> Vec<ResourceRecord> {
            let mut kept = Vec::new();
            for record in message.section(section) {
                match self.verdict(record) {
                    Some(rule) => on_drop(section, record, rule),
                    None => kept.push(record.clone()),
                }
            }
            kept
        };

        DnsMessage {
            id: message.id,
            flags: message.flags,
            counts: message.counts,
            questions: message.questions.clone(),
            answers: keep(RecordSection::Answer),
            authorities: keep(RecordSection::Authority),
            additionals: keep(RecordSection::Additional),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mdns::{DnsName, HeaderCounts, Question};
    use std::net::Ipv4Addr;

    fn aaaa(name: &str, addr: &str) -> ResourceRecord {
        ResourceRecord::new(name, RecordType::AAAA, RecordData::Aaaa(addr.parse().unwrap()))
    }

    fn a(name: &str, addr: Ipv4Addr) -> ResourceRecord {
        ResourceRecord::new(name, RecordType::A, RecordData::A(addr))
    }

    fn ptr(name: &str, target: &str) -> ResourceRecord {
        ResourceRecord::new(name, RecordType::PTR, RecordData::Ptr(DnsName::from(target)))
    }

    fn srv(name: &str) -> ResourceRecord {
        ResourceRecord::new(
            name,
            RecordType::SRV,
            RecordData::Srv {
                priority: 0,
                weight: 0,
                port: 8009,
                target: DnsName::from("z.local"),
            },
        )
    }

    fn unknown(name: &str, rtype: u16) -> ResourceRecord {
        ResourceRecord::new(
            name,
            RecordType::Unknown(rtype),
            RecordData::Opaque(vec![0xde, 0xad]),
        )
    }

    fn mixed_answers() -> Vec<ResourceRecord> {
        vec![
            aaaa("x.local", "fe80::1"),
            a("x.local", Ipv4Addr::new(10, 0, 0, 5)),
            ptr("1.0.8.e.f.ip6.arpa", "y.local"),
            srv("z._ipp._tcp.local"),
        ]
    }

    #[test]
    fn test_answers_example() {
        let policy = RecordPolicy::new();
        let filtered = policy.filter_section(&mixed_answers());

        assert_eq!(
            filtered,
            vec![
                a("x.local", Ipv4Addr::new(10, 0, 0, 5)),
                srv("z._ipp._tcp.local")
            ]
        );
    }

    #[test]
    fn test_link_local_aaaa_dropped() {
        let policy = RecordPolicy::new();
        assert_eq!(
            policy.verdict(&aaaa("x.local", "fe80::1")),
            Some(DropRule::LinkLocalAddress)
        );
        // Upper edge of fe80::/10.
        assert_eq!(
            policy.verdict(&aaaa("x.local", "febf:ffff::1")),
            Some(DropRule::LinkLocalAddress)
        );
    }

    #[test]
    fn test_routable_aaaa_kept() {
        let policy = RecordPolicy::new();
        assert!(policy.allows(&aaaa("x.local", "2001:db8::1")));
        assert!(policy.allows(&aaaa("x.local", "fd00::1")));
        // Just outside fe80::/10 (site-local, deprecated but not link-local).
        assert!(policy.allows(&aaaa("x.local", "fec0::1")));
    }

    #[test]
    fn test_reverse_zone_ptr_is_case_insensitive() {
        let policy = RecordPolicy::new();
        for name in [
            "1.0.8.e.f.ip6.arpa",
            "1.0.8.E.F.ip6.arpa",
            "1.0.8.E.F.IP6.ARPA",
        ] {
            assert_eq!(
                policy.verdict(&ptr(name, "host.local")),
                Some(DropRule::LinkLocalReverseZone),
                "{}",
                name
            );
        }
    }

    #[test]
    fn test_other_reverse_zones_kept() {
        let policy = RecordPolicy::new();
        assert!(policy.allows(&ptr("5.0.0.10.in-addr.arpa", "host.local")));
        assert!(policy.allows(&ptr("_ipp._tcp.local", "printer._ipp._tcp.local")));
    }

    #[test]
    fn test_reverse_zone_only_applies_to_ptr() {
        let policy = RecordPolicy::new();
        let txt = ResourceRecord::new(
            "1.0.8.e.f.ip6.arpa",
            RecordType::TXT,
            RecordData::Txt(vec![b"k=v".to_vec()]),
        );
        assert!(policy.allows(&txt));
    }

    #[test]
    fn test_unknown_type_dropped() {
        let policy = RecordPolicy::new();
        assert_eq!(
            policy.verdict(&unknown("x.local", 65)),
            Some(DropRule::UnknownType)
        );
        assert_eq!(
            policy.verdict(&unknown("x.local", 9999)),
            Some(DropRule::UnknownType)
        );
    }

    #[test]
    fn test_nsec_and_any_dropped_as_unknown() {
        let policy = RecordPolicy::new();
        let nsec = ResourceRecord::new(
            "x.local",
            RecordType::NSEC,
            RecordData::Nsec {
                next: DnsName::from("x.local"),
                type_bitmaps: vec![0x00, 0x04, 0x40, 0x00, 0x00, 0x08],
            },
        );
        let any = ResourceRecord::new("x.local", RecordType::ANY, RecordData::Opaque(vec![]));

        assert_eq!(policy.verdict(&nsec), Some(DropRule::UnknownType));
        assert_eq!(policy.verdict(&any), Some(DropRule::UnknownType));
    }

    #[test]
    fn test_rarely_seen_named_types_kept() {
        let policy = RecordPolicy::new();
        for rtype in [
            RecordType::NULL,
            RecordType::HINFO,
            RecordType::MINFO,
            RecordType::OPT,
            RecordType::URI,
        ] {
            let record = ResourceRecord::new("x.local", rtype, RecordData::Opaque(vec![1, 2]));
            assert!(policy.allows(&record), "{}", rtype);
        }
    }

    #[test]
    fn test_empty_sections_pass_through() {
        let policy = RecordPolicy::new();
        let message = DnsMessage::new(1, 0x8400);
        let filtered = policy.filter_message(&message);

        assert!(filtered.answers.is_empty());
        assert!(filtered.authorities.is_empty());
        assert!(filtered.additionals.is_empty());
        assert_eq!(filtered, message);
    }

    #[test]
    fn test_sections_filtered_independently() {
        let policy = RecordPolicy::new();
        let mut message = DnsMessage::new(0, 0x8400);
        message.answers = mixed_answers();
        message.authorities = vec![srv("a._ipp._tcp.local"), unknown("b.local", 65)];
        message.additionals = vec![
            a("c.local", Ipv4Addr::new(192, 168, 1, 2)),
            aaaa("c.local", "2001:db8::2"),
        ];

        let filtered = policy.filter_message(&message);

        assert_eq!(filtered.answers, policy.filter_section(&message.answers));
        assert_eq!(filtered.authorities, vec![srv("a._ipp._tcp.local")]);
        assert_eq!(filtered.additionals, message.additionals);
    }

    #[test]
    fn test_filtering_is_idempotent() {
        let policy = RecordPolicy::new();
        let mut message = DnsMessage::new(0, 0x8400);
        message.answers = mixed_answers();
        message.authorities = vec![
            unknown("b.local", 65),
            ptr("a.0.8.e.f.ip6.arpa", "x.local"),
        ];
        message.additionals = vec![
            aaaa("c.local", "fe80::abcd"),
            srv("c._http._tcp.local"),
        ];

        let once = policy.filter_message(&message);
        let twice = policy.filter_message(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_drop_callback_sees_each_removed_record() {
        let policy = RecordPolicy::new();
        let mut message = DnsMessage::new(0, 0x8400);
        message.answers = mixed_answers();
        message.additionals = vec![unknown("b.local", 65)];

        let mut dropped = Vec::new();
        let filtered = policy.filter_message_with(&message, |section, record, rule| {
            dropped.push((section, record.name.to_string(), rule));
        });

        assert_eq!(filtered, policy.filter_message(&message));
        assert_eq!(
            dropped,
            vec![
                (
                    RecordSection::Answer,
                    "x.local".to_string(),
                    DropRule::LinkLocalAddress
                ),
                (
                    RecordSection::Answer,
                    "1.0.8.e.f.ip6.arpa".to_string(),
                    DropRule::LinkLocalReverseZone
                ),
                (
                    RecordSection::Additional,
                    "b.local".to_string(),
                    DropRule::UnknownType
                ),
            ]
        );
    }

    #[test]
    fn test_header_and_questions_untouched() {
        let policy = RecordPolicy::new();
        let mut message = DnsMessage::new(0x4242, 0x8400);
        message.counts = HeaderCounts {
            questions: 1,
            answers: 4,
            authorities: 0,
            additionals: 0,
        };
        message.questions.push(Question {
            name: DnsName::from("x.local"),
            record_type: RecordType::AAAA,
            record_class: 1,
        });
        message.answers = mixed_answers();

        let filtered = policy.filter_message(&message);

        assert_eq!(filtered.id, 0x4242);
        assert_eq!(filtered.flags, 0x8400);
        assert_eq!(filtered.counts, message.counts);
        assert_eq!(filtered.questions, message.questions);
        assert_eq!(filtered.answers.len(), 2);
    }
}
