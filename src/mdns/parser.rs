//! mDNS packet parsing.
//!
//! Parses raw DNS/mDNS message bytes into a typed [`DnsMessage`]. Any
//! structural problem (truncation, bad compression pointers, wrong fixed-size
//! payload lengths) is a parse failure; nothing is partially decoded.

use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::{Error, Result};
use crate::mdns::packet::{
    DnsMessage, DnsName, HeaderCounts, Question, RecordData, ResourceRecord,
};
use crate::mdns::RecordType;

/// Maximum number of compression pointer jumps to prevent infinite loops.
const MAX_JUMPS: usize = 10;

/// Maximum encoded length of a domain name (RFC 1035 2.3.4).
const MAX_NAME_LEN: usize = 255;

/// Size of the fixed DNS header.
pub const HEADER_LEN: usize = 12;

fn read_u16(data: &[u8], offset: usize) -> Result<u16> {
    data.get(offset..offset + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| Error::ParseError(format!("truncated at offset {}", offset)))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32> {
    data.get(offset..offset + 4)
        .map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
        .ok_or_else(|| Error::ParseError(format!("truncated at offset {}", offset)))
}

/// Parser for mDNS/DNS messages.
pub struct MdnsParser;

impl MdnsParser {
    /// Parse a DNS name from message data, handling compression.
    ///
    /// DNS names can contain compression pointers (2 bytes starting with 0xC0)
    /// that reference earlier positions in the message.
    ///
    /// Returns the parsed name and the offset just past the name as it appears
    /// at `offset` (i.e. past the first pointer, if any).
    pub fn parse_name(data: &[u8], offset: usize) -> Result<(DnsName, usize)> {
        let mut labels: Vec<Vec<u8>> = Vec::new();
        let mut current = offset;
        let mut end_offset = None;
        let mut jump_count = 0;
        let mut encoded_len = 0;

        loop {
            let Some(&length) = data.get(current) else {
                return Err(Error::ParseError("Unterminated name".to_string()));
            };
            let length = length as usize;

            // End of name
            if length == 0 {
                current += 1;
                break;
            }

            // Compression pointer: top 2 bits are 11
            if (length & 0xC0) == 0xC0 {
                let Some(&low) = data.get(current + 1) else {
                    return Err(Error::ParseError(
                        "Truncated compression pointer".to_string(),
                    ));
                };

                jump_count += 1;
                if jump_count > MAX_JUMPS {
                    return Err(Error::ParseError("Too many compression jumps".to_string()));
                }

                if end_offset.is_none() {
                    end_offset = Some(current + 2);
                }
                current = ((length & 0x3F) << 8) | low as usize;
                continue;
            }

            // 0x40 and 0x80 label types are reserved
            if length > 63 {
                return Err(Error::ParseError(format!("Invalid label length {}", length)));
            }

            current += 1;
            let Some(label) = data.get(current..current + length) else {
                return Err(Error::ParseError(
                    "Label extends past end of data".to_string(),
                ));
            };

            encoded_len += length + 1;
            if encoded_len > MAX_NAME_LEN {
                return Err(Error::ParseError("Name too long".to_string()));
            }

            labels.push(label.to_vec());
            current += length;
        }

        Ok((DnsName::new(labels), end_offset.unwrap_or(current)))
    }

    /// Parse TXT record data into its character strings.
    ///
    /// Empty strings are preserved so the record re-encodes byte-for-byte.
    pub fn parse_txt_strings(rdata: &[u8]) -> Result<Vec<Vec<u8>>> {
        let mut strings = Vec::new();
        let mut offset = 0;

        while offset < rdata.len() {
            let length = rdata[offset] as usize;
            offset += 1;

            let Some(txt) = rdata.get(offset..offset + length) else {
                return Err(Error::ParseError(
                    "TXT string extends past end of record".to_string(),
                ));
            };
            strings.push(txt.to_vec());
            offset += length;
        }

        Ok(strings)
    }

    /// Parse a complete mDNS message.
    pub fn parse(data: &[u8]) -> Result<DnsMessage> {
        if data.len() < HEADER_LEN {
            return Err(Error::ParseError(
                "Packet too short for DNS header".to_string(),
            ));
        }

        let id = read_u16(data, 0)?;
        let flags = read_u16(data, 2)?;
        let counts = HeaderCounts {
            questions: read_u16(data, 4)?,
            answers: read_u16(data, 6)?,
            authorities: read_u16(data, 8)?,
            additionals: read_u16(data, 10)?,
        };

        let mut offset = HEADER_LEN;

        let mut questions = Vec::with_capacity(counts.questions as usize);
        for _ in 0..counts.questions {
            questions.push(Self::parse_question(data, &mut offset)?);
        }

        let answers = Self::parse_records(data, &mut offset, counts.answers)?;
        let authorities = Self::parse_records(data, &mut offset, counts.authorities)?;
        let additionals = Self::parse_records(data, &mut offset, counts.additionals)?;

        Ok(DnsMessage {
            id,
            flags,
            counts,
            questions,
            answers,
            authorities,
            additionals,
        })
    }

    fn parse_question(data: &[u8], offset: &mut usize) -> Result<Question> {
        let (name, new_offset) = Self::parse_name(data, *offset)?;
        let qtype = read_u16(data, new_offset)?;
        let qclass = read_u16(data, new_offset + 2)?;
        *offset = new_offset + 4;

        Ok(Question {
            name,
            record_type: RecordType::from_u16(qtype),
            record_class: qclass,
        })
    }

    fn parse_records(
        data: &[u8],
        offset: &mut usize,
        count: u16,
    ) -> Result<Vec<ResourceRecord>> {
        let mut records = Vec::with_capacity(count as usize);

        for _ in 0..count {
            let (name, new_offset) = Self::parse_name(data, *offset)?;
            *offset = new_offset;

            let rtype = RecordType::from_u16(read_u16(data, *offset)?);
            let rclass = read_u16(data, *offset + 2)?;
            let ttl = read_u32(data, *offset + 4)?;
            let rdlength = read_u16(data, *offset + 8)? as usize;
            *offset += 10;

            if *offset + rdlength > data.len() {
                return Err(Error::ParseError(format!(
                    "{} record for {} extends past end of data",
                    rtype, name
                )));
            }

            let data_field = Self::parse_rdata(data, rtype, *offset, rdlength)?;
            *offset += rdlength;

            records.push(ResourceRecord {
                name,
                record_type: rtype,
                record_class: rclass,
                ttl,
                data: data_field,
            });
        }

        Ok(records)
    }

    /// Decode the payload of one record.
    ///
    /// Embedded names are resolved against the whole message because they may
    /// use compression pointers.
    fn parse_rdata(
        data: &[u8],
        rtype: RecordType,
        start: usize,
        len: usize,
    ) -> Result<RecordData> {
        let end = start + len;
        let rdata = &data[start..end];

        let name_in_rdata = |offset: usize| -> Result<(DnsName, usize)> {
            let (name, next) = Self::parse_name(data, offset)?;
            if next > end {
                return Err(Error::ParseError(format!(
                    "{} name extends past record data",
                    rtype
                )));
            }
            Ok((name, next))
        };

        let parsed = match rtype {
            RecordType::A => {
                let octets: [u8; 4] = rdata.try_into().map_err(|_| {
                    Error::ParseError(format!("A record with {} byte payload", len))
                })?;
                RecordData::A(Ipv4Addr::from(octets))
            }
            RecordType::AAAA => {
                let octets: [u8; 16] = rdata.try_into().map_err(|_| {
                    Error::ParseError(format!("AAAA record with {} byte payload", len))
                })?;
                RecordData::Aaaa(Ipv6Addr::from(octets))
            }
            RecordType::PTR => RecordData::Ptr(name_in_rdata(start)?.0),
            RecordType::NS | RecordType::CNAME => RecordData::Name(name_in_rdata(start)?.0),
            RecordType::SRV => {
                if len < 7 {
                    return Err(Error::ParseError("SRV record too short".to_string()));
                }
                RecordData::Srv {
                    priority: read_u16(data, start)?,
                    weight: read_u16(data, start + 2)?,
                    port: read_u16(data, start + 4)?,
                    target: name_in_rdata(start + 6)?.0,
                }
            }
            RecordType::TXT => RecordData::Txt(Self::parse_txt_strings(rdata)?),
            RecordType::MX => {
                if len < 3 {
                    return Err(Error::ParseError("MX record too short".to_string()));
                }
                RecordData::Mx {
                    preference: read_u16(data, start)?,
                    exchange: name_in_rdata(start + 2)?.0,
                }
            }
            RecordType::SOA => {
                let (mname, next) = name_in_rdata(start)?;
                let (rname, next) = name_in_rdata(next)?;
                if next + 20 != end {
                    return Err(Error::ParseError("SOA record has bad length".to_string()));
                }
                RecordData::Soa {
                    mname,
                    rname,
                    serial: read_u32(data, next)?,
                    refresh: read_u32(data, next + 4)?,
                    retry: read_u32(data, next + 8)?,
                    expire: read_u32(data, next + 12)?,
                    minimum: read_u32(data, next + 16)?,
                }
            }
            RecordType::NSEC => {
                let (next_name, next) = name_in_rdata(start)?;
                RecordData::Nsec {
                    next: next_name,
                    type_bitmaps: data[next..end].to_vec(),
                }
            }
            RecordType::MD
            | RecordType::MF
            | RecordType::MB
            | RecordType::MG
            | RecordType::MR
            | RecordType::NULL
            | RecordType::WKS
            | RecordType::HINFO
            | RecordType::MINFO
            | RecordType::OPT
            | RecordType::ANY
            | RecordType::URI
            | RecordType::Unknown(_) => RecordData::Opaque(rdata.to_vec()),
        };

        Ok(parsed)
    }
}
