//! mDNS message encoding.
//!
//! Serializes a [`DnsMessage`] back to wire format. Header counts are always
//! written from the actual section lengths, never from the counts that were
//! decoded, so a filtered message stays self-consistent.

use std::collections::HashMap;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::mdns::packet::{DnsMessage, DnsName, RecordData, ResourceRecord};

/// Largest DNS payload that fits in a single UDP datagram.
pub const MAX_MESSAGE_LEN: usize = 65507;

/// Compression pointers address at most 14 bits.
const MAX_POINTER_OFFSET: usize = 0x3FFF;

/// Encoder for mDNS/DNS messages with name compression.
pub struct MdnsEncoder {
    buf: BytesMut,
    names: HashMap<Vec<Vec<u8>>, u16>,
}

impl MdnsEncoder {
    /// Encode a complete message.
    pub fn encode(message: &DnsMessage) -> Result<Bytes> {
        let mut encoder = Self {
            buf: BytesMut::with_capacity(512),
            names: HashMap::new(),
        };

        encoder.buf.put_u16(message.id);
        encoder.buf.put_u16(message.flags);
        encoder.put_count(message.questions.len())?;
        encoder.put_count(message.answers.len())?;
        encoder.put_count(message.authorities.len())?;
        encoder.put_count(message.additionals.len())?;

        for question in &message.questions {
            encoder.write_name(&question.name, true)?;
            encoder.buf.put_u16(question.record_type.to_u16());
            encoder.buf.put_u16(question.record_class);
        }

        for record in message
            .answers
            .iter()
            .chain(&message.authorities)
            .chain(&message.additionals)
        {
            encoder.write_record(record)?;
        }

        if encoder.buf.len() > MAX_MESSAGE_LEN {
            return Err(Error::EncodeError(format!(
                "message of {} bytes exceeds UDP limit",
                encoder.buf.len()
            )));
        }

        Ok(encoder.buf.freeze())
    }

    fn put_count(&mut self, count: usize) -> Result<()> {
        let count = u16::try_from(count)
            .map_err(|_| Error::EncodeError(format!("{} entries in one section", count)))?;
        self.buf.put_u16(count);
        Ok(())
    }

    /// Write a name, reusing earlier suffixes when `compress` is set.
    fn write_name(&mut self, name: &DnsName, compress: bool) -> Result<()> {
        let labels = name.labels();
        let encoded_len: usize = labels.iter().map(|l| l.len() + 1).sum::<usize>() + 1;
        if encoded_len > 255 {
            return Err(Error::EncodeError(format!("name too long: {}", name)));
        }

        for idx in 0..labels.len() {
            let suffix = &labels[idx..];

            if compress {
                if let Some(&pointer) = self.names.get(suffix) {
                    self.buf.put_u16(0xC000 | pointer);
                    return Ok(());
                }
                let offset = self.buf.len();
                if offset <= MAX_POINTER_OFFSET {
                    self.names.insert(suffix.to_vec(), offset as u16);
                }
            }

            let label = &labels[idx];
            if label.is_empty() || label.len() > 63 {
                return Err(Error::EncodeError(format!(
                    "invalid label length {} in {}",
                    label.len(),
                    name
                )));
            }
            self.buf.put_u8(label.len() as u8);
            self.buf.put_slice(label);
        }

        self.buf.put_u8(0);
        Ok(())
    }

    fn write_record(&mut self, record: &ResourceRecord) -> Result<()> {
        self.write_name(&record.name, true)?;
        self.buf.put_u16(record.record_type.to_u16());
        self.buf.put_u16(record.record_class);
        self.buf.put_u32(record.ttl);

        let length_at = self.buf.len();
        self.buf.put_u16(0);
        let start = self.buf.len();

        match &record.data {
            RecordData::A(addr) => self.buf.put_slice(&addr.octets()),
            RecordData::Aaaa(addr) => self.buf.put_slice(&addr.octets()),
            RecordData::Ptr(name) | RecordData::Name(name) => self.write_name(name, true)?,
            RecordData::Srv {
                priority,
                weight,
                port,
                target,
            } => {
                self.buf.put_u16(*priority);
                self.buf.put_u16(*weight);
                self.buf.put_u16(*port);
                self.write_name(target, false)?;
            }
            RecordData::Txt(strings) => {
                for txt in strings {
                    let len = u8::try_from(txt.len()).map_err(|_| {
                        Error::EncodeError(format!("TXT string of {} bytes", txt.len()))
                    })?;
                    self.buf.put_u8(len);
                    self.buf.put_slice(txt);
                }
            }
            RecordData::Mx {
                preference,
                exchange,
            } => {
                self.buf.put_u16(*preference);
                self.write_name(exchange, true)?;
            }
            RecordData::Soa {
                mname,
                rname,
                serial,
                refresh,
                retry,
                expire,
                minimum,
            } => {
                self.write_name(mname, true)?;
                self.write_name(rname, true)?;
                self.buf.put_u32(*serial);
                self.buf.put_u32(*refresh);
                self.buf.put_u32(*retry);
                self.buf.put_u32(*expire);
                self.buf.put_u32(*minimum);
            }
            RecordData::Nsec { next, type_bitmaps } => {
                self.write_name(next, false)?;
                self.buf.put_slice(type_bitmaps);
            }
            RecordData::Opaque(bytes) => self.buf.put_slice(bytes),
        }

        let rdlength = u16::try_from(self.buf.len() - start).map_err(|_| {
            Error::EncodeError(format!("record data too long for {}", record.name))
        })?;
        self.buf[length_at..length_at + 2].copy_from_slice(&rdlength.to_be_bytes());
        Ok(())
    }
}
