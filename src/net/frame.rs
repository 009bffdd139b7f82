//! Link, network and transport layer handling for captured frames.
//!
//! Frame layout handled here:
//! 1. Ethernet II header (14 bytes)
//! 2. IPv4 header (20+ bytes) or IPv6 header (40 bytes, no extension headers)
//! 3. UDP header (8 bytes)
//! 4. mDNS message
//!
//! Only the Ethernet header is decoded when a frame is captured. The IP and
//! UDP headers are located later, when the payload is actually needed.

use std::fmt;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::SystemTime;

use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{Error, Result};

pub const ETHERNET_HEADER_LEN: usize = 14;
pub const ETHERTYPE_IPV4: u16 = 0x0800;
pub const ETHERTYPE_IPV6: u16 = 0x86DD;
pub const IP_PROTO_UDP: u8 = 17;
pub const UDP_HEADER_LEN: usize = 8;

const IPV6_HEADER_LEN: usize = 40;

/// A six-octet link-layer address.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct MacAddr(pub [u8; 6]);

impl MacAddr {
    pub fn octets(&self) -> [u8; 6] {
        self.0
    }
}

impl fmt::Display for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            a, b, c, d, e, g
        )
    }
}

impl fmt::Debug for MacAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MacAddr({})", self)
    }
}

/// A frame exactly as captured.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawFrame {
    /// Captured bytes, starting at the Ethernet header.
    pub data: Bytes,
    /// Capture timestamp.
    pub timestamp: SystemTime,
}

impl RawFrame {
    pub fn new(data: impl Into<Bytes>, timestamp: SystemTime) -> Self {
        Self {
            data: data.into(),
            timestamp,
        }
    }
}

/// Ethernet II header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthernetHeader {
    pub destination: MacAddr,
    pub source: MacAddr,
    pub ethertype: u16,
}

impl EthernetHeader {
    /// Decode the header at the start of `data`.
    pub fn parse(data: &[u8]) -> Result<Self> {
        if data.len() < ETHERNET_HEADER_LEN {
            return Err(Error::FrameError(format!(
                "{} bytes is too short for an Ethernet header",
                data.len()
            )));
        }

        let mut destination = [0u8; 6];
        let mut source = [0u8; 6];
        destination.copy_from_slice(&data[0..6]);
        source.copy_from_slice(&data[6..12]);

        Ok(Self {
            destination: MacAddr(destination),
            source: MacAddr(source),
            ethertype: u16::from_be_bytes([data[12], data[13]]),
        })
    }
}

/// A captured frame with its link layer decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BonjourPacket {
    pub frame: RawFrame,
    pub ethernet: EthernetHeader,
}

impl BonjourPacket {
    /// Decode the link layer of a captured frame.
    pub fn from_frame(frame: RawFrame) -> Result<Self> {
        let ethernet = EthernetHeader::parse(&frame.data)?;
        Ok(Self { frame, ethernet })
    }

    /// Link-layer address of the host that sent the frame.
    pub fn source(&self) -> MacAddr {
        self.ethernet.source
    }

    /// Locate the IP/UDP headers and the application payload.
    pub fn udp(&self) -> Result<UdpDatagram> {
        UdpDatagram::locate(&self.frame.data, self.ethernet.ethertype)
    }
}

/// Network-layer endpoints, kept for the UDP pseudo-header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpEndpoints {
    V4 { source: Ipv4Addr, destination: Ipv4Addr },
    V6 { source: Ipv6Addr, destination: Ipv6Addr },
}

/// Location of the UDP datagram inside a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UdpDatagram {
    pub endpoints: IpEndpoints,
    /// Offset of the UDP header (end of the IP header).
    pub udp_offset: usize,
    /// Offset of the application payload.
    pub payload_offset: usize,
    /// Payload length according to the UDP header.
    pub payload_len: usize,
}

impl UdpDatagram {
    /// Find the UDP payload of an Ethernet frame.
    pub fn locate(frame: &[u8], ethertype: u16) -> Result<Self> {
        let ip = frame.get(ETHERNET_HEADER_LEN..).unwrap_or_default();

        let (endpoints, ip_header_len, ip_payload_len) = match ethertype {
            ETHERTYPE_IPV4 => Self::parse_ipv4(ip)?,
            ETHERTYPE_IPV6 => Self::parse_ipv6(ip)?,
            other => {
                return Err(Error::FrameError(format!(
                    "EtherType {:#06x} does not carry IP",
                    other
                )));
            }
        };

        let udp_offset = ETHERNET_HEADER_LEN + ip_header_len;
        if ip_payload_len < UDP_HEADER_LEN || frame.len() < udp_offset + UDP_HEADER_LEN {
            return Err(Error::FrameError("truncated UDP header".to_string()));
        }

        let udp_len = u16::from_be_bytes([frame[udp_offset + 4], frame[udp_offset + 5]]) as usize;
        if udp_len < UDP_HEADER_LEN || udp_len > ip_payload_len {
            return Err(Error::FrameError(format!("bad UDP length {}", udp_len)));
        }

        let payload_offset = udp_offset + UDP_HEADER_LEN;
        let payload_len = udp_len - UDP_HEADER_LEN;
        if frame.len() < payload_offset + payload_len {
            return Err(Error::FrameError(
                "UDP payload truncated by capture".to_string(),
            ));
        }

        Ok(Self {
            endpoints,
            udp_offset,
            payload_offset,
            payload_len,
        })
    }

    /// Returns (endpoints, header length, bytes following the header).
    fn parse_ipv4(data: &[u8]) -> Result<(IpEndpoints, usize, usize)> {
        if data.len() < 20 || data[0] >> 4 != 4 {
            return Err(Error::FrameError("malformed IPv4 header".to_string()));
        }

        let ihl = (data[0] & 0x0F) as usize * 4;
        let total_len = u16::from_be_bytes([data[2], data[3]]) as usize;
        if ihl < 20 || total_len < ihl || data.len() < ihl {
            return Err(Error::FrameError("malformed IPv4 header".to_string()));
        }

        // More-fragments flag or a non-zero fragment offset.
        let fragment = u16::from_be_bytes([data[6], data[7]]);
        if fragment & 0x3FFF != 0 {
            return Err(Error::FrameError("fragmented IPv4 datagram".to_string()));
        }

        if data[9] != IP_PROTO_UDP {
            return Err(Error::FrameError(format!(
                "IP protocol {} is not UDP",
                data[9]
            )));
        }

        let endpoints = IpEndpoints::V4 {
            source: Ipv4Addr::new(data[12], data[13], data[14], data[15]),
            destination: Ipv4Addr::new(data[16], data[17], data[18], data[19]),
        };
        Ok((endpoints, ihl, total_len - ihl))
    }

    fn parse_ipv6(data: &[u8]) -> Result<(IpEndpoints, usize, usize)> {
        if data.len() < IPV6_HEADER_LEN || data[0] >> 4 != 6 {
            return Err(Error::FrameError("malformed IPv6 header".to_string()));
        }

        if data[6] != IP_PROTO_UDP {
            return Err(Error::FrameError(format!(
                "IPv6 next header {} is not UDP",
                data[6]
            )));
        }

        let payload_len = u16::from_be_bytes([data[4], data[5]]) as usize;
        let mut source = [0u8; 16];
        let mut destination = [0u8; 16];
        source.copy_from_slice(&data[8..24]);
        destination.copy_from_slice(&data[24..40]);

        let endpoints = IpEndpoints::V6 {
            source: Ipv6Addr::from(source),
            destination: Ipv6Addr::from(destination),
        };
        Ok((endpoints, IPV6_HEADER_LEN, payload_len))
    }

    /// The application payload inside `frame`.
    pub fn payload<'a>(&self, frame: &'a [u8]) -> &'a [u8] {
        &frame[self.payload_offset..self.payload_offset + self.payload_len]
    }
}

/// Internet checksum (RFC 1071) over a sequence of byte slices.
fn checksum(parts: &[&[u8]]) -> u16 {
    let mut sum: u32 = 0;
    let mut carry: Option<u8> = None;

    for part in parts {
        for &byte in part.iter() {
            match carry.take() {
                Some(high) => sum += u32::from(u16::from_be_bytes([high, byte])),
                None => carry = Some(byte),
            }
        }
    }
    if let Some(high) = carry {
        sum += u32::from(u16::from_be_bytes([high, 0]));
    }

    while sum > 0xFFFF {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

fn udp_checksum(endpoints: &IpEndpoints, udp: &[u8]) -> u16 {
    let length = udp.len() as u32;
    let sum = match endpoints {
        IpEndpoints::V4 {
            source,
            destination,
        } => {
            let pseudo_tail = [0, IP_PROTO_UDP, (length >> 8) as u8, length as u8];
            checksum(&[&source.octets(), &destination.octets(), &pseudo_tail, udp])
        }
        IpEndpoints::V6 {
            source,
            destination,
        } => {
            let mut pseudo_tail = [0u8; 8];
            pseudo_tail[..4].copy_from_slice(&length.to_be_bytes());
            pseudo_tail[7] = IP_PROTO_UDP;
            checksum(&[&source.octets(), &destination.octets(), &pseudo_tail, udp])
        }
    };
    // Zero means "no checksum" on the wire.
    if sum == 0 {
        0xFFFF
    } else {
        sum
    }
}

/// Build a frame carrying `payload` in place of the original UDP payload.
///
/// The destination MAC, IP header and UDP ports are copied from `original`;
/// the Ethernet source is set to `source`. IP and UDP lengths and checksums
/// are recomputed.
pub fn rebuild_frame(
    original: &[u8],
    datagram: &UdpDatagram,
    source: MacAddr,
    payload: &[u8],
) -> Result<Bytes> {
    let udp_len = UDP_HEADER_LEN + payload.len();
    let ip_header_len = datagram.udp_offset - ETHERNET_HEADER_LEN;
    let ip_total_len = match datagram.endpoints {
        IpEndpoints::V4 { .. } => ip_header_len + udp_len,
        IpEndpoints::V6 { .. } => udp_len,
    };
    let ip_total_len = u16::try_from(ip_total_len)
        .map_err(|_| Error::EncodeError(format!("{} byte payload does not fit", payload.len())))?;

    let mut out = BytesMut::with_capacity(datagram.payload_offset + payload.len());
    out.put_slice(&original[0..6]);
    out.put_slice(&source.octets());
    out.put_slice(&original[12..datagram.udp_offset]);

    let ip = ETHERNET_HEADER_LEN;
    match datagram.endpoints {
        IpEndpoints::V4 { .. } => {
            out[ip + 2..ip + 4].copy_from_slice(&ip_total_len.to_be_bytes());
            out[ip + 10..ip + 12].copy_from_slice(&[0, 0]);
            let header_sum = checksum(&[&out[ip..datagram.udp_offset]]);
            out[ip + 10..ip + 12].copy_from_slice(&header_sum.to_be_bytes());
        }
        IpEndpoints::V6 { .. } => {
            out[ip + 4..ip + 6].copy_from_slice(&ip_total_len.to_be_bytes());
        }
    }

    let udp = out.len();
    out.put_slice(&original[datagram.udp_offset..datagram.udp_offset + 4]);
    out.put_u16(udp_len as u16);
    out.put_u16(0);
    out.put_slice(payload);

    let udp_sum = udp_checksum(&datagram.endpoints, &out[udp..]);
    out[udp + 6..udp + 8].copy_from_slice(&udp_sum.to_be_bytes());

    Ok(out.freeze())
}

/// Frame builders shared by unit tests across the crate.
#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::mdns::{MDNS_PORT, MULTICAST_ADDRESS, MULTICAST_ADDRESS_V6};

    pub const MDNS_MAC_V4: [u8; 6] = [0x01, 0x00, 0x5e, 0x00, 0x00, 0xfb];
    pub const MDNS_MAC_V6: [u8; 6] = [0x33, 0x33, 0x00, 0x00, 0x00, 0xfb];

    /// An IPv4 mDNS frame from `source` carrying `payload`.
    pub fn ipv4_frame(source: MacAddr, payload: &[u8]) -> Vec<u8> {
        let src_ip = Ipv4Addr::new(192, 168, 1, 20);
        let mut frame = Vec::new();
        frame.extend_from_slice(&MDNS_MAC_V4);
        frame.extend_from_slice(&source.octets());
        frame.extend_from_slice(&ETHERTYPE_IPV4.to_be_bytes());

        let total_len = (20 + UDP_HEADER_LEN + payload.len()) as u16;
        let mut ip = vec![0x45, 0x00];
        ip.extend_from_slice(&total_len.to_be_bytes());
        ip.extend_from_slice(&[0x00, 0x00, 0x40, 0x00, 255, IP_PROTO_UDP, 0, 0]);
        ip.extend_from_slice(&src_ip.octets());
        ip.extend_from_slice(&MULTICAST_ADDRESS.octets());
        let sum = checksum(&[&ip]);
        ip[10..12].copy_from_slice(&sum.to_be_bytes());
        frame.extend_from_slice(&ip);

        let udp_start = frame.len();
        frame.extend_from_slice(&MDNS_PORT.to_be_bytes());
        frame.extend_from_slice(&MDNS_PORT.to_be_bytes());
        frame.extend_from_slice(&((UDP_HEADER_LEN + payload.len()) as u16).to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(payload);
        let endpoints = IpEndpoints::V4 {
            source: src_ip,
            destination: MULTICAST_ADDRESS,
        };
        let sum = udp_checksum(&endpoints, &frame[udp_start..]);
        frame[udp_start + 6..udp_start + 8].copy_from_slice(&sum.to_be_bytes());
        frame
    }

    /// An IPv6 mDNS frame from `source` carrying `payload`.
    pub fn ipv6_frame(source: MacAddr, payload: &[u8]) -> Vec<u8> {
        let src_ip: Ipv6Addr = "fe80::1c2d:3e4f".parse().unwrap();
        let mut frame = Vec::new();
        frame.extend_from_slice(&MDNS_MAC_V6);
        frame.extend_from_slice(&source.octets());
        frame.extend_from_slice(&ETHERTYPE_IPV6.to_be_bytes());

        let udp_len = (UDP_HEADER_LEN + payload.len()) as u16;
        frame.extend_from_slice(&[0x60, 0, 0, 0]);
        frame.extend_from_slice(&udp_len.to_be_bytes());
        frame.extend_from_slice(&[IP_PROTO_UDP, 255]);
        frame.extend_from_slice(&src_ip.octets());
        frame.extend_from_slice(&MULTICAST_ADDRESS_V6.octets());

        let udp_start = frame.len();
        frame.extend_from_slice(&MDNS_PORT.to_be_bytes());
        frame.extend_from_slice(&MDNS_PORT.to_be_bytes());
        frame.extend_from_slice(&udp_len.to_be_bytes());
        frame.extend_from_slice(&[0, 0]);
        frame.extend_from_slice(payload);
        let endpoints = IpEndpoints::V6 {
            source: src_ip,
            destination: MULTICAST_ADDRESS_V6,
        };
        let sum = udp_checksum(&endpoints, &frame[udp_start..]);
        frame[udp_start + 6..udp_start + 8].copy_from_slice(&sum.to_be_bytes());
        frame
    }

    /// An ARP request from `source`: Ethernet without an IP payload.
    pub fn arp_frame(source: MacAddr) -> Vec<u8> {
        let mut frame = vec![0xff; 6];
        frame.extend_from_slice(&source.octets());
        frame.extend_from_slice(&[0x08, 0x06]);
        frame.extend_from_slice(&[0u8; 28]);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    const SENDER: MacAddr = MacAddr([0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff]);

    #[test]
    fn test_mac_addr_display() {
        assert_eq!(SENDER.to_string(), "aa:bb:cc:dd:ee:ff");
        assert_eq!(format!("{:?}", SENDER), "MacAddr(aa:bb:cc:dd:ee:ff)");
    }

    #[test]
    fn test_ethernet_header_parse() {
        let frame = ipv4_frame(SENDER, b"payload");
        let header = EthernetHeader::parse(&frame).unwrap();
        assert_eq!(header.source, SENDER);
        assert_eq!(header.destination, MacAddr(MDNS_MAC_V4));
        assert_eq!(header.ethertype, ETHERTYPE_IPV4);
    }

    #[test]
    fn test_short_frame_rejected() {
        let frame = RawFrame::new(vec![0u8; 10], SystemTime::UNIX_EPOCH);
        assert!(BonjourPacket::from_frame(frame).is_err());
    }

    #[test]
    fn test_locate_ipv4_payload() {
        let frame = ipv4_frame(SENDER, b"hello mdns");
        let datagram = UdpDatagram::locate(&frame, ETHERTYPE_IPV4).unwrap();
        assert_eq!(datagram.udp_offset, 34);
        assert_eq!(datagram.payload(&frame), b"hello mdns");
    }

    #[test]
    fn test_locate_ignores_ethernet_padding() {
        let mut frame = ipv4_frame(SENDER, b"hi");
        frame.resize(60, 0);
        let datagram = UdpDatagram::locate(&frame, ETHERTYPE_IPV4).unwrap();
        assert_eq!(datagram.payload(&frame), b"hi");
    }

    #[test]
    fn test_locate_ipv6_payload() {
        let frame = ipv6_frame(SENDER, b"hello v6");
        let datagram = UdpDatagram::locate(&frame, ETHERTYPE_IPV6).unwrap();
        assert_eq!(datagram.udp_offset, 54);
        assert_eq!(datagram.payload(&frame), b"hello v6");
    }

    #[test]
    fn test_locate_rejects_non_ip() {
        let frame = arp_frame(SENDER);
        assert!(UdpDatagram::locate(&frame, 0x0806).is_err());
    }

    #[test]
    fn test_locate_rejects_truncated_capture() {
        let mut frame = ipv4_frame(SENDER, b"a longer payload");
        frame.truncate(frame.len() - 4);
        assert!(UdpDatagram::locate(&frame, ETHERTYPE_IPV4).is_err());
    }

    #[test]
    fn test_locate_rejects_fragment() {
        let mut frame = ipv4_frame(SENDER, b"frag");
        // Set more-fragments
        frame[ETHERNET_HEADER_LEN + 6] = 0x20;
        assert!(UdpDatagram::locate(&frame, ETHERTYPE_IPV4).is_err());
    }

    #[test]
    fn test_rebuild_ipv4_frame() {
        let original = ipv4_frame(MacAddr([2, 0, 0, 0, 0, 1]), b"original payload");
        let datagram = UdpDatagram::locate(&original, ETHERTYPE_IPV4).unwrap();

        let rebuilt = rebuild_frame(&original, &datagram, SENDER, b"short").unwrap();

        let header = EthernetHeader::parse(&rebuilt).unwrap();
        assert_eq!(header.source, SENDER);
        assert_eq!(header.destination, MacAddr(MDNS_MAC_V4));

        let located = UdpDatagram::locate(&rebuilt, ETHERTYPE_IPV4).unwrap();
        assert_eq!(located.payload(&rebuilt), b"short");
        assert_eq!(located.endpoints, datagram.endpoints);

        // Valid checksums sum to zero.
        let ip = &rebuilt[ETHERNET_HEADER_LEN..located.udp_offset];
        assert_eq!(checksum(&[ip]), 0);
        let udp = &rebuilt[located.udp_offset..];
        let IpEndpoints::V4 {
            source,
            destination,
        } = located.endpoints
        else {
            panic!("expected IPv4");
        };
        let pseudo = [0, IP_PROTO_UDP, 0, udp.len() as u8];
        assert_eq!(
            checksum(&[&source.octets(), &destination.octets(), &pseudo, udp]),
            0
        );
    }

    #[test]
    fn test_rebuild_matches_builder_for_same_payload() {
        let original = ipv6_frame(SENDER, b"same");
        let datagram = UdpDatagram::locate(&original, ETHERTYPE_IPV6).unwrap();
        let rebuilt = rebuild_frame(&original, &datagram, SENDER, b"same").unwrap();
        assert_eq!(&rebuilt[..], &original[..]);
    }

    #[test]
    fn test_bonjour_packet_defers_udp_decoding() {
        let frame = RawFrame::new(arp_frame(SENDER), SystemTime::UNIX_EPOCH);
        let packet = BonjourPacket::from_frame(frame).unwrap();
        assert_eq!(packet.source(), SENDER);
        assert!(packet.udp().is_err());
    }
}
