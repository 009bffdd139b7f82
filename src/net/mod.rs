//! Frame capture, frame decoding and egress interfaces.

pub mod capture;
pub mod frame;
pub mod interface;

pub use capture::{open_ingress, CaptureStream, FrameSource, NextFrame, PcapSource};
pub use frame::{
    rebuild_frame, BonjourPacket, EthernetHeader, IpEndpoints, MacAddr, RawFrame, UdpDatagram,
};
pub use interface::{find_device, EgressInterface, InterfaceInfo, PcapInterface};
