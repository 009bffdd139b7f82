//! Network interface lookup and egress transmit handles.

use std::net::IpAddr;
use std::sync::{Mutex, PoisonError};

use ipnet::IpNet;
use pcap::{Active, Capture, Device};
use tracing::debug;

use crate::error::{Error, Result};

/// Network interface information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterfaceInfo {
    /// Interface name (e.g., "eth0", "wlan0").
    pub ifname: String,
    /// Networks configured on the interface.
    pub networks: Vec<IpNet>,
}

impl InterfaceInfo {
    /// Create InterfaceInfo from name and address/netmask pairs.
    pub fn new(ifname: String, addresses: &[(IpAddr, Option<IpAddr>)]) -> Self {
        let networks = addresses
            .iter()
            .map(|&(addr, netmask)| {
                netmask
                    .and_then(|mask| IpNet::with_netmask(addr, mask).ok())
                    .unwrap_or_else(|| IpNet::from(addr))
            })
            .collect();

        Self { ifname, networks }
    }

    pub(crate) fn from_device(device: &Device) -> Self {
        let addresses: Vec<_> = device
            .addresses
            .iter()
            .map(|a| (a.addr, a.netmask))
            .collect();
        Self::new(device.name.clone(), &addresses)
    }
}

impl std::fmt::Display for InterfaceInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dev {}", self.ifname)?;
        for network in &self.networks {
            write!(f, " addr {}", network)?;
        }
        Ok(())
    }
}

/// Find a capture device by its exact name.
pub fn find_device(ifname: &str) -> Result<Device> {
    let (found, others): (Vec<_>, Vec<_>) =
        Device::list()?.into_iter().partition(|d| d.name == ifname);

    if let Some(device) = found.into_iter().next() {
        return Ok(device);
    }

    for device in &others {
        debug!(interface = %InterfaceInfo::from_device(device), "available");
    }
    Err(Error::InterfaceNotFound(ifname.to_string()))
}

/// A transmit capability bound to one interface.
pub trait EgressInterface: Send + Sync {
    /// Interface name, for diagnostics.
    fn name(&self) -> &str;

    /// Put one complete link-layer frame on the wire.
    fn send(&self, frame: &[u8]) -> Result<()>;
}

/// Egress handle backed by a live pcap session.
///
/// libpcap handles are not safe for concurrent use, so sends are serialized.
pub struct PcapInterface {
    name: String,
    capture: Mutex<Capture<Active>>,
}

impl PcapInterface {
    /// Open a transmit handle on the named interface.
    pub fn open(ifname: &str) -> Result<Self> {
        let device = find_device(ifname)?;
        debug!(interface = %InterfaceInfo::from_device(&device), "opening egress");

        let capture = Capture::from_device(device)?.open()?;

        Ok(Self {
            name: ifname.to_string(),
            capture: Mutex::new(capture),
        })
    }
}

impl EgressInterface for PcapInterface {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, frame: &[u8]) -> Result<()> {
        let mut capture = self.capture.lock().unwrap_or_else(PoisonError::into_inner);
        capture.sendpacket(frame)?;
        Ok(())
    }
}

impl std::fmt::Debug for PcapInterface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PcapInterface")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
