//! Ingress capture.
//!
//! A blocking worker reads frames from the capture session and hands them to
//! the async pipeline over a bounded channel. A slow consumer therefore
//! throttles reads instead of growing an unbounded queue.

use std::time::{Duration, UNIX_EPOCH};

use bytes::Bytes;
use pcap::{Active, Capture, Linktype};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::CaptureSettings;
use crate::error::{Error, Result};
use crate::mdns::BPF_FILTER;
use crate::net::frame::{BonjourPacket, RawFrame};
use crate::net::interface::{find_device, InterfaceInfo};

/// Result of one read from a capture session.
#[derive(Debug)]
pub enum NextFrame {
    Frame(RawFrame),
    /// The read timeout expired with nothing captured.
    Timeout,
    /// The session has no more frames.
    Closed,
}

/// A source of captured link-layer frames.
pub trait FrameSource: Send + 'static {
    fn next_frame(&mut self) -> Result<NextFrame>;
}

/// Live pcap capture session.
pub struct PcapSource {
    capture: Capture<Active>,
}

impl FrameSource for PcapSource {
    fn next_frame(&mut self) -> Result<NextFrame> {
        match self.capture.next_packet() {
            Ok(packet) => {
                let ts = packet.header.ts;
                let timestamp = UNIX_EPOCH
                    + Duration::from_secs(ts.tv_sec as u64)
                    + Duration::from_micros(ts.tv_usec as u64);
                let data = Bytes::copy_from_slice(packet.data);
                Ok(NextFrame::Frame(RawFrame::new(data, timestamp)))
            }
            Err(pcap::Error::TimeoutExpired) => Ok(NextFrame::Timeout),
            Err(pcap::Error::NoMorePackets) => Ok(NextFrame::Closed),
            Err(e) => Err(e.into()),
        }
    }
}

/// Open a live capture on `ifname` restricted to mDNS traffic.
pub fn open_ingress(ifname: &str, settings: &CaptureSettings) -> Result<PcapSource> {
    let device = find_device(ifname)?;
    info!(interface = %InterfaceInfo::from_device(&device), "opening capture");

    let mut capture = Capture::from_device(device)?
        .promisc(settings.promiscuous)
        .snaplen(settings.snaplen)
        .timeout(settings.timeout_ms)
        .immediate_mode(true)
        .open()?;

    if capture.get_datalink() != Linktype::ETHERNET {
        return Err(Error::ConfigError(format!(
            "{} is not an Ethernet interface",
            ifname
        )));
    }

    capture
        .filter(BPF_FILTER, true)
        .map_err(|e| Error::InvalidFilter {
            interface: ifname.to_string(),
            reason: e.to_string(),
        })?;

    Ok(PcapSource { capture })
}

/// Ordered stream of captured packets.
///
/// The stream ends after the session closes or after the first read error,
/// which is delivered as the final item.
pub struct CaptureStream {
    rx: mpsc::Receiver<Result<BonjourPacket>>,
    worker: JoinHandle<()>,
}

impl CaptureStream {
    /// Start reading `source` on a blocking worker.
    pub fn spawn<S: FrameSource>(source: S, depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(depth.max(1));
        let worker = tokio::task::spawn_blocking(move || pump(source, tx));
        Self { rx, worker }
    }

    /// Next captured packet, or `None` once the stream has ended.
    pub async fn next(&mut self) -> Option<Result<BonjourPacket>> {
        self.rx.recv().await
    }

    /// Stop consuming and wait for the worker to notice.
    ///
    /// The worker only observes the closed channel between reads, so this
    /// can take up to one capture timeout.
    pub async fn close(self) {
        let Self { rx, worker } = self;
        drop(rx);
        if let Err(e) = worker.await {
            debug!(error = %e, "capture worker did not exit cleanly");
        }
    }
}

fn pump<S: FrameSource>(mut source: S, tx: mpsc::Sender<Result<BonjourPacket>>) {
    loop {
        let item = match source.next_frame() {
            Ok(NextFrame::Frame(frame)) => match BonjourPacket::from_frame(frame) {
                Ok(packet) => Ok(packet),
                Err(e) => {
                    debug!(error = %e, "skipping frame");
                    continue;
                }
            },
            Ok(NextFrame::Timeout) => {
                if tx.is_closed() {
                    break;
                }
                continue;
            }
            Ok(NextFrame::Closed) => {
                debug!("capture session closed");
                break;
            }
            Err(e) => Err(e),
        };

        let terminal = item.is_err();
        if tx.blocking_send(item).is_err() {
            debug!("stream dropped, stopping capture");
            break;
        }
        if terminal {
            break;
        }
    }
}
