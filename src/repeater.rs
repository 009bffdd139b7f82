//! Main mDNS repeater orchestration logic.
//!
//! Each captured packet is decoded, filtered by [`RecordPolicy`] and relayed
//! to every egress interface concurrently. The sender's link-layer address is
//! kept as the Ethernet source of every relayed frame.

use std::future::Future;
use std::sync::Arc;

use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::RepeaterConfig;
use crate::error::{Error, Result};
use crate::filter::RecordPolicy;
use crate::mdns::{DnsMessage, MdnsEncoder, MdnsParser};
use crate::net::{
    rebuild_frame, BonjourPacket, CaptureStream, EgressInterface, MacAddr, PcapInterface,
    UdpDatagram,
};
use crate::report::{DropReason, PacketObserver};

/// Interfaces the repeater works with, opened once at startup.
pub struct RepeaterContext {
    /// Interface mDNS traffic is captured on.
    pub receive_interface: String,
    /// Egress handles in configuration order.
    pub send_interfaces: Vec<Arc<dyn EgressInterface>>,
}

impl RepeaterContext {
    pub fn new(
        receive_interface: impl Into<String>,
        send_interfaces: Vec<Arc<dyn EgressInterface>>,
    ) -> Self {
        Self {
            receive_interface: receive_interface.into(),
            send_interfaces,
        }
    }

    /// Open a transmit handle for every configured send interface.
    pub fn open(config: &RepeaterConfig) -> Result<Self> {
        let mut send_interfaces: Vec<Arc<dyn EgressInterface>> = Vec::new();
        for ifname in &config.send_interfaces {
            let iface = PcapInterface::open(ifname).map_err(|err| {
                error!("Failed to open {}: {}", ifname, err);
                err
            })?;
            send_interfaces.push(Arc::new(iface));
        }
        Ok(Self::new(config.receive_interface.clone(), send_interfaces))
    }

    fn send_names(&self) -> Vec<&str> {
        self.send_interfaces.iter().map(|i| i.name()).collect()
    }
}

/// A decoded message together with where it came from.
#[derive(Debug, Clone)]
pub struct ExtractedMessage {
    pub message: DnsMessage,
    /// Link-layer source of the captured frame.
    pub source: MacAddr,
    /// Layout of the captured frame, reused when rebuilding it.
    pub datagram: UdpDatagram,
}

/// Decode the DNS message carried by a captured packet.
pub fn extract(packet: &BonjourPacket) -> std::result::Result<ExtractedMessage, DropReason> {
    let datagram = packet
        .udp()
        .map_err(|e| DropReason::NoApplicationLayer(e.to_string()))?;

    let payload = datagram.payload(&packet.frame.data);
    if payload.is_empty() {
        return Err(DropReason::NoApplicationLayer(
            "empty UDP payload".to_string(),
        ));
    }

    let message = MdnsParser::parse(payload).map_err(|e| DropReason::NotDns(e.to_string()))?;

    Ok(ExtractedMessage {
        message,
        source: packet.source(),
        datagram,
    })
}

/// Result of relaying one message on one interface.
#[derive(Debug)]
pub struct SendOutcome {
    pub interface: String,
    pub result: Result<()>,
}

/// In-flight sends for one message.
///
/// Dropping a `Dispatch` detaches the sends; they still run to completion.
pub struct Dispatch {
    sends: Vec<(String, JoinHandle<SendOutcome>)>,
}

impl Dispatch {
    pub fn len(&self) -> usize {
        self.sends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sends.is_empty()
    }

    /// Wait for every send, returning outcomes in configuration order.
    pub async fn join(self) -> Vec<SendOutcome> {
        let mut outcomes = Vec::with_capacity(self.sends.len());
        for (interface, handle) in self.sends {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => SendOutcome {
                    interface,
                    result: Err(Error::NetworkError(std::io::Error::other(e))),
                },
            };
            outcomes.push(outcome);
        }
        outcomes
    }
}

/// Fans a message out to every egress interface.
pub struct Dispatcher {
    egress: Vec<Arc<dyn EgressInterface>>,
    observer: Arc<dyn PacketObserver>,
}

impl Dispatcher {
    pub fn new(egress: Vec<Arc<dyn EgressInterface>>, observer: Arc<dyn PacketObserver>) -> Self {
        Self { egress, observer }
    }

    /// Encode `message` into a copy of the captured frame and send it on
    /// every interface.
    ///
    /// The frame is built once and shared by all sends. Each send reports
    /// its own outcome to the observer.
    pub fn dispatch(
        &self,
        message: &DnsMessage,
        packet: &BonjourPacket,
        datagram: &UdpDatagram,
        source: MacAddr,
    ) -> std::result::Result<Dispatch, DropReason> {
        let frame = MdnsEncoder::encode(message)
            .and_then(|payload| rebuild_frame(&packet.frame.data, datagram, source, &payload))
            .map_err(|e| DropReason::EncodeFailed(e.to_string()))?;

        let sends = self
            .egress
            .iter()
            .map(|iface| {
                let name = iface.name().to_string();
                let handle = Self::spawn_send(iface.clone(), frame.clone(), self.observer.clone());
                (name, handle)
            })
            .collect();

        Ok(Dispatch { sends })
    }

    fn spawn_send(
        iface: Arc<dyn EgressInterface>,
        frame: Bytes,
        observer: Arc<dyn PacketObserver>,
    ) -> JoinHandle<SendOutcome> {
        tokio::task::spawn_blocking(move || {
            let outcome = SendOutcome {
                interface: iface.name().to_string(),
                result: iface.send(&frame),
            };
            observer.on_sent(&outcome);
            outcome
        })
    }
}

/// Main mDNS repeater.
pub struct MdnsRepeater {
    context: RepeaterContext,
    policy: RecordPolicy,
    dispatcher: Dispatcher,
    observer: Arc<dyn PacketObserver>,
}

impl MdnsRepeater {
    /// Create a new repeater over an opened context.
    pub fn new(context: RepeaterContext, observer: Arc<dyn PacketObserver>) -> Self {
        let dispatcher = Dispatcher::new(context.send_interfaces.clone(), observer.clone());
        Self {
            context,
            policy: RecordPolicy::new(),
            dispatcher,
            observer,
        }
    }

    /// Handle one captured packet.
    ///
    /// Returns the in-flight sends, or `None` if the packet was dropped.
    pub fn handle_packet(&self, packet: &BonjourPacket) -> Option<Dispatch> {
        let extracted = match extract(packet) {
            Ok(extracted) => extracted,
            Err(reason) => {
                self.observer.on_dropped(packet.source(), &reason);
                return None;
            }
        };

        let mut removed = 0;
        let filtered = self
            .policy
            .filter_message_with(&extracted.message, |section, record, rule| {
                removed += 1;
                self.observer.on_record_removed(section, record, rule);
            });
        self.observer.on_filtered(&filtered, extracted.source, removed);

        match self
            .dispatcher
            .dispatch(&filtered, packet, &extracted.datagram, extracted.source)
        {
            Ok(dispatch) => Some(dispatch),
            Err(reason) => {
                self.observer.on_dropped(extracted.source, &reason);
                None
            }
        }
    }

    /// Main entry point - runs the repeater until Ctrl-C or end of capture.
    pub async fn run(&self, stream: CaptureStream) -> Result<()> {
        let shutdown = async {
            match tokio::signal::ctrl_c().await {
                Ok(()) => info!("Received shutdown signal"),
                // No signal handling available: run until the capture ends.
                Err(_) => std::future::pending::<()>().await,
            }
        };
        self.run_until(stream, shutdown).await
    }

    /// Run until `shutdown` completes, the capture ends or a read fails.
    pub async fn run_until<F>(&self, mut stream: CaptureStream, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        info!(
            "Repeating mDNS from {} to [{}]",
            self.context.receive_interface,
            self.context.send_names().join(", ")
        );

        tokio::pin!(shutdown);
        let result = loop {
            tokio::select! {
                _ = &mut shutdown => break Ok(()),
                item = stream.next() => match item {
                    Some(Ok(packet)) => {
                        // Sends detach and report their own outcomes.
                        drop(self.handle_packet(&packet));
                    }
                    Some(Err(err)) => {
                        error!("Capture error on {}: {}", self.context.receive_interface, err);
                        break Err(err);
                    }
                    None => {
                        debug!("capture ended");
                        break Ok(());
                    }
                },
            }
        };

        info!("Shutting down...");
        stream.close().await;
        result
    }
}
