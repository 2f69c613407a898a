//! Raw frame transmission

use crate::{Error, Interface, Result};
use parking_lot::Mutex;
use pnet_datalink::{Channel, DataLinkSender};
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

/// Something that puts complete Ethernet frames on the wire
pub trait PacketSender: Send + Sync {
    /// Transmit one frame (Ethernet header included)
    fn send(&self, frame: &[u8]) -> Result<()>;

    /// Best-effort transmission counters
    fn stats(&self) -> SendStats;
}

/// Snapshot of sender counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SendStats {
    pub packets_sent: u64,
    pub bytes_sent: u64,
    pub errors: u64,
}

/// Thread-safe sender counters
#[derive(Debug, Default)]
pub struct SendCounters {
    packets_sent: AtomicU64,
    bytes_sent: AtomicU64,
    errors: AtomicU64,
}

impl SendCounters {
    pub fn record_sent(&self, bytes: usize) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
        self.bytes_sent.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> SendStats {
        SendStats {
            packets_sent: self.packets_sent.load(Ordering::Relaxed),
            bytes_sent: self.bytes_sent.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Sender backed by a persistent datalink channel on one interface
pub struct LinkSender {
    interface: String,
    tx: Mutex<Box<dyn DataLinkSender>>,
    counters: SendCounters,
}

impl LinkSender {
    /// Open a datalink channel on `iface`
    pub fn open(iface: &Interface) -> Result<Self> {
        let interface = pnet_datalink::interfaces()
            .into_iter()
            .find(|i| i.name == iface.name)
            .ok_or_else(|| Error::InterfaceNotFound(iface.name.clone()))?;

        let tx = match pnet_datalink::channel(&interface, Default::default()) {
            Ok(Channel::Ethernet(tx, _rx)) => tx,
            Ok(_) => return Err(Error::Interface("Unsupported channel type".to_string())),
            Err(e) => return Err(Error::Interface(format!("Failed to create channel: {}", e))),
        };

        info!(interface = %iface.name, "Opened packet sender");

        Ok(Self {
            interface: iface.name.clone(),
            tx: Mutex::new(tx),
            counters: SendCounters::default(),
        })
    }
}

impl PacketSender for LinkSender {
    fn send(&self, frame: &[u8]) -> Result<()> {
        let result = self
            .tx
            .lock()
            .send_to(frame, None)
            .ok_or_else(|| Error::Interface("Failed to send packet".to_string()))
            .and_then(|r| r.map_err(|e| Error::Interface(format!("Send error: {}", e))));

        match &result {
            Ok(()) => self.counters.record_sent(frame.len()),
            Err(e) => {
                debug!(interface = %self.interface, error = %e, "Send failed");
                self.counters.record_error();
            }
        }

        result
    }

    fn stats(&self) -> SendStats {
        self.counters.snapshot()
    }
}
