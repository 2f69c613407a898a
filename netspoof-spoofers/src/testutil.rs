//! In-memory collaborators for module tests

use async_trait::async_trait;
use netspoof_capture::{Frames, PacketSource};
use netspoof_core::{
    AddressResolver, CancelToken, Endpoint, Error, Forwarding, Interface, MacAddr, Packet,
    PacketSender, Result, SendCounters, SendStats, Session,
};
use netspoof_packet::{ArpPacket, EtherType, EthernetFrame};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

pub const OWN_MAC: MacAddr = MacAddr([0xaa; 6]);
pub const GATEWAY_MAC: MacAddr = MacAddr([0x0b; 6]);

pub fn mac(a: u8, b: u8, c: u8, d: u8, e: u8, f: u8) -> MacAddr {
    MacAddr([a, b, c, d, e, f])
}

/// Keeps every frame handed to it
#[derive(Default)]
pub struct RecordingSender {
    frames: Mutex<Vec<Vec<u8>>>,
    counters: SendCounters,
}

impl RecordingSender {
    pub fn frames(&self) -> Vec<Vec<u8>> {
        self.frames.lock().clone()
    }

    pub fn clear(&self) {
        self.frames.lock().clear();
    }

    /// Recorded ARP frames as (ethernet destination, ARP payload)
    pub fn arp_replies(&self) -> Vec<(MacAddr, ArpPacket)> {
        self.frames()
            .iter()
            .filter_map(|raw| EthernetFrame::from_bytes(raw))
            .filter(|frame| frame.ethertype == EtherType::ARP)
            .filter_map(|frame| {
                ArpPacket::parse(&frame.payload)
                    .ok()
                    .map(|arp| (frame.destination, arp))
            })
            .collect()
    }
}

impl PacketSender for RecordingSender {
    fn send(&self, frame: &[u8]) -> Result<()> {
        self.counters.record_sent(frame.len());
        self.frames.lock().push(frame.to_vec());
        Ok(())
    }

    fn stats(&self) -> SendStats {
        self.counters.snapshot()
    }
}

/// Resolver backed by a fixed IP/MAC table
pub struct TableResolver {
    table: Mutex<HashMap<IpAddr, MacAddr>>,
    probes: AtomicUsize,
}

impl TableResolver {
    pub fn new(entries: &[(&str, MacAddr)]) -> Self {
        let table = entries
            .iter()
            .filter_map(|(ip, mac)| ip.parse().ok().map(|ip| (ip, *mac)))
            .collect();
        Self {
            table: Mutex::new(table),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn insert(&self, ip: &str, mac: MacAddr) {
        if let Ok(ip) = ip.parse() {
            self.table.lock().insert(ip, mac);
        }
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressResolver for TableResolver {
    async fn resolve(&self, ip: IpAddr, probe: bool) -> Result<MacAddr> {
        if probe {
            self.probes.fetch_add(1, Ordering::SeqCst);
        }
        self.table
            .lock()
            .get(&ip)
            .copied()
            .ok_or_else(|| Error::not_found(format!("mac of {}", ip)))
    }

    async fn inverse_resolve(&self, mac: MacAddr) -> Result<IpAddr> {
        self.table
            .lock()
            .iter()
            .find(|(_, m)| **m == mac)
            .map(|(ip, _)| *ip)
            .ok_or_else(|| Error::not_found(format!("address of {}", mac)))
    }
}

/// Forwarding switch kept in memory
pub struct FlagForwarding {
    enabled: AtomicBool,
    writes: AtomicUsize,
}

impl FlagForwarding {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled: AtomicBool::new(enabled),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl Forwarding for FlagForwarding {
    fn is_forwarding_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn enable_forwarding(&self, enabled: bool) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(())
    }
}

/// Packet source fed by the test through an mpsc sender
pub struct ChannelSource {
    rx: Mutex<Option<mpsc::Receiver<Packet>>>,
}

impl ChannelSource {
    pub fn new() -> (Arc<Self>, mpsc::Sender<Packet>) {
        let (tx, rx) = mpsc::channel(64);
        (
            Arc::new(Self {
                rx: Mutex::new(Some(rx)),
            }),
            tx,
        )
    }
}

impl PacketSource for ChannelSource {
    fn open(&self, _filter: &str, _cancel: CancelToken) -> Result<Frames> {
        self.rx
            .lock()
            .take()
            .map(Frames::from_channel)
            .ok_or_else(|| Error::Capture("source already opened".to_string()))
    }
}

/// Packet source that cannot be opened, like pcap without privileges
pub struct FailingSource;

impl PacketSource for FailingSource {
    fn open(&self, _filter: &str, _cancel: CancelToken) -> Result<Frames> {
        Err(Error::Capture("permission denied".to_string()))
    }
}

/// Interface `test0` at 10.0.0.2/24 with MAC aa:aa:aa:aa:aa:aa and a
/// link-local IPv6 address; gateway 10.0.0.1 at 0b:0b:0b:0b:0b:0b.
pub fn test_interface() -> Interface {
    Interface::new("test0".to_string(), 1, OWN_MAC)
        .with_ipv4("10.0.0.2/24".parse().expect("valid network"))
        .with_ipv6("fe80::a8aa:aaff:feaa:aaaa".parse().expect("valid address"))
}

pub fn session_with(
    resolver: TableResolver,
) -> (Arc<Session>, Arc<RecordingSender>, Arc<FlagForwarding>) {
    session_with_forwarding(resolver, false)
}

pub fn session_with_forwarding(
    resolver: TableResolver,
    forwarding_enabled: bool,
) -> (Arc<Session>, Arc<RecordingSender>, Arc<FlagForwarding>) {
    session_with_resolver(Arc::new(resolver), forwarding_enabled)
}

pub fn session_with_resolver(
    resolver: Arc<TableResolver>,
    forwarding_enabled: bool,
) -> (Arc<Session>, Arc<RecordingSender>, Arc<FlagForwarding>) {
    let sender = Arc::new(RecordingSender::default());
    let forwarding = Arc::new(FlagForwarding::new(forwarding_enabled));
    let gateway = Endpoint::new("10.0.0.1".parse().expect("valid address"), GATEWAY_MAC);

    let session = Session::new(
        test_interface(),
        gateway,
        sender.clone(),
        resolver,
        forwarding.clone(),
    );
    (Arc::new(session), sender, forwarding)
}
