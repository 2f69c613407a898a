//! MAC/IP address resolution against the kernel neighbour tables

use crate::{Error, MacAddr, Result};
use async_trait::async_trait;
use rand::Rng;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::process::Command;
use tracing::{debug, trace};

/// UDP port the resolution probe is sent to (NetBIOS session, usually closed)
const PROBE_PORT: u16 = 139;

/// Delay between a probe and the second table lookup
const PROBE_DELAY: Duration = Duration::from_millis(500);

/// Maps protocol addresses to hardware addresses and back
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// Hardware address of `ip`. With `probe` set, a miss triggers a probe
    /// packet followed by a short wait and one retry.
    async fn resolve(&self, ip: IpAddr, probe: bool) -> Result<MacAddr>;

    /// Current protocol address of the host owning `mac`
    async fn inverse_resolve(&self, mac: MacAddr) -> Result<IpAddr>;
}

/// Resolver reading `/proc/net/arp` and the IPv6 neighbour table
pub struct SystemResolver {
    interface: String,
    probe_delay: Duration,
}

impl SystemResolver {
    pub fn new(interface: &str) -> Self {
        Self {
            interface: interface.to_string(),
            probe_delay: PROBE_DELAY,
        }
    }

    /// IPv4 neighbours on this interface with a complete hardware address
    pub fn arp_table(&self) -> Result<Vec<(Ipv4Addr, MacAddr)>> {
        let entries = procfs::net::arp()
            .map_err(|e| Error::Interface(format!("Failed to read ARP table: {}", e)))?;

        Ok(entries
            .into_iter()
            .filter(|e| e.device == self.interface)
            .filter_map(|e| {
                let mac = MacAddr(e.hw_address?);
                (!mac.is_zero()).then_some((e.ip_address, mac))
            })
            .collect())
    }

    /// IPv6 neighbours on this interface, from `ip -6 neigh show`
    pub async fn ndp_table(&self) -> Result<Vec<(Ipv6Addr, MacAddr)>> {
        let output = Command::new("ip")
            .args(["-6", "neigh", "show", "dev", &self.interface])
            .output()
            .await?;

        if !output.status.success() {
            return Err(Error::Interface(format!(
                "ip -6 neigh exited with {}",
                output.status
            )));
        }

        Ok(parse_neigh_output(&String::from_utf8_lossy(&output.stdout)))
    }

    async fn lookup(&self, ip: IpAddr) -> Result<Option<MacAddr>> {
        Ok(match ip {
            IpAddr::V4(v4) => self
                .arp_table()?
                .into_iter()
                .find(|(addr, _)| *addr == v4)
                .map(|(_, mac)| mac),
            IpAddr::V6(v6) => self
                .ndp_table()
                .await?
                .into_iter()
                .find(|(addr, _)| *addr == v6)
                .map(|(_, mac)| mac),
        })
    }

    /// Provoke the kernel into resolving `ip` by sending it a small datagram
    async fn probe(&self, ip: IpAddr) -> Result<()> {
        let bind: SocketAddr = match ip {
            IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
            IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
        };
        let socket = UdpSocket::bind(bind).await?;
        let payload: [u8; 8] = rand::thread_rng().gen();
        socket.send_to(&payload, (ip, PROBE_PORT)).await?;
        trace!(ip = %ip, "Sent resolution probe");
        Ok(())
    }
}

#[async_trait]
impl AddressResolver for SystemResolver {
    async fn resolve(&self, ip: IpAddr, probe: bool) -> Result<MacAddr> {
        if let Some(mac) = self.lookup(ip).await? {
            return Ok(mac);
        }

        if probe {
            if let Err(e) = self.probe(ip).await {
                debug!(ip = %ip, error = %e, "Resolution probe failed");
            }
            tokio::time::sleep(self.probe_delay).await;

            if let Some(mac) = self.lookup(ip).await? {
                return Ok(mac);
            }
        }

        Err(Error::not_found(format!("hardware address of {}", ip)))
    }

    async fn inverse_resolve(&self, mac: MacAddr) -> Result<IpAddr> {
        if let Some((ip, _)) = self.arp_table()?.into_iter().find(|(_, m)| *m == mac) {
            return Ok(IpAddr::V4(ip));
        }

        if let Ok(table) = self.ndp_table().await {
            if let Some((ip, _)) = table.into_iter().find(|(_, m)| *m == mac) {
                return Ok(IpAddr::V6(ip));
            }
        }

        Err(Error::not_found(format!("address of {}", mac)))
    }
}

/// Parse lines like `fe80::1 lladdr 00:11:22:33:44:55 router REACHABLE`
pub fn parse_neigh_output(output: &str) -> Vec<(Ipv6Addr, MacAddr)> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.split_whitespace();
            let ip: Ipv6Addr = fields.next()?.parse().ok()?;
            let mut fields = fields.skip_while(|f| *f != "lladdr");
            fields.next()?;
            let mac: MacAddr = fields.next()?.parse().ok()?;
            Some((ip, mac))
        })
        .collect()
}
