//! Network interface types

use crate::{Error, MacAddr, Result};
use ipnetwork::{IpNetwork, Ipv4Network};
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Route flag marking an entry whose gateway field is valid
const RTF_GATEWAY: u16 = 0x0002;

/// Network interface the session operates on
#[derive(Debug, Clone)]
pub struct Interface {
    /// Interface name (e.g., "eth0")
    pub name: String,
    /// Interface index
    pub index: u32,
    /// MAC address
    pub mac_address: MacAddr,
    /// First IPv4 network assigned to the interface
    pub ipv4: Option<Ipv4Network>,
    /// IPv6 addresses assigned to the interface
    pub ipv6: Vec<Ipv6Addr>,
}

impl Interface {
    /// Create an interface description without touching the system
    pub fn new(name: String, index: u32, mac_address: MacAddr) -> Self {
        Self {
            name,
            index,
            mac_address,
            ipv4: None,
            ipv6: Vec::new(),
        }
    }

    /// Attach an IPv4 network
    pub fn with_ipv4(mut self, network: Ipv4Network) -> Self {
        self.ipv4 = Some(network);
        self
    }

    /// Attach an IPv6 address
    pub fn with_ipv6(mut self, addr: Ipv6Addr) -> Self {
        self.ipv6.push(addr);
        self
    }

    /// Get interface by name
    pub fn by_name(name: &str) -> Result<Self> {
        let iface = pnet_datalink::interfaces()
            .into_iter()
            .find(|i| i.name == name)
            .ok_or_else(|| Error::InterfaceNotFound(name.to_string()))?;

        let mac_address = iface
            .mac
            .map(MacAddr::from)
            .ok_or_else(|| Error::Interface(format!("{} has no hardware address", name)))?;

        let mut ipv4 = None;
        let mut ipv6 = Vec::new();
        for network in &iface.ips {
            match network {
                IpNetwork::V4(net) if ipv4.is_none() => ipv4 = Some(*net),
                IpNetwork::V6(net) => ipv6.push(net.ip()),
                _ => {}
            }
        }

        Ok(Self {
            name: iface.name.clone(),
            index: iface.index,
            mac_address,
            ipv4,
            ipv6,
        })
    }

    /// First interface that is up, not loopback and has an IPv4 address
    pub fn default_interface() -> Result<Self> {
        let name = pnet_datalink::interfaces()
            .into_iter()
            .find(|i| i.is_up() && !i.is_loopback() && i.ips.iter().any(|n| n.is_ipv4()))
            .map(|i| i.name)
            .ok_or_else(|| Error::InterfaceNotFound("<default>".to_string()))?;
        Self::by_name(&name)
    }

    /// Get the IPv4 address of this interface
    pub fn ipv4_addr(&self) -> Option<Ipv4Addr> {
        self.ipv4.map(|net| net.ip())
    }

    /// Link-local IPv6 address, falling back to any IPv6 address
    pub fn ipv6_addr(&self) -> Option<Ipv6Addr> {
        self.ipv6
            .iter()
            .find(|a| (a.segments()[0] & 0xffc0) == 0xfe80)
            .or_else(|| self.ipv6.first())
            .copied()
    }

    /// The interface subnet in CIDR notation, e.g. `192.168.1.0/24`
    pub fn cidr(&self) -> Option<String> {
        self.ipv4
            .map(|net| format!("{}/{}", net.network(), net.prefix()))
    }

    /// True if `ip` is one of this interface's own addresses
    pub fn owns(&self, ip: IpAddr) -> bool {
        match ip {
            IpAddr::V4(v4) => self.ipv4_addr() == Some(v4),
            IpAddr::V6(v6) => self.ipv6.contains(&v6),
        }
    }
}

impl fmt::Display for Interface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.ipv4 {
            Some(net) => write!(f, "{} ({}, {})", self.name, self.mac_address, net),
            None => write!(f, "{} ({})", self.name, self.mac_address),
        }
    }
}

/// Default IPv4 gateway of `iface`, read from the kernel routing table
pub fn default_gateway(iface: &str) -> Result<Ipv4Addr> {
    let routes = procfs::net::route()
        .map_err(|e| Error::Interface(format!("Failed to read routing table: {}", e)))?;

    routes
        .into_iter()
        .find(|r| {
            r.iface == iface
                && r.destination.is_unspecified()
                && r.flags & RTF_GATEWAY != 0
        })
        .map(|r| r.gateway)
        .ok_or_else(|| Error::not_found(format!("default gateway on {}", iface)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_interface() -> Interface {
        Interface::new("test0".to_string(), 1, MacAddr([0xaa; 6]))
            .with_ipv4(Ipv4Network::new(Ipv4Addr::new(192, 168, 1, 23), 24).unwrap())
            .with_ipv6("2001:db8::5".parse().unwrap())
            .with_ipv6("fe80::1234".parse().unwrap())
    }

    #[test]
    fn test_cidr() {
        assert_eq!(test_interface().cidr().as_deref(), Some("192.168.1.0/24"));
    }

    #[test]
    fn test_ipv6_prefers_link_local() {
        assert_eq!(
            test_interface().ipv6_addr(),
            Some("fe80::1234".parse().unwrap())
        );
    }

    #[test]
    fn test_owns() {
        let iface = test_interface();
        assert!(iface.owns("192.168.1.23".parse().unwrap()));
        assert!(iface.owns("2001:db8::5".parse().unwrap()));
        assert!(!iface.owns("192.168.1.1".parse().unwrap()));
    }
}
