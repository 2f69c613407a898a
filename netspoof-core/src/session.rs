//! Session: the interface, gateway and collaborators shared by all modules

use crate::forwarding::{Forwarding, ProcForwarding};
use crate::interface::default_gateway;
use crate::resolver::{AddressResolver, SystemResolver};
use crate::sender::{LinkSender, PacketSender};
use crate::{Endpoint, Error, Interface, MacAddr, Parameters, Result};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use tracing::info;

/// Everything a module needs to reach the network.
///
/// Modules hold an `Arc<Session>`; nothing here is global, so independent
/// sessions (and tests with mocked collaborators) can coexist.
pub struct Session {
    pub interface: Interface,
    pub gateway: Endpoint,
    pub sender: Arc<dyn PacketSender>,
    pub resolver: Arc<dyn AddressResolver>,
    pub forwarding: Arc<dyn Forwarding>,
    pub params: Arc<Parameters>,
    aliases: RwLock<HashMap<String, MacAddr>>,
}

impl Session {
    pub fn new(
        interface: Interface,
        gateway: Endpoint,
        sender: Arc<dyn PacketSender>,
        resolver: Arc<dyn AddressResolver>,
        forwarding: Arc<dyn Forwarding>,
    ) -> Self {
        Self {
            interface,
            gateway,
            sender,
            resolver,
            forwarding,
            params: Arc::new(Parameters::new()),
            aliases: RwLock::new(HashMap::new()),
        }
    }

    /// Build a session on a live interface: opens the datalink sender and
    /// resolves the default gateway through the kernel tables.
    pub async fn open(interface_name: Option<&str>) -> Result<Self> {
        let interface = match interface_name {
            Some(name) => Interface::by_name(name)?,
            None => Interface::default_interface()?,
        };

        let sender = Arc::new(LinkSender::open(&interface)?);
        let resolver = Arc::new(SystemResolver::new(&interface.name));
        let forwarding = Arc::new(ProcForwarding::new());

        let gateway_ip = IpAddr::V4(default_gateway(&interface.name)?);
        let gateway_mac = resolver.resolve(gateway_ip, true).await?;
        let gateway = Endpoint::new(gateway_ip, gateway_mac);

        info!(interface = %interface, gateway = %gateway, "Session ready");

        Ok(Self::new(interface, gateway, sender, resolver, forwarding))
    }

    /// Our own hardware address
    pub fn own_mac(&self) -> MacAddr {
        self.interface.mac_address
    }

    /// Addresses that are never spoof targets: loopback, our own interface
    /// and the gateway.
    pub fn skip(&self, ip: IpAddr) -> bool {
        ip.is_loopback() || self.interface.owns(ip) || ip == self.gateway.ip
    }

    /// Resolve the hardware address of `ip`, optionally probing
    pub async fn find_mac(&self, ip: IpAddr, probe: bool) -> Result<MacAddr> {
        self.resolver.resolve(ip, probe).await
    }

    pub fn set_alias(&self, name: &str, mac: MacAddr) {
        self.aliases.write().insert(name.to_lowercase(), mac);
    }

    pub fn alias(&self, name: &str) -> Option<MacAddr> {
        self.aliases.read().get(&name.to_lowercase()).copied()
    }

    /// Resolve an alias or fail with `UnknownAlias`
    pub fn require_alias(&self, name: &str) -> Result<MacAddr> {
        self.alias(name)
            .ok_or_else(|| Error::UnknownAlias(name.to_string()))
    }
}
