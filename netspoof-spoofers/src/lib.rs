//! Spoofing modules for netspoof
//!
//! - [`arp`]: ARP cache poisoning of IPv4 hosts, with cache restore on stop
//! - [`ndp`]: rogue IPv6 router advertisements
//! - [`dns`]: forged answers to sniffed DNS queries
//!
//! Every module implements [`netspoof_module::Module`] and is driven through
//! a [`netspoof_module::ModuleManager`].

pub mod arp;
pub mod dns;
pub mod ndp;
pub mod targets;

#[cfg(test)]
mod testutil;

pub use arp::{ArpSpoofer, SpoofMode};
pub use dns::{DnsSpoofer, Hosts, Responder};
pub use ndp::NdpSpoofer;
pub use targets::{ResolvedTarget, TargetExpr, TargetSet};
