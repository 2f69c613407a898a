//! Target expressions
//!
//! A target expression is a comma separated list whose items are
//!
//! - IP addresses (`10.0.0.5`, `fe80::1`)
//! - CIDR blocks (`192.168.1.0/30`)
//! - nmap-style octet ranges (`192.168.1.1-3`, `10.0.1-2.1`)
//! - MAC addresses (`aa:bb:cc:dd:ee:ff` or `AA-BB-CC-DD-EE-FF`)
//! - aliases known to the session
//!
//! Parsing yields [`TargetExpr`] items that are grouped in a [`TargetSet`].
//! Resolution to `(IP, MAC)` pairs happens later, on every beacon tick.

use ipnetwork::IpNetwork;
use netspoof_core::{split_list, Endpoint, Error, MacAddr, Result, Session};
use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};
use tracing::debug;

/// Largest number of addresses a single range item may expand to
const MAX_RANGE_SIZE: u64 = 1 << 16;

/// One parsed target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetExpr {
    Address(IpAddr),
    Hardware(MacAddr),
}

/// A target found on the wire
pub type ResolvedTarget = Endpoint;

/// Addresses and hardware addresses picked by an expression.
///
/// Also used for whitelists: a candidate is whitelisted when its IP or its
/// MAC is present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetSet {
    addresses: Vec<IpAddr>,
    macs: Vec<MacAddr>,
}

impl TargetSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `expr`, looking bare words up in the session alias table
    pub fn parse(expr: &str, session: &Session) -> Result<Self> {
        Self::parse_with(expr, |name| session.require_alias(name))
    }

    /// Parse `expr` with a custom alias lookup
    pub fn parse_with<F>(expr: &str, alias: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<MacAddr>,
    {
        let mut set = Self::new();
        for item in split_list(expr) {
            for target in parse_item(&item, &alias)? {
                set.insert(target);
            }
        }
        Ok(set)
    }

    pub fn insert(&mut self, target: TargetExpr) {
        match target {
            TargetExpr::Address(ip) => {
                if !self.addresses.contains(&ip) {
                    self.addresses.push(ip);
                }
            }
            TargetExpr::Hardware(mac) => {
                if !self.macs.contains(&mac) {
                    self.macs.push(mac);
                }
            }
        }
    }

    pub fn addresses(&self) -> &[IpAddr] {
        &self.addresses
    }

    pub fn macs(&self) -> &[MacAddr] {
        &self.macs
    }

    pub fn len(&self) -> usize {
        self.addresses.len() + self.macs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when `ip` or `mac` is part of the set
    pub fn matches(&self, ip: IpAddr, mac: MacAddr) -> bool {
        self.addresses.contains(&ip) || self.macs.contains(&mac)
    }

    /// Resolve every member to an `(IP, MAC)` pair.
    ///
    /// Addresses are resolved to MACs and MACs back to their current IP
    /// through the session resolver. Misses and addresses the session skips
    /// are dropped for this round only. The result is ordered by IP, a
    /// MAC-specified entry replacing an address-specified one for the same IP.
    pub async fn resolve(&self, session: &Session, probe: bool) -> Vec<ResolvedTarget> {
        let mut found: BTreeMap<IpAddr, MacAddr> = BTreeMap::new();

        for &ip in &self.addresses {
            if session.skip(ip) {
                continue;
            }
            match session.find_mac(ip, probe).await {
                Ok(mac) => {
                    found.insert(ip, mac);
                }
                Err(e) => debug!(ip = %ip, error = %e, "Could not resolve target"),
            }
        }

        for &mac in &self.macs {
            match session.resolver.inverse_resolve(mac).await {
                Ok(ip) if session.skip(ip) => {}
                Ok(ip) => {
                    found.insert(ip, mac);
                }
                Err(e) => debug!(mac = %mac, error = %e, "Could not find address of target"),
            }
        }

        found
            .into_iter()
            .map(|(ip, mac)| Endpoint::new(ip, mac))
            .collect()
    }
}

fn parse_item<F>(item: &str, alias: &F) -> Result<Vec<TargetExpr>>
where
    F: Fn(&str) -> Result<MacAddr>,
{
    if let Ok(ip) = item.parse::<IpAddr>() {
        return Ok(vec![TargetExpr::Address(ip)]);
    }
    if let Ok(mac) = item.parse::<MacAddr>() {
        return Ok(vec![TargetExpr::Hardware(mac)]);
    }
    if item.contains('/') {
        return expand_cidr(item);
    }
    if looks_like_address(item) {
        return expand_octet_ranges(item);
    }
    alias(item).map(|mac| vec![TargetExpr::Hardware(mac)])
}

/// Items made of digits, dots and dashes, or containing a colon, are
/// addresses that failed to parse rather than aliases.
fn looks_like_address(item: &str) -> bool {
    item.contains(':') || item.chars().all(|c| c.is_ascii_digit() || c == '.' || c == '-')
}

pub(crate) fn expand_cidr(item: &str) -> Result<Vec<TargetExpr>> {
    let network: IpNetwork = item
        .parse()
        .map_err(|_| Error::InvalidTarget(item.to_string()))?;

    let host_bits = match network {
        IpNetwork::V4(net) => 32 - net.prefix() as u32,
        IpNetwork::V6(net) => 128 - net.prefix() as u32,
    };
    if host_bits > 16 {
        return Err(Error::InvalidTarget(format!(
            "{}: range larger than {} addresses",
            item, MAX_RANGE_SIZE
        )));
    }

    Ok(network.iter().map(TargetExpr::Address).collect())
}

/// `a.b.c.d` where every octet is `N` or `N-M`
fn expand_octet_ranges(item: &str) -> Result<Vec<TargetExpr>> {
    let invalid = || Error::InvalidTarget(item.to_string());

    let parts: Vec<&str> = item.split('.').collect();
    if parts.len() != 4 {
        return Err(invalid());
    }

    let mut ranges = [(0u8, 0u8); 4];
    for (range, part) in ranges.iter_mut().zip(&parts) {
        let (lo, hi) = match part.split_once('-') {
            Some((lo, hi)) => (lo, hi),
            None => (*part, *part),
        };
        let lo: u8 = lo.parse().map_err(|_| invalid())?;
        let hi: u8 = hi.parse().map_err(|_| invalid())?;
        if lo > hi {
            return Err(invalid());
        }
        *range = (lo, hi);
    }

    let size: u64 = ranges
        .iter()
        .map(|(lo, hi)| (*hi - *lo) as u64 + 1)
        .product();
    if size > MAX_RANGE_SIZE {
        return Err(Error::InvalidTarget(format!(
            "{}: range larger than {} addresses",
            item, MAX_RANGE_SIZE
        )));
    }

    let mut out = Vec::with_capacity(size as usize);
    for a in ranges[0].0..=ranges[0].1 {
        for b in ranges[1].0..=ranges[1].1 {
            for c in ranges[2].0..=ranges[2].1 {
                for d in ranges[3].0..=ranges[3].1 {
                    out.push(TargetExpr::Address(IpAddr::V4(Ipv4Addr::new(a, b, c, d))));
                }
            }
        }
    }
    Ok(out)
}
