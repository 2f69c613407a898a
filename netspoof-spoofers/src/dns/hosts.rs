//! Host table for the DNS spoofer
//!
//! An ordered list of `(pattern, address)` entries; the first entry whose
//! pattern matches a queried name wins. Patterns are host names, or
//! `*.domain` to match `domain` itself and everything below it.

use netspoof_core::{Error, Result};
use std::fmt;
use std::net::IpAddr;
use std::path::Path;

/// One `(pattern, address)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEntry {
    /// Normalised pattern: lowercase, no trailing dot
    pub pattern: String,
    pub address: IpAddr,
    suffix: Option<String>,
}

impl HostEntry {
    pub fn new(pattern: &str, address: IpAddr) -> Self {
        let pattern = normalize(pattern);
        let suffix = pattern.strip_prefix("*.").map(str::to_string);
        Self {
            pattern,
            address,
            suffix,
        }
    }

    /// `name` must already be normalised
    fn matches(&self, name: &str) -> bool {
        match &self.suffix {
            Some(domain) => {
                name == domain
                    || (name.len() > domain.len()
                        && name.ends_with(domain.as_str())
                        && name.as_bytes()[name.len() - domain.len() - 1] == b'.')
            }
            None => name == self.pattern,
        }
    }
}

impl fmt::Display for HostEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.pattern, self.address)
    }
}

fn normalize(name: &str) -> String {
    name.trim().trim_end_matches('.').to_ascii_lowercase()
}

/// Ordered host table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Hosts {
    entries: Vec<HostEntry>,
}

impl Hosts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every domain mapped to `address`
    pub fn from_domains<S: AsRef<str>>(domains: &[S], address: IpAddr) -> Self {
        Self {
            entries: domains
                .iter()
                .map(|d| HostEntry::new(d.as_ref(), address))
                .collect(),
        }
    }

    /// Parse hosts-file text.
    ///
    /// Each line is `address host [host...]` or a lone `host`, which maps to
    /// `default_address`. `#` starts a comment.
    pub fn parse(content: &str, default_address: IpAddr) -> Result<Self> {
        let mut hosts = Self::new();

        for (lineno, line) in content.lines().enumerate() {
            let line = line.split('#').next().unwrap_or_default();
            let tokens: Vec<&str> = line.split_whitespace().collect();

            match tokens.as_slice() {
                [] => {}
                [host] => hosts.push(HostEntry::new(host, default_address)),
                [address, names @ ..] => {
                    let address: IpAddr = address.parse().map_err(|_| {
                        Error::invalid_parameter(
                            "dns.spoof.hosts",
                            format!("line {}: '{}' is not an IP address", lineno + 1, address),
                        )
                    })?;
                    for name in names {
                        hosts.push(HostEntry::new(name, address));
                    }
                }
            }
        }

        Ok(hosts)
    }

    pub fn from_file<P: AsRef<Path>>(path: P, default_address: IpAddr) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::invalid_parameter(
                "dns.spoof.hosts",
                format!("cannot read {}: {}", path.as_ref().display(), e),
            )
        })?;
        Self::parse(&content, default_address)
    }

    pub fn push(&mut self, entry: HostEntry) {
        self.entries.push(entry);
    }

    /// Append `other` after the current entries
    pub fn extend(&mut self, other: Hosts) {
        self.entries.extend(other.entries);
    }

    pub fn entries(&self) -> &[HostEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Address of the first entry matching `name`
    pub fn resolve(&self, name: &str) -> Option<IpAddr> {
        let name = normalize(name);
        self.entries
            .iter()
            .find(|entry| entry.matches(&name))
            .map(|entry| entry.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn test_first_match_wins() {
        let mut hosts = Hosts::new();
        hosts.push(HostEntry::new("a.com", ip("1.1.1.1")));
        hosts.push(HostEntry::new("a.com", ip("2.2.2.2")));

        assert_eq!(hosts.resolve("a.com"), Some(ip("1.1.1.1")));
    }

    #[test]
    fn test_case_and_trailing_dot() {
        let hosts = Hosts::from_domains(&["Example.COM."], ip("9.9.9.9"));
        assert_eq!(hosts.resolve("example.com"), Some(ip("9.9.9.9")));
        assert_eq!(hosts.resolve("EXAMPLE.com."), Some(ip("9.9.9.9")));
        assert_eq!(hosts.resolve("www.example.com"), None);
    }

    #[test]
    fn test_wildcard() {
        let hosts = Hosts::from_domains(&["*.example.com"], ip("9.9.9.9"));
        assert_eq!(hosts.resolve("example.com"), Some(ip("9.9.9.9")));
        assert_eq!(hosts.resolve("a.b.example.com"), Some(ip("9.9.9.9")));
        assert_eq!(hosts.resolve("badexample.com"), None);
        assert_eq!(hosts.resolve("example.org"), None);
    }

    #[test]
    fn test_parse_hosts_file() {
        let content = "\
# spoofed hosts
10.0.0.1   router.lan  gw.lan
fe80::1    v6.lan      # inline comment

lonely.lan
";
        let hosts = Hosts::parse(content, ip("9.9.9.9")).unwrap();
        assert_eq!(hosts.len(), 4);
        assert_eq!(hosts.resolve("gw.lan"), Some(ip("10.0.0.1")));
        assert_eq!(hosts.resolve("v6.lan"), Some(ip("fe80::1")));
        assert_eq!(hosts.resolve("lonely.lan"), Some(ip("9.9.9.9")));
    }

    #[test]
    fn test_parse_rejects_bad_address() {
        let err = Hosts::parse("not-an-ip host.lan\n", ip("9.9.9.9")).unwrap_err();
        assert!(err.to_string().contains("line 1"));
    }

    #[test]
    fn test_missing_file() {
        let err = Hosts::from_file("/nonexistent/netspoof/hosts", ip("9.9.9.9")).unwrap_err();
        assert!(matches!(err, Error::InvalidParameter { .. }));
    }
}
