//! Kernel IP forwarding control

use crate::{Error, Result};
use std::fs;
use std::path::PathBuf;
use tracing::info;

/// Toggles packet forwarding on the host
pub trait Forwarding: Send + Sync {
    fn is_forwarding_enabled(&self) -> bool;

    fn enable_forwarding(&self, enabled: bool) -> Result<()>;
}

/// Forwarding control through the `/proc/sys` knobs
pub struct ProcForwarding {
    ipv4: PathBuf,
    ipv6: PathBuf,
}

impl ProcForwarding {
    pub fn new() -> Self {
        Self {
            ipv4: PathBuf::from("/proc/sys/net/ipv4/ip_forward"),
            ipv6: PathBuf::from("/proc/sys/net/ipv6/conf/all/forwarding"),
        }
    }

    /// Use alternative knob files (tests, containers with a remapped /proc)
    pub fn with_paths(ipv4: PathBuf, ipv6: PathBuf) -> Self {
        Self { ipv4, ipv6 }
    }
}

impl Default for ProcForwarding {
    fn default() -> Self {
        Self::new()
    }
}

impl Forwarding for ProcForwarding {
    fn is_forwarding_enabled(&self) -> bool {
        fs::read_to_string(&self.ipv4)
            .map(|v| v.trim() == "1")
            .unwrap_or(false)
    }

    fn enable_forwarding(&self, enabled: bool) -> Result<()> {
        let value = if enabled { "1" } else { "0" };

        fs::write(&self.ipv4, value).map_err(|e| {
            Error::ExecutionFailed(format!("writing {}: {}", self.ipv4.display(), e))
        })?;

        // Not every host has IPv6 enabled.
        if self.ipv6.exists() {
            fs::write(&self.ipv6, value).map_err(|e| {
                Error::ExecutionFailed(format!("writing {}: {}", self.ipv6.display(), e))
            })?;
        }

        info!(enabled, "IP forwarding updated");
        Ok(())
    }
}
