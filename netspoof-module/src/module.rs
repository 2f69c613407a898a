//! The `Module` trait implemented by every spoofer

use async_trait::async_trait;
use netspoof_core::{Error, ParamDescriptor, Result};

/// A command string a module answers to, e.g. `arp.spoof on`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handler {
    pub name: String,
    pub description: String,
}

impl Handler {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// A session module with a start/stop lifecycle
#[async_trait]
pub trait Module: Send + Sync {
    /// Module name, also the prefix of its commands and parameters
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Parameters the module reads in `configure`
    fn parameters(&self) -> Vec<ParamDescriptor>;

    fn running(&self) -> bool;

    /// Read and validate parameters. Fails with `AlreadyStarted` while running.
    async fn configure(&self) -> Result<()>;

    /// Configure, then spawn the worker. Returns without waiting for it.
    async fn start(&self) -> Result<()>;

    /// Stop the worker and block until its teardown has finished.
    async fn stop(&self) -> Result<()>;

    /// Commands this module answers to. Defaults to `<name> on|off`.
    fn handlers(&self) -> Vec<Handler> {
        vec![
            Handler::new(
                format!("{} on", self.name()),
                format!("Start the {} module.", self.name()),
            ),
            Handler::new(
                format!("{} off", self.name()),
                format!("Stop the {} module.", self.name()),
            ),
        ]
    }

    /// Execute one of the commands listed by [`Module::handlers`]
    async fn handle(&self, command: &str) -> Result<()> {
        match command.strip_prefix(self.name()).map(str::trim) {
            Some("on") => self.start().await,
            Some("off") => self.stop().await,
            _ => Err(Error::UnknownCommand(command.to_string())),
        }
    }
}
