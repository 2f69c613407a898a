//! Module manager
//!
//! Owns every module of a session, routes `<module> on|off` style commands to
//! the module that declared them and stops everything on shutdown.

use dashmap::DashMap;
use netspoof_core::{Error, Result};
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::module::{Handler, Module};

/// Snapshot of one module
#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub name: String,
    pub description: String,
    pub running: bool,
    pub handlers: Vec<Handler>,
}

/// Registry of the session's modules
pub struct ModuleManager {
    modules: DashMap<String, Arc<dyn Module>>,
}

impl ModuleManager {
    pub fn new() -> Self {
        Self {
            modules: DashMap::new(),
        }
    }

    pub fn register(&self, module: Arc<dyn Module>) {
        let name = module.name().to_string();
        debug!(module = %name, "Registering module");
        self.modules.insert(name, module);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Module>> {
        self.modules.get(name).map(|m| Arc::clone(m.value()))
    }

    /// Modules sorted by name
    pub fn list(&self) -> Vec<ModuleInfo> {
        let mut list: Vec<ModuleInfo> = self
            .modules
            .iter()
            .map(|entry| {
                let module = entry.value();
                ModuleInfo {
                    name: module.name().to_string(),
                    description: module.description().to_string(),
                    running: module.running(),
                    handlers: module.handlers(),
                }
            })
            .collect();
        list.sort_by(|a, b| a.name.cmp(&b.name));
        list
    }

    /// Find the module owning `command`
    pub fn find_handler(&self, command: &str) -> Option<Arc<dyn Module>> {
        self.modules
            .iter()
            .find(|entry| entry.value().handlers().iter().any(|h| h.name == command))
            .map(|entry| Arc::clone(entry.value()))
    }

    /// Run a module command such as `arp.spoof on`.
    ///
    /// Whitespace between words is normalised. Unknown commands yield
    /// `UnknownCommand`.
    pub async fn dispatch(&self, line: &str) -> Result<()> {
        let command = line.split_whitespace().collect::<Vec<_>>().join(" ");
        let module = self
            .find_handler(&command)
            .ok_or_else(|| Error::UnknownCommand(command.clone()))?;

        debug!(module = %module.name(), command = %command, "Dispatching");
        module.handle(&command).await
    }

    /// Stop every running module, restoring victims where the module supports it
    pub async fn stop_all(&self) -> Result<()> {
        let running: Vec<Arc<dyn Module>> = self
            .modules
            .iter()
            .filter(|entry| entry.value().running())
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        if running.is_empty() {
            return Ok(());
        }

        info!(count = running.len(), "Stopping all modules");

        let mut failed = 0usize;
        for module in running {
            match module.stop().await {
                Ok(()) => {}
                Err(e) if e.is_idempotency() => {}
                Err(e) => {
                    error!(module = %module.name(), error = %e, "Failed to stop module");
                    failed += 1;
                }
            }
        }

        if failed == 0 {
            Ok(())
        } else {
            Err(Error::ExecutionFailed(format!(
                "Failed to stop {} modules",
                failed
            )))
        }
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

impl Default for ModuleManager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Lifecycle;
    use async_trait::async_trait;
    use netspoof_core::ParamDescriptor;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Beacon {
        lifecycle: Lifecycle,
        teardowns: Arc<AtomicUsize>,
    }

    impl Beacon {
        fn new(name: &str) -> Self {
            Self {
                lifecycle: Lifecycle::new(name),
                teardowns: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl Module for Beacon {
        fn name(&self) -> &str {
            self.lifecycle.name()
        }

        fn description(&self) -> &str {
            "test beacon"
        }

        fn parameters(&self) -> Vec<ParamDescriptor> {
            Vec::new()
        }

        fn running(&self) -> bool {
            self.lifecycle.is_running()
        }

        async fn configure(&self) -> Result<()> {
            self.lifecycle.ensure_stopped()
        }

        async fn start(&self) -> Result<()> {
            self.lifecycle
                .start(self.configure(), |ctx| async move {
                    while ctx.tick(std::time::Duration::from_millis(5)).await {}
                    Ok(())
                })
                .await
                .map(|_| ())
        }

        async fn stop(&self) -> Result<()> {
            let teardowns = Arc::clone(&self.teardowns);
            self.lifecycle
                .stop(async move {
                    teardowns.fetch_add(1, Ordering::SeqCst);
                })
                .await
        }
    }

    #[tokio::test]
    async fn test_dispatch_on_off() {
        let manager = ModuleManager::new();
        let beacon = Arc::new(Beacon::new("beacon"));
        manager.register(beacon.clone());

        manager.dispatch("beacon   on").await.unwrap();
        assert!(beacon.running());

        let err = manager.dispatch("beacon on").await.unwrap_err();
        assert!(err.is_idempotency());

        manager.dispatch("beacon off").await.unwrap();
        assert!(!beacon.running());
        assert_eq!(beacon.teardowns.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_command() {
        let manager = ModuleManager::new();
        manager.register(Arc::new(Beacon::new("beacon")));

        let err = manager.dispatch("beacon sideways").await.unwrap_err();
        assert!(matches!(err, Error::UnknownCommand(_)));
    }

    #[tokio::test]
    async fn test_stop_all() {
        let manager = ModuleManager::new();
        let a = Arc::new(Beacon::new("a"));
        let b = Arc::new(Beacon::new("b"));
        let c = Arc::new(Beacon::new("c"));
        manager.register(a.clone());
        manager.register(b.clone());
        manager.register(c.clone());

        manager.dispatch("a on").await.unwrap();
        manager.dispatch("b on").await.unwrap();

        manager.stop_all().await.unwrap();
        assert!(!a.running() && !b.running() && !c.running());
        assert_eq!(a.teardowns.load(Ordering::SeqCst), 1);
        assert_eq!(c.teardowns.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_list_sorted() {
        let manager = ModuleManager::new();
        manager.register(Arc::new(Beacon::new("zeta")));
        manager.register(Arc::new(Beacon::new("alpha")));

        let names: Vec<String> = manager.list().into_iter().map(|m| m.name).collect();
        assert_eq!(names, vec!["alpha", "zeta"]);
        assert_eq!(manager.list()[0].handlers.len(), 2);
    }
}
