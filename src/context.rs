use crate::config::types::IdentdConfig;
use crate::connections::ConnectionRegistry;
use crate::ident::resolver::Resolver;
use crate::system::SystemInfo;
use std::sync::{Arc, RwLock};

/// Current identd settings. Readers take a snapshot per request; a reload
/// swaps the whole value.
#[derive(Debug)]
pub struct SharedConfig {
    inner: RwLock<Arc<IdentdConfig>>,
}

impl SharedConfig {
    pub fn new(config: IdentdConfig) -> Self {
        Self {
            inner: RwLock::new(Arc::new(config)),
        }
    }

    pub fn snapshot(&self) -> Arc<IdentdConfig> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, config: IdentdConfig) {
        let mut guard = match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = Arc::new(config);
    }
}

/// Shared identd context, replacing scattered Arc parameters
pub struct IdentContext {
    pub config: Arc<SharedConfig>,
    pub registry: Arc<ConnectionRegistry>,
    pub system: Arc<dyn SystemInfo>,
    pub resolver: Resolver,
}

impl IdentContext {
    pub fn new(
        config: Arc<SharedConfig>,
        registry: Arc<ConnectionRegistry>,
        system: Arc<dyn SystemInfo>,
    ) -> Self {
        let resolver = Resolver::new(registry.clone(), system.clone());
        Self {
            config,
            registry,
            system,
            resolver,
        }
    }

    /// Build the reply line for one request against the current settings.
    pub fn respond(&self, line: &str) -> String {
        let config = self.config.snapshot();
        crate::ident::protocol::respond(line, |ports| self.resolver.resolve(&config, ports))
    }
}
