use crate::config::ServerConfig;
use crate::relay::{LiveStreamNotifier, NoopNotifier, StreamRegistry};
use std::sync::Arc;

/// Process wide state handed to every connection.  Cloning shares the same registry.
#[derive(Clone)]
pub struct ServerContext {
    pub config: Arc<ServerConfig>,
    pub registry: StreamRegistry,
    pub notifier: Arc<dyn LiveStreamNotifier>,
}

impl ServerContext {
    pub fn new(config: ServerConfig, notifier: Arc<dyn LiveStreamNotifier>) -> ServerContext {
        ServerContext {
            config: Arc::new(config),
            registry: StreamRegistry::new(),
            notifier,
        }
    }

    /// Context for a server nobody needs to hear from when streams go live
    pub fn without_notifier(config: ServerConfig) -> ServerContext {
        ServerContext::new(config, Arc::new(NoopNotifier))
    }
}
