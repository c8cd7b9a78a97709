//! Lazy, at-most-once channel establishment.

use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::caller::{Connector, RemoteCaller};
use crate::config::ClientConfig;
use crate::error::Result;

/// Owns the channel to the authority and establishes it on first use.
///
/// The connect attempt runs at most once per manager for its whole
/// lifetime: concurrent first callers all await the same attempt, and the
/// winner's channel is shared. A failed attempt leaves the slot empty, so
/// a later call may try again.
pub struct ConnectionManager {
    config: ClientConfig,
    connector: Arc<dyn Connector>,
    channel: OnceCell<Arc<dyn RemoteCaller>>,
}

impl ConnectionManager {
    /// Create a manager; no connection is attempted yet.
    pub fn new(config: ClientConfig, connector: Arc<dyn Connector>) -> Self {
        Self {
            config,
            connector,
            channel: OnceCell::new(),
        }
    }

    /// The configuration this manager connects with.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The channel to the authority, connecting first if necessary.
    pub async fn channel(&self) -> Result<Arc<dyn RemoteCaller>> {
        let caller = self
            .channel
            .get_or_try_init(|| async {
                debug!(
                    "Connecting to lock authority at {}:{}",
                    self.config.host, self.config.port
                );
                let caller = self.connector.connect(&self.config).await?;
                info!(
                    "Connected to lock authority at {}:{}",
                    self.config.host, self.config.port
                );
                Ok(caller)
            })
            .await?;
        Ok(Arc::clone(caller))
    }
}
