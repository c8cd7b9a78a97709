//! In-process transport wiring real clients to a [`MemoryAuthority`].

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use locksmith_client::{ClientConfig, Connector, Locksmith, RemoteCaller, Result};

use crate::authority::MemoryAuthority;

/// Connector handing every client a channel to one shared authority.
///
/// Counts how many channels it handed out, which makes it easy to assert
/// that a client connects lazily and only once.
#[derive(Clone)]
pub struct MemoryConnector {
    authority: MemoryAuthority,
    connects: Arc<AtomicUsize>,
}

impl MemoryConnector {
    /// Create a connector for `authority`.
    pub fn new(authority: MemoryAuthority) -> Self {
        Self {
            authority,
            connects: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of channels handed out so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// The authority behind this connector.
    pub fn authority(&self) -> &MemoryAuthority {
        &self.authority
    }
}

#[async_trait]
impl Connector for MemoryConnector {
    async fn connect(&self, _config: &ClientConfig) -> Result<Arc<dyn RemoteCaller>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(self.authority.clone()))
    }
}

/// A client wired to a fresh in-memory authority.
///
/// The authority is returned alongside the client so tests can inspect
/// lock state directly or wire up further contending clients.
pub fn memory_client() -> (Locksmith, MemoryAuthority) {
    let authority = MemoryAuthority::new();
    let client = client_for(&authority);
    (client, authority)
}

/// A client wired to an existing in-memory authority.
pub fn client_for(authority: &MemoryAuthority) -> Locksmith {
    Locksmith::builder("memory", 1)
        .with_connector(Arc::new(MemoryConnector::new(authority.clone())))
        .build()
        .expect("in-memory client config is valid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_memory_client_round_trip() {
        let (client, authority) = memory_client();

        let lease = client
            .try_acquire("orders", Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        assert!(authority.is_held("orders").await);

        assert!(lease.release().await.unwrap());
        assert!(!authority.is_held("orders").await);
    }

    #[tokio::test]
    async fn test_clients_share_the_authority() {
        let (first, authority) = memory_client();
        let second = client_for(&authority);

        let lease = first
            .try_acquire("orders", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(lease.is_some());

        let contended = second
            .try_acquire("orders", Duration::from_secs(30))
            .await
            .unwrap();
        assert!(contended.is_none());
    }

    #[tokio::test]
    async fn test_connector_reports_channel_count() {
        let authority = MemoryAuthority::new();
        let connector = MemoryConnector::new(authority);
        let client = Locksmith::builder("memory", 1)
            .with_connector(Arc::new(connector.clone()))
            .build()
            .unwrap();

        assert_eq!(connector.connect_count(), 0);
        client.try_acquire("a", Duration::from_secs(1)).await.unwrap();
        client.try_acquire("b", Duration::from_secs(1)).await.unwrap();
        assert_eq!(connector.connect_count(), 1);
    }
}
