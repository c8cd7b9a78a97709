//! The lock-lease client.

use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::caller::Connector;
use crate::config::ClientConfig;
use crate::connection::ConnectionManager;
use crate::error::{LocksmithError, Result};
use crate::http::HttpConnector;
use crate::lease::{Lease, LeaseId};
use crate::protocol;

/// Client for a remote lock authority.
///
/// Cheap to clone; all clones share one lazily established channel. The
/// authority enforces mutual exclusion and lease expiry, the client only
/// speaks the protocol: an acquire that waits does so on the authority,
/// without client-side retries.
#[derive(Clone)]
pub struct Locksmith {
    inner: Arc<LocksmithInner>,
}

struct LocksmithInner {
    connection: ConnectionManager,
}

impl Locksmith {
    /// Create a client using the default HTTP transport.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// use locksmith_client::{ClientConfig, Locksmith};
    /// use std::time::Duration;
    ///
    /// let client = Locksmith::new(ClientConfig::new("lock-authority", 33013))?;
    /// let lease = client.acquire("reports", Duration::from_secs(30)).await?;
    /// ```
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_connector(config, Arc::new(HttpConnector::new()))
    }

    /// Create a client with an explicit transport.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: Arc::new(LocksmithInner {
                connection: ConnectionManager::new(config, connector),
            }),
        })
    }

    /// Create a client from `LOCKSMITH_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env())
    }

    /// Start building a client against `host:port`.
    pub fn builder(host: impl Into<String>, port: u16) -> LocksmithBuilder {
        LocksmithBuilder::new(host, port)
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ClientConfig {
        self.inner.connection.config()
    }

    /// Acquire a lease on `name`, blocking until it is granted.
    ///
    /// The lease stays valid for `validity` unless extended or released.
    pub async fn acquire(&self, name: impl Into<String>, validity: Duration) -> Result<Lease> {
        let name = name.into();
        match self.acquire_with(&name, validity, None).await? {
            Some(lease) => Ok(lease),
            None => Err(LocksmithError::BadReply(format!(
                "authority declined a blocking acquire for lock: {}",
                name
            ))),
        }
    }

    /// Try to acquire a lease on `name` (single attempt).
    ///
    /// Returns `None` if the lock is currently held; losing the race is
    /// not an error.
    pub async fn try_acquire(
        &self,
        name: impl Into<String>,
        validity: Duration,
    ) -> Result<Option<Lease>> {
        let name = name.into();
        self.acquire_with(&name, validity, Some(Duration::ZERO))
            .await
    }

    /// Acquire a lease on `name`, waiting up to `timeout` for it.
    ///
    /// The waiting happens on the authority; no retry traffic crosses the
    /// network. Returns `None` if the lock stayed held for the whole wait.
    pub async fn acquire_timeout(
        &self,
        name: impl Into<String>,
        validity: Duration,
        timeout: Duration,
    ) -> Result<Option<Lease>> {
        let name = name.into();
        self.acquire_with(&name, validity, Some(timeout)).await
    }

    async fn acquire_with(
        &self,
        name: &str,
        validity: Duration,
        wait: Option<Duration>,
    ) -> Result<Option<Lease>> {
        let args = protocol::AcquireArgs {
            name: name.to_string(),
            validity,
            wait,
        }
        .encode();

        let channel = self.inner.connection.channel().await?;
        let reply = channel.call(protocol::ACQUIRE, &args).await?;

        match protocol::decode_acquire(&reply)? {
            Some(grant) => {
                info!("Acquired lease {} on lock: {}", grant.id, grant.name);
                Ok(Some(Lease::new(grant.name, grant.id, self.clone())))
            }
            None => {
                debug!("Failed to acquire lock (already held): {}", name);
                Ok(None)
            }
        }
    }

    /// Extend the lease `id` to stay valid for `validity` from now.
    ///
    /// Returns `false` if the lease is unknown, expired or released.
    pub async fn update(&self, id: &LeaseId, validity: Duration) -> Result<bool> {
        let args = protocol::UpdateArgs {
            id: id.clone(),
            validity,
        }
        .encode();

        let channel = self.inner.connection.channel().await?;
        let reply = channel.call(protocol::UPDATE, &args).await?;

        let applied = protocol::decode_ack(&reply)?;
        if applied {
            debug!("Extended lease: {}", id);
        } else {
            warn!("Failed to extend lease (not held or expired): {}", id);
        }
        Ok(applied)
    }

    /// Release the lease `id`, making its lock immediately available.
    ///
    /// Returns `false` if the lease is unknown, expired or released.
    pub async fn release(&self, id: &LeaseId) -> Result<bool> {
        let args = protocol::ReleaseArgs { id: id.clone() }.encode();

        let channel = self.inner.connection.channel().await?;
        let reply = channel.call(protocol::RELEASE, &args).await?;

        let applied = protocol::decode_ack(&reply)?;
        if applied {
            debug!("Released lease: {}", id);
        } else {
            warn!("Failed to release lease (not held or expired): {}", id);
        }
        Ok(applied)
    }

    /// Fetch the authority's usage counters.
    ///
    /// The record is authority-defined and passed through untyped.
    pub async fn statistics(&self) -> Result<Value> {
        let channel = self.inner.connection.channel().await?;
        let reply = channel.call(protocol::STATISTICS, &[]).await?;
        protocol::decode_statistics(&reply)
    }
}

impl std::fmt::Debug for Locksmith {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let config = self.config();
        f.debug_struct("Locksmith")
            .field("host", &config.host)
            .field("port", &config.port)
            .finish()
    }
}

/// Builder for [`Locksmith`].
pub struct LocksmithBuilder {
    config: ClientConfig,
    connector: Option<Arc<dyn Connector>>,
}

impl LocksmithBuilder {
    /// Start building a client against `host:port`.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            config: ClientConfig::new(host, port),
            connector: None,
        }
    }

    /// Set authentication credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.config = self.config.with_credentials(user, password);
        self
    }

    /// Set the socket timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_timeout(timeout);
        self
    }

    /// Use a custom transport instead of HTTP.
    pub fn with_connector(mut self, connector: Arc<dyn Connector>) -> Self {
        self.connector = Some(connector);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<Locksmith> {
        let connector = self
            .connector
            .unwrap_or_else(|| Arc::new(HttpConnector::new()));
        Locksmith::with_connector(self.config, connector)
    }
}
