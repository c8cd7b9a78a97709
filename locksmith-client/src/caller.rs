//! Transport abstraction: named remote calls against the lock authority.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

use crate::config::ClientConfig;
use crate::error::Result;

/// A reply from the authority: one or more positional result tuples.
///
/// Every authority operation answers with this shape; only the first tuple
/// is ever consulted by the client. Decoding into typed records happens in
/// [`crate::protocol`], once, at this boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    rows: Vec<Vec<Value>>,
}

impl Reply {
    /// Create a reply from raw result tuples.
    pub fn new(rows: Vec<Vec<Value>>) -> Self {
        Self { rows }
    }

    /// The first result tuple, if any.
    pub fn first(&self) -> Option<&[Value]> {
        self.rows.first().map(Vec::as_slice)
    }

    /// All result tuples.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }
}

/// A ready-to-use channel to the lock authority.
///
/// The capability is minimal on purpose: perform a named remote call with
/// positional arguments and hand back the reply tuples. Implementations
/// must be shareable across tasks; the client issues calls concurrently
/// without external synchronization.
#[async_trait]
pub trait RemoteCaller: Send + Sync {
    /// Perform one named remote call.
    async fn call(&self, method: &str, args: &[Value]) -> Result<Reply>;
}

/// Constructs the channel to the authority from the client configuration.
///
/// The client holds a connector and invokes it lazily, at most once per
/// client instance (see [`crate::connection::ConnectionManager`]).
/// Substituting the transport means substituting the connector; an
/// implementation that lacks the required capability is rejected by the
/// type system rather than probed at runtime.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Establish a channel to the authority described by `config`.
    async fn connect(&self, config: &ClientConfig) -> Result<Arc<dyn RemoteCaller>>;
}

/// Connector that hands out an existing channel.
///
/// Useful for injecting a pre-connected or embedded authority, e.g. an
/// in-process simulated one in tests.
pub struct StaticConnector {
    caller: Arc<dyn RemoteCaller>,
}

impl StaticConnector {
    /// Wrap an existing channel.
    pub fn new(caller: Arc<dyn RemoteCaller>) -> Self {
        Self { caller }
    }
}

#[async_trait]
impl Connector for StaticConnector {
    async fn connect(&self, _config: &ClientConfig) -> Result<Arc<dyn RemoteCaller>> {
        Ok(Arc::clone(&self.caller))
    }
}
