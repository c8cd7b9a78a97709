//! In-memory lock authority (for testing)

use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

use locksmith_client::{protocol, LeaseId, LocksmithError, RemoteCaller, Reply, Result};

/// How often a blocked acquire rechecks the table for an expired holder.
const RECHECK: Duration = Duration::from_millis(10);

/// In-memory lock authority (for testing/development).
///
/// Implements the full authority contract in-process: at most one live
/// lease per lock, expiry by validity, and server-side waiting for
/// contended acquires. Clones share state, so several clients can contend
/// for the same locks within one test.
#[derive(Clone)]
pub struct MemoryAuthority {
    inner: Arc<Inner>,
}

struct Inner {
    table: Mutex<LockTable>,
    freed: Notify,
    acquired: AtomicU64,
    released: AtomicU64,
    expired: AtomicU64,
    contended: AtomicU64,
}

#[derive(Default)]
struct LockTable {
    names: HashMap<String, Grant>,
    leases: HashMap<LeaseId, String>,
}

struct Grant {
    id: LeaseId,
    expires_at: Instant,
}

impl LockTable {
    /// Drop every grant whose validity ran out.
    fn sweep(&mut self, expired: &AtomicU64) {
        let now = Instant::now();
        let gone: Vec<String> = self
            .names
            .iter()
            .filter(|(_, grant)| grant.expires_at <= now)
            .map(|(name, _)| name.clone())
            .collect();

        for name in gone {
            if let Some(grant) = self.names.remove(&name) {
                self.leases.remove(&grant.id);
                expired.fetch_add(1, Ordering::Relaxed);
            }
        }
    }
}

impl MemoryAuthority {
    /// Create an authority with no locks held.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                table: Mutex::new(LockTable::default()),
                freed: Notify::new(),
                acquired: AtomicU64::new(0),
                released: AtomicU64::new(0),
                expired: AtomicU64::new(0),
                contended: AtomicU64::new(0),
            }),
        }
    }

    /// Number of locks currently held.
    pub async fn lock_count(&self) -> usize {
        let mut table = self.inner.table.lock().await;
        table.sweep(&self.inner.expired);
        table.names.len()
    }

    /// Whether `name` is currently held.
    pub async fn is_held(&self, name: &str) -> bool {
        let mut table = self.inner.table.lock().await;
        table.sweep(&self.inner.expired);
        table.names.contains_key(name)
    }

    /// Drop all leases, waking any blocked acquires.
    pub async fn clear(&self) {
        let mut table = self.inner.table.lock().await;
        table.names.clear();
        table.leases.clear();
        self.inner.freed.notify_waiters();
    }

    async fn acquire(&self, args: &[Value]) -> Result<Reply> {
        let call = protocol::AcquireArgs::decode(args)?;

        let deadline = call.wait.map(|wait| Instant::now() + wait);
        loop {
            {
                let mut table = self.inner.table.lock().await;
                table.sweep(&self.inner.expired);
                if !table.names.contains_key(&call.name) {
                    let id = LeaseId::random();
                    table.names.insert(
                        call.name.clone(),
                        Grant {
                            id: id.clone(),
                            expires_at: Instant::now() + call.validity,
                        },
                    );
                    table.leases.insert(id.clone(), call.name.clone());
                    self.inner.acquired.fetch_add(1, Ordering::Relaxed);
                    return Ok(protocol::granted(&call.name, &id));
                }
            }

            let recheck = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.inner.contended.fetch_add(1, Ordering::Relaxed);
                        return Ok(protocol::ungranted());
                    }
                    RECHECK.min(deadline - now)
                }
                None => RECHECK,
            };

            // A release wakes waiters early; the tick catches expiries.
            tokio::select! {
                _ = self.inner.freed.notified() => {}
                _ = tokio::time::sleep(recheck) => {}
            }
        }
    }

    async fn update(&self, args: &[Value]) -> Result<Reply> {
        let call = protocol::UpdateArgs::decode(args)?;

        let mut table = self.inner.table.lock().await;
        table.sweep(&self.inner.expired);
        match table.leases.get(&call.id).cloned() {
            Some(name) => {
                if let Some(grant) = table.names.get_mut(&name) {
                    grant.expires_at = Instant::now() + call.validity;
                }
                Ok(protocol::ack(Some(&call.id)))
            }
            None => Ok(protocol::ack(None)),
        }
    }

    async fn release(&self, args: &[Value]) -> Result<Reply> {
        let id = protocol::ReleaseArgs::decode(args)?.id;

        let mut table = self.inner.table.lock().await;
        table.sweep(&self.inner.expired);
        match table.leases.remove(&id) {
            Some(name) => {
                table.names.remove(&name);
                self.inner.released.fetch_add(1, Ordering::Relaxed);
                self.inner.freed.notify_waiters();
                Ok(protocol::ack(Some(&id)))
            }
            None => Ok(protocol::ack(None)),
        }
    }

    async fn statistics(&self) -> Reply {
        let mut table = self.inner.table.lock().await;
        table.sweep(&self.inner.expired);
        protocol::statistics(json!({
            "locks": table.names.len(),
            "acquired": self.inner.acquired.load(Ordering::Relaxed),
            "released": self.inner.released.load(Ordering::Relaxed),
            "expired": self.inner.expired.load(Ordering::Relaxed),
            "contended": self.inner.contended.load(Ordering::Relaxed),
        }))
    }
}

impl Default for MemoryAuthority {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteCaller for MemoryAuthority {
    async fn call(&self, method: &str, args: &[Value]) -> Result<Reply> {
        match method {
            protocol::ACQUIRE => self.acquire(args).await,
            protocol::UPDATE => self.update(args).await,
            protocol::RELEASE => self.release(args).await,
            protocol::STATISTICS => Ok(self.statistics().await),
            other => Err(LocksmithError::Remote(format!("unknown method: {}", other))),
        }
    }
}
