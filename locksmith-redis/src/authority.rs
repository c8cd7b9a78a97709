//! Redis-backed lock authority.

use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use locksmith_client::{protocol, LeaseId, LocksmithError, RemoteCaller, Reply, Result};

/// Default key prefix for all authority state.
pub const DEFAULT_PREFIX: &str = "locksmith";

/// How often a waiting acquire retries against a held lock.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Lock authority backed by Redis.
///
/// Leases live as paired keys under one prefix: `{prefix}:name:{lock}`
/// maps a lock to its lease id and `{prefix}:lease:{id}` maps the id back
/// to the lock. Both carry the validity as their TTL, so Redis expires a
/// lease on its own; grants, extensions and releases run as Lua scripts
/// to stay atomic. Waiting acquires poll, which keeps the adapter honest
/// against any other process granting through the same Redis.
#[derive(Clone)]
pub struct RedisAuthority {
    conn: redis::aio::ConnectionManager,
    prefix: String,
}

impl RedisAuthority {
    /// Connect to Redis at `url`, e.g. `redis://localhost:6379`.
    pub async fn connect(url: &str) -> Result<Self> {
        let client = redis::Client::open(url).map_err(network)?;
        let conn = client.get_connection_manager().await.map_err(network)?;
        debug!("Connected lock authority to Redis");
        Ok(Self::with_connection(conn))
    }

    /// Wrap an existing connection manager.
    pub fn with_connection(conn: redis::aio::ConnectionManager) -> Self {
        Self {
            conn,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }

    /// Use a different key prefix (default `locksmith`).
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// The key prefix in use.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    async fn acquire(&self, args: &[Value]) -> Result<Reply> {
        let call = protocol::AcquireArgs::decode(args)?;

        let deadline = call.wait.map(|wait| Instant::now() + wait);
        loop {
            let id = LeaseId::random();
            if self.try_grant(&call.name, &id, call.validity).await? {
                return Ok(protocol::granted(&call.name, &id));
            }

            match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        self.bump_contended().await;
                        return Ok(protocol::ungranted());
                    }
                    tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
                }
                None => tokio::time::sleep(POLL_INTERVAL).await,
            }
        }
    }

    /// One grant attempt: claim both directions of the mapping in a
    /// single atomic step, with the validity as TTL on both keys.
    async fn try_grant(&self, name: &str, id: &LeaseId, validity: Duration) -> Result<bool> {
        let script = r#"
            if redis.call("exists", KEYS[1]) == 1 then
                return 0
            end
            redis.call("set", KEYS[1], ARGV[1], "PX", ARGV[3])
            redis.call("set", KEYS[2], ARGV[2], "PX", ARGV[3])
            redis.call("incr", ARGV[4])
            return 1
        "#;

        let mut conn = self.conn.clone();
        let granted: i32 = redis::Script::new(script)
            .key(self.name_key(name))
            .key(self.lease_key(id.as_str()))
            .arg(id.as_str())
            .arg(name)
            .arg(validity_millis(validity))
            .arg(self.stats_key("acquired"))
            .invoke_async(&mut conn)
            .await
            .map_err(network)?;
        Ok(granted == 1)
    }

    async fn update(&self, args: &[Value]) -> Result<Reply> {
        let call = protocol::UpdateArgs::decode(args)?;

        // Resolve the lease back to its lock and extend both keys,
        // checking ownership in the same atomic step.
        let script = r#"
            local name = redis.call("get", KEYS[1])
            if not name then
                return 0
            end
            local name_key = ARGV[3] .. ":name:" .. name
            if redis.call("get", name_key) ~= ARGV[1] then
                return 0
            end
            redis.call("pexpire", KEYS[1], ARGV[2])
            redis.call("pexpire", name_key, ARGV[2])
            return 1
        "#;

        let mut conn = self.conn.clone();
        let applied: i32 = redis::Script::new(script)
            .key(self.lease_key(call.id.as_str()))
            .arg(call.id.as_str())
            .arg(validity_millis(call.validity))
            .arg(&self.prefix)
            .invoke_async(&mut conn)
            .await
            .map_err(network)?;

        if applied == 1 {
            Ok(protocol::ack(Some(&call.id)))
        } else {
            Ok(protocol::ack(None))
        }
    }

    async fn release(&self, args: &[Value]) -> Result<Reply> {
        let id = protocol::ReleaseArgs::decode(args)?.id;

        // Resolve the lease back to its lock; it counts as released only
        // if it still owned the name key. A stale lease key is deleted
        // either way.
        let script = r#"
            local name = redis.call("get", KEYS[1])
            if not name then
                return 0
            end
            redis.call("del", KEYS[1])
            local name_key = ARGV[2] .. ":name:" .. name
            if redis.call("get", name_key) ~= ARGV[1] then
                return 0
            end
            redis.call("del", name_key)
            redis.call("incr", ARGV[3])
            return 1
        "#;

        let mut conn = self.conn.clone();
        let applied: i32 = redis::Script::new(script)
            .key(self.lease_key(id.as_str()))
            .arg(id.as_str())
            .arg(&self.prefix)
            .arg(self.stats_key("released"))
            .invoke_async(&mut conn)
            .await
            .map_err(network)?;

        if applied == 1 {
            Ok(protocol::ack(Some(&id)))
        } else {
            Ok(protocol::ack(None))
        }
    }

    async fn statistics(&self) -> Result<Reply> {
        let script = r#"
            return #redis.call("keys", ARGV[1])
        "#;

        let mut conn = self.conn.clone();
        let locks: i64 = redis::Script::new(script)
            .arg(format!("{}:name:*", self.prefix))
            .invoke_async(&mut conn)
            .await
            .map_err(network)?;

        let (acquired, released, contended): (Option<i64>, Option<i64>, Option<i64>) =
            redis::cmd("MGET")
                .arg(self.stats_key("acquired"))
                .arg(self.stats_key("released"))
                .arg(self.stats_key("contended"))
                .query_async(&mut conn)
                .await
                .map_err(network)?;

        Ok(protocol::statistics(json!({
            "locks": locks,
            "acquired": acquired.unwrap_or(0),
            "released": released.unwrap_or(0),
            "contended": contended.unwrap_or(0),
        })))
    }

    /// Best effort counter update.
    async fn bump_contended(&self) {
        let mut conn = self.conn.clone();
        let _: std::result::Result<i64, _> = redis::cmd("INCR")
            .arg(self.stats_key("contended"))
            .query_async(&mut conn)
            .await;
    }

    fn name_key(&self, name: &str) -> String {
        format!("{}:name:{}", self.prefix, name)
    }

    fn lease_key(&self, id: &str) -> String {
        format!("{}:lease:{}", self.prefix, id)
    }

    fn stats_key(&self, counter: &str) -> String {
        format!("{}:stats:{}", self.prefix, counter)
    }
}

#[async_trait]
impl RemoteCaller for RedisAuthority {
    async fn call(&self, method: &str, args: &[Value]) -> Result<Reply> {
        match method {
            protocol::ACQUIRE => self.acquire(args).await,
            protocol::UPDATE => self.update(args).await,
            protocol::RELEASE => self.release(args).await,
            protocol::STATISTICS => self.statistics().await,
            other => Err(LocksmithError::Remote(format!("unknown method: {}", other))),
        }
    }
}

fn network(error: redis::RedisError) -> LocksmithError {
    LocksmithError::Network(error.to_string())
}

/// Validity as a PX argument; Redis rejects a TTL of zero.
fn validity_millis(validity: Duration) -> usize {
    (validity.as_millis().max(1)) as usize
}
