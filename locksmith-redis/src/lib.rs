//! Redis-backed lock authority for locksmith clients.
//!
//! [`RedisAuthority`] implements the full authority contract on top of
//! Redis: atomic grants via Lua, validity as key TTL, and polling for
//! waiting acquires. Run the client against it with [`RedisConnector`],
//! which reads the Redis address and credentials from the client
//! configuration.
//!
//! # Examples
//!
//! ```no_run
//! use locksmith_client::Locksmith;
//! use locksmith_redis::RedisConnector;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), locksmith_client::LocksmithError> {
//!     let client = Locksmith::builder("localhost", 6379)
//!         .with_connector(Arc::new(RedisConnector::new()))
//!         .build()?;
//!
//!     if let Some(lease) = client.try_acquire("reports", Duration::from_secs(30)).await? {
//!         // ... exclusive work ...
//!         lease.release().await?;
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod authority;
pub mod connector;

pub use authority::{RedisAuthority, DEFAULT_PREFIX};
pub use connector::RedisConnector;
