//! Test support for locksmith clients.
//!
//! [`MemoryAuthority`] is a complete in-process implementation of the lock
//! authority contract: exclusive leases, expiry, server-side waiting. Wire
//! real clients to it with [`MemoryConnector`], or grab a ready pair from
//! [`memory_client`].
//!
//! # Examples
//!
//! ```no_run
//! use locksmith_testing::memory_client;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), locksmith_client::LocksmithError> {
//!     let (client, authority) = memory_client();
//!
//!     let lease = client.acquire("orders", Duration::from_secs(30)).await?;
//!     assert!(authority.is_held("orders").await);
//!     lease.release().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod authority;
pub mod connector;

pub use authority::MemoryAuthority;
pub use connector::{client_for, memory_client, MemoryConnector};
