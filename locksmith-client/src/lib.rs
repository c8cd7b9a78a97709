//! Client for a remote lock authority handing out time-limited leases.
//!
//! A lease grants exclusive use of a named lock for a validity period.
//! The authority is the single arbiter: it grants at most one live lease
//! per lock, expires leases whose validity runs out, and does all waiting
//! server-side. This client speaks the protocol and exposes the four
//! operations: acquire, update, release and statistics.
//!
//! Losing a race for a lock and touching a lease that already expired are
//! ordinary outcomes, reported as `None` and `false`. Errors are reserved
//! for broken configuration, transport failures and protocol violations.
//!
//! # Examples
//!
//! ```no_run
//! use locksmith_client::{ClientConfig, Locksmith};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), locksmith_client::LocksmithError> {
//!     let client = Locksmith::new(ClientConfig::new("lock-authority", 33013))?;
//!
//!     if let Some(lease) = client.try_acquire("reports", Duration::from_secs(30)).await? {
//!         // ... exclusive work ...
//!         lease.release().await?;
//!     }
//!
//!     Ok(())
//! }
//! ```
//!
//! Waiting for a contended lock, with credentials:
//!
//! ```no_run
//! use locksmith_client::{Locksmith, LocksmithError};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), LocksmithError> {
//!     let client = Locksmith::builder("lock-authority", 33013)
//!         .with_credentials("svc-reports", "secret")
//!         .with_timeout(Duration::from_secs(2))
//!         .build()?;
//!
//!     let wait = Duration::from_secs(10);
//!     match client.acquire_timeout("nightly-rollup", Duration::from_secs(300), wait).await? {
//!         Some(lease) => {
//!             // ... run the rollup ...
//!             lease.release().await?;
//!         }
//!         None => println!("another worker holds the rollup lock"),
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod caller;
pub mod client;
pub mod config;
pub mod connection;
pub mod error;
pub mod http;
pub mod lease;
pub mod protocol;

pub use caller::{Connector, RemoteCaller, Reply, StaticConnector};
pub use client::{Locksmith, LocksmithBuilder};
pub use config::{ClientConfig, DEFAULT_TIMEOUT};
pub use connection::ConnectionManager;
pub use error::{LocksmithError, Result};
pub use http::{HttpCaller, HttpConnector};
pub use lease::{Lease, LeaseId};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::caller::{Connector, RemoteCaller, Reply};
    pub use crate::client::{Locksmith, LocksmithBuilder};
    pub use crate::config::ClientConfig;
    pub use crate::error::{LocksmithError, Result};
    pub use crate::lease::{Lease, LeaseId};
}
