// Locksmith - a client for distributed lock-lease authorities
//
// This library hands out time-limited leases on named locks. The authority
// is the single arbiter: it grants at most one live lease per lock, runs
// expirations, and does all waiting server-side.

// Re-export the core client
pub use locksmith_client::*;

// Re-export optional crates
#[cfg(feature = "redis")]
pub use locksmith_redis;

#[cfg(feature = "testing")]
pub use locksmith_testing;

// Prelude for common imports
pub mod prelude {
    pub use crate::{
        ClientConfig,
        Connector,
        Lease,
        LeaseId,
        Locksmith,
        LocksmithBuilder,
        LocksmithError,
        RemoteCaller,
        Reply,
    };

    #[cfg(feature = "redis")]
    pub use crate::locksmith_redis::{RedisAuthority, RedisConnector};

    #[cfg(feature = "testing")]
    pub use crate::locksmith_testing::{MemoryAuthority, MemoryConnector};
}
