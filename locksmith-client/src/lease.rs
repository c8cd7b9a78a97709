//! Lease identifiers and the client-side lease handle.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use crate::client::Locksmith;
use crate::error::Result;

/// Unique identifier of a lease, assigned by the authority.
///
/// Opaque to the client: it is carried back verbatim in update and release
/// calls and never parsed. Authority implementations mint fresh ones with
/// [`LeaseId::random`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaseId(String);

impl LeaseId {
    /// Mint a fresh, globally unique identifier.
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for LeaseId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for LeaseId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl AsRef<str> for LeaseId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LeaseId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A granted lease on a named lock.
///
/// The handle remembers which client granted it, so extending and releasing
/// read naturally at the call site:
///
/// ```rust,ignore
/// if let Some(lease) = client.try_acquire("reports", Duration::from_secs(30)).await? {
///     // ... exclusive work ...
///     lease.release().await?;
/// }
/// ```
///
/// Dropping the handle does nothing; an unreleased lease simply runs out
/// its validity on the authority. Holding the handle past expiry is
/// harmless: later calls through it answer `false`.
#[derive(Clone)]
pub struct Lease {
    name: String,
    id: LeaseId,
    client: Locksmith,
}

impl Lease {
    pub(crate) fn new(name: String, id: LeaseId, client: Locksmith) -> Self {
        Self { name, id, client }
    }

    /// Name of the lock this lease is held under.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identifier of this lease.
    pub fn id(&self) -> &LeaseId {
        &self.id
    }

    /// Extend this lease to stay valid for `validity` from now.
    ///
    /// Returns `false` if the lease already expired or was released; the
    /// exclusivity it granted is gone and must be re-acquired.
    pub async fn update(&self, validity: Duration) -> Result<bool> {
        self.client.update(&self.id, validity).await
    }

    /// Release this lease, making the lock immediately available.
    ///
    /// Returns `false` if the lease already expired or was released.
    pub async fn release(&self) -> Result<bool> {
        self.client.release(&self.id).await
    }
}

impl std::fmt::Debug for Lease {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lease")
            .field("name", &self.name)
            .field("id", &self.id)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_id_round_trips_as_plain_string() {
        let id = LeaseId::from("u-42");
        let encoded = serde_json::to_string(&id).unwrap();
        assert_eq!(encoded, "\"u-42\"");
        let decoded: LeaseId = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, id);
    }

    #[test]
    fn test_random_lease_ids_are_unique() {
        assert_ne!(LeaseId::random(), LeaseId::random());
    }

    #[test]
    fn test_lease_id_display_matches_inner() {
        let id = LeaseId::from("u-42");
        assert_eq!(id.to_string(), "u-42");
        assert_eq!(id.as_str(), "u-42");
    }
}
