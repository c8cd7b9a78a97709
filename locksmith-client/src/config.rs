//! Client configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{LocksmithError, Result};

/// Default socket-level round-trip timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(1);

/// Configuration for a lock authority client.
///
/// All parameters are fixed when the client is constructed and immutable
/// thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Authority host (non-empty, required).
    pub host: String,
    /// Authority port (nonzero, required).
    pub port: u16,
    /// Optional username.
    #[serde(default)]
    pub user: Option<String>,
    /// Optional password.
    #[serde(default)]
    pub password: Option<String>,
    /// Socket-level round-trip timeout applied to each remote call.
    ///
    /// This caps one round trip, not a whole blocking acquire: the bundled
    /// transports extend the per-call deadline by any wait budget forwarded
    /// with an acquire.
    #[serde(with = "duration_secs", default = "default_timeout")]
    pub timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl ClientConfig {
    /// Create a configuration for the given authority address.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            user: None,
            password: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Set the credentials.
    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self.password = Some(password.into());
        self
    }

    /// Set the socket-level round-trip timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Load configuration from environment variables.
    ///
    /// Recognized: `LOCKSMITH_HOST`, `LOCKSMITH_PORT`, `LOCKSMITH_USER`,
    /// `LOCKSMITH_PASSWORD`, `LOCKSMITH_TIMEOUT_SECS`. Unset values are left
    /// at their defaults; validation happens when the client is built.
    pub fn from_env() -> Self {
        let mut config = Self::new(
            std::env::var("LOCKSMITH_HOST").unwrap_or_default(),
            0,
        );

        if let Ok(port) = std::env::var("LOCKSMITH_PORT")
            && let Ok(port) = port.parse()
        {
            config.port = port;
        }

        if let Ok(user) = std::env::var("LOCKSMITH_USER") {
            config.user = Some(user);
        }

        if let Ok(password) = std::env::var("LOCKSMITH_PASSWORD") {
            config.password = Some(password);
        }

        if let Ok(secs) = std::env::var("LOCKSMITH_TIMEOUT_SECS")
            && let Ok(secs) = secs.parse::<f64>()
            && let Ok(timeout) = Duration::try_from_secs_f64(secs)
            && !timeout.is_zero()
        {
            config.timeout = timeout;
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(LocksmithError::Config("host must not be empty".to_string()));
        }
        if self.port == 0 {
            return Err(LocksmithError::Config("port must be nonzero".to_string()));
        }
        Ok(())
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs)
            .map_err(|_| serde::de::Error::custom("timeout must be a non-negative number of seconds"))
    }
}
