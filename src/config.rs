//! Store configuration

use std::time::Duration;

use crate::error::SessionError;

/// Largest accepted max age (100 years)
const MAX_AGE_LIMIT: u64 = 100 * 365 * 24 * 60 * 60;

/// Configuration shared by every session store
#[derive(Clone, Debug)]
pub struct StoreConfig {
    /// Max age in seconds.
    /// Every save/renew sets a session's expiration to now + max age,
    /// and the expiration sweeper runs once per max age.
    pub max_age: u64,

    /// Session key prefix in Redis (default: "sess:")
    pub prefix: String,

    /// Redis sorted set indexing session ids by expiration (default: "sess-expiry")
    pub index_key: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            max_age: 86400,
            prefix: "sess:".to_string(),
            index_key: "sess-expiry".to_string(),
        }
    }
}

impl StoreConfig {
    /// Create a new store configuration with the given max age in seconds
    pub fn new(max_age: u64) -> Self {
        Self {
            max_age,
            ..Default::default()
        }
    }

    /// Set max age in seconds
    pub fn with_max_age(mut self, max_age: u64) -> Self {
        self.max_age = max_age;
        self
    }

    /// Set the session key prefix in Redis (default: "sess:")
    pub fn with_prefix<S: Into<String>>(mut self, prefix: S) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Set the Redis expiration index key (default: "sess-expiry")
    pub fn with_index_key<S: Into<String>>(mut self, index_key: S) -> Self {
        self.index_key = index_key.into();
        self
    }

    /// Get max age as Duration
    pub fn max_age_duration(&self) -> Duration {
        Duration::from_secs(self.max_age)
    }

    /// Get max age as a chrono duration, for computing expirations
    pub(crate) fn max_age_delta(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.max_age.min(MAX_AGE_LIMIT) as i64)
    }

    /// Check the configuration before a store is built from it
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.max_age == 0 {
            return Err(SessionError::InvalidConfig(
                "max_age must be greater than zero".to_string(),
            ));
        }
        if self.max_age > MAX_AGE_LIMIT {
            return Err(SessionError::InvalidConfig(format!(
                "max_age of {} seconds is too large",
                self.max_age
            )));
        }
        if self.prefix.is_empty() {
            return Err(SessionError::InvalidConfig("prefix must not be empty".to_string()));
        }
        if self.index_key.starts_with(&self.prefix) {
            return Err(SessionError::InvalidConfig(format!(
                "index_key {:?} must not start with the session prefix {:?}",
                self.index_key, self.prefix
            )));
        }
        Ok(())
    }
}
