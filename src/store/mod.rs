//! Session store implementations

mod memory;
mod traits;

pub use memory::MemoryStore;
pub use traits::SessionStore;

#[cfg(feature = "redis-store")]
mod redis_store;

#[cfg(feature = "redis-store")]
pub use redis_store::RedisStore;

#[cfg(feature = "sqlite-store")]
mod sqlite_store;

#[cfg(feature = "sqlite-store")]
pub use sqlite_store::SqliteStore;

#[cfg(any(feature = "redis-store", feature = "sqlite-store"))]
use chrono::{DateTime, TimeZone, Utc};

/// Expiration as stored by the persistent backends (unix milliseconds)
#[cfg(any(feature = "redis-store", feature = "sqlite-store"))]
pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

#[cfg(any(feature = "redis-store", feature = "sqlite-store"))]
pub(crate) fn from_millis(millis: i64) -> DateTime<Utc> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}
