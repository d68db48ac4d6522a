//! # session-store
//!
//! Pluggable session stores with background expiration sweeping.
//!
//! A [`Session`] is an identified bag of JSON values with an expiration
//! instant. A [`SessionStore`] persists sessions and removes them once they
//! expire; every backend honours the same contract, so callers can swap one
//! for another without behavioural surprises.
//!
//! ## Features
//!
//! - **In-memory store**: always available, for development and tests
//! - **Redis store** (`redis-store`, default): one hash per session plus an expiry index
//! - **SQLite store** (`sqlite-store`, default): one row per session in a `session` table
//! - **Background sweeping**: each store runs one sweeper task that deletes expired
//!   sessions once per max age, and [`SessionStore::close`] waits for it to exit
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use session_store::{MemoryStore, Session, SessionStore};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), session_store::SessionError> {
//!     let store = MemoryStore::new(3600)?;
//!
//!     let session = Session::new("user-42");
//!     session.set("views", 1);
//!     store.save(&session).await?;
//!
//!     let loaded = store.load("user-42").await?.expect("just saved");
//!     assert_eq!(loaded.get_as::<i32>("views"), Some(1));
//!
//!     store.close().await
//! }
//! ```

pub mod config;
pub mod error;
pub mod session;
pub mod store;
mod sweeper;

pub use config::StoreConfig;
pub use error::{Operation, SessionError};
pub use session::{Session, SessionData};
pub use store::{MemoryStore, SessionStore};

#[cfg(feature = "redis-store")]
pub use store::RedisStore;

#[cfg(feature = "sqlite-store")]
pub use store::SqliteStore;
