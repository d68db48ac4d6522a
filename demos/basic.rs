//! Basic example: the same session lifecycle against every available store
//!
//! Run with: `cargo run --example basic`
//! Set `REDIS_URL` to include the Redis store.

use session_store::{MemoryStore, Session, SessionError, SessionStore, SqliteStore};
use sqlx::sqlite::SqlitePoolOptions;
use std::time::Duration;

async fn build_stores(max_age: u64) -> Result<Vec<(&'static str, Box<dyn SessionStore>)>, Box<dyn std::error::Error>> {
    let mut stores: Vec<(&'static str, Box<dyn SessionStore>)> = Vec::new();

    stores.push(("memory", Box::new(MemoryStore::new(max_age)?)));

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    SqliteStore::migrate(&pool).await?;
    stores.push(("sqlite", Box::new(SqliteStore::new(pool, max_age)?)));

    #[cfg(feature = "redis-store")]
    if let Ok(url) = std::env::var("REDIS_URL") {
        let client = redis::Client::open(url)?;
        stores.push(("redis", Box::new(session_store::RedisStore::new(client, max_age).await?)));
    }

    Ok(stores)
}

async fn exercise(name: &str, store: &dyn SessionStore) -> Result<(), SessionError> {
    let session = Session::new("demo-user");
    session.set("views", 1);
    session.set("theme", "dark");
    store.save(&session).await?;
    println!("[{}] saved, expires at {:?}", name, session.expires_at());

    if let Some(loaded) = store.load("demo-user").await? {
        let views = loaded.get_as::<i32>("views").unwrap_or(0);
        loaded.set("views", views + 1);
        loaded.unset("theme");
        store.renew(&loaded).await?;
        println!("[{}] renewed with data {:?}", name, loaded.data());
    }

    println!("[{}] has before expiry: {}", name, store.has("demo-user").await?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let stores = build_stores(1).await?;
    for (name, store) in &stores {
        exercise(name, store.as_ref()).await?;
    }

    // Past max age plus one sweep interval every store has dropped the session.
    tokio::time::sleep(Duration::from_secs(2)).await;

    for (name, store) in &stores {
        println!("[{}] has after expiry: {}", name, store.has("demo-user").await?);
        store.close().await?;
    }

    Ok(())
}
