//! Database operations for `PostgreSQL`.
//!
//! ## Tables
//!
//! - `users` - Registered users (receipt recipients)
//! - `products` - Product catalog
//! - `purchases` - Purchase events (`user_id` → `users`, `product_id` → `products`)
//!
//! The receipt pipeline only ever reads from these tables.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/server/migrations/`, run on server
//! startup and via:
//! ```bash
//! cargo run -p paperslip-cli -- migrate
//! ```

pub mod products;
pub mod purchases;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use products::ProductRepository;
pub use purchases::PurchaseRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
