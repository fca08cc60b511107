//! Database migration command.
//!
//! Applies the migrations in `crates/server/migrations/`. The server also
//! applies them on startup; this command exists for running them against a
//! database before the server is deployed.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::info;

use super::{CommandError, database_url};

/// Run pending database migrations.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is not set, the connection fails,
/// or a migration fails to apply.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    info!("Connecting to database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    info!("Running migrations...");
    sqlx::migrate!("../server/migrations").run(&pool).await?;

    info!("Migrations complete!");
    Ok(())
}
