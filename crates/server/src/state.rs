//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::receipt::{ChromiumRenderer, Dispatcher, PgReceiptStore};
use crate::services::{MailError, SmtpMailer};

/// The production dispatcher wiring: Postgres lookups, a Chromium
/// renderer, and SMTP delivery.
pub type AppDispatcher = Dispatcher<PgReceiptStore, ChromiumRenderer, SmtpMailer>;

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    dispatcher: AppDispatcher,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the SMTP mailer cannot be configured.
    pub fn new(config: AppConfig, pool: PgPool) -> Result<Self, MailError> {
        let dispatcher = Dispatcher::new(
            PgReceiptStore::new(pool.clone()),
            ChromiumRenderer::new(&config.renderer),
            SmtpMailer::new(&config.email)?,
        );

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                dispatcher,
            }),
        })
    }

    /// Get a reference to the application configuration.
    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the receipt dispatcher.
    #[must_use]
    pub fn dispatcher(&self) -> &AppDispatcher {
        &self.inner.dispatcher
    }
}
