//! Postgres-backed implementation of the assembler's lookup capability.

use async_trait::async_trait;
use sqlx::PgPool;

use paperslip_core::{Email, ProductId, UserId};

use crate::db::{ProductRepository, PurchaseRepository, RepositoryError, UserRepository};
use crate::models::{Product, Purchase, User};
use crate::receipt::document::ReceiptStore;

/// [`ReceiptStore`] over the live database, delegating to the repositories.
#[derive(Clone)]
pub struct PgReceiptStore {
    pool: PgPool,
}

impl PgReceiptStore {
    /// Create a store over a connection pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReceiptStore for PgReceiptStore {
    async fn find_user_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        UserRepository::new(&self.pool).find_by_email(email).await
    }

    async fn find_purchases_by_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<Purchase>, RepositoryError> {
        PurchaseRepository::new(&self.pool)
            .list_by_user(user_id)
            .await
    }

    async fn find_product(&self, product_id: ProductId) -> Result<Option<Product>, RepositoryError> {
        ProductRepository::new(&self.pool)
            .find_by_id(product_id)
            .await
    }
}
