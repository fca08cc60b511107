//! Purchase repository for database operations.

use sqlx::PgPool;

use paperslip_core::UserId;

use super::RepositoryError;
use crate::models::Purchase;

/// Repository for purchase database operations.
pub struct PurchaseRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> PurchaseRepository<'a> {
    /// Create a new purchase repository.
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List all purchases for a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_by_user(&self, user_id: UserId) -> Result<Vec<Purchase>, RepositoryError> {
        let purchases = sqlx::query_as::<_, Purchase>(
            r"
            SELECT id, user_id, product_id, quantity, total_price, purchased_at
            FROM purchases
            WHERE user_id = $1
            ORDER BY purchased_at, id
            ",
        )
        .bind(user_id)
        .fetch_all(self.pool)
        .await?;

        Ok(purchases)
    }
}
