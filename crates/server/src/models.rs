//! Domain models backed by the `PostgreSQL` schema.

use chrono::{DateTime, Utc};
use serde::Serialize;

use paperslip_core::{Email, ProductId, PurchaseId, UserId, Yen};

/// A registered user, looked up by email during receipt dispatch.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
}

/// A product in the catalog.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Yen,
    pub description: String,
}

/// One purchase event; many-to-one with [`User`] and [`Product`].
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Purchase {
    pub id: PurchaseId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub total_price: Yen,
    pub purchased_at: DateTime<Utc>,
}

/// A purchase joined with its product, materialized only for receipt
/// rendering; never persisted.
#[derive(Debug, Clone)]
pub struct PurchaseWithProduct {
    pub purchase: Purchase,
    pub product: Product,
}

impl PurchaseWithProduct {
    /// Line subtotal: unit price times quantity.
    #[must_use]
    pub const fn subtotal(&self) -> Yen {
        self.product.price.times(self.purchase.quantity)
    }
}
