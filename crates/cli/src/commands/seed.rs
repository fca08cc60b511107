//! Seed the database with demo users, products, and purchases.
//!
//! Idempotent: rows are keyed by fixed IDs and skipped when already
//! present, so the command can run repeatedly against the same database.

use secrecy::ExposeSecret;
use sqlx::PgPool;
use tracing::info;

use super::{CommandError, database_url};

struct SeedUser {
    id: i32,
    name: &'static str,
    email: &'static str,
}

struct SeedProduct {
    id: i32,
    name: &'static str,
    price: i64,
    description: &'static str,
}

struct SeedPurchase {
    user_id: i32,
    product_id: i32,
    quantity: i32,
    total_price: i64,
}

const USERS: &[SeedUser] = &[
    SeedUser {
        id: 1,
        name: "Hong Gipyo",
        email: "honggipyo@example.com",
    },
    SeedUser {
        id: 2,
        name: "Gipyo Hong",
        email: "gipyo@example.com",
    },
    SeedUser {
        id: 3,
        name: "Gipyo",
        email: "hgoeshard@gmail.com",
    },
];

const PRODUCTS: &[SeedProduct] = &[
    SeedProduct {
        id: 1,
        name: "ワイヤレスマウス",
        price: 2500,
        description: "使いやすいワイヤレスマウス",
    },
    SeedProduct {
        id: 2,
        name: "メカニカルキーボード",
        price: 8500,
        description: "高品質な打鍵感を実現",
    },
    SeedProduct {
        id: 3,
        name: "ワイヤレスマウス",
        price: 2500,
        description: "使いやすいワイヤレスマウス",
    },
];

const PURCHASES: &[SeedPurchase] = &[
    SeedPurchase {
        user_id: 1,
        product_id: 1,
        quantity: 2,
        total_price: 5000,
    },
    SeedPurchase {
        user_id: 2,
        product_id: 2,
        quantity: 1,
        total_price: 8500,
    },
    SeedPurchase {
        user_id: 3,
        product_id: 3,
        quantity: 1,
        total_price: 2500,
    },
];

/// Insert the demo data set.
///
/// # Errors
///
/// Returns an error if `DATABASE_URL` is not set, the connection fails,
/// or an insert fails.
pub async fn run() -> Result<(), CommandError> {
    let database_url = database_url()?;

    info!("Connecting to database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    info!("Seeding users...");
    for user in USERS {
        sqlx::query(
            r"
            INSERT INTO users (id, name, email)
            VALUES ($1, $2, $3)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(user.id)
        .bind(user.name)
        .bind(user.email)
        .execute(&pool)
        .await?;
    }

    info!("Seeding products...");
    for product in PRODUCTS {
        sqlx::query(
            r"
            INSERT INTO products (id, name, price, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(product.id)
        .bind(product.name)
        .bind(product.price)
        .bind(product.description)
        .execute(&pool)
        .await?;
    }

    info!("Seeding purchases...");
    for purchase in PURCHASES {
        // No natural key; skip when the user already has this purchase.
        sqlx::query(
            r"
            INSERT INTO purchases (user_id, product_id, quantity, total_price)
            SELECT $1, $2, $3, $4
            WHERE NOT EXISTS (
                SELECT 1 FROM purchases WHERE user_id = $1 AND product_id = $2
            )
            ",
        )
        .bind(purchase.user_id)
        .bind(purchase.product_id)
        .bind(purchase.quantity)
        .bind(purchase.total_price)
        .execute(&pool)
        .await?;
    }

    // Sequences were bypassed by explicit IDs; realign them.
    sqlx::query("SELECT setval(pg_get_serial_sequence('users', 'id'), (SELECT MAX(id) FROM users))")
        .execute(&pool)
        .await?;
    sqlx::query(
        "SELECT setval(pg_get_serial_sequence('products', 'id'), (SELECT MAX(id) FROM products))",
    )
    .execute(&pool)
    .await?;

    info!("Seeding complete!");
    Ok(())
}
