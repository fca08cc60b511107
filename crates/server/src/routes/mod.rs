//! HTTP route handlers for the receipt service.
//!
//! # Route Structure
//!
//! ```text
//! POST /send-receipt-mail-by-csv - Bulk receipt dispatch from a CSV upload
//! GET  /products                 - Product catalog as JSON
//! GET  /health                   - Liveness check
//! GET  /health/ready             - Readiness check (database reachable)
//! ```

pub mod health;
pub mod products;
pub mod receipts;

use axum::{
    Router,
    routing::{get, post},
};

use crate::state::AppState;

/// Create all routes for the server.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/send-receipt-mail-by-csv", post(receipts::send_by_csv))
        .route("/products", get(products::index))
        .route("/health", get(health::liveness))
        .route("/health/ready", get(health::readiness))
}
