//! Product catalog endpoint.

use axum::Json;
use axum::extract::State;

use crate::db::ProductRepository;
use crate::error::AppError;
use crate::models::Product;
use crate::state::AppState;

/// List the full product catalog as JSON.
///
/// An empty catalog is a successful response with an empty array.
///
/// # Errors
///
/// Returns `AppError::Database` when the catalog query fails.
pub async fn index(State(state): State<AppState>) -> Result<Json<Vec<Product>>, AppError> {
    let products = ProductRepository::new(state.pool()).list_all().await?;
    Ok(Json(products))
}
