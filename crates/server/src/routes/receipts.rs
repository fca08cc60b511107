//! Bulk receipt dispatch endpoint.

use axum::extract::{Multipart, State};
use axum::http::StatusCode;

use crate::error::AppError;
use crate::state::AppState;

/// Multipart field name carrying the CSV upload.
const FILE_FIELD: &str = "file";

/// Dispatch receipt mail for every recipient in the uploaded CSV.
///
/// Expects a multipart body with the CSV under a `file` field. Responds
/// 400 when the upload is missing or fails validation; otherwise 204 once
/// every recipient has been processed. Per-recipient failures are logged,
/// not reflected in the status code, so the caller cannot distinguish a
/// fully from a partially delivered batch.
///
/// # Errors
///
/// Returns `AppError::BadRequest` when no `file` field is present and
/// `AppError::Csv` when the CSV fails validation.
pub async fn send_by_csv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<StatusCode, AppError> {
    let mut csv_bytes = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(format!("Parameter invalid: {e}")))?
    {
        if field.name() == Some(FILE_FIELD) {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| AppError::BadRequest(format!("Parameter invalid: {e}")))?;
            csv_bytes = Some(bytes);
            break;
        }
    }

    let csv_bytes = csv_bytes.ok_or_else(|| AppError::BadRequest("Parameter invalid".to_string()))?;

    let outcomes = state.dispatcher().dispatch(&csv_bytes).await?;

    tracing::info!(
        recipients = outcomes.len(),
        failed = outcomes.iter().filter(|o| !o.success).count(),
        "bulk receipt dispatch finished"
    );

    Ok(StatusCode::NO_CONTENT)
}
