//! Upload confirmation: verify, claim, and detach processing.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use rendia_core::models::MediaStatus;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::OwnerIdentity;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmUploadRequest {
    pub media_id: Uuid,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmUploadResponse {
    pub message: String,
    pub media_id: Uuid,
    pub status: MediaStatus,
}

/// Confirm that the client finished its direct upload. Returns immediately;
/// derivative generation continues in the background and the record's status
/// reflects progress. Confirming the same media twice is harmless.
#[utoipa::path(
    post,
    path = "/api/v1/media/confirm-upload",
    tag = "media",
    request_body = ConfirmUploadRequest,
    responses(
        (status = 200, description = "Processing started (or already underway)", body = ConfirmUploadResponse),
        (status = 400, description = "Upload verification failed", body = ErrorResponse),
        (status = 404, description = "Media not found", body = ErrorResponse),
        (status = 401, description = "Missing owner identity", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state, request), fields(owner_id = %owner.0, media_id = %request.media_id))]
pub async fn confirm_upload(
    owner: OwnerIdentity,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<ConfirmUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let receipt = state.ingest.confirm_upload(owner.0, request.media_id).await?;

    let message = if receipt.accepted {
        "Upload confirmed; processing started".to_string()
    } else {
        format!("Upload already confirmed; status is {}", receipt.status)
    };

    Ok(Json(ConfirmUploadResponse {
        message,
        media_id: receipt.media_id,
        status: receipt.status,
    }))
}
