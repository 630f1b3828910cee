//! Upload intake: issue a presigned URL and a pending record.

use std::sync::Arc;

use axum::{extract::State, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::OwnerIdentity;
use crate::error::{ErrorResponse, HttpAppError, ValidatedJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUploadRequest {
    pub filename: String,
    pub mime_type: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    #[serde(default)]
    pub message_id: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUploadResponse {
    pub presigned_url: String,
    pub key: String,
    pub media_id: Uuid,
}

/// Issue a presigned upload URL. The client PUTs the bytes directly to the
/// object store and then calls the confirmation endpoint.
#[utoipa::path(
    post,
    path = "/api/v1/media/presigned-upload-url",
    tag = "media",
    request_body = PresignedUploadRequest,
    responses(
        (status = 200, description = "Upload ticket issued", body = PresignedUploadResponse),
        (status = 400, description = "Unsupported media type", body = ErrorResponse),
        (status = 401, description = "Missing owner identity", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
#[tracing::instrument(
    skip(state, request),
    fields(owner_id = %owner.0, filename = %request.filename, mime_type = %request.mime_type)
)]
pub async fn request_presigned_upload(
    owner: OwnerIdentity,
    State(state): State<Arc<AppState>>,
    ValidatedJson(request): ValidatedJson<PresignedUploadRequest>,
) -> Result<impl IntoResponse, HttpAppError> {
    let ticket = state
        .ingest
        .request_upload(
            owner.0,
            &request.filename,
            &request.mime_type,
            request.conversation_id,
            request.message_id,
        )
        .await?;

    Ok(Json(PresignedUploadResponse {
        presigned_url: ticket.presigned_url,
        key: ticket.storage_key,
        media_id: ticket.media_id,
    }))
}
