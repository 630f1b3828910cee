//! Deletion endpoint.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use serde::Serialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::OwnerIdentity;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FailedObjectDelete {
    pub key: String,
    pub error: String,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeleteMediaResponse {
    pub id: Uuid,
    /// Storage keys removed from the object store.
    pub deleted: Vec<String>,
    /// Per-key delete failures. The record is gone either way; these
    /// objects await an out-of-band sweep.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<FailedObjectDelete>,
}

/// Delete a media record and every object it references. Object deletes are
/// best-effort and reported per key; the record is removed regardless.
#[utoipa::path(
    delete,
    path = "/api/v1/media/{media_id}",
    tag = "media",
    params(("media_id" = Uuid, Path, description = "Media record id")),
    responses(
        (status = 200, description = "Media deleted", body = DeleteMediaResponse),
        (status = 404, description = "Media not found", body = ErrorResponse),
        (status = 401, description = "Missing owner identity", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(owner_id = %owner.0, media_id = %media_id))]
pub async fn delete_media(
    owner: OwnerIdentity,
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let report = state.ingest.delete_media(owner.0, media_id).await?;

    Ok(Json(DeleteMediaResponse {
        id: report.media_id,
        deleted: report.deleted,
        failed: report
            .failed
            .into_iter()
            .map(|(key, error)| FailedObjectDelete { key, error })
            .collect(),
    }))
}
