//! Read paths: fetch one record, list an owner's records.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    response::IntoResponse,
    Json,
};
use rendia_core::models::{MediaRecord, MediaRecordSummary};
use rendia_core::AppError;
use uuid::Uuid;

use crate::auth::OwnerIdentity;
use crate::error::{ErrorResponse, HttpAppError};
use crate::state::AppState;

/// Fetch one media record with its full versions map.
#[utoipa::path(
    get,
    path = "/api/v1/media/{media_id}",
    tag = "media",
    params(("media_id" = Uuid, Path, description = "Media record id")),
    responses(
        (status = 200, description = "Media record", body = MediaRecord),
        (status = 404, description = "Media not found", body = ErrorResponse),
        (status = 401, description = "Missing owner identity", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(owner_id = %owner.0, media_id = %media_id))]
pub async fn get_media(
    owner: OwnerIdentity,
    State(state): State<Arc<AppState>>,
    Path(media_id): Path<Uuid>,
) -> Result<impl IntoResponse, HttpAppError> {
    let record = state
        .repository
        .get_owned(owner.0, media_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Media not found: {}", media_id)))?;

    Ok(Json(record))
}

/// List the owner's media records, newest first. Versions maps are omitted
/// from list payloads; fetch a single record for the full map.
#[utoipa::path(
    get,
    path = "/api/v1/media",
    tag = "media",
    responses(
        (status = 200, description = "Media records for the owner", body = [MediaRecordSummary]),
        (status = 401, description = "Missing owner identity", body = ErrorResponse)
    )
)]
#[tracing::instrument(skip(state), fields(owner_id = %owner.0))]
pub async fn list_media(
    owner: OwnerIdentity,
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, HttpAppError> {
    let records = state.repository.list_by_owner(owner.0).await?;
    let summaries: Vec<MediaRecordSummary> = records.iter().map(MediaRecordSummary::from).collect();
    Ok(Json(summaries))
}
