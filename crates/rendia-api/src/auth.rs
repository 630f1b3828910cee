//! Owner identity extraction.
//!
//! Authentication is a collaborator concern: the upstream gateway validates
//! credentials and asserts the caller's identity in a trusted header. This
//! extractor parses that header; every handler then relies on repository
//! ownership checks for authorization.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use rendia_core::AppError;
use uuid::Uuid;

use crate::constants::OWNER_ID_HEADER;
use crate::error::HttpAppError;

/// The authenticated owner on whose behalf the request acts.
#[derive(Debug, Clone, Copy)]
pub struct OwnerIdentity(pub Uuid);

impl<S> FromRequestParts<S> for OwnerIdentity
where
    S: Send + Sync,
{
    type Rejection = HttpAppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(OWNER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| {
                HttpAppError(AppError::Unauthorized(
                    "Missing owner identity header".to_string(),
                ))
            })?;

        let owner_id = Uuid::parse_str(raw).map_err(|_| {
            HttpAppError(AppError::Unauthorized(
                "Owner identity header is not a valid UUID".to_string(),
            ))
        })?;

        Ok(OwnerIdentity(owner_id))
    }
}
