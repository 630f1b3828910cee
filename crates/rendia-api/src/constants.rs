//! API-wide constants.

/// Route prefix for the media API.
pub const API_PREFIX: &str = "/api/v1/media";

/// Header carrying the owner identity asserted by the upstream gateway.
pub const OWNER_ID_HEADER: &str = "x-owner-id";

/// Request body size cap. Bodies here are small JSON; media bytes go
/// directly to the object store via presigned URLs.
pub const MAX_BODY_BYTES: usize = 64 * 1024;
