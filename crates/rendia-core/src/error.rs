//! Unified application error type.
//!
//! All layers converge on `AppError`; the API crate maps it to an HTTP
//! response via the `ErrorMetadata` methods so that status codes, machine
//! codes, and log levels are decided in one place.

/// Log level for error reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    /// Expected errors such as validation failures.
    Debug,
    /// Recoverable or client-caused issues worth surfacing.
    Warn,
    /// Unexpected failures.
    Error,
}

/// How an error should be presented over HTTP.
pub trait ErrorMetadata {
    /// HTTP status code to return.
    fn http_status_code(&self) -> u16;

    /// Machine-readable error code (e.g. "NOT_FOUND").
    fn error_code(&self) -> &'static str;

    /// Log level for this error.
    fn log_level(&self) -> LogLevel;

    /// Client-facing message.
    fn client_message(&self) -> String;
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Processing error: {0}")]
    Processing(String),

    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Internal error: {message}")]
    InternalWithSource {
        message: String,
        #[source]
        source: anyhow::Error,
    },
}

impl ErrorMetadata for AppError {
    fn http_status_code(&self) -> u16 {
        match self {
            AppError::UnsupportedMediaType(_)
            | AppError::InvalidInput(_)
            | AppError::BadRequest(_) => 400,
            AppError::Unauthorized(_) => 401,
            AppError::NotFound(_) => 404,
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Processing(_)
            | AppError::Internal(_)
            | AppError::InternalWithSource { .. } => 500,
        }
    }

    fn error_code(&self) -> &'static str {
        match self {
            AppError::Database(_) => "DATABASE_ERROR",
            AppError::Storage(_) => "STORAGE_ERROR",
            AppError::Processing(_) => "PROCESSING_ERROR",
            AppError::UnsupportedMediaType(_) => "UNSUPPORTED_MEDIA_TYPE",
            AppError::InvalidInput(_) => "INVALID_INPUT",
            AppError::BadRequest(_) => "BAD_REQUEST",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::Unauthorized(_) => "UNAUTHORIZED",
            AppError::Internal(_) | AppError::InternalWithSource { .. } => "INTERNAL_ERROR",
        }
    }

    fn log_level(&self) -> LogLevel {
        match self {
            AppError::UnsupportedMediaType(_)
            | AppError::InvalidInput(_)
            | AppError::BadRequest(_)
            | AppError::NotFound(_) => LogLevel::Debug,
            AppError::Unauthorized(_) => LogLevel::Warn,
            AppError::Database(_)
            | AppError::Storage(_)
            | AppError::Processing(_)
            | AppError::Internal(_)
            | AppError::InternalWithSource { .. } => LogLevel::Error,
        }
    }

    fn client_message(&self) -> String {
        match self {
            // Internal details stay out of client responses.
            AppError::Database(_) => "A database error occurred".to_string(),
            AppError::Storage(_) => "A storage error occurred".to_string(),
            AppError::Internal(_) | AppError::InternalWithSource { .. } => {
                "An internal error occurred".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::InternalWithSource {
            message: err.to_string(),
            source: err,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::UnsupportedMediaType("application/pdf".into()).http_status_code(),
            400
        );
        assert_eq!(AppError::NotFound("media".into()).http_status_code(), 404);
        assert_eq!(AppError::Unauthorized("owner".into()).http_status_code(), 401);
        assert_eq!(AppError::Storage("boom".into()).http_status_code(), 500);
    }

    #[test]
    fn test_internal_details_not_leaked() {
        let err = AppError::Database("connection refused at 10.0.0.1".into());
        assert!(!err.client_message().contains("10.0.0.1"));
        assert_eq!(err.error_code(), "DATABASE_ERROR");
    }
}
