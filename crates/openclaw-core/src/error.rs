//! Shared error taxonomy used across all openclaw services.
//!
//! Every crate boundary produces `ServiceError`; HTTP handlers map it to an
//! RFC7807 `Problem` body (see `openclaw-api`), never leaking the `Internal`
//! variant's message verbatim to a client.

use thiserror::Error;

/// Common service error classes, mirroring the error taxonomy of the
/// control-plane design: `Validation`, `NotFound`, `StateConflict`,
/// `RuntimeUnavailable`, `ImageNotFound`, `ProviderError`,
/// `ProviderMalformed`, `Timeout`, `Internal`.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("validation error: {message}")]
    Validation { message: String },

    #[error("not found: {resource}")]
    NotFound { resource: String },

    #[error("state conflict: {message}")]
    StateConflict { message: String },

    #[error("runtime unavailable: {message}")]
    RuntimeUnavailable { message: String },

    #[error("image not found: {tag}")]
    ImageNotFound { tag: String },

    #[error("provider error ({provider}): {message}")]
    ProviderError { provider: String, message: String },

    #[error("provider returned malformed output ({provider}): {message}")]
    ProviderMalformed { provider: String, message: String },

    #[error("operation timed out: {message}")]
    Timeout { message: String },

    #[error("database error: {0}")]
    Database(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ServiceError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
        }
    }

    pub fn state_conflict(message: impl Into<String>) -> Self {
        Self::StateConflict {
            message: message.into(),
        }
    }

    pub fn runtime_unavailable(message: impl Into<String>) -> Self {
        Self::RuntimeUnavailable {
            message: message.into(),
        }
    }

    pub fn image_not_found(tag: impl Into<String>) -> Self {
        Self::ImageNotFound { tag: tag.into() }
    }

    pub fn provider_error(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderError {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn provider_malformed(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProviderMalformed {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::Timeout {
            message: message.into(),
        }
    }

    /// HTTP status class this error maps to, per the error handling design:
    /// client-caused taxonomy classes become 4xx, provider/runtime
    /// unavailability becomes 503, `Internal` becomes 500.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::NotFound { .. } => 404,
            Self::StateConflict { .. } => 409,
            Self::RuntimeUnavailable { .. } => 503,
            Self::ImageNotFound { .. } => 404,
            Self::ProviderError { .. } => 503,
            Self::ProviderMalformed { .. } => 502,
            Self::Timeout { .. } => 504,
            Self::Database(_) => 500,
            Self::Internal(_) => 500,
        }
    }
}

impl From<sea_orm::DbErr> for ServiceError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Database(err.to_string())
    }
}

/// Result type alias for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_taxonomy() {
        assert_eq!(ServiceError::validation("x").status_code(), 400);
        assert_eq!(ServiceError::not_found("task").status_code(), 404);
        assert_eq!(ServiceError::state_conflict("x").status_code(), 409);
        assert_eq!(ServiceError::runtime_unavailable("x").status_code(), 503);
        assert_eq!(ServiceError::provider_error("gemini", "x").status_code(), 503);
        assert_eq!(
            ServiceError::provider_malformed("gemini", "x").status_code(),
            502
        );
        assert_eq!(ServiceError::timeout("x").status_code(), 504);
    }
}
