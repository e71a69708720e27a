//! RFC 7807 Problem Details, carried over from the control plane's error
//! convention: every crate boundary produces a `thiserror` enum, every HTTP
//! handler converts it to a `Problem` at the edge.

use std::collections::BTreeMap;

use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::Value;

use openclaw_core::ServiceError;

#[derive(Debug, Clone)]
pub struct Problem {
    pub status_code: StatusCode,
    pub body: BTreeMap<String, Value>,
}

pub fn new<S: Into<StatusCode>>(status_code: S) -> Problem {
    Problem {
        status_code: status_code.into(),
        body: BTreeMap::new(),
    }
}

impl Problem {
    pub fn with_type(self, value: impl Into<String>) -> Self {
        self.with_value("type", value.into())
    }

    pub fn with_title(self, value: impl Into<String>) -> Self {
        self.with_value("title", value.into())
    }

    pub fn with_detail(self, value: impl Into<String>) -> Self {
        self.with_value("detail", value.into())
    }

    pub fn with_value<V: Into<Value>>(mut self, key: &str, value: V) -> Self {
        self.body.insert(key.to_owned(), value.into());
        self
    }
}

impl IntoResponse for Problem {
    fn into_response(self) -> axum::response::Response {
        let mut response = (self.status_code, Json(self.body)).into_response();
        response.headers_mut().insert(
            axum::http::header::CONTENT_TYPE,
            "application/problem+json".parse().unwrap(),
        );
        response
    }
}

pub type Result<T> = std::result::Result<T, Problem>;

impl From<openclaw_builder::BuilderError> for Problem {
    fn from(value: openclaw_builder::BuilderError) -> Self {
        Problem::from(ServiceError::from(value))
    }
}

impl From<openclaw_workflow::WorkflowEngineError> for Problem {
    fn from(value: openclaw_workflow::WorkflowEngineError) -> Self {
        Problem::from(ServiceError::from(value))
    }
}

/// Maps the shared service error taxonomy to the status/type/title triple
/// recorded in the error handling design: `Validation`/`StateConflict` ->
/// 400/409, `NotFound` -> 404, `RuntimeUnavailable`/`ProviderError` -> 503,
/// `ProviderMalformed` -> 502, `Timeout` -> 504, everything else -> 500.
impl From<ServiceError> for Problem {
    fn from(error: ServiceError) -> Self {
        let status = StatusCode::from_u16(error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let (type_url, title) = match &error {
            ServiceError::Validation { .. } => ("https://openclaw.dev/probs/validation", "Validation Error"),
            ServiceError::NotFound { .. } => ("https://openclaw.dev/probs/not-found", "Resource Not Found"),
            ServiceError::StateConflict { .. } => ("https://openclaw.dev/probs/state-conflict", "State Conflict"),
            ServiceError::RuntimeUnavailable { .. } => {
                ("https://openclaw.dev/probs/runtime-unavailable", "Runtime Unavailable")
            }
            ServiceError::ImageNotFound { .. } => ("https://openclaw.dev/probs/image-not-found", "Image Not Found"),
            ServiceError::ProviderError { .. } => ("https://openclaw.dev/probs/provider-error", "Provider Error"),
            ServiceError::ProviderMalformed { .. } => {
                ("https://openclaw.dev/probs/provider-malformed", "Provider Malformed Output")
            }
            ServiceError::Timeout { .. } => ("https://openclaw.dev/probs/timeout", "Operation Timed Out"),
            ServiceError::Database(_) => ("https://openclaw.dev/probs/database-error", "Database Error"),
            ServiceError::Internal(_) => ("https://openclaw.dev/probs/internal-error", "Internal Server Error"),
        };

        new(status)
            .with_type(type_url)
            .with_title(title)
            .with_detail(error.to_string())
            .with_value("timestamp", chrono::Utc::now().to_rfc3339())
    }
}
