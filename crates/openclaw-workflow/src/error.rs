use thiserror::Error;

#[derive(Error, Debug)]
pub enum WorkflowEngineError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<openclaw_runtime::BuilderError> for WorkflowEngineError {
    fn from(value: openclaw_runtime::BuilderError) -> Self {
        WorkflowEngineError::RuntimeUnavailable(value.to_string())
    }
}

impl From<openclaw_runtime::DeployerError> for WorkflowEngineError {
    fn from(value: openclaw_runtime::DeployerError) -> Self {
        match value {
            openclaw_runtime::DeployerError::ContainerNotFound(id) => {
                WorkflowEngineError::NotFound(format!("container {id}"))
            }
            openclaw_runtime::DeployerError::ImageNotFound(tag) => {
                WorkflowEngineError::ImageNotFound(tag)
            }
            other => WorkflowEngineError::RuntimeUnavailable(other.to_string()),
        }
    }
}

impl From<openclaw_builder::BuilderError> for WorkflowEngineError {
    fn from(value: openclaw_builder::BuilderError) -> Self {
        match value {
            openclaw_builder::BuilderError::NotFound(r) => WorkflowEngineError::NotFound(r),
            openclaw_builder::BuilderError::StateConflict(m) => WorkflowEngineError::StateConflict(m),
            openclaw_builder::BuilderError::ImageNotFound(t) => WorkflowEngineError::ImageNotFound(t),
            openclaw_builder::BuilderError::RuntimeUnavailable(m) => {
                WorkflowEngineError::RuntimeUnavailable(m)
            }
            openclaw_builder::BuilderError::Validation(m) => WorkflowEngineError::Validation(m),
            openclaw_builder::BuilderError::Io(e) => WorkflowEngineError::Internal(e.into()),
            openclaw_builder::BuilderError::Internal(e) => WorkflowEngineError::Internal(e),
        }
    }
}

impl From<WorkflowEngineError> for openclaw_core::ServiceError {
    fn from(value: WorkflowEngineError) -> Self {
        match value {
            WorkflowEngineError::Validation(m) => openclaw_core::ServiceError::validation(m),
            WorkflowEngineError::NotFound(r) => openclaw_core::ServiceError::not_found(r),
            WorkflowEngineError::StateConflict(m) => openclaw_core::ServiceError::state_conflict(m),
            WorkflowEngineError::RuntimeUnavailable(m) => {
                openclaw_core::ServiceError::runtime_unavailable(m)
            }
            WorkflowEngineError::ImageNotFound(t) => openclaw_core::ServiceError::image_not_found(t),
            WorkflowEngineError::Timeout(m) => openclaw_core::ServiceError::timeout(m),
            WorkflowEngineError::Internal(e) => openclaw_core::ServiceError::Internal(e),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowEngineError>;
