use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuilderError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("build not found: {0}")]
    NotFound(String),

    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("image not found: {0}")]
    ImageNotFound(String),

    #[error("state conflict: {0}")]
    StateConflict(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<openclaw_runtime::BuilderError> for BuilderError {
    fn from(value: openclaw_runtime::BuilderError) -> Self {
        BuilderError::RuntimeUnavailable(value.to_string())
    }
}

impl From<openclaw_runtime::DeployerError> for BuilderError {
    fn from(value: openclaw_runtime::DeployerError) -> Self {
        match value {
            openclaw_runtime::DeployerError::ContainerNotFound(id) => {
                BuilderError::NotFound(format!("container {id}"))
            }
            openclaw_runtime::DeployerError::ImageNotFound(tag) => {
                BuilderError::ImageNotFound(tag)
            }
            other => BuilderError::RuntimeUnavailable(other.to_string()),
        }
    }
}

impl From<BuilderError> for openclaw_core::ServiceError {
    fn from(value: BuilderError) -> Self {
        match value {
            BuilderError::Validation(message) => openclaw_core::ServiceError::validation(message),
            BuilderError::NotFound(resource) => openclaw_core::ServiceError::not_found(resource),
            BuilderError::StateConflict(message) => {
                openclaw_core::ServiceError::state_conflict(message)
            }
            BuilderError::RuntimeUnavailable(message) => {
                openclaw_core::ServiceError::runtime_unavailable(message)
            }
            BuilderError::ImageNotFound(tag) => openclaw_core::ServiceError::image_not_found(tag),
            BuilderError::Io(e) => openclaw_core::ServiceError::Internal(e.into()),
            BuilderError::Internal(e) => openclaw_core::ServiceError::Internal(e),
        }
    }
}

pub type BuilderResult<T> = Result<T, BuilderError>;
