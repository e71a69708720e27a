use thiserror::Error;

#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("provider not configured: {0}")]
    ProviderNotConfigured(String),

    #[error("provider error ({provider}): {message}")]
    ProviderError { provider: String, message: String },

    #[error("provider returned malformed output ({provider}): {message}")]
    ProviderMalformed { provider: String, message: String },

    #[error("validation error: {0}")]
    Validation(String),

    #[error(transparent)]
    Config(#[from] openclaw_config::ConfigStoreError),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl From<GatewayError> for openclaw_core::ServiceError {
    fn from(value: GatewayError) -> Self {
        match value {
            GatewayError::ProviderNotConfigured(provider) => {
                openclaw_core::ServiceError::provider_error(provider, "not configured")
            }
            GatewayError::ProviderError { provider, message } => {
                openclaw_core::ServiceError::provider_error(provider, message)
            }
            GatewayError::ProviderMalformed { provider, message } => {
                openclaw_core::ServiceError::provider_malformed(provider, message)
            }
            GatewayError::Validation(message) => openclaw_core::ServiceError::validation(message),
            GatewayError::Config(e) => openclaw_core::ServiceError::Internal(e.into()),
            GatewayError::Http(e) => {
                openclaw_core::ServiceError::provider_error("unknown", e.to_string())
            }
        }
    }
}

pub type GatewayResult<T> = Result<T, GatewayError>;
