pub mod llm_config;
mod service;

pub use llm_config::{ConfigStore, ConfigStoreError, KNOWN_KEYS};
pub use service::{ConfigService, ConfigServiceError, ServerConfig};
