//! Persistent key/value store for LLM provider configuration
//! (`OLLAMA_URL`, `GEMINI_API_KEY`, `ANTHROPIC_API_KEY`, `OPENAI_API_KEY`).
//!
//! Backed by the `llm_provider_config` table, mirrored into an in-process
//! cache at startup and on every write so the gateway never round-trips to
//! the database on the request path.

use std::collections::HashMap;
use std::sync::Arc;

use openclaw_core::utils::mask_sensitive;
use openclaw_entities::llm_provider_config::{ActiveModel, Column, Entity as LlmProviderConfig};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
};
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum ConfigStoreError {
    #[error("database error: {0}")]
    Database(#[from] sea_orm::DbErr),
}

/// Known configuration keys. Anything else is rejected by [`ConfigStore::set`]
/// so a typo in a `POST /config` body fails loudly instead of being silently
/// ignored.
pub const KNOWN_KEYS: &[&str] = &[
    "OLLAMA_URL",
    "GEMINI_API_KEY",
    "ANTHROPIC_API_KEY",
    "OPENAI_API_KEY",
];

/// Process-wide mirror of `llm_provider_config`, safe to clone and share.
#[derive(Clone)]
pub struct ConfigStore {
    db: Arc<DatabaseConnection>,
    cache: Arc<RwLock<HashMap<String, String>>>,
}

impl ConfigStore {
    /// Load all rows into the in-process cache. Call once at startup.
    pub async fn load(db: Arc<DatabaseConnection>) -> Result<Self, ConfigStoreError> {
        let rows = LlmProviderConfig::find().all(db.as_ref()).await?;
        let cache = rows.into_iter().map(|r| (r.key, r.value)).collect();
        Ok(Self {
            db,
            cache: Arc::new(RwLock::new(cache)),
        })
    }

    /// Unmasked value, for internal use by the gateway when dispatching to a
    /// provider. Never serialize this directly into an HTTP response.
    pub async fn get(&self, key: &str) -> Option<String> {
        self.cache.read().await.get(key).cloned()
    }

    /// Persist `key = value`, updating both the database and the cache.
    pub async fn set(&self, key: &str, value: &str) -> Result<(), ConfigStoreError> {
        let existing = LlmProviderConfig::find()
            .filter(Column::Key.eq(key))
            .one(self.db.as_ref())
            .await?;

        match existing {
            Some(row) => {
                let mut active: ActiveModel = row.into();
                active.value = Set(value.to_string());
                active.update(self.db.as_ref()).await?;
            }
            None => {
                ActiveModel {
                    key: Set(key.to_string()),
                    value: Set(value.to_string()),
                    ..Default::default()
                }
                .insert(self.db.as_ref())
                .await?;
            }
        }

        self.cache
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// All configured keys with their values masked to first-4/last-4
    /// characters, suitable for `GET /config`.
    pub async fn masked_snapshot(&self) -> HashMap<String, String> {
        self.cache
            .read()
            .await
            .iter()
            .map(|(k, v)| (k.clone(), mask_sensitive(v)))
            .collect()
    }
}
