use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use openclaw_core::UtcDateTime;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "policies")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub task_id: String,
    /// Monotone per task; `task.current_policy = max(version)`. New
    /// versions never mutate older ones.
    pub version: i32,

    pub tools_allowed: Option<Json>,
    pub network_rules: Option<Json>,
    pub filesystem_rules: Option<Json>,
    pub database_rules: Option<Json>,
    pub resource_limits: Option<Json>,

    pub created_at: UtcDateTime,
    pub created_by: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tasks::Entity",
        from = "Column::TaskId",
        to = "super::tasks::Column::Id"
    )]
    Task,
}

impl Related<super::tasks::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Task.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        if insert && self.created_at.is_not_set() {
            self.created_at = Set(chrono::Utc::now());
        }
        Ok(self)
    }
}

/// Typed view over a policy's structured rule columns, for handlers that
/// want the shape rather than raw `Json`.
#[derive(Clone, Debug, Serialize, Deserialize, ToSchema)]
pub struct PolicyRules {
    #[serde(default)]
    pub tools_allowed: Vec<String>,
    #[serde(default)]
    pub network_rules: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub filesystem_rules: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub database_rules: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub resource_limits: serde_json::Map<String, serde_json::Value>,
}
