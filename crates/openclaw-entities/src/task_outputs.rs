use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};

use openclaw_core::UtcDateTime;

/// One row per agent iteration. `iteration` is monotone per task, strictly
/// increasing across continuations.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "task_outputs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub task_id: String,
    pub iteration: i32,

    pub completed: bool,
    pub capability_requested: bool,

    /// Container stdout/stderr, truncated to a ceiling before storage.
    pub agent_logs: Option<String>,
    /// The structured result envelope, raw.
    pub output: Option<Json>,
    pub error: Option<String>,

    pub llm_response_preview: Option<String>,
    pub model_used: Option<String>,
    pub image_used: Option<String>,
    pub duration_ms: Option<i64>,

    /// Deliverable files created by the agent: `{filename: content}`.
    pub deliverables: Option<Json>,

    pub created_at: UtcDateTime,
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
