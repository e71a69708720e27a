use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use openclaw_core::UtcDateTime;

/// Lifecycle state of a task. Stored as text so new states can be added
/// without a migration; the workflow engine is the only writer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Created,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "created",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "tasks")]
pub struct Model {
    /// Task identity string, e.g. `task-<uuid8>`.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: String,

    pub workspace_id: String,
    pub current_image: Option<String>,
    pub current_policy_id: Option<i32>,
    pub llm_model: String,

    /// Durable workflow identity assigned by the task workflow engine.
    /// Unique: a task has exactly one active workflow at a time.
    #[sea_orm(unique)]
    pub workflow_id: Option<String>,
    pub workflow_run_id: Option<String>,

    pub created_by: Option<String>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
    pub started_at: Option<UtcDateTime>,
    pub completed_at: Option<UtcDateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::policies::Entity")]
    Policies,
    #[sea_orm(has_many = "super::capability_requests::Entity")]
    CapabilityRequests,
    #[sea_orm(has_many = "super::task_outputs::Entity")]
    Outputs,
    #[sea_orm(has_many = "super::task_messages::Entity")]
    Messages,
    #[sea_orm(has_many = "super::deployments::Entity")]
    Deployments,
}

impl Related<super::policies::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Policies.def()
    }
}

impl Related<super::capability_requests::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CapabilityRequests.def()
    }
}

impl Related<super::task_outputs::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Outputs.def()
    }
}

impl Related<super::task_messages::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Messages.def()
    }
}

impl Related<super::deployments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Deployments.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(mut self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = chrono::Utc::now();
        if insert {
            if self.created_at.is_not_set() {
                self.created_at = Set(now);
            }
            if self.updated_at.is_not_set() {
                self.updated_at = Set(now);
            }
            if self.status.is_not_set() {
                self.status = Set(TaskStatus::Created.as_str().to_string());
            }
        } else {
            self.updated_at = Set(now);
        }
        Ok(self)
    }
}
