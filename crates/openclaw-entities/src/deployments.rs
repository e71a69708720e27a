use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use openclaw_core::UtcDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    PendingApproval,
    Approved,
    Building,
    Built,
    Running,
    Stopped,
    Failed,
}

impl DeploymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PendingApproval => "pending_approval",
            Self::Approved => "approved",
            Self::Building => "building",
            Self::Built => "built",
            Self::Running => "running",
            Self::Stopped => "stopped",
            Self::Failed => "failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "deployments")]
pub struct Model {
    /// `deploy-<uuid8>`.
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub name: String,
    pub task_id: String,

    pub image_tag: Option<String>,
    pub entrypoint: Option<String>,
    pub port: Option<i32>,

    pub status: String,
    pub container_id: Option<String>,
    pub host_port: Option<i32>,
    pub url: Option<String>,

    pub created_at: UtcDateTime,
    pub approved_at: Option<UtcDateTime>,
    pub built_at: Option<UtcDateTime>,
    pub started_at: Option<UtcDateTime>,
    pub stopped_at: Option<UtcDateTime>,
    pub error: Option<String>,
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
        if insert {
            if self.created_at.is_not_set() {
                self.created_at = Set(chrono::Utc::now());
            }
            if self.status.is_not_set() {
                self.status = Set(DeploymentStatus::PendingApproval.as_str().to_string());
            }
        }
        Ok(self)
    }
}
