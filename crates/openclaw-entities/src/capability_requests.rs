use async_trait::async_trait;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue::Set, ConnectionTrait, DbErr};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use openclaw_core::UtcDateTime;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityType {
    ToolInstall,
    NetworkAccess,
    FilesystemAccess,
    DatabaseAccess,
}

impl CapabilityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ToolInstall => "tool_install",
            Self::NetworkAccess => "network_access",
            Self::FilesystemAccess => "filesystem_access",
            Self::DatabaseAccess => "database_access",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "tool_install" => Some(Self::ToolInstall),
            "network_access" => Some(Self::NetworkAccess),
            "filesystem_access" => Some(Self::FilesystemAccess),
            "database_access" => Some(Self::DatabaseAccess),
            _ => None,
        }
    }
}

/// Once non-pending, a request is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Approved,
    Denied,
    Modified,
}

impl RequestStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Denied => "denied",
            Self::Modified => "modified",
        }
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "capability_requests")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub task_id: String,

    pub capability_type: String,
    pub resource_name: String,
    pub justification: String,
    pub details: Option<Json>,

    pub status: String,
    pub decision_notes: Option<String>,
    pub alternative_suggestion: Option<String>,
    pub reviewed_by: Option<String>,
    pub reviewed_at: Option<UtcDateTime>,

    pub requested_at: UtcDateTime,
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
            if self.requested_at.is_not_set() {
                self.requested_at = Set(chrono::Utc::now());
            }
            if self.status.is_not_set() {
                self.status = Set(RequestStatus::Pending.as_str().to_string());
            }
        }
        Ok(self)
    }
}
