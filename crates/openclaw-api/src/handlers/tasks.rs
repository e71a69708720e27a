//! `/api/tasks`: create, list, detail, state transitions, outputs, messages.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait, QueryOrder};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use utoipa::ToSchema;

use openclaw_entities::task_messages::{ActiveModel as MessageActiveModel, Column as MessageColumn, Entity as TaskMessages};
use openclaw_entities::task_outputs::{ActiveModel as OutputActiveModel, Column as OutputColumn, Entity as TaskOutputs, Model as OutputModel};
use openclaw_entities::tasks::{ActiveModel as TaskActiveModel, Entity as Tasks, Model as TaskModel, TaskStatus};
use sea_orm::{ColumnTrait, QueryFilter};

use crate::problem::{Problem, Result};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tasks", post(create_task).get(list_tasks))
        .route("/tasks/{id}", get(get_task))
        .route("/tasks/{id}/start", post(start_task))
        .route("/tasks/{id}/pause", post(pause_task))
        .route("/tasks/{id}/resume", post(resume_task))
        .route("/tasks/{id}/complete", post(complete_task))
        .route("/tasks/{id}/fail", post(fail_task))
        .route("/tasks/{id}/outputs", post(append_output).get(list_outputs))
        .route("/tasks/{id}/messages", get(list_messages).post(append_message))
}

#[derive(Deserialize, ToSchema)]
pub struct CreateTaskRequest {
    pub name: String,
    pub description: Option<String>,
    pub workspace_id: String,
    #[serde(default = "default_model")]
    pub llm_model: String,
    pub created_by: Option<String>,
}

fn default_model() -> String {
    "claude-sonnet-4".to_string()
}

#[utoipa::path(post, path = "/api/tasks", request_body = CreateTaskRequest,
    responses((status = 201, description = "Task created, workflow started")))]
pub(crate) async fn create_task(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<Json<TaskModel>> {
    let id = format!("task-{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
    let active = TaskActiveModel {
        id: Set(id.clone()),
        name: Set(body.name),
        description: Set(body.description),
        workspace_id: Set(body.workspace_id),
        llm_model: Set(body.llm_model),
        workflow_id: Set(Some(id.clone())),
        created_by: Set(body.created_by),
        ..Default::default()
    };
    let task = active.insert(state.db.as_ref()).await.map_err(openclaw_core::ServiceError::from)?;

    spawn_workflow(state.clone(), task.id.clone(), None);
    info!(task_id = %task.id, "task created, workflow started");
    Ok(Json(task))
}

#[utoipa::path(get, path = "/api/tasks", responses((status = 200)))]
pub(crate) async fn list_tasks(State(state): State<Arc<AppState>>) -> Result<Json<Vec<TaskModel>>> {
    let tasks = Tasks::find()
        .order_by_desc(openclaw_entities::tasks::Column::CreatedAt)
        .all(state.db.as_ref())
        .await
        .map_err(openclaw_core::ServiceError::from)?;
    Ok(Json(tasks))
}

#[utoipa::path(get, path = "/api/tasks/{id}", responses((status = 200), (status = 404)))]
pub(crate) async fn get_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<TaskModel>> {
    Ok(Json(load_task(&state, &id).await?))
}

async fn load_task(state: &AppState, id: &str) -> Result<TaskModel> {
    Tasks::find_by_id(id.to_string())
        .one(state.db.as_ref())
        .await
        .map_err(|e| Problem::from(openclaw_core::ServiceError::from(e)))?
        .ok_or_else(|| Problem::from(openclaw_core::ServiceError::not_found(format!("task {id}"))))
}

#[utoipa::path(post, path = "/api/tasks/{id}/start", responses((status = 202), (status = 404), (status = 409)))]
pub(crate) async fn start_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<axum::http::StatusCode> {
    let task = load_task(&state, &id).await?;
    if task.status != TaskStatus::Created.as_str() {
        return Err(Problem::from(openclaw_core::ServiceError::state_conflict(format!(
            "task {id} is not in the created state"
        ))));
    }
    spawn_workflow(state.clone(), id, None);
    Ok(axum::http::StatusCode::ACCEPTED)
}

/// Pause/resume only flip the status column. The workflow loop itself has
/// no suspend point outside `Approving`; a paused task simply will not be
/// restarted by the engine until `resume` flips it back and the operator
/// re-issues `start`.
#[utoipa::path(post, path = "/api/tasks/{id}/pause", responses((status = 204), (status = 404)))]
pub(crate) async fn pause_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<axum::http::StatusCode> {
    set_task_status(&state, &id, TaskStatus::Paused).await
}

#[utoipa::path(post, path = "/api/tasks/{id}/resume", responses((status = 204), (status = 404)))]
pub(crate) async fn resume_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<axum::http::StatusCode> {
    set_task_status(&state, &id, TaskStatus::Running).await
}

#[utoipa::path(post, path = "/api/tasks/{id}/complete", responses((status = 204), (status = 404)))]
pub(crate) async fn complete_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<axum::http::StatusCode> {
    finalize_task(&state, &id, TaskStatus::Completed).await
}

#[utoipa::path(post, path = "/api/tasks/{id}/fail", responses((status = 204), (status = 404)))]
pub(crate) async fn fail_task(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<axum::http::StatusCode> {
    finalize_task(&state, &id, TaskStatus::Failed).await
}

async fn set_task_status(state: &AppState, id: &str, status: TaskStatus) -> Result<axum::http::StatusCode> {
    let task = load_task(state, id).await?;
    let mut active: TaskActiveModel = task.into();
    active.status = Set(status.as_str().to_string());
    active
        .update(state.db.as_ref())
        .await
        .map_err(|e| Problem::from(openclaw_core::ServiceError::from(e)))?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

async fn finalize_task(state: &AppState, id: &str, status: TaskStatus) -> Result<axum::http::StatusCode> {
    let task = load_task(state, id).await?;
    let mut active: TaskActiveModel = task.into();
    active.status = Set(status.as_str().to_string());
    active.completed_at = Set(Some(chrono::Utc::now()));
    active
        .update(state.db.as_ref())
        .await
        .map_err(|e| Problem::from(openclaw_core::ServiceError::from(e)))?;
    Ok(axum::http::StatusCode::NO_CONTENT)
}

#[derive(Deserialize, ToSchema)]
pub struct AppendOutputRequest {
    pub iteration: i32,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub capability_requested: bool,
    pub agent_logs: Option<String>,
    pub output: Option<String>,
    pub error: Option<String>,
    pub image_used: Option<String>,
    pub deliverables: Option<Value>,
}

#[utoipa::path(post, path = "/api/tasks/{id}/outputs", request_body = AppendOutputRequest,
    responses((status = 201)))]
pub(crate) async fn append_output(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<AppendOutputRequest>,
) -> Result<Json<OutputModel>> {
    load_task(&state, &id).await?;
    let active = OutputActiveModel {
        task_id: Set(id),
        iteration: Set(body.iteration),
        completed: Set(body.completed),
        capability_requested: Set(body.capability_requested),
        agent_logs: Set(body.agent_logs),
        output: Set(body.output),
        error: Set(body.error),
        image_used: Set(body.image_used),
        deliverables: Set(body.deliverables),
        ..Default::default()
    };
    let output = active
        .insert(state.db.as_ref())
        .await
        .map_err(|e| Problem::from(openclaw_core::ServiceError::from(e)))?;
    Ok(Json(output))
}

#[utoipa::path(get, path = "/api/tasks/{id}/outputs", responses((status = 200)))]
pub(crate) async fn list_outputs(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<Vec<OutputModel>>> {
    let outputs = TaskOutputs::find()
        .filter(OutputColumn::TaskId.eq(id))
        .order_by_asc(OutputColumn::Iteration)
        .all(state.db.as_ref())
        .await
        .map_err(|e| Problem::from(openclaw_core::ServiceError::from(e)))?;
    Ok(Json(outputs))
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct TaskMessage {
    pub role: String,
    pub content: String,
    pub metadata: Option<Value>,
}

#[utoipa::path(get, path = "/api/tasks/{id}/messages", responses((status = 200)))]
pub(crate) async fn list_messages(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<openclaw_entities::task_messages::Model>>> {
    let messages = TaskMessages::find()
        .filter(MessageColumn::TaskId.eq(id))
        .order_by_asc(MessageColumn::CreatedAt)
        .all(state.db.as_ref())
        .await
        .map_err(|e| Problem::from(openclaw_core::ServiceError::from(e)))?;
    Ok(Json(messages))
}

#[utoipa::path(post, path = "/api/tasks/{id}/messages", request_body = TaskMessage,
    responses((status = 201)))]
pub(crate) async fn append_message(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<TaskMessage>,
) -> Result<Json<openclaw_entities::task_messages::Model>> {
    load_task(&state, &id).await?;
    let active = MessageActiveModel {
        task_id: Set(id),
        role: Set(body.role),
        content: Set(body.content),
        metadata: Set(body.metadata),
        ..Default::default()
    };
    let message = active
        .insert(state.db.as_ref())
        .await
        .map_err(|e| Problem::from(openclaw_core::ServiceError::from(e)))?;
    Ok(Json(message))
}

fn spawn_workflow(state: Arc<AppState>, task_id: String, follow_up: Option<String>) {
    tokio::spawn(async move {
        if let Err(e) = state.workflow.run(&task_id, follow_up).await {
            warn!(task_id, error = %e, "task workflow exited with an error");
        }
    });
}
