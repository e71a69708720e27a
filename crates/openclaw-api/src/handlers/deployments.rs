//! `/api/deployments`: create, list, detail, patch, approve, start, stop.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::{Json, Router};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use serde::Deserialize;
use tracing::{info, warn};
use utoipa::ToSchema;

use openclaw_entities::deployments::{ActiveModel as DeploymentActiveModel, Entity as Deployments, Model as DeploymentModel};

use crate::problem::{Problem, Result};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/deployments", post(create_deployment).get(list_deployments))
        .route("/deployments/{id}", get(get_deployment).patch(patch_deployment))
        .route("/deployments/{id}/approve", post(approve_deployment))
        .route("/deployments/{id}/start", post(start_deployment))
        .route("/deployments/{id}/stop", post(stop_deployment))
}

#[derive(Deserialize, ToSchema)]
pub struct CreateDeploymentRequest {
    pub name: String,
    pub task_id: String,
    pub entrypoint: Option<String>,
    pub port: Option<i32>,
}

#[utoipa::path(post, path = "/api/deployments", request_body = CreateDeploymentRequest,
    responses((status = 201), (status = 400)))]
pub(crate) async fn create_deployment(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateDeploymentRequest>,
) -> Result<Json<DeploymentModel>> {
    let deployment = state
        .deployments
        .create(&body.name, &body.task_id, body.entrypoint, body.port)
        .await?;
    Ok(Json(deployment))
}

#[utoipa::path(get, path = "/api/deployments", responses((status = 200)))]
pub(crate) async fn list_deployments(State(state): State<Arc<AppState>>) -> Result<Json<Vec<DeploymentModel>>> {
    let deployments = Deployments::find()
        .all(state.db.as_ref())
        .await
        .map_err(openclaw_core::ServiceError::from)?;
    Ok(Json(deployments))
}

#[utoipa::path(get, path = "/api/deployments/{id}", responses((status = 200), (status = 404)))]
pub(crate) async fn get_deployment(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<DeploymentModel>> {
    Ok(Json(load_deployment(&state, &id).await?))
}

async fn load_deployment(state: &AppState, id: &str) -> Result<DeploymentModel> {
    Deployments::find_by_id(id.to_string())
        .one(state.db.as_ref())
        .await
        .map_err(openclaw_core::ServiceError::from)?
        .ok_or_else(|| Problem::from(openclaw_core::ServiceError::not_found(format!("deployment {id}"))))
}

#[derive(Deserialize, ToSchema)]
pub struct PatchDeploymentRequest {
    pub name: Option<String>,
    pub entrypoint: Option<String>,
    pub port: Option<i32>,
}

#[utoipa::path(patch, path = "/api/deployments/{id}", request_body = PatchDeploymentRequest,
    responses((status = 200), (status = 404)))]
pub(crate) async fn patch_deployment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<PatchDeploymentRequest>,
) -> Result<Json<DeploymentModel>> {
    let model = load_deployment(&state, &id).await?;
    let mut active: DeploymentActiveModel = model.into();
    if let Some(name) = body.name {
        active.name = Set(name);
    }
    if body.entrypoint.is_some() {
        active.entrypoint = Set(body.entrypoint);
    }
    if body.port.is_some() {
        active.port = Set(body.port);
    }
    let updated = active.update(state.db.as_ref()).await.map_err(openclaw_core::ServiceError::from)?;
    Ok(Json(updated))
}

#[derive(Deserialize, ToSchema)]
pub struct ApproveDeploymentRequest {
    pub approved: bool,
    pub notes: Option<String>,
}

/// Approving kicks off the build asynchronously: the caller gets the
/// `approved` state back immediately, and `GET /deployments/{id}` reflects
/// `building` -> `built`|`failed` as the background task progresses.
#[utoipa::path(post, path = "/api/deployments/{id}/approve", request_body = ApproveDeploymentRequest,
    responses((status = 200), (status = 404), (status = 409)))]
pub(crate) async fn approve_deployment(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(body): Json<ApproveDeploymentRequest>,
) -> Result<Json<DeploymentModel>> {
    let mut deployment = state.deployments.approve(&id, body.approved).await?;

    if !body.approved {
        if let Some(notes) = body.notes {
            let mut active: DeploymentActiveModel = deployment.clone().into();
            active.error = Set(Some(notes));
            deployment = active.update(state.db.as_ref()).await.map_err(openclaw_core::ServiceError::from)?;
        }
        return Ok(Json(deployment));
    }

    let deployments = state.deployments.clone();
    let deployment_id = id.clone();
    tokio::spawn(async move {
        if let Err(e) = deployments.build(&deployment_id).await {
            warn!(deployment_id, error = %e, "deployment build failed");
        }
    });
    info!(deployment_id = %id, "deployment approved, build started");
    Ok(Json(deployment))
}

#[utoipa::path(post, path = "/api/deployments/{id}/start", responses((status = 200), (status = 404), (status = 409)))]
pub(crate) async fn start_deployment(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<DeploymentModel>> {
    let deployment = state.deployments.start(&id).await?;
    Ok(Json(deployment))
}

#[utoipa::path(post, path = "/api/deployments/{id}/stop", responses((status = 200), (status = 404), (status = 409)))]
pub(crate) async fn stop_deployment(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<DeploymentModel>> {
    let deployment = state.deployments.stop(&id).await?;
    Ok(Json(deployment))
}
