//! Image builder contract: `POST /build`, `GET /builds/{id}`,
//! `POST /build-deployment`. Mounted at the API root, not under `/api`, to
//! match the contract agent containers and deployment workflows call.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;

use openclaw_builder::{BuildRecord, Capability};

use crate::problem::Result;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/build", post(start_build))
        .route("/builds/{id}", get(get_build))
        .route("/build-deployment", post(start_deployment_build))
}

#[derive(Deserialize)]
pub struct StartBuildRequest {
    pub task_id: String,
    pub base_image: String,
    #[serde(default)]
    pub capabilities: Vec<Capability>,
}

#[utoipa::path(post, path = "/build", responses((status = 202)))]
pub(crate) async fn start_build(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartBuildRequest>,
) -> Result<Json<BuildRecord>> {
    let record = state
        .image_builder
        .start_build(&body.task_id, &body.base_image, &body.capabilities)
        .await?;
    Ok(Json(record))
}

#[utoipa::path(get, path = "/builds/{id}", responses((status = 200), (status = 404)))]
pub(crate) async fn get_build(State(state): State<Arc<AppState>>, Path(id): Path<String>) -> Result<Json<BuildRecord>> {
    let record = state.image_builder.get_build(&id).await?;
    Ok(Json(record))
}

#[derive(Deserialize, ToSchema)]
pub struct StartDeploymentBuildRequest {
    pub deployment_id: String,
    pub task_id: String,
    pub entrypoint: String,
    pub port: u16,
    /// Accepted for contract compatibility; the deployment Dockerfile infers
    /// its pip/apt set from the task's most recent agent Dockerfile instead.
    #[serde(default)]
    pub pip_packages: Vec<String>,
}

#[utoipa::path(post, path = "/build-deployment", request_body = StartDeploymentBuildRequest, responses((status = 202)))]
pub(crate) async fn start_deployment_build(
    State(state): State<Arc<AppState>>,
    Json(body): Json<StartDeploymentBuildRequest>,
) -> Result<Json<BuildRecord>> {
    let record = state
        .image_builder
        .start_deployment_build(&body.deployment_id, &body.task_id, &body.entrypoint, body.port)
        .await?;
    Ok(Json(record))
}
