//! `/api/capabilities/requests`: create, and review (approve/deny), which
//! delivers the `approve_capability` signal to a suspended workflow.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, EntityTrait};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use utoipa::ToSchema;

use openclaw_entities::capability_requests::{
    ActiveModel as RequestActiveModel, CapabilityType, Entity as CapabilityRequests, Model as RequestModel,
    RequestStatus,
};

use crate::problem::{Problem, Result};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/capabilities/requests", post(create_request))
        .route("/capabilities/requests/{id}/review", post(review_request))
}

#[derive(Deserialize, ToSchema)]
pub struct CreateCapabilityRequest {
    pub task_id: String,
    pub capability_type: String,
    pub resource_name: String,
    pub justification: String,
    pub details: Option<Value>,
}

#[utoipa::path(post, path = "/api/capabilities/requests", request_body = CreateCapabilityRequest,
    responses((status = 201), (status = 400)))]
pub(crate) async fn create_request(
    State(state): State<Arc<AppState>>,
    Json(body): Json<CreateCapabilityRequest>,
) -> Result<Json<RequestModel>> {
    let capability_type = CapabilityType::parse(&body.capability_type).ok_or_else(|| {
        Problem::from(openclaw_core::ServiceError::validation(format!(
            "unknown capability_type: {}",
            body.capability_type
        )))
    })?;

    let active = RequestActiveModel {
        task_id: Set(body.task_id),
        capability_type: Set(capability_type.as_str().to_string()),
        resource_name: Set(body.resource_name),
        justification: Set(body.justification),
        details: Set(body.details),
        ..Default::default()
    };
    let request = active.insert(state.db.as_ref()).await.map_err(openclaw_core::ServiceError::from)?;
    Ok(Json(request))
}

#[derive(Deserialize, ToSchema)]
pub struct ReviewRequest {
    pub approved: bool,
    pub notes: Option<String>,
    pub reviewed_by: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ReviewResponse {
    pub delivered: bool,
}

/// Signals the workflow waiting on this request id, if one still is. The
/// workflow itself owns the status/reviewed_at transition once it wakes;
/// this only records the reviewer's notes ahead of that.
#[utoipa::path(post, path = "/api/capabilities/requests/{id}/review", request_body = ReviewRequest,
    responses((status = 200), (status = 404), (status = 409)))]
pub(crate) async fn review_request(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i32>,
    Json(body): Json<ReviewRequest>,
) -> Result<Json<ReviewResponse>> {
    let request = CapabilityRequests::find_by_id(id)
        .one(state.db.as_ref())
        .await
        .map_err(openclaw_core::ServiceError::from)?
        .ok_or_else(|| Problem::from(openclaw_core::ServiceError::not_found(format!("capability request {id}"))))?;

    if request.status != RequestStatus::Pending.as_str() {
        return Err(Problem::from(openclaw_core::ServiceError::state_conflict(format!(
            "capability request {id} already reviewed"
        ))));
    }

    let mut active: RequestActiveModel = request.into();
    active.decision_notes = Set(body.notes);
    active.reviewed_by = Set(body.reviewed_by);
    active.update(state.db.as_ref()).await.map_err(openclaw_core::ServiceError::from)?;

    let delivered = state.workflow.signals.signal(id, body.approved).await;
    info!(request_id = id, approved = body.approved, delivered, "capability request reviewed");
    Ok(Json(ReviewResponse { delivered }))
}
