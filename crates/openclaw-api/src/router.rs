//! Mounts every HTTP surface from the external interfaces table onto one
//! axum `Router`, plus a Swagger UI, matching the teacher's
//! `tower-http` tracing/CORS/catch-panic composition.

use std::sync::Arc;

use axum::Router;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers::{build, capabilities, deployments, tasks};
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(
    paths(
        tasks::create_task,
        tasks::list_tasks,
        tasks::get_task,
        tasks::start_task,
        tasks::pause_task,
        tasks::resume_task,
        tasks::complete_task,
        tasks::fail_task,
        tasks::append_output,
        tasks::list_outputs,
        tasks::list_messages,
        tasks::append_message,
        capabilities::create_request,
        capabilities::review_request,
        deployments::create_deployment,
        deployments::list_deployments,
        deployments::get_deployment,
        deployments::patch_deployment,
        deployments::approve_deployment,
        deployments::start_deployment,
        deployments::stop_deployment,
        build::start_build,
        build::get_build,
        build::start_deployment_build,
    ),
    tags((name = "openclaw", description = "Policy-governed autonomous agent orchestration"))
)]
struct ApiDoc;

pub fn router(state: Arc<AppState>, gateway_router: Router) -> Router {
    let api = Router::new()
        .merge(tasks::router())
        .merge(capabilities::router())
        .merge(deployments::router())
        .with_state(state.clone());

    let build_contract = build::router().with_state(state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .nest("/api", api)
        .nest("/api/llm", gateway_router)
        .merge(build_contract)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .layer(CorsLayer::permissive())
}
