use std::sync::Arc;

use openclaw_builder::{DeploymentService, ImageBuilderService};
use openclaw_gateway::GatewayState;
use openclaw_workflow::TaskWorkflowEngine;
use sea_orm::DatabaseConnection;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub workflow: Arc<TaskWorkflowEngine>,
    pub image_builder: Arc<ImageBuilderService>,
    pub deployments: Arc<DeploymentService>,
    pub gateway: Arc<GatewayState>,
}
