use std::path::PathBuf;
use std::sync::Arc;

use clap::Args;
use sea_orm::{sea_query::Expr, ColumnTrait, EntityTrait, QueryFilter};
use tracing::{debug, info, warn};

use openclaw_builder::{DeploymentService, ImageBuilderConfig, ImageBuilderService};
use openclaw_config::{ConfigStore, ServerConfig};
use openclaw_entities::deployments;
use openclaw_gateway::GatewayState;
use openclaw_runtime::docker::DockerRuntime;
use openclaw_runtime::{ContainerDeployer, ContainerRuntime, ImageBuilder};
use openclaw_workflow::{AgentStepController, StepControllerConfig, TaskWorkflowEngine};

#[derive(Args)]
pub struct ServeCommand {
    /// Address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1:3000", env = "OPENCLAW_ADDRESS")]
    pub address: String,

    /// Database connection URL (postgres:// or postgresql://)
    #[arg(long, env = "OPENCLAW_DATABASE_URL")]
    pub database_url: String,

    /// Directory holding per-task agent Dockerfiles and their version history
    #[arg(long, env = "OPENCLAW_AGENT_IMAGES_DIR")]
    pub agent_images_dir: Option<PathBuf>,

    /// Root directory under which per-task workspaces are persisted
    #[arg(long, env = "OPENCLAW_WORKSPACES_DIR")]
    pub workspaces_dir: Option<PathBuf>,

    /// Shared base image every task's Dockerfile v1 is built FROM
    #[arg(long, default_value = "openclaw-agent-base:latest", env = "OPENCLAW_BASE_IMAGE")]
    pub base_image: String,

    /// Registry images are pushed to and pulled from
    #[arg(long, default_value = "localhost:5000", env = "OPENCLAW_REGISTRY")]
    pub registry: String,

    /// URL the agent container uses to reach this control plane
    #[arg(long, default_value = "http://127.0.0.1:3000", env = "OPENCLAW_CONTROL_PLANE_URL")]
    pub control_plane_url: String,

    /// Default Ollama endpoint, used when no per-task override is configured
    #[arg(long, default_value = "http://127.0.0.1:11434", env = "OPENCLAW_OLLAMA_URL")]
    pub ollama_url: String,

    /// Docker network agent and deployment containers are attached to
    #[arg(long, default_value = "bridge", env = "OPENCLAW_DOCKER_NETWORK")]
    pub docker_network: String,

    /// Use BuildKit for image builds
    #[arg(long, default_value_t = true, env = "OPENCLAW_USE_BUILDKIT")]
    pub use_buildkit: bool,
}

impl ServeCommand {
    pub fn execute(self) -> anyhow::Result<()> {
        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(self.run())
    }

    async fn run(self) -> anyhow::Result<()> {
        let serve_config = Arc::new(ServerConfig::new(self.address.clone(), self.database_url.clone())?);
        debug!(data_dir = %serve_config.get_data_dir().display(), "resolved data directory");

        let agent_images_dir = self
            .agent_images_dir
            .unwrap_or_else(|| serve_config.get_data_dir().join("agent-images"));
        let workspaces_dir = self
            .workspaces_dir
            .unwrap_or_else(|| serve_config.get_data_dir().join("workspaces"));
        std::fs::create_dir_all(&agent_images_dir)?;
        std::fs::create_dir_all(&workspaces_dir)?;

        debug!("establishing database connection...");
        let db = openclaw_database::establish_connection(&self.database_url).await?;

        let docker = Arc::new(bollard::Docker::connect_with_local_defaults()?);
        let docker_runtime = Arc::new(DockerRuntime::new(docker, self.use_buildkit, self.docker_network.clone()));
        let image_runtime: Arc<dyn ImageBuilder> = docker_runtime.clone();
        let deployer_runtime: Arc<dyn ContainerDeployer> = docker_runtime.clone();
        let container_runtime: Arc<dyn ContainerRuntime> = docker_runtime;

        let image_builder = Arc::new(ImageBuilderService::new(
            image_runtime,
            ImageBuilderConfig {
                agent_images_dir,
                shared_base_image: self.base_image.clone(),
                registry: self.registry.clone(),
            },
        ));
        image_builder.bootstrap().await?;

        let deployments_service = Arc::new(DeploymentService::new(db.clone(), deployer_runtime, image_builder.clone()));

        let step_controller = Arc::new(AgentStepController::new(
            container_runtime,
            StepControllerConfig {
                workspaces_root: workspaces_dir,
                control_plane_url: self.control_plane_url.clone(),
                ollama_url: self.ollama_url.clone(),
                registry: self.registry.clone(),
            },
        ));

        let workflow = Arc::new(TaskWorkflowEngine::new(
            db.clone(),
            step_controller,
            image_builder.clone(),
            deployments_service.clone(),
            self.base_image.clone(),
        ));

        let config_store = ConfigStore::load(db.clone()).await?;
        let gateway = Arc::new(GatewayState::new(config_store, self.ollama_url.clone()));
        let gateway_router = openclaw_gateway::router(gateway.clone());

        let state = Arc::new(openclaw_api::AppState {
            db: db.clone(),
            workflow,
            image_builder,
            deployments: deployments_service,
            gateway,
        });
        let app = openclaw_api::router(state, gateway_router);

        let listener = tokio::net::TcpListener::bind(&self.address).await?;
        info!(address = %self.address, "openclaw control plane listening");
        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal(db))
            .await?;
        Ok(())
    }
}

/// Waits for Ctrl+C, then marks any still-running deployments cancelled so
/// `GET /deployments` doesn't show them as live after the process exits.
async fn shutdown_signal(db: Arc<sea_orm::DatabaseConnection>) {
    tokio::signal::ctrl_c().await.expect("failed to listen for ctrl-c signal");
    info!("received ctrl-c, shutting down");

    match deployments::Entity::update_many()
        .filter(deployments::Column::Status.eq("running"))
        .col_expr(deployments::Column::Status, Expr::value("stopped"))
        .exec(db.as_ref())
        .await
    {
        Ok(result) if result.rows_affected > 0 => {
            info!(count = result.rows_affected, "marked running deployments stopped on shutdown");
        }
        Ok(_) => {}
        Err(e) => warn!(error = %e, "failed to mark deployments stopped during shutdown"),
    }
}
