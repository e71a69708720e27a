//! Deployment Lifecycle: create -> approve -> build -> start -> stop.

use std::collections::HashMap;
use std::sync::Arc;

use openclaw_entities::deployments::{ActiveModel, Column, DeploymentStatus, Entity as Deployments, Model};
use openclaw_runtime::{ContainerDeployer, DeployRequest, DeployerError, PortMapping, Protocol, RestartPolicy};
use sea_orm::{ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{BuilderError, BuilderResult};
use crate::image_builder::ImageBuilderService;

/// Lowest and highest host ports handed out to deployments.
const PORT_RANGE: std::ops::RangeInclusive<u16> = 9100..=9120;

const STOP_GRACE_SECS: u64 = 10;

pub struct DeploymentService {
    db: Arc<DatabaseConnection>,
    runtime: Arc<dyn ContainerDeployer>,
    image_builder: Arc<ImageBuilderService>,
    /// Serializes port allocation so two concurrent starts never pick the same port.
    port_lock: Mutex<()>,
}

impl DeploymentService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        runtime: Arc<dyn ContainerDeployer>,
        image_builder: Arc<ImageBuilderService>,
    ) -> Self {
        Self {
            db,
            runtime,
            image_builder,
            port_lock: Mutex::new(()),
        }
    }

    pub async fn create(
        &self,
        name: &str,
        task_id: &str,
        entrypoint: Option<String>,
        port: Option<i32>,
    ) -> BuilderResult<Model> {
        let deployment = ActiveModel {
            id: Set(format!("deploy-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])),
            name: Set(name.to_string()),
            task_id: Set(task_id.to_string()),
            entrypoint: Set(entrypoint),
            port: Set(port),
            ..Default::default()
        };
        let inserted = deployment
            .insert(self.db.as_ref())
            .await
            .map_err(|e| BuilderError::Internal(e.into()))?;
        Ok(inserted)
    }

    async fn find(&self, deployment_id: &str) -> BuilderResult<Model> {
        Deployments::find_by_id(deployment_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(|e| BuilderError::Internal(e.into()))?
            .ok_or_else(|| BuilderError::NotFound(deployment_id.to_string()))
    }

    pub async fn approve(&self, deployment_id: &str, approved: bool) -> BuilderResult<Model> {
        let model = self.find(deployment_id).await?;
        if model.status != DeploymentStatus::PendingApproval.as_str() {
            return Err(BuilderError::StateConflict(format!(
                "deployment {deployment_id} is not pending approval"
            )));
        }

        let mut active: ActiveModel = model.into();
        active.status = Set(if approved {
            DeploymentStatus::Approved.as_str().to_string()
        } else {
            DeploymentStatus::Failed.as_str().to_string()
        });
        active.approved_at = Set(Some(chrono::Utc::now()));
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| BuilderError::Internal(e.into()))
    }

    pub async fn build(&self, deployment_id: &str) -> BuilderResult<Model> {
        let model = self.find(deployment_id).await?;
        if model.status != DeploymentStatus::Approved.as_str() {
            return Err(BuilderError::StateConflict(format!(
                "deployment {deployment_id} is not approved"
            )));
        }

        let entrypoint = model
            .entrypoint
            .clone()
            .ok_or_else(|| BuilderError::Validation("deployment has no entrypoint".to_string()))?;
        let port = model
            .port
            .ok_or_else(|| BuilderError::Validation("deployment has no port".to_string()))?;

        let build = self
            .image_builder
            .start_deployment_build(deployment_id, &model.task_id, &entrypoint, port as u16)
            .await?;

        let mut active: ActiveModel = model.into();
        active.status = Set(DeploymentStatus::Building.as_str().to_string());
        let updated = active
            .update(self.db.as_ref())
            .await
            .map_err(|e| BuilderError::Internal(e.into()))?;

        // Poll the build record until terminal. Builds run in-process, this
        // is a short wait for a minimal image.
        loop {
            let record = self.image_builder.get_build(&build.build_id).await?;
            match record.status {
                crate::build_tracker::BuildStatus::Success => {
                    let mut active: ActiveModel = updated.clone().into();
                    active.status = Set(DeploymentStatus::Built.as_str().to_string());
                    active.image_tag = Set(Some(record.image_tag));
                    active.built_at = Set(Some(chrono::Utc::now()));
                    return active
                        .update(self.db.as_ref())
                        .await
                        .map_err(|e| BuilderError::Internal(e.into()));
                }
                crate::build_tracker::BuildStatus::Failed => {
                    let mut active: ActiveModel = updated.clone().into();
                    active.status = Set(DeploymentStatus::Failed.as_str().to_string());
                    active.error = Set(record.error);
                    return active
                        .update(self.db.as_ref())
                        .await
                        .map_err(|e| BuilderError::Internal(e.into()));
                }
                _ => tokio::time::sleep(std::time::Duration::from_millis(500)).await,
            }
        }
    }

    pub async fn start(&self, deployment_id: &str) -> BuilderResult<Model> {
        let model = self.find(deployment_id).await?;
        if model.status != DeploymentStatus::Built.as_str() && model.status != DeploymentStatus::Stopped.as_str()
        {
            return Err(BuilderError::StateConflict(format!(
                "deployment {deployment_id} is not built"
            )));
        }
        let image_tag = model
            .image_tag
            .clone()
            .ok_or_else(|| BuilderError::Validation("deployment has no image".to_string()))?;
        let container_port = model
            .port
            .ok_or_else(|| BuilderError::Validation("deployment has no port".to_string()))? as u16;

        let host_port = {
            let _guard = self.port_lock.lock().await;
            self.allocate_port().await?
        };

        let mut labels = HashMap::new();
        labels.insert("openclaw.deployment_id".to_string(), deployment_id.to_string());
        labels.insert("openclaw.task_id".to_string(), model.task_id.clone());

        let deploy_result = self
            .runtime
            .deploy_container(DeployRequest {
                image_name: image_tag,
                container_name: format!("openclaw-deploy-{deployment_id}"),
                environment_vars: HashMap::new(),
                port_mappings: vec![PortMapping {
                    host_port,
                    container_port,
                    protocol: Protocol::Tcp,
                }],
                mounts: vec![],
                tmpfs_paths: vec![],
                use_host_network: false,
                resource_limits: Default::default(),
                restart_policy: RestartPolicy::UnlessStopped,
                log_path: std::env::temp_dir().join(format!("{deployment_id}.log")),
                command: None,
            })
            .await
            .map_err(BuilderError::from)?;

        info!(deployment_id, container_id = %deploy_result.container_id, host_port, "deployment started");

        let mut active: ActiveModel = model.into();
        active.status = Set(DeploymentStatus::Running.as_str().to_string());
        active.container_id = Set(Some(deploy_result.container_id));
        active.host_port = Set(Some(host_port as i32));
        active.url = Set(Some(format!("http://localhost:{host_port}")));
        active.started_at = Set(Some(chrono::Utc::now()));
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| BuilderError::Internal(e.into()))
    }

    pub async fn stop(&self, deployment_id: &str) -> BuilderResult<Model> {
        let model = self.find(deployment_id).await?;
        let container_id = model
            .container_id
            .clone()
            .ok_or_else(|| BuilderError::StateConflict(format!("deployment {deployment_id} has no running container")))?;

        match tokio::time::timeout(
            std::time::Duration::from_secs(STOP_GRACE_SECS),
            self.runtime.stop_container(&container_id),
        )
        .await
        {
            Ok(Ok(())) => {}
            Ok(Err(DeployerError::ContainerNotFound(_))) => {}
            Ok(Err(e)) => return Err(BuilderError::from(e)),
            Err(_) => {}
        }
        let _ = self.runtime.remove_container(&container_id).await;

        let mut active: ActiveModel = model.into();
        active.status = Set(DeploymentStatus::Stopped.as_str().to_string());
        active.container_id = Set(None);
        active.host_port = Set(None);
        active.url = Set(None);
        active.stopped_at = Set(Some(chrono::Utc::now()));
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| BuilderError::Internal(e.into()))
    }

    async fn allocate_port(&self) -> BuilderResult<u16> {
        let used_ports: std::collections::HashSet<i32> = Deployments::find()
            .filter(Column::Status.eq(DeploymentStatus::Running.as_str()))
            .all(self.db.as_ref())
            .await
            .map_err(|e| BuilderError::Internal(e.into()))?
            .into_iter()
            .filter_map(|d| d.host_port)
            .collect();

        for port in PORT_RANGE {
            if !used_ports.contains(&(port as i32)) {
                return Ok(port);
            }
        }
        Err(BuilderError::RuntimeUnavailable(
            "no free port in the deployment port range".to_string(),
        ))
    }
}
