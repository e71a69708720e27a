//! Image Builder Service: `POST /build`, `GET /builds/{id}`, `POST /build-deployment`.

use std::path::PathBuf;
use std::sync::Arc;

use openclaw_runtime::{BuildRequest, ImageBuilder};
use tracing::{info, warn};

use crate::build_tracker::{BuildRecord, BuildStatus, BuildTracker};
use crate::capability::{normalize_capabilities, Capability};
use crate::dockerfile::{
    infer_packages_from_dockerfile, persist_dockerfile, render_agent_dockerfile,
    render_deployment_dockerfile,
};
use crate::error::{BuilderError, BuilderResult};

pub struct ImageBuilderConfig {
    pub agent_images_dir: PathBuf,
    pub shared_base_image: String,
    pub registry: String,
}

/// Builds and pushes versioned agent and deployment images.
pub struct ImageBuilderService {
    runtime: Arc<dyn ImageBuilder>,
    tracker: BuildTracker,
    config: ImageBuilderConfig,
}

impl ImageBuilderService {
    pub fn new(runtime: Arc<dyn ImageBuilder>, config: ImageBuilderConfig) -> Self {
        Self {
            runtime,
            tracker: BuildTracker::new(),
            config,
        }
    }

    pub fn registry_qualified(&self, tag: &str) -> String {
        format!("{}/{}", self.config.registry, tag)
    }

    pub fn agent_images_dir(&self) -> &std::path::Path {
        &self.config.agent_images_dir
    }

    /// Check the shared base image exists locally; pull it; if that still
    /// fails and a local Dockerfile is present, build and push it. Runs once
    /// at process startup so `compose up` is self-contained.
    pub async fn bootstrap(&self) -> BuilderResult<()> {
        if self.runtime.image_exists(&self.config.shared_base_image).await? {
            return Ok(());
        }

        info!(image = %self.config.shared_base_image, "shared base image missing locally, attempting pull");
        if self.runtime.pull_image(&self.config.shared_base_image).await.is_ok() {
            return Ok(());
        }

        let base_dockerfile = self.config.agent_images_dir.join("base").join("Dockerfile");
        if !base_dockerfile.exists() {
            warn!(
                image = %self.config.shared_base_image,
                "shared base image unavailable and no local Dockerfile to bootstrap from"
            );
            return Err(BuilderError::ImageNotFound(self.config.shared_base_image.clone()));
        }

        let context = base_dockerfile.parent().unwrap().to_path_buf();
        self.runtime
            .build_image(BuildRequest {
                image_name: self.config.shared_base_image.clone(),
                context_path: context,
                dockerfile_path: Some(base_dockerfile),
                build_args: Default::default(),
                build_args_buildkit: Default::default(),
                platform: None,
                log_path: self.config.agent_images_dir.join("base").join("build.log"),
            })
            .await?;

        let qualified = self.registry_qualified(&self.config.shared_base_image);
        self.runtime
            .tag_image(&self.config.shared_base_image, &qualified)
            .await?;
        self.runtime.push_image(&qualified).await?;
        Ok(())
    }

    /// `POST /build`. Kicks off an asynchronous build; returns immediately
    /// with a `pending` record, the caller polls `GET /builds/{id}`.
    pub async fn start_build(
        &self,
        task_id: &str,
        base_image: &str,
        capabilities: &[Capability],
    ) -> BuilderResult<BuildRecord> {
        let version = 1 + self.tracker.active_or_successful_count(task_id).await as u32;
        let image_tag = format!("openclaw-agent:{task_id}-v{version}");

        let normalized = normalize_capabilities(capabilities);
        let dockerfile_text = render_agent_dockerfile(base_image, &normalized);

        let dockerfile_path =
            persist_dockerfile(&self.config.agent_images_dir, task_id, version, &dockerfile_text)
                .await
                .map_err(BuilderError::Io)?;

        let record = self.tracker.create(task_id, &image_tag).await;
        self.run_build(record.build_id.clone(), image_tag, dockerfile_path).await;

        self.tracker
            .get(&record.build_id)
            .await
            .ok_or_else(|| BuilderError::Internal(anyhow::anyhow!("build record vanished")))
    }

    async fn run_build(&self, build_id: String, image_tag: String, dockerfile_path: PathBuf) {
        self.tracker.set_building(&build_id).await;
        self.tracker
            .append_log(&build_id, format!("building {image_tag}"))
            .await;

        let context = dockerfile_path.parent().unwrap().to_path_buf();
        let build_result = self
            .runtime
            .build_image(BuildRequest {
                image_name: image_tag.clone(),
                context_path: context.clone(),
                dockerfile_path: Some(dockerfile_path),
                build_args: Default::default(),
                build_args_buildkit: Default::default(),
                platform: None,
                log_path: context.join("build.log"),
            })
            .await;

        let build_result = match build_result {
            Ok(result) => result,
            Err(e) => {
                self.tracker.set_failed(&build_id, e.to_string()).await;
                return;
            }
        };

        let qualified = self.registry_qualified(&image_tag);
        if let Err(e) = self.runtime.tag_image(&image_tag, &qualified).await {
            self.tracker.set_failed(&build_id, e.to_string()).await;
            return;
        }
        if let Err(e) = self.runtime.push_image(&qualified).await {
            self.tracker.set_failed(&build_id, e.to_string()).await;
            return;
        }

        self.tracker
            .set_success(&build_id, Some(build_result.image_id))
            .await;
    }

    pub async fn get_build(&self, build_id: &str) -> BuilderResult<BuildRecord> {
        self.tracker
            .get(build_id)
            .await
            .ok_or_else(|| BuilderError::NotFound(build_id.to_string()))
    }

    /// `POST /build-deployment`. Infers the apt/pip set from the task's most
    /// recent agent Dockerfile and renders a minimal deployment image.
    pub async fn start_deployment_build(
        &self,
        deployment_id: &str,
        task_id: &str,
        entrypoint: &str,
        port: u16,
    ) -> BuilderResult<BuildRecord> {
        let latest_dockerfile = self.config.agent_images_dir.join(task_id).join("Dockerfile");
        let dockerfile_text = tokio::fs::read_to_string(&latest_dockerfile)
            .await
            .unwrap_or_default();
        let inferred = infer_packages_from_dockerfile(&dockerfile_text);

        let image_tag = format!("openclaw-deploy:{deployment_id}");
        let rendered = render_deployment_dockerfile(&inferred, port, entrypoint);

        let deploy_dir = self.config.agent_images_dir.join("deployments").join(deployment_id);
        tokio::fs::create_dir_all(&deploy_dir).await.map_err(BuilderError::Io)?;
        let dockerfile_path = deploy_dir.join("Dockerfile");
        tokio::fs::write(&dockerfile_path, &rendered)
            .await
            .map_err(BuilderError::Io)?;

        let record = self.tracker.create(task_id, &image_tag).await;
        self.run_build(record.build_id.clone(), image_tag, dockerfile_path).await;

        self.tracker
            .get(&record.build_id)
            .await
            .ok_or_else(|| BuilderError::Internal(anyhow::anyhow!("build record vanished")))
    }
}
