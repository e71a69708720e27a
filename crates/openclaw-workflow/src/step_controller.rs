//! Agent Step Sub-engine: drives one container-bound agent iteration.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use openclaw_runtime::{BindMount, ContainerRuntime, DeployRequest, ResourceLimits, RestartPolicy};
use tracing::{info, warn};

use crate::envelope::{harvest_envelope, IterationEnvelope};
use crate::error::{WorkflowEngineError, WorkflowResult};

const DESCRIPTION_TRUNCATE: usize = 2 * 1024;
const DOCKERFILE_TRUNCATE: usize = 4 * 1024;
const FOLLOW_UP_TRUNCATE: usize = 2 * 1024;

const POLL_INTERVAL: Duration = Duration::from_secs(3);
const ITERATION_CAP: Duration = Duration::from_secs(30 * 60);

/// Where the per-task workspace is bind-mounted inside the agent container.
const WORKSPACE_MOUNT_PATH: &str = "/workspace";

pub struct StepControllerConfig {
    pub workspaces_root: PathBuf,
    pub control_plane_url: String,
    pub ollama_url: String,
    pub registry: String,
}

pub struct IterationRequest {
    pub task_id: String,
    pub iteration: i32,
    pub workspace_id: String,
    pub image_tag: String,
    pub dockerfile_text: String,
    pub model: String,
    pub task_description: String,
    pub follow_up: Option<String>,
}

/// Runs one agent iteration container end-to-end: resolve image, prepare
/// workspace, launch, poll, harvest, clean up.
pub struct AgentStepController {
    runtime: Arc<dyn ContainerRuntime>,
    http: reqwest::Client,
    config: StepControllerConfig,
}

impl AgentStepController {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: StepControllerConfig) -> Self {
        Self { runtime, http: reqwest::Client::new(), config }
    }

    pub async fn run_iteration(&self, request: IterationRequest) -> WorkflowResult<IterationEnvelope> {
        let image_tag = self.resolve_image(&request.image_tag).await?;
        let workspace_dir = self.prepare_workspace(&request.workspace_id).await?;
        let env = self.compose_environment(&request, &image_tag);

        let container_id = self.launch_detached(&image_tag, &workspace_dir, env).await?;

        let exited = self.poll_until_exit_or_cap(&request.task_id, &container_id).await;
        if !exited {
            warn!(container_id, "iteration exceeded its cap, harvesting best-effort result");
        }

        let logs = self
            .runtime
            .get_container_logs(&container_id)
            .await
            .unwrap_or_default();
        let workspace_result = tokio::fs::read_to_string(workspace_dir.join("result.json"))
            .await
            .ok();

        let envelope = harvest_envelope(&logs, workspace_result.as_deref());

        if let Err(e) = self.runtime.remove_container(&container_id).await {
            warn!(container_id, error = %e, "failed to remove iteration container");
        }

        Ok(envelope)
    }

    async fn resolve_image(&self, tag: &str) -> WorkflowResult<String> {
        if self.runtime.image_exists(tag).await.map_err(|e| {
            WorkflowEngineError::RuntimeUnavailable(e.to_string())
        })? {
            return Ok(tag.to_string());
        }

        let qualified = format!("{}/{}", self.config.registry, tag);
        if self.runtime.pull_image(&qualified).await.is_ok() {
            return Ok(qualified);
        }

        Err(WorkflowEngineError::ImageNotFound(tag.to_string()))
    }

    async fn prepare_workspace(&self, workspace_id: &str) -> WorkflowResult<PathBuf> {
        let dir = self.config.workspaces_root.join(workspace_id);
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| WorkflowEngineError::Internal(e.into()))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = std::fs::Permissions::from_mode(0o777);
            let _ = tokio::fs::set_permissions(&dir, permissions).await;
        }

        Ok(dir)
    }

    fn compose_environment(
        &self,
        request: &IterationRequest,
        image_tag: &str,
    ) -> Vec<(String, String)> {
        vec![
            ("TASK_ID".to_string(), request.task_id.clone()),
            ("ITERATION".to_string(), request.iteration.to_string()),
            ("CONTROL_PLANE_URL".to_string(), self.config.control_plane_url.clone()),
            (
                "LLM_ROUTER_URL".to_string(),
                format!("{}/api/llm", self.config.control_plane_url),
            ),
            ("OLLAMA_URL".to_string(), self.config.ollama_url.clone()),
            ("LLM_MODEL".to_string(), request.model.clone()),
            (
                "TASK_DESCRIPTION".to_string(),
                truncate(&request.task_description, DESCRIPTION_TRUNCATE),
            ),
            ("AGENT_IMAGE".to_string(), image_tag.to_string()),
            ("WORKSPACE_DIR".to_string(), WORKSPACE_MOUNT_PATH.to_string()),
            (
                "AGENT_DOCKERFILE".to_string(),
                truncate(&request.dockerfile_text, DOCKERFILE_TRUNCATE),
            ),
            (
                "FOLLOW_UP".to_string(),
                request
                    .follow_up
                    .as_deref()
                    .map(|f| truncate(f, FOLLOW_UP_TRUNCATE))
                    .unwrap_or_default(),
            ),
        ]
    }

    async fn launch_detached(
        &self,
        image_tag: &str,
        workspace_dir: &std::path::Path,
        env: Vec<(String, String)>,
    ) -> WorkflowResult<String> {
        let environment_vars: HashMap<String, String> = env.into_iter().collect();

        let result = self
            .runtime
            .deploy_container(DeployRequest {
                image_name: image_tag.to_string(),
                container_name: format!("openclaw-iter-{}", uuid::Uuid::new_v4().simple()),
                environment_vars,
                port_mappings: vec![],
                mounts: vec![BindMount {
                    host_path: workspace_dir.to_path_buf(),
                    container_path: WORKSPACE_MOUNT_PATH.to_string(),
                    read_only: false,
                }],
                tmpfs_paths: vec!["/tmp".to_string()],
                use_host_network: true,
                resource_limits: ResourceLimits::default(),
                restart_policy: RestartPolicy::Never,
                log_path: workspace_dir.join("container.log"),
                command: None,
            })
            .await
            .map_err(WorkflowEngineError::from)?;

        Ok(result.container_id)
    }

    /// Poll container status every ~3s until it exits or the overall cap
    /// elapses, appending any new gateway turns along the way so each turn
    /// becomes its own recorded activity. Returns `true` if the container
    /// exited on its own.
    async fn poll_until_exit_or_cap(&self, task_id: &str, container_id: &str) -> bool {
        let deadline = tokio::time::Instant::now() + ITERATION_CAP;
        let mut seen = 0usize;

        loop {
            seen = self.poll_new_turns(task_id, seen).await;

            match self.runtime.get_container_info(container_id).await {
                Ok(info) => {
                    if matches!(
                        info.status,
                        openclaw_runtime::ContainerStatus::Exited | openclaw_runtime::ContainerStatus::Dead
                    ) {
                        self.poll_new_turns(task_id, seen).await;
                        return true;
                    }
                }
                Err(e) => {
                    warn!(container_id, error = %e, "failed to inspect iteration container");
                    return false;
                }
            }

            if tokio::time::Instant::now() >= deadline {
                return false;
            }

            info!(container_id, "iteration still running, polling again");
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// `GET /interactions/{task_id}?since=<seen>` on the LLM gateway and log
    /// any turns past `since`. Returns the new high-water mark, or `since`
    /// unchanged if the gateway couldn't be reached.
    async fn poll_new_turns(&self, task_id: &str, since: usize) -> usize {
        let url = format!("{}/interactions/{}?since={}", self.gateway_base_url(), task_id, since);
        let turns: Vec<PolledTurn> = match self.http.get(&url).send().await {
            Ok(resp) => match resp.json().await {
                Ok(turns) => turns,
                Err(e) => {
                    warn!(task_id, error = %e, "failed to decode gateway interaction poll");
                    return since;
                }
            },
            Err(e) => {
                warn!(task_id, error = %e, "failed to poll gateway interactions");
                return since;
            }
        };

        let mut latest = since;
        for turn in &turns {
            info!(
                task_id,
                turn = turn.turn,
                provider = %turn.provider,
                finish_reason = %turn.finish_reason,
                "new LLM turn recorded"
            );
            latest = latest.max(turn.turn);
        }
        latest
    }

    fn gateway_base_url(&self) -> String {
        format!("{}/api/llm", self.config.control_plane_url)
    }
}

#[derive(serde::Deserialize)]
struct PolledTurn {
    turn: usize,
    provider: String,
    finish_reason: String,
}

fn truncate(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }
    let mut end = max_bytes;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    text[..end].to_string()
}
