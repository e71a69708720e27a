//! Task Workflow Engine: the durable per-task state machine.
//!
//! Initializing -> Iterating (loop) -> { Approving -> Iterating } |
//! BuildingDeploy | Finalizing.

use std::sync::Arc;

use openclaw_builder::capability::{Capability, CapabilityKind};
use openclaw_builder::{BuildStatus, DeploymentService, ImageBuilderService};
use openclaw_entities::capability_requests::{
    ActiveModel as CapabilityRequestActiveModel, CapabilityType, Entity as CapabilityRequests,
    RequestStatus,
};
use openclaw_entities::task_outputs::{ActiveModel as TaskOutputActiveModel, Column as TaskOutputColumn, Entity as TaskOutputs};
use openclaw_entities::tasks::{ActiveModel as TaskActiveModel, Entity as Tasks, Model as TaskModel, TaskStatus};
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder,
};
use tracing::{info, warn};

use crate::envelope::IterationEnvelope;
use crate::error::{WorkflowEngineError, WorkflowResult};
use crate::signal::{ApprovalOutcome, SignalRegistry};
use crate::step_controller::{AgentStepController, IterationRequest};

pub const ITERATION_CAP: i32 = 50;

pub struct TaskWorkflowEngine {
    db: Arc<DatabaseConnection>,
    step_controller: Arc<AgentStepController>,
    image_builder: Arc<ImageBuilderService>,
    deployments: Arc<DeploymentService>,
    pub signals: SignalRegistry,
    shared_base_image: String,
}

impl TaskWorkflowEngine {
    pub fn new(
        db: Arc<DatabaseConnection>,
        step_controller: Arc<AgentStepController>,
        image_builder: Arc<ImageBuilderService>,
        deployments: Arc<DeploymentService>,
        shared_base_image: String,
    ) -> Self {
        Self {
            db,
            step_controller,
            image_builder,
            deployments,
            signals: SignalRegistry::new(),
            shared_base_image,
        }
    }

    /// Run a task's workflow from its current state to completion.
    /// `follow_up` is `Some` only for continuation workflows.
    pub async fn run(&self, task_id: &str, follow_up: Option<String>) -> WorkflowResult<()> {
        let mut task = self.load_task(task_id).await?;
        self.mark_running(&task).await?;

        let mut iteration = self.next_iteration_number(task_id).await?;
        let mut follow_up = follow_up;

        loop {
            if iteration > ITERATION_CAP {
                warn!(task_id, "iteration cap reached, finalizing as failed");
                return self.finalize(&task, false).await;
            }

            let envelope = self
                .run_one_iteration(&task, iteration, follow_up.take())
                .await?;

            self.store_output(task_id, iteration, &envelope, &task.current_image).await;

            if envelope.agent_failed {
                return self.finalize(&task, false).await;
            }
            if envelope.deployment_requested {
                if let Some(ask) = &envelope.deployment {
                    self.deployments
                        .create(&ask.name, task_id, Some(ask.entrypoint.clone()), Some(ask.port as i32))
                        .await
                        .map_err(WorkflowEngineError::from)?;
                }
                return self.finalize(&task, true).await;
            }
            if envelope.completed {
                return self.finalize(&task, true).await;
            }
            if envelope.capability_requested {
                if let Some(ask) = &envelope.capability {
                    let outcome = self.approve(&mut task, ask).await?;
                    if outcome == ApprovalOutcome::TimedOut {
                        warn!(task_id, "capability approval timed out, finalizing as failed");
                        return self.finalize(&task, false).await;
                    }
                }
            }

            iteration += 1;
        }
    }

    async fn run_one_iteration(
        &self,
        task: &TaskModel,
        iteration: i32,
        follow_up: Option<String>,
    ) -> WorkflowResult<IterationEnvelope> {
        let image_tag = task
            .current_image
            .clone()
            .unwrap_or_else(|| self.shared_base_image.clone());
        let dockerfile_text = self.read_current_dockerfile(&task.id).await;

        self.step_controller
            .run_iteration(IterationRequest {
                task_id: task.id.clone(),
                iteration,
                workspace_id: task.workspace_id.clone(),
                image_tag,
                dockerfile_text,
                model: task.llm_model.clone(),
                task_description: task.description.clone().unwrap_or_default(),
                follow_up,
            })
            .await
    }

    async fn read_current_dockerfile(&self, task_id: &str) -> String {
        let path = self
            .image_builder_agent_images_dir()
            .join(task_id)
            .join("Dockerfile");
        tokio::fs::read_to_string(path).await.unwrap_or_default()
    }

    fn image_builder_agent_images_dir(&self) -> std::path::PathBuf {
        // The builder service owns the canonical path; mirrored here so the
        // workflow engine can read the same Dockerfile without a getter
        // round-trip through an HTTP call.
        self.image_builder.agent_images_dir().to_path_buf()
    }

    async fn approve(
        &self,
        task: &mut TaskModel,
        ask: &crate::envelope::CapabilityAsk,
    ) -> WorkflowResult<ApprovalOutcome> {
        let capability_type = CapabilityType::parse(&ask.kind).unwrap_or(CapabilityType::ToolInstall);

        let request = CapabilityRequestActiveModel {
            task_id: Set(task.id.clone()),
            capability_type: Set(capability_type.as_str().to_string()),
            resource_name: Set(ask.resource.clone()),
            justification: Set(ask.justification.clone()),
            ..Default::default()
        }
        .insert(self.db.as_ref())
        .await
        .map_err(|e| WorkflowEngineError::Internal(e.into()))?;

        info!(task_id = %task.id, request_id = request.id, "suspended iterating, awaiting capability approval");
        let outcome = self.signals.wait_for_approval(request.id).await;

        let status = match outcome {
            ApprovalOutcome::Approved => RequestStatus::Approved,
            ApprovalOutcome::Denied => RequestStatus::Denied,
            ApprovalOutcome::TimedOut => RequestStatus::Denied,
        };
        let mut active: CapabilityRequestActiveModel = CapabilityRequests::find_by_id(request.id)
            .one(self.db.as_ref())
            .await
            .map_err(|e| WorkflowEngineError::Internal(e.into()))?
            .ok_or_else(|| WorkflowEngineError::NotFound(format!("capability request {}", request.id)))?
            .into();
        active.status = Set(status.as_str().to_string());
        active.reviewed_at = Set(Some(chrono::Utc::now()));
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| WorkflowEngineError::Internal(e.into()))?;

        if outcome == ApprovalOutcome::Approved {
            let base_image = task
                .current_image
                .clone()
                .unwrap_or_else(|| self.shared_base_image.clone());
            let capability = Capability {
                kind: map_capability_kind(capability_type),
                name: ask.resource.clone(),
                version: None,
            };

            match self
                .image_builder
                .start_build(&task.id, &base_image, std::slice::from_ref(&capability))
                .await
            {
                Ok(build) => {
                    let build = self.poll_build_until_terminal(&build.build_id).await;
                    if build.status == BuildStatus::Success {
                        let mut active: TaskActiveModel = task.clone().into();
                        active.current_image = Set(Some(build.image_tag.clone()));
                        *task = active
                            .update(self.db.as_ref())
                            .await
                            .map_err(|e| WorkflowEngineError::Internal(e.into()))?;
                    } else {
                        warn!(task_id = %task.id, "capability build failed, falling back to prior image");
                    }
                }
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "failed to start capability build");
                }
            }
        }

        Ok(outcome)
    }

    async fn poll_build_until_terminal(&self, build_id: &str) -> openclaw_builder::BuildRecord {
        loop {
            if let Ok(record) = self.image_builder.get_build(build_id).await {
                if record.status == BuildStatus::Success || record.status == BuildStatus::Failed {
                    return record;
                }
            }
            tokio::time::sleep(std::time::Duration::from_millis(500)).await;
        }
    }

    async fn load_task(&self, task_id: &str) -> WorkflowResult<TaskModel> {
        Tasks::find_by_id(task_id.to_string())
            .one(self.db.as_ref())
            .await
            .map_err(|e| WorkflowEngineError::Internal(e.into()))?
            .ok_or_else(|| WorkflowEngineError::NotFound(task_id.to_string()))
    }

    async fn mark_running(&self, task: &TaskModel) -> WorkflowResult<()> {
        let mut active: TaskActiveModel = task.clone().into();
        active.status = Set(TaskStatus::Running.as_str().to_string());
        if task.started_at.is_none() {
            active.started_at = Set(Some(chrono::Utc::now()));
        }
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| WorkflowEngineError::Internal(e.into()))?;
        Ok(())
    }

    async fn next_iteration_number(&self, task_id: &str) -> WorkflowResult<i32> {
        let last = TaskOutputs::find()
            .filter(TaskOutputColumn::TaskId.eq(task_id))
            .order_by_desc(TaskOutputColumn::Iteration)
            .one(self.db.as_ref())
            .await
            .map_err(|e| WorkflowEngineError::Internal(e.into()))?;
        Ok(last.map(|o| o.iteration + 1).unwrap_or(1))
    }

    async fn store_output(
        &self,
        task_id: &str,
        iteration: i32,
        envelope: &IterationEnvelope,
        image_used: &Option<String>,
    ) {
        let record = TaskOutputActiveModel {
            task_id: Set(task_id.to_string()),
            iteration: Set(iteration),
            completed: Set(envelope.completed),
            capability_requested: Set(envelope.capability_requested),
            agent_logs: Set(envelope.agent_logs.clone()),
            output: Set(envelope.output.clone()),
            error: Set(envelope.error.clone()),
            image_used: Set(image_used.clone()),
            deliverables: Set(serde_json::to_value(&envelope.deliverables).ok()),
            ..Default::default()
        };

        // Storing output is best-effort: a failure here must not abort the
        // workflow, only be logged.
        if let Err(e) = record.insert(self.db.as_ref()).await {
            warn!(task_id, iteration, error = %e, "failed to store iteration output");
        }
    }

    async fn finalize(&self, task: &TaskModel, succeeded: bool) -> WorkflowResult<()> {
        let mut active: TaskActiveModel = task.clone().into();
        active.status = Set(if succeeded {
            TaskStatus::Completed.as_str().to_string()
        } else {
            TaskStatus::Failed.as_str().to_string()
        });
        active.completed_at = Set(Some(chrono::Utc::now()));
        active
            .update(self.db.as_ref())
            .await
            .map_err(|e| WorkflowEngineError::Internal(e.into()))?;
        Ok(())
    }
}

fn map_capability_kind(capability_type: CapabilityType) -> CapabilityKind {
    match capability_type {
        CapabilityType::ToolInstall => CapabilityKind::PipPackage,
        CapabilityType::NetworkAccess => CapabilityKind::Tool,
        CapabilityType::FilesystemAccess => CapabilityKind::Tool,
        CapabilityType::DatabaseAccess => CapabilityKind::AptPackage,
    }
}
