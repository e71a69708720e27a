//! In-memory tracking of image build progress.
//!
//! Builds are not persisted: there is no `builds` table in the schema, and a
//! build is meaningful only for as long as the process that started it is
//! alive. A crash mid-build simply loses the status; the next `/build` call
//! for the task starts a fresh version.

use std::collections::HashMap;
use std::sync::Arc;

use openclaw_core::UtcDateTime;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BuildStatus {
    Pending,
    Building,
    Success,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRecord {
    pub build_id: String,
    pub task_id: String,
    pub image_tag: String,
    pub status: BuildStatus,
    pub digest: Option<String>,
    pub error: Option<String>,
    pub logs: Vec<String>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

/// Process-wide registry of build records, keyed by build id.
#[derive(Clone, Default)]
pub struct BuildTracker {
    records: Arc<RwLock<HashMap<String, BuildRecord>>>,
}

impl BuildTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, task_id: &str, image_tag: &str) -> BuildRecord {
        let now = chrono::Utc::now();
        let record = BuildRecord {
            build_id: format!("build-{}", uuid::Uuid::new_v4().simple()),
            task_id: task_id.to_string(),
            image_tag: image_tag.to_string(),
            status: BuildStatus::Pending,
            digest: None,
            error: None,
            logs: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        self.records
            .write()
            .await
            .insert(record.build_id.clone(), record.clone());
        record
    }

    pub async fn get(&self, build_id: &str) -> Option<BuildRecord> {
        self.records.read().await.get(build_id).cloned()
    }

    /// Count builds for a task whose status is not yet terminal-failed, used
    /// to compute the next version number.
    pub async fn active_or_successful_count(&self, task_id: &str) -> usize {
        self.records
            .read()
            .await
            .values()
            .filter(|r| r.task_id == task_id && r.status != BuildStatus::Failed)
            .count()
    }

    pub async fn set_building(&self, build_id: &str) {
        self.update(build_id, |record| record.status = BuildStatus::Building)
            .await;
    }

    pub async fn append_log(&self, build_id: &str, line: impl Into<String>) {
        self.update(build_id, |record| record.logs.push(line.into()))
            .await;
    }

    pub async fn set_success(&self, build_id: &str, digest: Option<String>) {
        self.update(build_id, |record| {
            record.status = BuildStatus::Success;
            record.digest = digest;
        })
        .await;
    }

    pub async fn set_failed(&self, build_id: &str, error: impl Into<String>) {
        self.update(build_id, |record| {
            record.status = BuildStatus::Failed;
            record.error = Some(error.into());
        })
        .await;
    }

    async fn update(&self, build_id: &str, f: impl FnOnce(&mut BuildRecord)) {
        if let Some(record) = self.records.write().await.get_mut(build_id) {
            f(record);
            record.updated_at = chrono::Utc::now();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn tracks_build_lifecycle() {
        let tracker = BuildTracker::new();
        let record = tracker.create("task-1", "openclaw-agent:task-1-v1").await;

        assert_eq!(record.status, BuildStatus::Pending);
        tracker.set_building(&record.build_id).await;
        tracker.append_log(&record.build_id, "step 1").await;
        tracker
            .set_success(&record.build_id, Some("sha256:abc".to_string()))
            .await;

        let fetched = tracker.get(&record.build_id).await.unwrap();
        assert_eq!(fetched.status, BuildStatus::Success);
        assert_eq!(fetched.digest.as_deref(), Some("sha256:abc"));
        assert_eq!(fetched.logs, vec!["step 1".to_string()]);
    }

    #[tokio::test]
    async fn active_count_excludes_failed_builds() {
        let tracker = BuildTracker::new();
        let a = tracker.create("task-1", "tag-v1").await;
        let b = tracker.create("task-1", "tag-v2").await;
        tracker.set_failed(&a.build_id, "boom").await;
        tracker.set_success(&b.build_id, None).await;

        assert_eq!(tracker.active_or_successful_count("task-1").await, 1);
    }
}
