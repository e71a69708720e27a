//! Per-task ring buffer of LLM interactions, surfaced for post-hoc
//! inspection after a task finishes (`GET /interactions/{task_id}`).

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::RwLock;

const MAX_INTERACTIONS_PER_TASK: usize = 100;
const TEXT_PREVIEW_CHARS: usize = 2000;
const TOOL_ARG_PREVIEW_CHARS: usize = 500;

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallSummary {
    pub id: String,
    pub name: String,
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize)]
pub struct Interaction {
    pub turn: usize,
    pub timestamp: String,
    pub provider: String,
    pub streaming: bool,
    pub request_roles: Vec<String>,
    pub response_content: Option<String>,
    pub response_tool_calls: Vec<ToolCallSummary>,
    pub finish_reason: String,
}

#[derive(Clone, Default)]
pub struct InteractionLog {
    by_task: Arc<RwLock<HashMap<String, Vec<Interaction>>>>,
}

impl InteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Extract `task_id` from `Authorization: Bearer task:<id>`.
    pub fn task_id_from_bearer(header: &str) -> Option<String> {
        header
            .strip_prefix("Bearer task:")
            .map(|rest| rest.to_string())
    }

    pub async fn record(
        &self,
        task_id: &str,
        provider: &str,
        streaming: bool,
        request_roles: Vec<String>,
        response_content: Option<&str>,
        response_tool_calls: &[Value],
        finish_reason: &str,
    ) {
        let mut guard = self.by_task.write().await;
        let turns = guard.entry(task_id.to_string()).or_default();
        if turns.len() >= MAX_INTERACTIONS_PER_TASK {
            return;
        }

        let tool_calls = response_tool_calls
            .iter()
            .map(|tc| {
                let function = tc.get("function").cloned().unwrap_or_default();
                let name = function
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let arguments = parse_and_preview_arguments(function.get("arguments"));
                ToolCallSummary {
                    id: tc.get("id").and_then(Value::as_str).unwrap_or_default().to_string(),
                    name,
                    arguments,
                }
            })
            .collect();

        turns.push(Interaction {
            turn: turns.len() + 1,
            timestamp: chrono::Utc::now().to_rfc3339(),
            provider: provider.to_string(),
            streaming,
            request_roles,
            response_content: response_content.map(|c| truncate(c, TEXT_PREVIEW_CHARS)),
            response_tool_calls: tool_calls,
            finish_reason: finish_reason.to_string(),
        });
    }

    pub async fn get(&self, task_id: &str) -> Vec<Interaction> {
        self.by_task.read().await.get(task_id).cloned().unwrap_or_default()
    }

    pub async fn clear(&self, task_id: &str) -> bool {
        self.by_task.write().await.remove(task_id).is_some()
    }
}

fn parse_and_preview_arguments(raw: Option<&Value>) -> Value {
    let Some(raw) = raw else { return Value::Null };
    let parsed = match raw {
        Value::String(s) => serde_json::from_str::<Value>(s).unwrap_or_else(|_| Value::String(s.clone())),
        other => other.clone(),
    };
    match parsed {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| match v {
                    Value::String(s) if s.len() > TOOL_ARG_PREVIEW_CHARS => {
                        (k, Value::String(format!("{}... ({} chars)", truncate(&s, TOOL_ARG_PREVIEW_CHARS), s.len())))
                    }
                    other => (k, other),
                })
                .collect(),
        ),
        other => other,
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_task_id_from_bearer_header() {
        assert_eq!(
            InteractionLog::task_id_from_bearer("Bearer task:task-abc123"),
            Some("task-abc123".to_string())
        );
        assert_eq!(InteractionLog::task_id_from_bearer("Bearer sometoken"), None);
    }

    #[tokio::test]
    async fn records_and_caps_interactions_per_task() {
        let log = InteractionLog::new();
        for _ in 0..(MAX_INTERACTIONS_PER_TASK + 5) {
            log.record("task-1", "ollama", false, vec!["user".to_string()], Some("hi"), &[], "stop")
                .await;
        }
        assert_eq!(log.get("task-1").await.len(), MAX_INTERACTIONS_PER_TASK);
    }

    #[tokio::test]
    async fn clear_removes_task_history() {
        let log = InteractionLog::new();
        log.record("task-1", "ollama", false, vec![], None, &[], "stop").await;
        assert!(log.clear("task-1").await);
        assert!(log.get("task-1").await.is_empty());
    }
}
