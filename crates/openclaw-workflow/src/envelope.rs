//! The result envelope an agent iteration returns to the workflow, and the
//! container-log marker protocol it is harvested from.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

const RESULT_START: &str = "===OPENCLAW_RESULT_JSON_START===";
const RESULT_END: &str = "===OPENCLAW_RESULT_JSON_END===";

const AGENT_LOGS_CEILING: usize = 50 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CapabilityAsk {
    #[serde(rename = "type")]
    pub kind: String,
    pub resource: String,
    pub justification: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DeploymentAsk {
    pub name: String,
    pub port: u16,
    pub entrypoint: String,
    #[serde(default)]
    pub files: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IterationEnvelope {
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub capability_requested: bool,
    #[serde(default)]
    pub deployment_requested: bool,
    #[serde(default)]
    pub agent_failed: bool,

    pub capability: Option<CapabilityAsk>,
    pub deployment: Option<DeploymentAsk>,

    #[serde(default)]
    pub deliverables: HashMap<String, String>,
    pub error: Option<String>,
    pub output: Option<Value>,

    #[serde(skip_deserializing)]
    pub agent_logs: Option<String>,
}

/// Locate the delimited JSON block in container logs; fall back to
/// `workspace/result.json`; fall back to a synthetic failure scanned from
/// the tail of the logs.
pub fn harvest_envelope(logs: &str, workspace_result_json: Option<&str>) -> IterationEnvelope {
    let mut envelope = if let Some(block) = extract_delimited_block(logs) {
        serde_json::from_str::<IterationEnvelope>(&block).unwrap_or_else(|e| {
            synthetic_failure(format!("failed to parse result envelope: {e}"))
        })
    } else if let Some(text) = workspace_result_json {
        serde_json::from_str::<IterationEnvelope>(text)
            .unwrap_or_else(|e| synthetic_failure(format!("failed to parse result.json: {e}")))
    } else {
        scan_tail_for_failure(logs)
    };

    apply_marker_fallbacks(&mut envelope, logs);

    envelope.agent_logs = Some(truncate(logs, AGENT_LOGS_CEILING));
    envelope
}

/// The agent-side wrapper sometimes prints `CAPABILITY_REQUEST:`/
/// `DEPLOYMENT_REQUEST:` marker lines straight to stdout instead of (or
/// alongside) a structured envelope. Pick those up whenever the envelope
/// itself didn't already carry the corresponding request.
fn apply_marker_fallbacks(envelope: &mut IterationEnvelope, logs: &str) {
    if !envelope.capability_requested {
        if let Some(ask) = logs.lines().rev().find_map(parse_capability_request_marker) {
            envelope.capability_requested = true;
            envelope.capability = Some(ask);
        }
    }
    if !envelope.deployment_requested {
        if let Some(ask) = logs.lines().rev().find_map(parse_deployment_request_marker) {
            envelope.deployment_requested = true;
            envelope.deployment = Some(ask);
        }
    }
}

fn extract_delimited_block(logs: &str) -> Option<String> {
    let start = logs.find(RESULT_START)? + RESULT_START.len();
    let end = logs[start..].find(RESULT_END)? + start;
    Some(logs[start..end].trim().to_string())
}

fn scan_tail_for_failure(logs: &str) -> IterationEnvelope {
    let tail: String = logs.chars().rev().take(4096).collect::<String>().chars().rev().collect();
    if tail.contains("ERROR:") || tail.contains("Traceback (most recent call last)") {
        synthetic_failure("agent container produced no result envelope and logged an error".to_string())
    } else {
        synthetic_failure("agent container produced no result envelope".to_string())
    }
}

fn synthetic_failure(message: String) -> IterationEnvelope {
    IterationEnvelope {
        agent_failed: true,
        error: Some(message),
        ..Default::default()
    }
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

/// Parse `CAPABILITY_REQUEST:<kind>:<comma-packages>:<reason>` lines emitted
/// by the agent-side wrapper, as a fallback when the structured envelope
/// itself didn't carry `capability`.
pub fn parse_capability_request_marker(line: &str) -> Option<CapabilityAsk> {
    let rest = line.strip_prefix("CAPABILITY_REQUEST:")?;
    let mut parts = rest.splitn(3, ':');
    let kind = parts.next()?.to_string();
    let resource = parts.next()?.to_string();
    let justification = parts.next().unwrap_or("").to_string();
    Some(CapabilityAsk { kind, resource, justification })
}

/// Parse `DEPLOYMENT_REQUEST:<name>:<port>:<entrypoint>`, stripping an
/// unbalanced trailing quote from the entrypoint.
pub fn parse_deployment_request_marker(line: &str) -> Option<DeploymentAsk> {
    let rest = line.strip_prefix("DEPLOYMENT_REQUEST:")?;
    let mut parts = rest.splitn(3, ':');
    let name = parts.next()?.to_string();
    let port: u16 = parts.next()?.parse().ok()?;
    let mut entrypoint = parts.next().unwrap_or("").to_string();

    let quote_count = entrypoint.matches(['"', '\'']).count();
    if quote_count % 2 != 0 {
        if let Some(last) = entrypoint.chars().last() {
            if last == '"' || last == '\'' {
                entrypoint.pop();
            }
        }
    }

    Some(DeploymentAsk { name, port, entrypoint, files: Vec::new() })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_delimited_json_block() {
        let logs = format!(
            "some noise\n{RESULT_START}\n{{\"completed\":true}}\n{RESULT_END}\nmore noise"
        );
        let envelope = harvest_envelope(&logs, None);
        assert!(envelope.completed);
        assert!(!envelope.agent_failed);
    }

    #[test]
    fn falls_back_to_workspace_result_json() {
        let envelope = harvest_envelope("no markers here", Some(r#"{"completed":true}"#));
        assert!(envelope.completed);
    }

    #[test]
    fn synthesizes_failure_when_nothing_found() {
        let envelope = harvest_envelope("Traceback (most recent call last):\nERROR: boom", None);
        assert!(envelope.agent_failed);
    }

    #[test]
    fn parses_capability_request_marker() {
        let ask = parse_capability_request_marker("CAPABILITY_REQUEST:tool_install:pandas:need dataframes").unwrap();
        assert_eq!(ask.kind, "tool_install");
        assert_eq!(ask.resource, "pandas");
        assert_eq!(ask.justification, "need dataframes");
    }

    #[test]
    fn parses_deployment_request_marker_stripping_trailing_quote() {
        let ask = parse_deployment_request_marker("DEPLOYMENT_REQUEST:app:8080:python app.py\"").unwrap();
        assert_eq!(ask.name, "app");
        assert_eq!(ask.port, 8080);
        assert_eq!(ask.entrypoint, "python app.py");
    }
}
