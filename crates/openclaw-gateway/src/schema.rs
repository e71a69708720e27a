//! OpenAI-compatible chat completion schema the gateway accepts and returns.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatMessage {
    /// Flatten OpenAI's multi-part content (`[{"type":"text","text":"..."}]`)
    /// down to a plain string, the way the agent-side SDK always sends it
    /// back out once a turn round-trips through here.
    pub fn content_as_text(&self) -> Option<String> {
        match self.content.as_ref()? {
            Value::String(s) => Some(s.clone()),
            Value::Array(parts) => {
                let joined: Vec<String> = parts
                    .iter()
                    .map(|part| match part {
                        Value::Object(obj) if obj.get("type").and_then(Value::as_str) == Some("text") => {
                            obj.get("text").and_then(Value::as_str).unwrap_or("").to_string()
                        }
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect();
                Some(joined.join("\n"))
            }
            other => Some(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i32,
    #[serde(default)]
    pub stream: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_choice: Option<Value>,
}

fn default_temperature() -> f32 {
    0.7
}

fn default_max_tokens() -> i32 {
    4096
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Usage {
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChoice {
    pub index: u32,
    pub message: ChatMessage,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: i64,
    pub model: String,
    pub choices: Vec<ChatCompletionChoice>,
    pub usage: Usage,
}

impl ChatCompletionResponse {
    pub fn new(id: String, model: String, choice: ChatCompletionChoice, usage: Usage) -> Self {
        Self {
            id,
            object: "chat.completion",
            created: chrono::Utc::now().timestamp(),
            model,
            choices: vec![choice],
            usage,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Provider {
    Ollama,
    Gemini,
    Anthropic,
    OpenAi,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ollama => "ollama",
            Self::Gemini => "gemini",
            Self::Anthropic => "anthropic",
            Self::OpenAi => "openai",
        }
    }
}

/// Detect which backend to route to from the requested model name.
/// Everything that doesn't match a hosted provider's prefix falls through
/// to the local Ollama runtime.
pub fn detect_provider(model: &str) -> Provider {
    let lower = model.to_lowercase();
    if lower.starts_with("gemini") {
        Provider::Gemini
    } else if lower.starts_with("claude") {
        Provider::Anthropic
    } else if ["gpt-", "o1-", "o3-", "o4-"].iter().any(|p| lower.starts_with(p)) {
        Provider::OpenAi
    } else {
        Provider::Ollama
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_provider_by_model_prefix() {
        assert_eq!(detect_provider("gemini-2.5-flash"), Provider::Gemini);
        assert_eq!(detect_provider("claude-sonnet-4"), Provider::Anthropic);
        assert_eq!(detect_provider("gpt-4o"), Provider::OpenAi);
        assert_eq!(detect_provider("o3-mini"), Provider::OpenAi);
        assert_eq!(detect_provider("gemma3:27b"), Provider::Ollama);
    }

    #[test]
    fn flattens_multipart_content_to_text() {
        let msg = ChatMessage {
            content: Some(serde_json::json!([{"type": "text", "text": "a"}, {"type": "text", "text": "b"}])),
            ..Default::default()
        };
        assert_eq!(msg.content_as_text(), Some("a\nb".to_string()));
    }
}
