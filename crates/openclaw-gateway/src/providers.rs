//! Non-streaming provider backends: Ollama, Gemini, Anthropic, OpenAI.
//!
//! Each backend accepts the gateway's internal [`ChatCompletionRequest`] and
//! returns a normalized [`ChatCompletionResponse`], regardless of how
//! different the wire format of the upstream API is.

use serde_json::{json, Value};
use uuid::Uuid;

use crate::error::{GatewayError, GatewayResult};
use crate::schema::{ChatCompletionChoice, ChatCompletionRequest, ChatCompletionResponse, ChatMessage, Usage};
use crate::thought_signature::ThoughtSignatureCache;

const GEMINI_OPENAI_COMPAT_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";
const ANTHROPIC_MESSAGES_URL: &str = "https://api.anthropic.com/v1/messages";
const OPENAI_CHAT_URL: &str = "https://api.openai.com/v1/chat/completions";

pub async fn call_ollama(
    client: &reqwest::Client,
    ollama_url: &str,
    req: &ChatCompletionRequest,
) -> GatewayResult<ChatCompletionResponse> {
    let messages: Vec<Value> = req
        .messages
        .iter()
        .map(|m| {
            let mut obj = json!({
                "role": m.role,
                "content": m.content_as_text().unwrap_or_default(),
            });
            if let Some(tool_calls) = &m.tool_calls {
                obj["tool_calls"] = json!(tool_calls);
            }
            obj
        })
        .collect();

    let mut payload = json!({
        "model": req.model,
        "messages": messages,
        "stream": false,
        "options": {
            "temperature": req.temperature,
            "num_predict": req.max_tokens,
        },
    });
    if let Some(tools) = &req.tools {
        payload["tools"] = json!(tools);
    }

    let response = client
        .post(format!("{ollama_url}/api/chat"))
        .json(&payload)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| GatewayError::ProviderError {
            provider: "ollama".to_string(),
            message: e.to_string(),
        })?;
    let data: Value = response.json().await?;

    let message = data.get("message").cloned().unwrap_or_default();
    let content = message.get("content").and_then(Value::as_str).unwrap_or_default();
    let tool_calls = message.get("tool_calls").and_then(Value::as_array).cloned();
    let finish_reason = if tool_calls.is_some() { "tool_calls" } else { "stop" };

    let prompt_tokens = data.get("prompt_eval_count").and_then(Value::as_i64).unwrap_or(0);
    let completion_tokens = data.get("eval_count").and_then(Value::as_i64).unwrap_or(0);

    Ok(ChatCompletionResponse::new(
        format!("chatcmpl-{}", Uuid::new_v4().simple()),
        req.model.clone(),
        ChatCompletionChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: Some(Value::String(content.to_string())),
                tool_calls,
                ..Default::default()
            },
            finish_reason: finish_reason.to_string(),
        },
        Usage {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        },
    ))
}

pub async fn call_gemini(
    client: &reqwest::Client,
    api_key: &str,
    signatures: &ThoughtSignatureCache,
    req: &ChatCompletionRequest,
) -> GatewayResult<ChatCompletionResponse> {
    let messages = build_gemini_messages(req, signatures).await;

    let mut payload = json!({
        "model": req.model,
        "messages": messages,
        "temperature": req.temperature,
        "max_tokens": req.max_tokens,
        "stream": false,
    });
    if let Some(tools) = &req.tools {
        payload["tools"] = json!(tools);
    }
    if let Some(tool_choice) = &req.tool_choice {
        payload["tool_choice"] = tool_choice.clone();
    }

    let response = client
        .post(GEMINI_OPENAI_COMPAT_URL)
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| GatewayError::ProviderError {
            provider: "gemini".to_string(),
            message: e.to_string(),
        })?;
    let data: Value = response.json().await?;

    let choices = data.get("choices").and_then(Value::as_array).cloned().unwrap_or_default();
    let first = choices.first().cloned().unwrap_or_default();
    let message = first.get("message").cloned().unwrap_or_default();
    let tool_calls = message.get("tool_calls").and_then(Value::as_array).cloned();

    if let Some(tool_calls) = &tool_calls {
        signatures.harvest_from_tool_calls(tool_calls).await;
    }

    // Gemini's OpenAI-compat endpoint sometimes reports finish_reason "stop"
    // even when tool_calls are present; OpenAI clients branch on this field.
    let mut finish_reason = first.get("finish_reason").and_then(Value::as_str).unwrap_or("stop").to_string();
    if tool_calls.is_some() && finish_reason != "tool_calls" {
        finish_reason = "tool_calls".to_string();
    }

    let usage = data.get("usage").cloned().unwrap_or_default();
    Ok(ChatCompletionResponse::new(
        data.get("id").and_then(Value::as_str).unwrap_or("chatcmpl-gemini").to_string(),
        req.model.clone(),
        ChatCompletionChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: message.get("content").cloned(),
                tool_calls,
                ..Default::default()
            },
            finish_reason,
        },
        Usage {
            prompt_tokens: usage.get("prompt_tokens").and_then(Value::as_i64).unwrap_or(0),
            completion_tokens: usage.get("completion_tokens").and_then(Value::as_i64).unwrap_or(0),
            total_tokens: usage.get("total_tokens").and_then(Value::as_i64).unwrap_or(0),
        },
    ))
}

async fn build_gemini_messages(req: &ChatCompletionRequest, signatures: &ThoughtSignatureCache) -> Vec<Value> {
    let mut out = Vec::with_capacity(req.messages.len());
    for m in &req.messages {
        let mut obj = json!({ "role": m.role, "content": m.content });
        if let Some(tool_calls) = &m.tool_calls {
            let mut patched = Vec::with_capacity(tool_calls.len());
            for tc in tool_calls {
                let mut tc = tc.clone();
                signatures.inject(&mut tc).await;
                patched.push(tc);
            }
            obj["tool_calls"] = json!(patched);
        }
        if let Some(id) = &m.tool_call_id {
            obj["tool_call_id"] = json!(id);
        }
        out.push(obj);
    }
    out
}

pub async fn call_anthropic(
    client: &reqwest::Client,
    api_key: &str,
    req: &ChatCompletionRequest,
) -> GatewayResult<ChatCompletionResponse> {
    let mut system_text = String::new();
    let mut messages = Vec::new();

    for m in &req.messages {
        match m.role.as_str() {
            "system" => {
                if let Some(text) = m.content_as_text() {
                    system_text.push_str(&text);
                    system_text.push('\n');
                }
            }
            "tool" => {
                messages.push(json!({
                    "role": "user",
                    "content": [{
                        "type": "tool_result",
                        "tool_use_id": m.tool_call_id.clone().unwrap_or_default(),
                        "content": m.content_as_text().unwrap_or_default(),
                    }],
                }));
            }
            "assistant" if m.tool_calls.is_some() => {
                let mut blocks = Vec::new();
                if let Some(text) = m.content_as_text() {
                    if !text.is_empty() {
                        blocks.push(json!({"type": "text", "text": text}));
                    }
                }
                for tc in m.tool_calls.as_ref().unwrap() {
                    let function = tc.get("function").cloned().unwrap_or_default();
                    let arguments = function
                        .get("arguments")
                        .and_then(Value::as_str)
                        .and_then(|s| serde_json::from_str::<Value>(s).ok())
                        .unwrap_or_else(|| json!({}));
                    blocks.push(json!({
                        "type": "tool_use",
                        "id": tc.get("id").cloned().unwrap_or(Value::Null),
                        "name": function.get("name").cloned().unwrap_or(Value::Null),
                        "input": arguments,
                    }));
                }
                messages.push(json!({"role": "assistant", "content": blocks}));
            }
            role => {
                messages.push(json!({"role": role, "content": m.content_as_text().unwrap_or_default()}));
            }
        }
    }

    let mut payload = json!({
        "model": req.model,
        "messages": messages,
        "max_tokens": req.max_tokens,
        "temperature": req.temperature,
    });
    if !system_text.trim().is_empty() {
        payload["system"] = json!(system_text.trim());
    }
    if let Some(tools) = &req.tools {
        let anthropic_tools: Vec<Value> = tools
            .iter()
            .filter(|t| t.get("type").and_then(Value::as_str) == Some("function"))
            .map(|t| {
                let function = t.get("function").cloned().unwrap_or_default();
                json!({
                    "name": function.get("name").cloned().unwrap_or(Value::Null),
                    "description": function.get("description").cloned().unwrap_or(Value::Null),
                    "input_schema": function.get("parameters").cloned().unwrap_or(json!({"type": "object", "properties": {}})),
                })
            })
            .collect();
        if !anthropic_tools.is_empty() {
            payload["tools"] = json!(anthropic_tools);
        }
    }

    let response = client
        .post(ANTHROPIC_MESSAGES_URL)
        .header("x-api-key", api_key)
        .header("anthropic-version", "2023-06-01")
        .json(&payload)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| GatewayError::ProviderError {
            provider: "anthropic".to_string(),
            message: e.to_string(),
        })?;
    let data: Value = response.json().await?;

    let blocks = data.get("content").and_then(Value::as_array).cloned().unwrap_or_default();
    let text: Vec<String> = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("text"))
        .filter_map(|b| b.get("text").and_then(Value::as_str).map(str::to_string))
        .collect();
    let content = if text.is_empty() { None } else { Some(Value::String(text.join(" "))) };

    let tool_calls: Vec<Value> = blocks
        .iter()
        .filter(|b| b.get("type").and_then(Value::as_str) == Some("tool_use"))
        .map(|b| {
            json!({
                "id": b.get("id").cloned().unwrap_or(Value::Null),
                "type": "function",
                "function": {
                    "name": b.get("name").cloned().unwrap_or(Value::Null),
                    "arguments": serde_json::to_string(b.get("input").unwrap_or(&json!({}))).unwrap_or_default(),
                },
            })
        })
        .collect();

    let stop_reason = data.get("stop_reason").and_then(Value::as_str).unwrap_or("end_turn");
    let finish_reason = if stop_reason == "tool_use" { "tool_calls" } else { "stop" };

    let usage = data.get("usage").cloned().unwrap_or_default();
    let input_tokens = usage.get("input_tokens").and_then(Value::as_i64).unwrap_or(0);
    let output_tokens = usage.get("output_tokens").and_then(Value::as_i64).unwrap_or(0);

    Ok(ChatCompletionResponse::new(
        data.get("id").and_then(Value::as_str).unwrap_or("chatcmpl-anthropic").to_string(),
        req.model.clone(),
        ChatCompletionChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content,
                tool_calls: if tool_calls.is_empty() { None } else { Some(tool_calls) },
                ..Default::default()
            },
            finish_reason: finish_reason.to_string(),
        },
        Usage {
            prompt_tokens: input_tokens,
            completion_tokens: output_tokens,
            total_tokens: input_tokens + output_tokens,
        },
    ))
}

pub async fn call_openai(
    client: &reqwest::Client,
    api_key: &str,
    req: &ChatCompletionRequest,
) -> GatewayResult<ChatCompletionResponse> {
    let messages: Vec<Value> = req
        .messages
        .iter()
        .map(|m| {
            let mut obj = json!({"role": m.role, "content": m.content});
            if let Some(tool_calls) = &m.tool_calls {
                obj["tool_calls"] = json!(tool_calls);
            }
            if let Some(id) = &m.tool_call_id {
                obj["tool_call_id"] = json!(id);
            }
            obj
        })
        .collect();

    let mut payload = json!({
        "model": req.model,
        "messages": messages,
        "temperature": req.temperature,
        "max_tokens": req.max_tokens,
        "stream": false,
    });
    if let Some(tools) = &req.tools {
        payload["tools"] = json!(tools);
    }
    if let Some(tool_choice) = &req.tool_choice {
        payload["tool_choice"] = tool_choice.clone();
    }

    let response = client
        .post(OPENAI_CHAT_URL)
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .await?
        .error_for_status()
        .map_err(|e| GatewayError::ProviderError {
            provider: "openai".to_string(),
            message: e.to_string(),
        })?;
    let data: Value = response.json().await?;

    let choices = data.get("choices").and_then(Value::as_array).cloned().unwrap_or_default();
    let first = choices.first().cloned().unwrap_or_default();
    let message = first.get("message").cloned().unwrap_or_default();

    let usage = data.get("usage").cloned().unwrap_or_default();
    Ok(ChatCompletionResponse::new(
        data.get("id").and_then(Value::as_str).unwrap_or("chatcmpl-openai").to_string(),
        req.model.clone(),
        ChatCompletionChoice {
            index: 0,
            message: ChatMessage {
                role: "assistant".to_string(),
                content: message.get("content").cloned(),
                tool_calls: message.get("tool_calls").and_then(Value::as_array).cloned(),
                function_call: message.get("function_call").cloned(),
                ..Default::default()
            },
            finish_reason: first.get("finish_reason").and_then(Value::as_str).unwrap_or("stop").to_string(),
        },
        Usage {
            prompt_tokens: usage.get("prompt_tokens").and_then(Value::as_i64).unwrap_or(0),
            completion_tokens: usage.get("completion_tokens").and_then(Value::as_i64).unwrap_or(0),
            total_tokens: usage.get("total_tokens").and_then(Value::as_i64).unwrap_or(0),
        },
    ))
}
