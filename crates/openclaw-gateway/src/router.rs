//! `POST /v1/chat/completions` and the gateway's supporting surface:
//! provider config, health, and per-task interaction inspection.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use futures_util::{stream, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::error::GatewayError;
use crate::interactions::InteractionLog;
use crate::providers::{call_anthropic, call_gemini, call_ollama, call_openai};
use crate::schema::{detect_provider, ChatCompletionRequest, Provider};
use crate::sse::{error_chunk, generate_sse_chunks, stream_gemini, DONE};
use crate::thought_signature::ThoughtSignatureCache;
use openclaw_config::ConfigStore;

#[derive(Clone)]
pub struct GatewayState {
    pub http: reqwest::Client,
    pub config: ConfigStore,
    pub signatures: ThoughtSignatureCache,
    pub interactions: InteractionLog,
    pub default_ollama_url: String,
}

impl GatewayState {
    pub fn new(config: ConfigStore, default_ollama_url: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            signatures: ThoughtSignatureCache::new(),
            interactions: InteractionLog::new(),
            default_ollama_url,
        }
    }
}

pub fn router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/v1/chat/completions", post(chat_completions))
        .route("/chat", post(legacy_chat))
        .route("/health", get(health))
        .route("/providers", get(providers))
        .route("/models", get(models))
        .route("/config", get(get_config).post(post_config))
        .route("/interactions/{task_id}", get(get_interactions).delete(clear_interactions))
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(json!({"status": "ok"}))
}

async fn providers() -> impl IntoResponse {
    Json(json!(["ollama", "gemini", "anthropic", "openai"]))
}

async fn models(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    let mut available = vec!["ollama: any locally pulled model".to_string()];
    if state.config.get("GEMINI_API_KEY").await.is_some() {
        available.push("gemini-*".to_string());
    }
    if state.config.get("ANTHROPIC_API_KEY").await.is_some() {
        available.push("claude-*".to_string());
    }
    if state.config.get("OPENAI_API_KEY").await.is_some() {
        available.push("gpt-*, o1-*, o3-*, o4-*".to_string());
    }
    Json(json!({"models": available}))
}

async fn get_config(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(state.config.masked_snapshot().await)
}

#[derive(Deserialize)]
struct SetConfigRequest {
    key: String,
    value: String,
}

async fn post_config(
    State(state): State<Arc<GatewayState>>,
    Json(body): Json<SetConfigRequest>,
) -> Result<impl IntoResponse, Response> {
    if !openclaw_config::KNOWN_KEYS.contains(&body.key.as_str()) {
        return Err(problem(
            StatusCode::BAD_REQUEST,
            &format!("unknown config key: {}", body.key),
        ));
    }
    state
        .config
        .set(&body.key, &body.value)
        .await
        .map_err(|e| problem(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(Deserialize)]
struct SinceQuery {
    since: Option<usize>,
}

/// `GET /interactions/{task_id}?since=<turn>` returns only turns numbered
/// past `since`, so a poller can append without re-fetching what it already
/// has.
async fn get_interactions(
    State(state): State<Arc<GatewayState>>,
    Path(task_id): Path<String>,
    Query(query): Query<SinceQuery>,
) -> impl IntoResponse {
    let turns = state.interactions.get(&task_id).await;
    match query.since {
        Some(since) => Json(turns.into_iter().filter(|i| i.turn > since).collect::<Vec<_>>()),
        None => Json(turns),
    }
}

async fn clear_interactions(
    State(state): State<Arc<GatewayState>>,
    Path(task_id): Path<String>,
) -> impl IntoResponse {
    if state.interactions.clear(&task_id).await {
        StatusCode::NO_CONTENT
    } else {
        StatusCode::NOT_FOUND
    }
}

#[derive(Deserialize)]
struct LegacyChatRequest {
    prompt: String,
    #[serde(default = "default_legacy_model")]
    model: String,
}

fn default_legacy_model() -> String {
    "gemma3:27b".to_string()
}

#[derive(Serialize)]
struct LegacyChatResponse {
    response: String,
}

/// A plain non-streaming `{prompt, model}` wrapper kept for callers that
/// predate the OpenAI-compatible surface.
async fn legacy_chat(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(body): Json<LegacyChatRequest>,
) -> Result<impl IntoResponse, Response> {
    let request = ChatCompletionRequest {
        model: body.model,
        messages: vec![crate::schema::ChatMessage {
            role: "user".to_string(),
            content: Some(Value::String(body.prompt)),
            ..Default::default()
        }],
        temperature: 0.7,
        max_tokens: 4096,
        stream: false,
        tools: None,
        tool_choice: None,
    };

    let response = dispatch(&state, &headers, &request).await.map_err(gateway_problem)?;
    let text = response
        .choices
        .first()
        .and_then(|c| c.message.content.clone())
        .and_then(|c| c.as_str().map(str::to_string))
        .unwrap_or_default();
    Ok(Json(LegacyChatResponse { response: text }))
}

/// `POST /v1/chat/completions`. The agent-side SDK always sends
/// `stream: true`; a non-streaming caller gets the plain JSON response.
async fn chat_completions(
    State(state): State<Arc<GatewayState>>,
    headers: HeaderMap,
    Json(request): Json<ChatCompletionRequest>,
) -> Response {
    let task_id = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(InteractionLog::task_id_from_bearer);
    let provider = detect_provider(&request.model);

    if !request.stream {
        return match dispatch(&state, &headers, &request).await {
            Ok(response) => {
                record_interaction(&state, task_id.as_deref(), provider, false, &request, &response).await;
                Json(response).into_response()
            }
            Err(e) => gateway_problem(e).into_response(),
        };
    }

    if provider == Provider::Gemini {
        return stream_gemini_response(&state, &request, task_id).await;
    }

    match dispatch(&state, &headers, &request).await {
        Ok(response) => {
            record_interaction(&state, task_id.as_deref(), provider, true, &request, &response).await;
            sse_response(generate_sse_chunks(&response))
        }
        Err(e) => {
            warn!(provider = provider.as_str(), error = %e, "provider call failed, emitting synthetic error chunk");
            sse_response(vec![error_chunk(&request.model, &e.to_string()), DONE.to_string()])
        }
    }
}

async fn stream_gemini_response(
    state: &Arc<GatewayState>,
    request: &ChatCompletionRequest,
    task_id: Option<String>,
) -> Response {
    let Some(api_key) = state.config.get("GEMINI_API_KEY").await else {
        return sse_response(vec![
            error_chunk(&request.model, "GEMINI_API_KEY not configured"),
            DONE.to_string(),
        ]);
    };

    let messages: Vec<Value> = request
        .messages
        .iter()
        .map(|m| json!({"role": m.role, "content": m.content, "tool_calls": m.tool_calls}))
        .collect();
    let mut payload = json!({
        "model": request.model,
        "messages": messages,
        "temperature": request.temperature,
        "max_tokens": request.max_tokens,
        "stream": true,
        "stream_options": {"include_usage": true},
    });
    if let Some(tools) = &request.tools {
        payload["tools"] = json!(tools);
    }

    let chunks: Vec<String> = stream_gemini(&state.http, &api_key, &request.model, payload, &state.signatures)
        .await
        .collect()
        .await;

    if let Some(task_id) = task_id {
        let (content, tool_calls, finish_reason) = accumulate_gemini_stream(&chunks);
        state
            .interactions
            .record(
                &task_id,
                Provider::Gemini.as_str(),
                true,
                request.messages.iter().map(|m| m.role.clone()).collect(),
                content.as_deref(),
                &tool_calls,
                &finish_reason,
            )
            .await;
        info!(task_id, "streamed gemini response for task");
    }
    sse_response(chunks)
}

/// Gemini's SSE lines already arrive in the OpenAI `chat.completion.chunk`
/// shape, so a response summary is built the same way a non-streaming
/// response would be read: walk the deltas, stitch content back together,
/// and merge tool call fragments by their `index`.
fn accumulate_gemini_stream(chunks: &[String]) -> (Option<String>, Vec<Value>, String) {
    let mut content = String::new();
    let mut tool_calls: Vec<Option<(String, String, String)>> = Vec::new();
    let mut finish_reason = "stop".to_string();

    for chunk in chunks {
        let Some(payload) = chunk.strip_prefix("data: ") else { continue };
        let payload = payload.trim();
        if payload.is_empty() || payload == "[DONE]" {
            continue;
        }
        let Ok(parsed) = serde_json::from_str::<Value>(payload) else { continue };
        let Some(choice) = parsed.get("choices").and_then(Value::as_array).and_then(|a| a.first()) else {
            continue;
        };
        let Some(delta) = choice.get("delta") else { continue };

        if let Some(piece) = delta.get("content").and_then(Value::as_str) {
            content.push_str(piece);
        }

        if let Some(calls) = delta.get("tool_calls").and_then(Value::as_array) {
            for call in calls {
                let index = call.get("index").and_then(Value::as_u64).unwrap_or(0) as usize;
                if tool_calls.len() <= index {
                    tool_calls.resize(index + 1, None);
                }
                let entry = tool_calls[index].get_or_insert_with(Default::default);
                if let Some(id) = call.get("id").and_then(Value::as_str) {
                    entry.0 = id.to_string();
                }
                if let Some(function) = call.get("function") {
                    if let Some(name) = function.get("name").and_then(Value::as_str) {
                        entry.1 = name.to_string();
                    }
                    if let Some(arguments) = function.get("arguments").and_then(Value::as_str) {
                        entry.2.push_str(arguments);
                    }
                }
            }
        }

        if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
            finish_reason = reason.to_string();
        }
    }

    let tool_calls = tool_calls
        .into_iter()
        .flatten()
        .map(|(id, name, arguments)| json!({"id": id, "type": "function", "function": {"name": name, "arguments": arguments}}))
        .collect();
    let content = if content.is_empty() { None } else { Some(content) };
    (content, tool_calls, finish_reason)
}

async fn dispatch(
    state: &GatewayState,
    _headers: &HeaderMap,
    request: &ChatCompletionRequest,
) -> Result<crate::schema::ChatCompletionResponse, GatewayError> {
    match detect_provider(&request.model) {
        Provider::Ollama => {
            let url = state
                .config
                .get("OLLAMA_URL")
                .await
                .unwrap_or_else(|| state.default_ollama_url.clone());
            call_ollama(&state.http, &url, request).await
        }
        Provider::Gemini => {
            let key = state
                .config
                .get("GEMINI_API_KEY")
                .await
                .ok_or_else(|| GatewayError::ProviderNotConfigured("gemini".to_string()))?;
            call_gemini(&state.http, &key, &state.signatures, request).await
        }
        Provider::Anthropic => {
            let key = state
                .config
                .get("ANTHROPIC_API_KEY")
                .await
                .ok_or_else(|| GatewayError::ProviderNotConfigured("anthropic".to_string()))?;
            call_anthropic(&state.http, &key, request).await
        }
        Provider::OpenAi => {
            let key = state
                .config
                .get("OPENAI_API_KEY")
                .await
                .ok_or_else(|| GatewayError::ProviderNotConfigured("openai".to_string()))?;
            call_openai(&state.http, &key, request).await
        }
    }
}

async fn record_interaction(
    state: &GatewayState,
    task_id: Option<&str>,
    provider: Provider,
    streaming: bool,
    request: &ChatCompletionRequest,
    response: &crate::schema::ChatCompletionResponse,
) {
    let Some(task_id) = task_id else { return };
    let Some(choice) = response.choices.first() else { return };
    state
        .interactions
        .record(
            task_id,
            provider.as_str(),
            streaming,
            request.messages.iter().map(|m| m.role.clone()).collect(),
            choice.message.content.as_ref().and_then(Value::as_str),
            choice.message.tool_calls.as_deref().unwrap_or(&[]),
            &choice.finish_reason,
        )
        .await;
}

fn sse_response(chunks: Vec<String>) -> Response {
    let body = Body::from_stream(stream::iter(chunks.into_iter().map(Ok::<_, Infallible>)));
    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .body(body)
        .expect("static headers form a valid response")
}

fn gateway_problem(error: GatewayError) -> Response {
    let service_error: openclaw_core::ServiceError = error.into();
    let status = StatusCode::from_u16(service_error.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    problem(status, &service_error.to_string())
}

fn problem(status: StatusCode, detail: &str) -> Response {
    (status, Json(json!({"title": status.canonical_reason().unwrap_or("error"), "detail": detail}))).into_response()
}
