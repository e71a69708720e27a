//! SSE chunk generation. The agent-side SDK always requests `stream: true`
//! and reads `choices[0].delta`, so a non-streaming backend response is
//! converted into a realistic OpenAI-format chunk stream here, and Gemini's
//! own SSE stream is proxied through with retry-on-malformed handling.

use futures_util::{stream, Stream, StreamExt};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::schema::ChatCompletionResponse;
use crate::thought_signature::ThoughtSignatureCache;

const CONTENT_CHUNK_CHARS: usize = 100;
const TOOL_ARG_CHUNK_CHARS: usize = 200;
const GEMINI_MAX_RETRIES: u32 = 3;

pub const DONE: &str = "data: [DONE]\n\n";

/// Convert a single [`ChatCompletionResponse`] into the SSE chunk sequence
/// an OpenAI streaming client expects: a role chunk, content chunks, tool
/// call chunks, a terminal chunk carrying `finish_reason` and usage, then
/// `[DONE]`.
pub fn generate_sse_chunks(response: &ChatCompletionResponse) -> Vec<String> {
    let mut chunks = Vec::new();
    let chunk_id = format!("chatcmpl-{}", Uuid::new_v4().simple());
    let Some(choice) = response.choices.first() else {
        chunks.push(sse_event(&empty_envelope(&chunk_id, response.created, &response.model)));
        chunks.push(DONE.to_string());
        return chunks;
    };

    chunks.push(sse_event(&envelope(
        &chunk_id,
        response.created,
        &response.model,
        json!({"role": "assistant", "content": null}),
        None,
    )));

    if let Some(content) = choice.message.content.as_ref().and_then(Value::as_str) {
        for piece in chunk_str(content, CONTENT_CHUNK_CHARS) {
            chunks.push(sse_event(&envelope(
                &chunk_id,
                response.created,
                &response.model,
                json!({"content": piece}),
                None,
            )));
        }
    }

    if let Some(tool_calls) = &choice.message.tool_calls {
        for (index, tc) in tool_calls.iter().enumerate() {
            let function = tc.get("function").cloned().unwrap_or_default();
            let name = function.get("name").cloned().unwrap_or(Value::Null);
            let arguments = function.get("arguments").and_then(Value::as_str).unwrap_or("");

            chunks.push(sse_event(&envelope(
                &chunk_id,
                response.created,
                &response.model,
                json!({
                    "tool_calls": [{
                        "index": index,
                        "id": tc.get("id").cloned().unwrap_or(Value::Null),
                        "type": "function",
                        "function": {"name": name, "arguments": ""},
                    }],
                }),
                None,
            )));

            for piece in chunk_str(arguments, TOOL_ARG_CHUNK_CHARS) {
                chunks.push(sse_event(&envelope(
                    &chunk_id,
                    response.created,
                    &response.model,
                    json!({"tool_calls": [{"index": index, "function": {"arguments": piece}}]}),
                    None,
                )));
            }
        }
    }

    chunks.push(sse_event(&envelope(
        &chunk_id,
        response.created,
        &response.model,
        json!({}),
        Some(&choice.finish_reason),
    )));
    chunks.push(DONE.to_string());
    chunks
}

fn chunk_str(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|c| c.iter().collect())
        .collect()
}

fn envelope(id: &str, created: i64, model: &str, delta: Value, finish_reason: Option<&str>) -> Value {
    json!({
        "id": id,
        "object": "chat.completion.chunk",
        "created": created,
        "model": model,
        "choices": [{"index": 0, "delta": delta, "finish_reason": finish_reason}],
    })
}

fn empty_envelope(id: &str, created: i64, model: &str) -> Value {
    json!({"id": id, "object": "chat.completion.chunk", "created": created, "model": model, "choices": []})
}

fn sse_event(payload: &Value) -> String {
    format!("data: {}\n\n", payload)
}

/// Synthesize an SSE error chunk so a provider failure reaches the client as
/// a valid (if content-bearing) stream rather than a broken connection.
pub fn error_chunk(model: &str, message: &str) -> String {
    let payload = json!({
        "id": format!("chatcmpl-err-{}", Uuid::new_v4().simple()),
        "object": "chat.completion.chunk",
        "created": chrono::Utc::now().timestamp(),
        "model": model,
        "choices": [{
            "index": 0,
            "delta": {"role": "assistant", "content": format!("[LLM_ERROR] {message}")},
            "finish_reason": "stop",
        }],
    });
    sse_event(&payload)
}

/// Stream directly from Gemini's SSE endpoint, retrying up to
/// [`GEMINI_MAX_RETRIES`] times on a non-200 response or a
/// `MALFORMED_FUNCTION_CALL` finish reason, with a `0.5 * attempt` backoff.
/// On persistent failure, yields a synthetic `[LLM_ERROR]` chunk instead of
/// propagating the error to the caller.
pub async fn stream_gemini(
    client: &reqwest::Client,
    api_key: &str,
    model: &str,
    payload: Value,
    signatures: &ThoughtSignatureCache,
) -> impl Stream<Item = String> {
    const URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/chat/completions";

    for attempt in 1..=GEMINI_MAX_RETRIES {
        let response = client.post(URL).bearer_auth(api_key).json(&payload).send().await;

        let response = match response {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                let status = r.status();
                let body = r.text().await.unwrap_or_default();
                if attempt < GEMINI_MAX_RETRIES {
                    tokio::time::sleep(std::time::Duration::from_millis(500 * attempt as u64)).await;
                    continue;
                }
                return stream::once(async move {
                    error_chunk(model, &format!("Gemini returned HTTP {status}: {}", truncate(&body, 500)))
                })
                .chain(stream::once(async { DONE.to_string() }))
                .boxed();
            }
            Err(e) => {
                if attempt < GEMINI_MAX_RETRIES {
                    tokio::time::sleep(std::time::Duration::from_millis(500 * attempt as u64)).await;
                    continue;
                }
                let message = e.to_string();
                return stream::once(async move { error_chunk(model, &format!("Gemini error: {message}")) })
                    .chain(stream::once(async { DONE.to_string() }))
                    .boxed();
            }
        };

        let body = match response.text().await {
            Ok(b) => b,
            Err(e) => {
                return stream::once(async move { error_chunk(model, &format!("Gemini stream read error: {e}")) })
                    .chain(stream::once(async { DONE.to_string() }))
                    .boxed();
            }
        };

        let lines: Vec<String> = body
            .lines()
            .filter(|l| l.starts_with("data: "))
            .map(str::to_string)
            .collect();
        let malformed = lines.iter().any(|l| l.contains("MALFORMED_FUNCTION_CALL"));

        if malformed && attempt < GEMINI_MAX_RETRIES {
            tokio::time::sleep(std::time::Duration::from_millis(500 * attempt as u64)).await;
            continue;
        }

        for line in &lines {
            harvest_signature_from_sse_line(line, signatures).await;
        }

        return stream::iter(lines.into_iter().map(|l| format!("{l}\n\n"))).boxed();
    }

    stream::once(async move { error_chunk(model, "Gemini request exhausted all retries") })
        .chain(stream::once(async { DONE.to_string() }))
        .boxed()
}

async fn harvest_signature_from_sse_line(line: &str, signatures: &ThoughtSignatureCache) {
    if !line.contains("thought_signature") || !line.contains("tool_calls") {
        return;
    }
    let Some(payload) = line.strip_prefix("data: ") else { return };
    if payload.trim() == "[DONE]" {
        return;
    }
    let Ok(parsed) = serde_json::from_str::<Value>(payload) else { return };
    let Some(choices) = parsed.get("choices").and_then(Value::as_array) else { return };
    for choice in choices {
        if let Some(tool_calls) = choice.get("delta").and_then(|d| d.get("tool_calls")).and_then(Value::as_array) {
            signatures.harvest_from_tool_calls(tool_calls).await;
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ChatCompletionChoice, ChatMessage, Usage};

    #[test]
    fn generates_role_content_and_terminal_chunks() {
        let response = ChatCompletionResponse::new(
            "chatcmpl-1".to_string(),
            "gemma3".to_string(),
            ChatCompletionChoice {
                index: 0,
                message: ChatMessage {
                    role: "assistant".to_string(),
                    content: Some(Value::String("hello".to_string())),
                    ..Default::default()
                },
                finish_reason: "stop".to_string(),
            },
            Usage::default(),
        );

        let chunks = generate_sse_chunks(&response);
        assert!(chunks.first().unwrap().contains("\"role\":\"assistant\""));
        assert!(chunks.iter().any(|c| c.contains("hello")));
        assert_eq!(chunks.last().unwrap(), DONE);
    }

    #[test]
    fn chunks_long_content_into_pieces() {
        let text = "x".repeat(250);
        let pieces = chunk_str(&text, 100);
        assert_eq!(pieces.len(), 3);
        assert_eq!(pieces[0].len(), 100);
        assert_eq!(pieces[2].len(), 50);
    }
}
