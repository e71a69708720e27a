//! Cache of Gemini `thought_signature` values, keyed by tool_call id.
//!
//! Gemini's newer models attach a `thought_signature` to each tool call and
//! require it to be present when that tool call's turn is replayed back in
//! history. The agent-side SDK strips unknown fields from tool_calls before
//! sending them back, so the gateway remembers the signature itself and
//! re-injects it by id.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::RwLock;

#[derive(Clone, Default)]
pub struct ThoughtSignatureCache {
    signatures: Arc<RwLock<HashMap<String, String>>>,
}

impl ThoughtSignatureCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn remember(&self, tool_call_id: &str, signature: &str) {
        self.signatures
            .write()
            .await
            .insert(tool_call_id.to_string(), signature.to_string());
    }

    pub async fn get(&self, tool_call_id: &str) -> Option<String> {
        self.signatures.read().await.get(tool_call_id).cloned()
    }

    /// Scan a tool_calls array from a Gemini response and cache any
    /// signatures found in `extra_content.google.thought_signature`.
    pub async fn harvest_from_tool_calls(&self, tool_calls: &[Value]) {
        for tc in tool_calls {
            let Some(id) = tc.get("id").and_then(Value::as_str) else { continue };
            let signature = tc
                .get("extra_content")
                .and_then(|v| v.get("google"))
                .and_then(|v| v.get("thought_signature"))
                .and_then(Value::as_str);
            if let Some(signature) = signature {
                self.remember(id, signature).await;
            }
        }
    }

    /// Inject a cached signature into a tool_call's `extra_content.google`
    /// field if one is on file for its id.
    pub async fn inject(&self, tool_call: &mut Value) {
        let Some(id) = tool_call.get("id").and_then(Value::as_str).map(str::to_string) else {
            return;
        };
        let Some(signature) = self.get(&id).await else { return };
        let obj = tool_call.as_object_mut().expect("tool_call is an object");
        let extra_content = obj
            .entry("extra_content")
            .or_insert_with(|| serde_json::json!({}));
        let google = extra_content
            .as_object_mut()
            .expect("extra_content is an object")
            .entry("google")
            .or_insert_with(|| serde_json::json!({}));
        google["thought_signature"] = Value::String(signature);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn harvests_and_injects_signature_by_tool_call_id() {
        let cache = ThoughtSignatureCache::new();
        let tool_calls = vec![serde_json::json!({
            "id": "call_1",
            "extra_content": {"google": {"thought_signature": "sig123"}},
        })];
        cache.harvest_from_tool_calls(&tool_calls).await;

        let mut bare = serde_json::json!({"id": "call_1"});
        cache.inject(&mut bare).await;
        assert_eq!(
            bare["extra_content"]["google"]["thought_signature"],
            "sig123"
        );
    }

    #[tokio::test]
    async fn inject_is_a_no_op_for_unknown_id() {
        let cache = ThoughtSignatureCache::new();
        let mut bare = serde_json::json!({"id": "call_unknown"});
        cache.inject(&mut bare).await;
        assert!(bare.get("extra_content").is_none());
    }
}
