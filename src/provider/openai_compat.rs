// src/provider/openai_compat.rs — Generic OpenAI-compatible chat provider
//
// Used for OpenRouter-hosted models (Zia/GLM, DeepSeek, Qwen) and any other
// host that speaks `/chat/completions`.

use async_trait::async_trait;

use super::{
    transport_error, truncate_body, GenerationRequest, ProviderDescriptor, ProviderKind, Role,
    TextProvider,
};
use crate::infra::errors::GenerationError;

pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Provider for any OpenAI-compatible API endpoint.
pub struct OpenAICompatProvider {
    id_str: String,
    name_str: String,
    api_key: String,
    base_url: String,
    model: String,
    client: reqwest::Client,
}

impl OpenAICompatProvider {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        api_key: String,
        base_url: String,
        model: String,
    ) -> Self {
        Self {
            id_str: id.into(),
            name_str: name.into(),
            api_key,
            base_url,
            model,
            client: reqwest::Client::new(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

/// Build the `/chat/completions` body: system message first, then the transcript.
pub fn build_messages(request: &GenerationRequest) -> Vec<serde_json::Value> {
    let mut msgs = Vec::with_capacity(request.history.len() + 1);
    if request.history.is_empty() {
        msgs.push(serde_json::json!({"role": "user", "content": request.system_prompt}));
        return msgs;
    }
    if !request.system_prompt.trim().is_empty() {
        msgs.push(serde_json::json!({"role": "system", "content": request.system_prompt}));
    }
    for turn in &request.history {
        msgs.push(serde_json::json!({
            "role": match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            },
            "content": turn.text,
        }));
    }
    msgs
}

/// Extract an error message from an OpenAI-style error body.
///
/// OpenRouter nests the upstream reason in `error.metadata.raw`; it often
/// carries the actual quota wording, so it is appended when present.
pub fn error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(v) if v["error"].is_object() => {
            let mut message = v["error"]["message"]
                .as_str()
                .unwrap_or("unknown error")
                .to_string();
            if let Some(raw) = v["error"]["metadata"]["raw"].as_str() {
                message.push_str(": ");
                message.push_str(&truncate_body(raw));
            }
            message
        }
        _ => truncate_body(body),
    }
}

impl ProviderDescriptor for OpenAICompatProvider {
    fn id(&self) -> &str {
        &self.id_str
    }

    fn name(&self) -> &str {
        &self.name_str
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Text
    }
}

#[async_trait]
impl TextProvider for OpenAICompatProvider {
    async fn generate_text(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": build_messages(request),
        });

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("User-Agent", format!("kindred/{}", env!("CARGO_PKG_VERSION")))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&self.id_str, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GenerationError::provider(
                &self.id_str,
                Some(status.as_u16()),
                error_message(&error_body),
            ));
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| {
            GenerationError::provider(&self.id_str, None, format!("Failed to parse response: {e}"))
        })?;

        // OpenRouter reports upstream failures inside a 200 response.
        if resp["error"].is_object() {
            let code = resp["error"]["code"].as_u64().map(|c| c as u16);
            return Err(GenerationError::provider(
                &self.id_str,
                code,
                error_message(&resp.to_string()),
            ));
        }

        Ok(resp["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or("")
            .to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::{ConversationTurn, GenerationMode};

    #[test]
    fn test_messages_system_first() {
        let req = GenerationRequest::new(
            GenerationMode::ChatReply,
            "You are Kai.",
            vec![
                ConversationTurn::user("yo"),
                ConversationTurn::assistant("hey"),
            ],
        );
        let msgs = build_messages(&req);
        assert_eq!(msgs.len(), 3);
        assert_eq!(msgs[0]["role"], "system");
        assert_eq!(msgs[2]["role"], "assistant");
    }

    #[test]
    fn test_messages_empty_history() {
        let req = GenerationRequest::new(GenerationMode::Teaser, "Write a hook.", vec![]);
        let msgs = build_messages(&req);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0]["role"], "user");
        assert_eq!(msgs[0]["content"], "Write a hook.");
    }

    #[test]
    fn test_error_message_openrouter_raw() {
        let body = r#"{"error":{"message":"Provider returned error","code":429,
            "metadata":{"raw":"deepseek is temporarily rate-limited upstream"}}}"#;
        let msg = error_message(body);
        assert!(msg.starts_with("Provider returned error"));
        assert!(msg.contains("rate-limited"));
    }

    #[test]
    fn test_error_message_plain_text() {
        assert_eq!(error_message("Bad Gateway"), "Bad Gateway");
    }
}
