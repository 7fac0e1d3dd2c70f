// src/provider/google.rs — Google Generative AI (Gemini) text provider

use async_trait::async_trait;

use super::{
    transport_error, truncate_body, GenerationRequest, ProviderDescriptor, ProviderKind, Role,
    TextProvider,
};
use crate::infra::errors::GenerationError;

pub const GOOGLE_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

pub struct GoogleProvider {
    id: String,
    name: String,
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleProvider {
    pub fn new(id: impl Into<String>, api_key: String, model: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            api_key,
            model: model.into(),
            base_url: GOOGLE_BASE_URL.into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model,
        )
    }
}

/// Build the Gemini request body from a GenerationRequest.
///
/// Gemini rejects requests without contents, so an empty transcript sends
/// the system prompt as the only user turn instead of as an instruction.
pub fn build_request_body(request: &GenerationRequest) -> serde_json::Value {
    if request.history.is_empty() {
        return serde_json::json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": request.system_prompt }],
            }],
        });
    }

    let contents: Vec<serde_json::Value> = request
        .history
        .iter()
        .map(|turn| {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "model",
            };
            serde_json::json!({
                "role": role,
                "parts": [{ "text": turn.text }],
            })
        })
        .collect();

    let mut body = serde_json::json!({
        "contents": contents,
    });

    if !request.system_prompt.trim().is_empty() {
        body["system_instruction"] = serde_json::json!({
            "parts": [{ "text": request.system_prompt }],
        });
    }

    body
}

/// Pull the concatenated text parts out of `candidates[0]`.
pub fn extract_text(resp: &serde_json::Value) -> String {
    resp["candidates"][0]["content"]["parts"]
        .as_array()
        .map(|parts| {
            parts
                .iter()
                .filter_map(|p| p["text"].as_str())
                .collect::<String>()
        })
        .unwrap_or_default()
}

/// Turn a non-2xx Gemini response into a provider error.
///
/// Gemini wraps the reason in `error.status` / `error.message`; both are kept
/// so quota phrases like RESOURCE_EXHAUSTED reach the classifier.
pub(crate) async fn error_from_response(
    provider: &str,
    response: reqwest::Response,
) -> GenerationError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(v) if v["error"].is_object() => format!(
            "{}: {}",
            v["error"]["status"].as_str().unwrap_or("ERROR"),
            v["error"]["message"].as_str().unwrap_or_default()
        ),
        _ => truncate_body(&body),
    };
    GenerationError::provider(provider, Some(status.as_u16()), message)
}

impl ProviderDescriptor for GoogleProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Text
    }
}

#[async_trait]
impl TextProvider for GoogleProvider {
    async fn generate_text(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let body = build_request_body(request);

        let response = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&self.id, e))?;

        if !response.status().is_success() {
            return Err(error_from_response(&self.id, response).await);
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| {
            GenerationError::provider(&self.id, None, format!("Failed to parse response: {e}"))
        })?;

        // A prompt blocked by safety filters comes back 200 with no candidates.
        if let Some(reason) = resp["promptFeedback"]["blockReason"].as_str() {
            return Err(GenerationError::provider(
                &self.id,
                None,
                format!("prompt blocked: {reason}"),
            ));
        }

        Ok(extract_text(&resp))
    }
}
