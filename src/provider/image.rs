// src/provider/image.rs — Image generation providers
//
// Two shapes:
//   - Gemini image models via generateContent, which accept a reference
//     image as inlineData and keep the subject recognisable.
//   - OpenAI-compatible /images/generations, text-to-image only.

use async_trait::async_trait;

use super::google::{error_from_response, GOOGLE_BASE_URL};
use super::openai_compat::error_message;
use super::{transport_error, ImagePayload, ImageProvider, ProviderDescriptor, ProviderKind};
use crate::infra::errors::GenerationError;

// ─── Gemini image ───────────────────────────────────────────────────────────

pub struct GoogleImageProvider {
    id: String,
    name: String,
    api_key: String,
    model: String,
    base_url: String,
    client: reqwest::Client,
}

impl GoogleImageProvider {
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
}

/// Reference image first, then the instruction, as Gemini expects for edits.
pub fn build_image_body(prompt: &str, reference: Option<&ImagePayload>) -> serde_json::Value {
    let mut parts = Vec::with_capacity(2);
    if let Some(image) = reference {
        parts.push(serde_json::json!({
            "inlineData": {
                "mimeType": image.mime_type,
                "data": image.to_base64(),
            }
        }));
    }
    parts.push(serde_json::json!({ "text": prompt }));

    serde_json::json!({
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "responseModalities": ["IMAGE", "TEXT"],
        },
    })
}

/// First inline image in the response, accepting both camelCase and snake_case keys.
pub fn extract_image(
    provider: &str,
    resp: &serde_json::Value,
) -> Result<Option<ImagePayload>, GenerationError> {
    let parts = resp["candidates"][0]["content"]["parts"]
        .as_array()
        .cloned()
        .unwrap_or_default();

    for part in &parts {
        let inline = part.get("inlineData").or_else(|| part.get("inline_data"));
        let Some(inline) = inline else { continue };
        let data = inline["data"].as_str().unwrap_or_default();
        if data.is_empty() {
            continue;
        }
        let mime = inline["mimeType"]
            .as_str()
            .or_else(|| inline["mime_type"].as_str())
            .unwrap_or("image/png");
        return ImagePayload::from_base64(data, mime)
            .map(Some)
            .map_err(|e| GenerationError::provider(provider, None, e.to_string()));
    }
    Ok(None)
}

impl ProviderDescriptor for GoogleImageProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Image
    }
}

#[async_trait]
impl ImageProvider for GoogleImageProvider {
    fn preserves_identity(&self) -> bool {
        true
    }

    async fn generate_image(
        &self,
        prompt: &str,
        reference: Option<&ImagePayload>,
    ) -> Result<ImagePayload, GenerationError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model,
        );

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(&build_image_body(prompt, reference))
            .send()
            .await
            .map_err(|e| transport_error(&self.id, e))?;

        if !response.status().is_success() {
            return Err(error_from_response(&self.id, response).await);
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| {
            GenerationError::provider(&self.id, None, format!("Failed to parse response: {e}"))
        })?;

        // No image part is an empty payload; the retry policy decides what to do.
        let image = extract_image(&self.id, &resp)?;
        Ok(image.unwrap_or_else(|| ImagePayload::new(Vec::new(), "image/png")))
    }
}

// ─── OpenAI-compatible /images/generations ─────────────────────────────────

pub struct OpenAIImagesProvider {
    id: String,
    name: String,
    api_key: String,
    base_url: String,
    model: String,
    size: String,
    client: reqwest::Client,
}

impl OpenAIImagesProvider {
    pub fn new(id: impl Into<String>, api_key: String, base_url: String, model: String) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            api_key,
            base_url,
            model,
            size: "1024x1024".into(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl ProviderDescriptor for OpenAIImagesProvider {
    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> ProviderKind {
        ProviderKind::Image
    }
}

#[async_trait]
impl ImageProvider for OpenAIImagesProvider {
    async fn generate_image(
        &self,
        prompt: &str,
        reference: Option<&ImagePayload>,
    ) -> Result<ImagePayload, GenerationError> {
        if reference.is_some() {
            tracing::debug!(
                provider = %self.id,
                "Reference image ignored by text-to-image provider"
            );
        }

        let body = serde_json::json!({
            "model": self.model,
            "prompt": prompt,
            "n": 1,
            "size": self.size,
            "response_format": "b64_json",
        });

        let response = self
            .client
            .post(format!("{}/images/generations", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error(&self.id, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(GenerationError::provider(
                &self.id,
                Some(status.as_u16()),
                error_message(&error_body),
            ));
        }

        let resp: serde_json::Value = response.json().await.map_err(|e| {
            GenerationError::provider(&self.id, None, format!("Failed to parse response: {e}"))
        })?;

        match resp["data"][0]["b64_json"].as_str() {
            Some(data) if !data.is_empty() => ImagePayload::from_base64(data, "image/png")
                .map_err(|e| GenerationError::provider(&self.id, None, e.to_string())),
            _ => Ok(ImagePayload::new(Vec::new(), "image/png")),
        }
    }
}
