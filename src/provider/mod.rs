// src/provider/mod.rs — Model provider layer

pub mod classifier;
pub mod fallback;
pub mod google;
pub mod image;
pub mod openai_compat;
pub mod resolver;
pub mod retry;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::infra::errors::GenerationError;

/// Static identity shared by every provider adapter.
pub trait ProviderDescriptor: Send + Sync {
    fn id(&self) -> &str;
    fn name(&self) -> &str;
    fn kind(&self) -> ProviderKind;
}

/// A hosted model that turns a system prompt and transcript into text.
///
/// One network call per invocation. Retries and fallback belong to the caller.
#[async_trait]
pub trait TextProvider: ProviderDescriptor {
    async fn generate_text(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}

/// A hosted model that turns a prompt (and optionally a reference image) into an image.
#[async_trait]
pub trait ImageProvider: ProviderDescriptor {
    /// Whether the provider keeps the subject of a reference image recognisable.
    fn preserves_identity(&self) -> bool {
        false
    }

    async fn generate_image(
        &self,
        prompt: &str,
        reference: Option<&ImagePayload>,
    ) -> Result<ImagePayload, GenerationError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    Text,
    Image,
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProviderKind::Text => write!(f, "text"),
            ProviderKind::Image => write!(f, "image"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[serde(alias = "bot")]
    Assistant,
}

impl Role {
    pub fn flipped(self) -> Self {
        match self {
            Role::User => Role::Assistant,
            Role::Assistant => Role::User,
        }
    }
}

/// One message in a conversation transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum GenerationMode {
    ChatReply,
    Suggestion,
    Scenario,
    Teaser,
    Image,
}

impl GenerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenerationMode::ChatReply => "chat-reply",
            GenerationMode::Suggestion => "suggestion",
            GenerationMode::Scenario => "scenario",
            GenerationMode::Teaser => "teaser",
            GenerationMode::Image => "image",
        }
    }

    /// Chat-like modes need a personality to speak from.
    pub fn requires_system_prompt(&self) -> bool {
        matches!(self, GenerationMode::ChatReply | GenerationMode::Suggestion)
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Everything a provider needs for one generation. Built fresh per call.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub system_prompt: String,
    pub history: Vec<ConversationTurn>,
    pub mode: GenerationMode,
    pub reference_image: Option<ImagePayload>,
}

impl GenerationRequest {
    pub fn new(
        mode: GenerationMode,
        system_prompt: impl Into<String>,
        history: Vec<ConversationTurn>,
    ) -> Self {
        Self {
            system_prompt: system_prompt.into(),
            history,
            mode,
            reference_image: None,
        }
    }

    /// Request-level checks performed once, before any provider is called.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.mode.requires_system_prompt() && self.system_prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(format!(
                "{} requires a non-empty system prompt",
                self.mode
            )));
        }
        if self.history.is_empty() && self.system_prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "nothing to generate from: empty prompt and empty history".into(),
            ));
        }
        Ok(())
    }
}

/// Raw image bytes returned by an image provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

impl ImagePayload {
    pub fn new(bytes: Vec<u8>, mime_type: impl Into<String>) -> Self {
        Self {
            bytes,
            mime_type: mime_type.into(),
        }
    }

    pub fn from_base64(data: &str, mime_type: impl Into<String>) -> Result<Self, GenerationError> {
        let bytes = BASE64
            .decode(data.trim().as_bytes())
            .map_err(|e| GenerationError::InvalidRequest(format!("invalid base64 image: {e}")))?;
        Ok(Self::new(bytes, mime_type))
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }

    /// Guess a MIME type from a file extension; PNG when unknown.
    pub fn mime_for_extension(ext: &str) -> &'static str {
        match ext.to_ascii_lowercase().as_str() {
            "jpg" | "jpeg" => "image/jpeg",
            "webp" => "image/webp",
            "gif" => "image/gif",
            _ => "image/png",
        }
    }
}

/// Payloads the retry policy can inspect for emptiness.
pub trait Payload {
    fn is_blank(&self) -> bool;
}

impl Payload for String {
    fn is_blank(&self) -> bool {
        self.trim().is_empty()
    }
}

impl Payload for ImagePayload {
    fn is_blank(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Cut a provider error body down to something readable in a log line.
pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 500;
    let body = body.trim();
    if body.len() <= MAX {
        return body.to_string();
    }
    let mut end = MAX;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}…", &body[..end])
}

/// Map a reqwest transport error onto the provider error taxonomy.
///
/// The URL is dropped so query-string credentials never reach logs.
pub(crate) fn transport_error(provider: &str, e: reqwest::Error) -> GenerationError {
    let e = e.without_url();
    GenerationError::provider(
        provider,
        e.status().map(|s| s.as_u16()),
        format!("request failed: {e}"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    // ─── ConversationTurn tests ─────────────────────────────────

    #[test]
    fn test_turn_constructors() {
        let u = ConversationTurn::user("hi");
        assert_eq!(u.role, Role::User);
        assert_eq!(u.text, "hi");
        assert_eq!(ConversationTurn::assistant("hey").role, Role::Assistant);
    }

    #[test]
    fn test_turn_accepts_bot_alias() {
        let turn: ConversationTurn =
            serde_json::from_str(r#"{"role":"bot","text":"hello there"}"#).unwrap();
        assert_eq!(turn.role, Role::Assistant);
    }

    #[test]
    fn test_role_flipped() {
        assert_eq!(Role::User.flipped(), Role::Assistant);
        assert_eq!(Role::Assistant.flipped(), Role::User);
    }

    // ─── GenerationRequest tests ────────────────────────────────

    #[test]
    fn test_validate_chat_requires_system_prompt() {
        let req = GenerationRequest::new(
            GenerationMode::ChatReply,
            "   ",
            vec![ConversationTurn::user("hello")],
        );
        assert!(matches!(
            req.validate(),
            Err(GenerationError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_validate_scenario_allows_empty_history() {
        let req = GenerationRequest::new(GenerationMode::Scenario, "Open a scene", vec![]);
        assert!(req.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_nothing_to_generate() {
        let req = GenerationRequest::new(GenerationMode::Teaser, "", vec![]);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_mode_serde_kebab() {
        let m: GenerationMode = serde_json::from_str("\"chat-reply\"").unwrap();
        assert_eq!(m, GenerationMode::ChatReply);
        assert_eq!(GenerationMode::Suggestion.to_string(), "suggestion");
    }

    // ─── ImagePayload tests ─────────────────────────────────────

    #[test]
    fn test_image_data_url() {
        let img = ImagePayload::new(vec![1, 2, 3], "image/png");
        assert_eq!(img.to_data_url(), "data:image/png;base64,AQID");
    }

    #[test]
    fn test_image_from_invalid_base64() {
        assert!(ImagePayload::from_base64("not base64!!", "image/png").is_err());
    }

    #[test]
    fn test_mime_for_extension() {
        assert_eq!(ImagePayload::mime_for_extension("JPG"), "image/jpeg");
        assert_eq!(ImagePayload::mime_for_extension("bin"), "image/png");
    }

    // ─── Payload tests ──────────────────────────────────────────

    #[test]
    fn test_blank_payloads() {
        assert!(String::from("  \n").is_blank());
        assert!(!String::from("ok").is_blank());
        assert!(ImagePayload::new(vec![], "image/png").is_blank());
    }

    #[test]
    fn test_truncate_body_respects_char_boundary() {
        let body = "é".repeat(400);
        let out = truncate_body(&body);
        assert!(out.ends_with('…'));
        assert!(out.len() <= 504);
    }
}
