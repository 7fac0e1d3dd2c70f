// src/provider/classifier.rs — Failure classification for provider errors
//
// Rules are data, not control flow: each provider can add its own phrases
// without touching the retry or fallback code. When nothing matches, the
// status code decides; when there is no status either, the failure is
// treated as transient.

use serde::{Deserialize, Serialize};

use crate::infra::errors::GenerationError;

/// Wildcard provider id for rules that apply to every provider.
pub const ANY_PROVIDER: &str = "*";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureClass {
    /// Rate or resource limit. Switch providers; never hammer the same one.
    QuotaExceeded,
    /// Timeout, 5xx, empty output. Worth retrying in place.
    Transient,
    /// Malformed request or bad configuration. Retrying will not help.
    Fatal,
}

impl FailureClass {
    pub fn is_retryable_in_place(&self) -> bool {
        matches!(self, FailureClass::Transient)
    }
}

impl std::fmt::Display for FailureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureClass::QuotaExceeded => write!(f, "quota-exceeded"),
            FailureClass::Transient => write!(f, "transient"),
            FailureClass::Fatal => write!(f, "fatal"),
        }
    }
}

/// A single `(provider, pattern) -> class` entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassifierRule {
    #[serde(default = "default_provider")]
    pub provider: String,
    pub pattern: String,
    pub class: FailureClass,
}

fn default_provider() -> String {
    ANY_PROVIDER.into()
}

impl ClassifierRule {
    pub fn new(
        provider: impl Into<String>,
        pattern: impl Into<String>,
        class: FailureClass,
    ) -> Self {
        Self {
            provider: provider.into(),
            pattern: pattern.into(),
            class,
        }
    }

    pub fn any(pattern: impl Into<String>, class: FailureClass) -> Self {
        Self::new(ANY_PROVIDER, pattern, class)
    }
}

/// Phrases observed from Gemini, OpenRouter and OpenAI-compatible hosts.
pub fn default_rules() -> Vec<ClassifierRule> {
    use FailureClass::*;
    vec![
        ClassifierRule::any("resource_exhausted", QuotaExceeded),
        ClassifierRule::any("resource has been exhausted", QuotaExceeded),
        ClassifierRule::any("quota", QuotaExceeded),
        ClassifierRule::any("rate limit", QuotaExceeded),
        ClassifierRule::any("rate-limit", QuotaExceeded),
        ClassifierRule::any("ratelimit", QuotaExceeded),
        ClassifierRule::any("too many requests", QuotaExceeded),
        ClassifierRule::any("insufficient credits", QuotaExceeded),
        ClassifierRule::any("free-models-per-day", QuotaExceeded),
        ClassifierRule::any("api key not valid", Fatal),
        ClassifierRule::any("invalid_api_key", Fatal),
        ClassifierRule::any("invalid api key", Fatal),
        ClassifierRule::any("invalid_argument", Fatal),
        ClassifierRule::any("is not a valid model", Fatal),
        ClassifierRule::any("model not found", Fatal),
    ]
}

/// Classifies provider failures from a rule table plus status-code fallbacks.
#[derive(Debug, Clone)]
pub struct QuotaClassifier {
    rules: Vec<ClassifierRule>,
}

impl Default for QuotaClassifier {
    fn default() -> Self {
        Self::new(default_rules())
    }
}

impl QuotaClassifier {
    /// Patterns are normalised to lowercase once here.
    pub fn new(rules: Vec<ClassifierRule>) -> Self {
        let rules = rules
            .into_iter()
            .filter(|r| !r.pattern.trim().is_empty())
            .map(|r| ClassifierRule {
                pattern: r.pattern.to_lowercase(),
                ..r
            })
            .collect();
        Self { rules }
    }

    /// User-supplied rules ahead of the defaults, so they win within a scope.
    pub fn with_extra_rules(extra: Vec<ClassifierRule>) -> Self {
        let mut rules = extra;
        rules.extend(default_rules());
        Self::new(rules)
    }

    pub fn rules(&self) -> &[ClassifierRule] {
        &self.rules
    }

    pub fn classify(&self, error: &GenerationError) -> FailureClass {
        match error {
            GenerationError::Provider {
                provider,
                status,
                message,
            } => self
                .match_rules(provider, message)
                .unwrap_or_else(|| classify_status(*status)),
            GenerationError::EmptyResponse { .. } | GenerationError::Timeout { .. } => {
                FailureClass::Transient
            }
            GenerationError::AllProvidersExhausted { last } => self.classify(last),
            GenerationError::InvalidRequest(_)
            | GenerationError::NoProvider { .. }
            | GenerationError::Config(_)
            | GenerationError::ImageUnavailable { .. }
            | GenerationError::Cancelled => FailureClass::Fatal,
            GenerationError::Io(_) | GenerationError::Other(_) => FailureClass::Transient,
        }
    }

    /// Provider-specific rules win over wildcard rules.
    fn match_rules(&self, provider: &str, message: &str) -> Option<FailureClass> {
        let message = message.to_lowercase();
        let matching = |scope: &str| {
            self.rules
                .iter()
                .filter(|r| r.provider == scope)
                .find(|r| message.contains(r.pattern.as_str()))
                .map(|r| r.class)
        };
        matching(provider).or_else(|| matching(ANY_PROVIDER))
    }
}

fn classify_status(status: Option<u16>) -> FailureClass {
    match status {
        Some(429) => FailureClass::QuotaExceeded,
        Some(400 | 401 | 403 | 404 | 422) => FailureClass::Fatal,
        // 408, 5xx, unknown statuses and transport errors without one
        _ => FailureClass::Transient,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn err(provider: &str, status: Option<u16>, message: &str) -> GenerationError {
        GenerationError::provider(provider, status, message)
    }

    #[test]
    fn test_quota_phrase_case_insensitive() {
        let c = QuotaClassifier::default();
        let e = err("gemini", Some(400), "RESOURCE_EXHAUSTED: Quota exceeded for metric");
        assert_eq!(c.classify(&e), FailureClass::QuotaExceeded);
    }

    #[test]
    fn test_status_429_is_quota() {
        let c = QuotaClassifier::new(vec![]);
        assert_eq!(
            c.classify(&err("qwen", Some(429), "slow down")),
            FailureClass::QuotaExceeded
        );
    }

    #[test]
    fn test_server_error_is_transient() {
        let c = QuotaClassifier::default();
        assert_eq!(
            c.classify(&err("deepseek", Some(503), "upstream unavailable")),
            FailureClass::Transient
        );
    }

    #[test]
    fn test_bad_request_is_fatal() {
        let c = QuotaClassifier::default();
        assert_eq!(
            c.classify(&err("zia", Some(400), "malformed body")),
            FailureClass::Fatal
        );
    }

    #[test]
    fn test_unknown_defaults_to_transient() {
        let c = QuotaClassifier::default();
        assert_eq!(
            c.classify(&err("zia", None, "something odd happened")),
            FailureClass::Transient
        );
        assert_eq!(
            c.classify(&err("zia", Some(418), "teapot")),
            FailureClass::Transient
        );
    }

    #[test]
    fn test_provider_rule_beats_wildcard() {
        let c = QuotaClassifier::with_extra_rules(vec![ClassifierRule::new(
            "qwen",
            "quota",
            FailureClass::Transient,
        )]);
        assert_eq!(
            c.classify(&err("qwen", Some(400), "quota check glitch")),
            FailureClass::Transient
        );
        // Other providers still hit the wildcard rule
        assert_eq!(
            c.classify(&err("gemini", Some(400), "quota check glitch")),
            FailureClass::QuotaExceeded
        );
    }

    #[test]
    fn test_user_wildcard_overrides_builtin_phrase() {
        let c = QuotaClassifier::with_extra_rules(vec![ClassifierRule::new(
            "*",
            "quota check",
            FailureClass::Transient,
        )]);
        assert_eq!(
            c.classify(&err("gemini", Some(503), "quota check glitch")),
            FailureClass::Transient
        );
        assert_eq!(
            c.classify(&err("gemini", Some(503), "daily quota exceeded")),
            FailureClass::QuotaExceeded
        );
    }

    #[test]
    fn test_empty_and_timeout_are_transient() {
        let c = QuotaClassifier::default();
        assert_eq!(
            c.classify(&GenerationError::EmptyResponse {
                provider: "gemini".into()
            }),
            FailureClass::Transient
        );
        assert_eq!(
            c.classify(&GenerationError::Timeout {
                provider: "gemini".into(),
                after_ms: 25_000
            }),
            FailureClass::Transient
        );
    }

    #[test]
    fn test_invalid_request_is_fatal() {
        let c = QuotaClassifier::default();
        assert_eq!(
            c.classify(&GenerationError::InvalidRequest("bad".into())),
            FailureClass::Fatal
        );
    }

    #[test]
    fn test_blank_patterns_are_dropped() {
        let c = QuotaClassifier::new(vec![ClassifierRule::any("  ", FailureClass::Fatal)]);
        assert!(c.rules().is_empty());
    }

    #[test]
    fn test_rule_toml_defaults_provider() {
        let rule: ClassifierRule =
            toml::from_str("pattern = \"credits\"\nclass = \"quota-exceeded\"").unwrap();
        assert_eq!(rule.provider, ANY_PROVIDER);
        assert_eq!(rule.class, FailureClass::QuotaExceeded);
    }
}
