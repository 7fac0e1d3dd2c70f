// src/infra/config.rs — Configuration loading (TOML)

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::infra::paths;
use crate::provider::classifier::ClassifierRule;
use crate::provider::retry::RetryConfig;
use crate::provider::GenerationMode;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Extra or overriding provider entries, merged over the built-in catalogue.
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,

    #[serde(default)]
    pub routing: RoutingConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub prompts: PromptsConfig,

    #[serde(default)]
    pub fallbacks: FallbackMessages,
}

/// Which request/response shape a provider entry speaks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdapterKind {
    #[serde(rename = "google")]
    Google,
    #[serde(rename = "openai-compat")]
    OpenAICompat,
    #[serde(rename = "google-image")]
    GoogleImage,
    #[serde(rename = "openai-images")]
    OpenAIImages,
}

impl AdapterKind {
    pub fn is_image(&self) -> bool {
        matches!(self, AdapterKind::GoogleImage | AdapterKind::OpenAIImages)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub adapter: AdapterKind,
    pub model: String,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

impl ProviderConfig {
    fn new(adapter: AdapterKind, model: &str, api_key_env: &str, name: &str) -> Self {
        Self {
            adapter,
            model: model.into(),
            base_url: None,
            api_key_env: Some(api_key_env.into()),
            name: Some(name.into()),
        }
    }

    fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = Some(base_url.into());
        self
    }
}

/// The providers offered in the app's model picker, plus the two image backends.
pub fn default_catalogue() -> BTreeMap<String, ProviderConfig> {
    use AdapterKind::*;
    let mut c = BTreeMap::new();
    c.insert(
        "gemini".into(),
        ProviderConfig::new(Google, "gemini-2.5-flash", "GEMINI_API_KEY", "Gemini"),
    );
    c.insert(
        "zia".into(),
        ProviderConfig::new(
            OpenAICompat,
            "z-ai/glm-4.5-air:free",
            "OPENROUTER_API_KEY",
            "Zia AI",
        ),
    );
    c.insert(
        "deepseek".into(),
        ProviderConfig::new(
            OpenAICompat,
            "deepseek/deepseek-chat-v3.1:free",
            "OPENROUTER_API_KEY",
            "Deepseek Chat",
        ),
    );
    c.insert(
        "qwen".into(),
        ProviderConfig::new(
            OpenAICompat,
            "qwen/qwen3-235b-a22b:free",
            "OPENROUTER_API_KEY",
            "Qwen",
        ),
    );
    c.insert(
        "gemini-image".into(),
        ProviderConfig::new(
            GoogleImage,
            "gemini-2.5-flash-image-preview",
            "GEMINI_API_KEY",
            "Gemini Image",
        ),
    );
    c.insert(
        "flux".into(),
        ProviderConfig::new(
            OpenAIImages,
            "black-forest-labs/FLUX.1-schnell-Free",
            "TOGETHER_API_KEY",
            "FLUX (Together)",
        )
        .with_base_url("https://api.together.xyz/v1"),
    );
    c
}

/// Candidate lists per generation mode. One place, no per-call-site literals.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Used when the caller has no preference of its own.
    pub default_preferred: Option<String>,
    pub chat: Vec<String>,
    pub suggestion: Vec<String>,
    pub scenario: Vec<String>,
    pub teaser: String,
    pub image_primary: String,
    pub image_secondary: Option<String>,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        let chat: Vec<String> = ["gemini", "deepseek", "qwen", "zia"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        Self {
            default_preferred: Some("gemini".into()),
            suggestion: chat.clone(),
            scenario: vec!["gemini".into(), "deepseek".into(), "qwen".into()],
            chat,
            teaser: "gemini".into(),
            image_primary: "gemini-image".into(),
            image_secondary: Some("flux".into()),
        }
    }
}

impl RoutingConfig {
    /// Backup list for a mode, in the order they should be tried.
    pub fn backups_for(&self, mode: GenerationMode) -> Vec<String> {
        match mode {
            GenerationMode::ChatReply => self.chat.clone(),
            GenerationMode::Suggestion => self.suggestion.clone(),
            GenerationMode::Scenario => self.scenario.clone(),
            GenerationMode::Teaser => vec![self.teaser.clone()],
            GenerationMode::Image => std::iter::once(self.image_primary.clone())
                .chain(self.image_secondary.clone())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// Checked before the built-in rules; provider-specific rules still win.
    #[serde(default)]
    pub rules: Vec<ClassifierRule>,
}

/// minijinja templates. Variables: `personality`, `theme`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub suggestion: String,
    pub scenario: String,
    pub teaser: String,
}

impl Default for PromptsConfig {
    fn default() -> Self {
        Self {
            suggestion: "You are role-playing as the USER in a conversation with the character \
                         described below. Write the user's next message: one or two natural \
                         sentences in first person. No narration, no quotation marks.\n\n\
                         Character:\n{{ personality }}"
                .into(),
            scenario: "{{ personality }}\n\nWrite the opening line of a new role-play scene\
                       {% if theme %} about: {{ theme }}{% endif %}. Stay in character and \
                       speak directly to the user. Reply with the line only."
                .into(),
            teaser: "Based on the personality below, write one short, intriguing hook line \
                     (under 15 words) that makes someone want to start chatting. Reply with \
                     the line only.\n\nPersonality:\n{{ personality }}"
                .into(),
        }
    }
}

/// What callers receive when every provider failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FallbackMessages {
    pub reply: String,
    pub suggestion: String,
    pub scenario: String,
    pub teaser: String,
}

impl Default for FallbackMessages {
    fn default() -> Self {
        Self {
            reply: "Sorry, I encountered an error. Please try again.".into(),
            suggestion: "Tell me more.".into(),
            scenario: "Failed to generate a scenario. Please try again.".into(),
            teaser: "Tap to start chatting.".into(),
        }
    }
}

impl Config {
    /// Load config from file, falling back to defaults.
    pub fn load() -> anyhow::Result<Self> {
        let path = paths::config_file_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn load_from(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Built-in catalogue with user entries layered on top.
    pub fn catalogue(&self) -> BTreeMap<String, ProviderConfig> {
        let mut catalogue = default_catalogue();
        for (id, cfg) in &self.providers {
            catalogue.insert(id.clone(), cfg.clone());
        }
        catalogue
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::classifier::FailureClass;
    use std::io::Write;

    #[test]
    fn test_defaults_reasonable() {
        let c = Config::default();
        assert_eq!(c.retry.max_attempts, 3);
        assert_eq!(c.routing.default_preferred, Some("gemini".into()));
        assert_eq!(c.routing.teaser, "gemini");
        assert!(c.providers.is_empty());
        assert!(!c.fallbacks.reply.is_empty());
    }

    #[test]
    fn test_default_catalogue_covers_routing() {
        let catalogue = Config::default().catalogue();
        let routing = RoutingConfig::default();
        for mode in [
            GenerationMode::ChatReply,
            GenerationMode::Suggestion,
            GenerationMode::Scenario,
            GenerationMode::Teaser,
            GenerationMode::Image,
        ] {
            for id in routing.backups_for(mode) {
                assert!(catalogue.contains_key(&id), "{id} missing from catalogue");
            }
        }
    }

    #[test]
    fn test_image_backups_primary_then_secondary() {
        let r = RoutingConfig::default();
        assert_eq!(r.backups_for(GenerationMode::Image), vec!["gemini-image", "flux"]);
    }

    #[test]
    fn test_parse_minimal_toml() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.routing.chat.len(), 4);
    }

    #[test]
    fn test_parse_full_toml() {
        let toml_str = r#"
[providers.local]
adapter = "openai-compat"
model = "llama3"
base_url = "http://localhost:11434/v1"
api_key_env = "LOCAL_KEY"

[routing]
default_preferred = "local"
chat = ["local", "gemini"]
image_secondary = "flux"

[retry]
max_attempts = 5
initial_delay_ms = 250

[[classifier.rules]]
provider = "local"
pattern = "model is loading"
class = "transient"

[prompts]
teaser = "Hook for {{ personality }}"

[fallbacks]
reply = "Be right back!"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.providers["local"].adapter, AdapterKind::OpenAICompat);
        assert_eq!(config.routing.chat, vec!["local", "gemini"]);
        // Unset routing fields keep their defaults
        assert_eq!(config.routing.teaser, "gemini");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 250);
        assert_eq!(config.retry.attempt_timeout_secs, 25);
        assert_eq!(config.classifier.rules[0].class, FailureClass::Transient);
        assert_eq!(config.prompts.teaser, "Hook for {{ personality }}");
        assert!(config.prompts.scenario.contains("{{ personality }}"));
        assert_eq!(config.fallbacks.reply, "Be right back!");
        assert_eq!(config.fallbacks.teaser, "Tap to start chatting.");
    }

    #[test]
    fn test_catalogue_user_entry_overrides_builtin() {
        let toml_str = r#"
[providers.gemini]
adapter = "google"
model = "gemini-2.5-pro"
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        let catalogue = config.catalogue();
        assert_eq!(catalogue["gemini"].model, "gemini-2.5-pro");
        assert!(catalogue.contains_key("qwen"));
    }

    #[test]
    fn test_unknown_adapter_rejected() {
        let toml_str = r#"
[providers.bad]
adapter = "carrier-pigeon"
model = "coo"
"#;
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[fallbacks]\nscenario = \"No scene today.\"").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.fallbacks.scenario, "No scene today.");
    }

    #[test]
    fn test_load_nonexistent_file() {
        let result = Config::load_from(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_serialize_roundtrip() {
        let config = Config::default();
        let serialized = toml::to_string(&config).unwrap();
        let deserialized: Config = toml::from_str(&serialized).unwrap();
        assert_eq!(deserialized.routing.chat, config.routing.chat);
        assert_eq!(deserialized.prompts.teaser, config.prompts.teaser);
    }
}
