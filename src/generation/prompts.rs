// src/generation/prompts.rs — Prompt construction from configured templates

use minijinja::{context, Environment};

use crate::infra::config::PromptsConfig;
use crate::infra::errors::GenerationError;

/// The suggestion, scenario and teaser templates, checked once at start-up.
#[derive(Debug)]
pub struct PromptTemplates {
    env: Environment<'static>,
    config: PromptsConfig,
}

impl Default for PromptTemplates {
    fn default() -> Self {
        Self {
            env: Environment::new(),
            config: PromptsConfig::default(),
        }
    }
}

impl PromptTemplates {
    /// Trial-render every template so a typo fails at start-up, not mid-conversation.
    pub fn from_config(config: &PromptsConfig) -> Result<Self, GenerationError> {
        let templates = Self {
            env: Environment::new(),
            config: config.clone(),
        };
        templates.suggestion("")?;
        templates.scenario("", Some("theme"))?;
        templates.teaser("")?;
        Ok(templates)
    }

    /// System prompt asking the model to answer as the user, not as the bot.
    pub fn suggestion(&self, personality: &str) -> Result<String, GenerationError> {
        self.render(
            "suggestion",
            &self.config.suggestion,
            context! { personality => personality.trim() },
        )
    }

    pub fn scenario(
        &self,
        personality: &str,
        theme: Option<&str>,
    ) -> Result<String, GenerationError> {
        let theme = theme.map(str::trim).filter(|t| !t.is_empty());
        self.render(
            "scenario",
            &self.config.scenario,
            context! { personality => personality.trim(), theme => theme },
        )
    }

    pub fn teaser(&self, personality: &str) -> Result<String, GenerationError> {
        self.render(
            "teaser",
            &self.config.teaser,
            context! { personality => personality.trim() },
        )
    }

    fn render(
        &self,
        name: &str,
        source: &str,
        ctx: minijinja::Value,
    ) -> Result<String, GenerationError> {
        self.env
            .render_str(source, ctx)
            .map(|s| s.trim().to_string())
            .map_err(|e| GenerationError::Config(format!("prompts.{name}: {e}")))
    }
}

/// Strip one layer of wrapping quotes the model tends to add around a line.
pub fn strip_wrapping_quotes(text: &str) -> String {
    const PAIRS: [(char, char); 4] = [('"', '"'), ('\'', '\''), ('“', '”'), ('‘', '’')];
    let trimmed = text.trim();
    for (open, close) in PAIRS {
        if let Some(inner) = trimmed
            .strip_prefix(open)
            .and_then(|rest| rest.strip_suffix(close))
        {
            return inner.trim().to_string();
        }
    }
    trimmed.to_string()
}
