// src/provider/resolver.rs — Provider construction and lookup from config

use std::collections::BTreeMap;
use std::sync::Arc;

use super::google::GoogleProvider;
use super::image::{GoogleImageProvider, OpenAIImagesProvider};
use super::openai_compat::{OpenAICompatProvider, OPENROUTER_BASE_URL};
use super::{ImageProvider, ProviderDescriptor, ProviderKind, TextProvider};
use crate::infra::config::{AdapterKind, Config, ProviderConfig};
use crate::infra::paths;

/// A catalogue entry that could not be built, kept for `kindred providers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Unavailable {
    pub id: String,
    pub reason: String,
}

/// Provider clients built once at start-up and shared by every call.
#[derive(Default, Clone)]
pub struct ProviderRegistry {
    text: BTreeMap<String, Arc<dyn TextProvider>>,
    image: BTreeMap<String, Arc<dyn ImageProvider>>,
    unavailable: Vec<Unavailable>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every catalogue entry that has a usable API key.
    pub async fn from_config(config: &Config) -> Self {
        let mut registry = Self::new();
        for (id, cfg) in config.catalogue() {
            let key = match resolve_key(cfg.api_key_env.as_deref(), &id).await {
                Some(key) => key,
                None => {
                    let reason = match &cfg.api_key_env {
                        Some(env) => format!("no API key (set {env} or save {id}.key)"),
                        None => format!("no API key (save {id}.key)"),
                    };
                    tracing::debug!(provider = %id, "Skipping provider: {reason}");
                    registry.unavailable.push(Unavailable { id, reason });
                    continue;
                }
            };
            registry.register_from_config(&id, &cfg, key);
        }
        registry
    }

    fn register_from_config(&mut self, id: &str, cfg: &ProviderConfig, key: String) {
        let name = cfg.name.clone().unwrap_or_else(|| id.to_string());
        match cfg.adapter {
            AdapterKind::Google => {
                let mut p = GoogleProvider::new(id, key, cfg.model.clone()).with_name(name);
                if let Some(url) = &cfg.base_url {
                    p = p.with_base_url(url.clone());
                }
                self.register_text(Arc::new(p));
            }
            AdapterKind::OpenAICompat => {
                let base_url = cfg
                    .base_url
                    .clone()
                    .unwrap_or_else(|| OPENROUTER_BASE_URL.to_string());
                let p = OpenAICompatProvider::new(id, name, key, base_url, cfg.model.clone());
                self.register_text(Arc::new(p));
            }
            AdapterKind::GoogleImage => {
                let mut p = GoogleImageProvider::new(id, key, cfg.model.clone()).with_name(name);
                if let Some(url) = &cfg.base_url {
                    p = p.with_base_url(url.clone());
                }
                self.register_image(Arc::new(p));
            }
            AdapterKind::OpenAIImages => match &cfg.base_url {
                Some(url) => {
                    let p = OpenAIImagesProvider::new(id, key, url.clone(), cfg.model.clone())
                        .with_name(name);
                    self.register_image(Arc::new(p));
                }
                None => self.unavailable.push(Unavailable {
                    id: id.to_string(),
                    reason: "openai-images adapter needs base_url".into(),
                }),
            },
        }
    }

    pub fn register_text(&mut self, provider: Arc<dyn TextProvider>) {
        self.text.insert(provider.id().to_string(), provider);
    }

    pub fn register_image(&mut self, provider: Arc<dyn ImageProvider>) {
        self.image.insert(provider.id().to_string(), provider);
    }

    pub fn text(&self, id: &str) -> Option<Arc<dyn TextProvider>> {
        self.text.get(id).cloned()
    }

    pub fn image(&self, id: &str) -> Option<Arc<dyn ImageProvider>> {
        self.image.get(id).cloned()
    }

    /// Map candidate ids to clients, in order. Unknown ids are skipped.
    pub fn text_candidates(&self, ids: &[String]) -> Vec<Arc<dyn TextProvider>> {
        ids.iter()
            .filter_map(|id| {
                let found = self.text(id);
                if found.is_none() {
                    tracing::warn!(provider = %id, "Unknown or unavailable provider, skipping");
                }
                found
            })
            .collect()
    }

    /// (id, name, kind) for every registered client, text first.
    pub fn describe(&self) -> Vec<(String, String, ProviderKind)> {
        let text = self.text.values().map(|p| describe_one(p.as_ref()));
        let image = self.image.values().map(|p| describe_one(p.as_ref()));
        text.chain(image).collect()
    }

    pub fn unavailable(&self) -> &[Unavailable] {
        &self.unavailable
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.image.is_empty()
    }
}

fn describe_one<P: ProviderDescriptor + ?Sized>(p: &P) -> (String, String, ProviderKind) {
    (p.id().to_string(), p.name().to_string(), p.kind())
}

/// Resolve an API key from env var first, then saved credential file.
async fn resolve_key(env_var: Option<&str>, provider_id: &str) -> Option<String> {
    if let Some(env_var) = env_var {
        if let Ok(key) = std::env::var(env_var) {
            if !key.trim().is_empty() {
                return Some(key.trim().to_string());
            }
        }
    }
    load_saved_key(provider_id).await
}

/// Load an API key from the saved credential file (~/.kindred/credentials/{provider}.key).
async fn load_saved_key(provider: &str) -> Option<String> {
    let key_path = paths::credentials_dir().join(format!("{provider}.key"));
    tokio::fs::read_to_string(&key_path)
        .await
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}
