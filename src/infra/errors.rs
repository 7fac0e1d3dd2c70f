// src/infra/errors.rs — Error types for Kindred

use thiserror::Error;

#[derive(Error, Debug)]
pub enum GenerationError {
    // Provider failures (classified by QuotaClassifier)
    #[error("Provider '{provider}' error{}: {message}", status_suffix(.status))]
    Provider {
        provider: String,
        status: Option<u16>,
        message: String,
    },

    #[error("Provider '{provider}' returned an empty response")]
    EmptyResponse { provider: String },

    #[error("Provider '{provider}' timed out after {after_ms}ms")]
    Timeout { provider: String, after_ms: u64 },

    // Request-level errors (checked once, before any provider is called)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("All providers exhausted: {last}")]
    AllProvidersExhausted {
        #[source]
        last: Box<GenerationError>,
    },

    #[error("Image generation is temporarily unavailable: {reason}")]
    ImageUnavailable { reason: String },

    #[error("No provider configured for {mode}. Set a provider API key or check config.toml.")]
    NoProvider { mode: String },

    #[error("Generation cancelled")]
    Cancelled,

    // Infra
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl GenerationError {
    pub fn provider(
        provider: impl Into<String>,
        status: Option<u16>,
        message: impl Into<String>,
    ) -> Self {
        GenerationError::Provider {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// HTTP-like status carried by the failure, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            GenerationError::Provider { status, .. } => *status,
            GenerationError::Timeout { .. } => Some(408),
            GenerationError::AllProvidersExhausted { last } => last.status(),
            _ => None,
        }
    }

    /// The provider that produced this failure, if it came from one.
    pub fn provider_id(&self) -> Option<&str> {
        match self {
            GenerationError::Provider { provider, .. }
            | GenerationError::EmptyResponse { provider }
            | GenerationError::Timeout { provider, .. } => Some(provider),
            GenerationError::AllProvidersExhausted { last } => last.provider_id(),
            _ => None,
        }
    }

    /// Unwraps `AllProvidersExhausted` down to the failure that ended the chain.
    pub fn last_failure(&self) -> &GenerationError {
        match self {
            GenerationError::AllProvidersExhausted { last } => last.last_failure(),
            other => other,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, GenerationError::Cancelled)
    }
}
