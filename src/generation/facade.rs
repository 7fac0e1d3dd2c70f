// src/generation/facade.rs — One call per user action, fallback strings on failure
//
// Text paths (reply, suggestion, scenario, teaser) never hand a provider
// error to the caller: they degrade to a configured string. The image path
// returns a typed error because the caller has to tell the user why.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use super::prompts::{strip_wrapping_quotes, PromptTemplates};
use super::GenerationOutcome;
use crate::infra::config::{Config, FallbackMessages, RoutingConfig};
use crate::infra::errors::GenerationError;
use crate::provider::classifier::{FailureClass, QuotaClassifier};
use crate::provider::fallback::{candidate_ids, FallbackChain, Generated};
use crate::provider::resolver::ProviderRegistry;
use crate::provider::retry::RetryPolicy;
use crate::provider::{
    ConversationTurn, GenerationMode, GenerationRequest, ImagePayload, ImageProvider,
    ProviderDescriptor, TextProvider,
};

pub struct GenerationFacade {
    registry: ProviderRegistry,
    routing: RoutingConfig,
    retry: RetryPolicy,
    classifier: QuotaClassifier,
    prompts: PromptTemplates,
    fallbacks: FallbackMessages,
}

impl GenerationFacade {
    pub fn new(config: &Config, registry: ProviderRegistry) -> Result<Self, GenerationError> {
        Ok(Self {
            registry,
            routing: config.routing.clone(),
            retry: RetryPolicy::from_config(&config.retry),
            classifier: QuotaClassifier::with_extra_rules(config.classifier.rules.clone()),
            prompts: PromptTemplates::from_config(&config.prompts)?,
            fallbacks: config.fallbacks.clone(),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    pub fn fallbacks(&self) -> &FallbackMessages {
        &self.fallbacks
    }

    /// Run a text request through the candidate chain for its mode.
    ///
    /// `Err` only when the request cannot be attempted at all (invalid input or
    /// no known candidate); provider failures come back as `Exhausted`.
    #[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4(), mode = %request.mode))]
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        preferred: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome<String>, GenerationError> {
        if request.mode == GenerationMode::Image {
            return Err(GenerationError::InvalidRequest(
                "image requests go through generate_image".into(),
            ));
        }
        request.validate()?;

        let preferred = preferred.or(self.routing.default_preferred.as_deref());
        let ids = candidate_ids(preferred, &self.routing.backups_for(request.mode));
        let candidates = self.registry.text_candidates(&ids);
        if candidates.is_empty() {
            return Err(GenerationError::NoProvider {
                mode: request.mode.to_string(),
            });
        }

        let chain = FallbackChain::new(&self.retry, &self.classifier);
        let result = chain
            .run(&candidates, cancel, |provider| async move {
                provider.generate_text(request).await
            })
            .await;

        if let Ok(generated) = &result {
            tracing::debug!(provider = %generated.provider, "Generation succeeded");
        }
        Ok(GenerationOutcome::from_result(result))
    }

    /// Reply as the bot. Falls back to the configured apology.
    pub async fn generate_reply(
        &self,
        history: &[ConversationTurn],
        system_prompt: &str,
        preferred: Option<&str>,
        cancel: &CancellationToken,
    ) -> String {
        let request =
            GenerationRequest::new(GenerationMode::ChatReply, system_prompt, history.to_vec());
        let outcome = self.generate(&request, preferred, cancel).await;
        text_or_fallback(outcome, &self.fallbacks.reply)
    }

    /// Draft the user's next message. The transcript is mirrored so the model
    /// speaks from the user's side of the conversation.
    pub async fn generate_suggestion(
        &self,
        history: &[ConversationTurn],
        personality: &str,
        preferred: Option<&str>,
        cancel: &CancellationToken,
    ) -> String {
        if personality.trim().is_empty() {
            tracing::warn!("Suggestion requested without a personality");
            return self.fallbacks.suggestion.clone();
        }
        let system_prompt = match self.prompts.suggestion(personality) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Suggestion prompt failed to render: {e}");
                return self.fallbacks.suggestion.clone();
            }
        };
        let mirrored = history
            .iter()
            .map(|turn| ConversationTurn {
                role: turn.role.flipped(),
                text: turn.text.clone(),
            })
            .collect();

        let request = GenerationRequest::new(GenerationMode::Suggestion, system_prompt, mirrored);
        let outcome = self.generate(&request, preferred, cancel).await;
        let text = text_or_fallback(outcome, &self.fallbacks.suggestion);
        strip_wrapping_quotes(&text)
    }

    /// Opening line for a new scene, from the personality and an optional theme.
    pub async fn generate_scenario(
        &self,
        personality: &str,
        theme: Option<&str>,
        preferred: Option<&str>,
        cancel: &CancellationToken,
    ) -> String {
        let system_prompt = match self.prompts.scenario(personality, theme) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Scenario prompt failed to render: {e}");
                return self.fallbacks.scenario.clone();
            }
        };
        let request = GenerationRequest::new(GenerationMode::Scenario, system_prompt, Vec::new());
        let outcome = self.generate(&request, preferred, cancel).await;
        text_or_fallback(outcome, &self.fallbacks.scenario)
    }

    /// Generate an image, preferring the identity-preserving provider.
    ///
    /// A quota failure of the premium provider falls back to the secondary one
    /// only for text-to-image; with a reference image the secondary would lose
    /// the subject, so `ImageUnavailable` is returned instead. The same holds
    /// when the primary itself cannot edit a reference image.
    #[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4(), mode = "image"))]
    pub async fn generate_image(
        &self,
        prompt: &str,
        reference: Option<&ImagePayload>,
        cancel: &CancellationToken,
    ) -> Result<Generated<ImagePayload>, GenerationError> {
        if prompt.trim().is_empty() {
            return Err(GenerationError::InvalidRequest(
                "image prompt must not be empty".into(),
            ));
        }
        let reference = reference.filter(|r| !r.bytes.is_empty());
        let secondary = self
            .routing
            .image_secondary
            .as_deref()
            .and_then(|id| self.registry.image(id));

        let Some(primary) = self.registry.image(&self.routing.image_primary) else {
            return match (reference, secondary) {
                (Some(_), _) => Err(GenerationError::ImageUnavailable {
                    reason: format!("'{}' is not configured", self.routing.image_primary),
                }),
                (None, Some(secondary)) => {
                    self.run_secondary_image(secondary, prompt, cancel).await
                }
                (None, None) => Err(GenerationError::NoProvider {
                    mode: GenerationMode::Image.to_string(),
                }),
            };
        };

        let primary_id = primary.id().to_string();
        if reference.is_some() && !primary.preserves_identity() {
            tracing::warn!(
                provider = %primary_id,
                "Primary image provider cannot edit a reference image"
            );
            return Err(GenerationError::ImageUnavailable {
                reason: format!("'{primary_id}' cannot edit a reference image"),
            });
        }
        let outcome = self
            .retry
            .run(&primary_id, &self.classifier, cancel, || {
                let provider = Arc::clone(&primary);
                async move { provider.generate_image(prompt, reference).await }
            })
            .await;

        let failure = match outcome {
            Ok(succeeded) => {
                return Ok(Generated {
                    provider: primary_id,
                    payload: succeeded.payload,
                })
            }
            Err(failure) if failure.error.is_cancelled() => return Err(GenerationError::Cancelled),
            Err(failure) => failure,
        };

        if failure.class != FailureClass::QuotaExceeded {
            return Err(GenerationError::AllProvidersExhausted {
                last: Box::new(failure.error),
            });
        }

        if reference.is_some() {
            tracing::warn!(
                provider = %primary_id,
                "Image quota reached; reference edit unavailable"
            );
            return Err(GenerationError::ImageUnavailable {
                reason: failure.error.to_string(),
            });
        }

        match secondary {
            Some(secondary) => {
                tracing::warn!(
                    provider = %primary_id,
                    fallback = %secondary.id(),
                    "Image quota reached, falling back"
                );
                self.run_secondary_image(secondary, prompt, cancel).await
            }
            None => Err(GenerationError::AllProvidersExhausted {
                last: Box::new(failure.error),
            }),
        }
    }

    async fn run_secondary_image(
        &self,
        secondary: Arc<dyn ImageProvider>,
        prompt: &str,
        cancel: &CancellationToken,
    ) -> Result<Generated<ImagePayload>, GenerationError> {
        let chain = FallbackChain::new(&self.retry, &self.classifier);
        chain
            .run(std::slice::from_ref(&secondary), cancel, |provider| async move {
                provider.generate_image(prompt, None).await
            })
            .await
    }

    /// A short hook line for a bot card. Single attempt, no chain.
    #[instrument(skip_all, fields(request_id = %uuid::Uuid::new_v4(), mode = "teaser"))]
    pub async fn generate_teaser(&self, personality: &str) -> String {
        let placeholder = || self.fallbacks.teaser.clone();
        if personality.trim().is_empty() {
            return placeholder();
        }
        let Some(provider) = self.registry.text(&self.routing.teaser) else {
            tracing::debug!(provider = %self.routing.teaser, "Teaser provider unavailable");
            return placeholder();
        };
        let prompt = match self.prompts.teaser(personality) {
            Ok(p) => p,
            Err(e) => {
                tracing::warn!("Teaser prompt failed to render: {e}");
                return placeholder();
            }
        };

        let request = GenerationRequest::new(GenerationMode::Teaser, prompt, Vec::new());
        let timeout = self.retry.attempt_timeout();
        match tokio::time::timeout(timeout, provider.generate_text(&request)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => strip_wrapping_quotes(&text),
            Ok(Ok(_)) => placeholder(),
            Ok(Err(e)) => {
                tracing::debug!("Teaser generation failed: {e}");
                placeholder()
            }
            Err(_) => {
                tracing::debug!(timeout_ms = timeout.as_millis() as u64, "Teaser timed out");
                placeholder()
            }
        }
    }
}

fn text_or_fallback(
    outcome: Result<GenerationOutcome<String>, GenerationError>,
    fallback: &str,
) -> String {
    match outcome {
        Ok(GenerationOutcome::Success(generated)) => generated.payload.trim().to_string(),
        Ok(GenerationOutcome::Exhausted(last)) => {
            tracing::warn!("All providers failed, using fallback text: {last}");
            fallback.to_string()
        }
        Ok(GenerationOutcome::Cancelled) => {
            tracing::debug!("Generation cancelled, using fallback text");
            fallback.to_string()
        }
        Err(e) => {
            tracing::warn!("Generation not attempted: {e}");
            fallback.to_string()
        }
    }
}
