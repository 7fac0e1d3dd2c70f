// src/provider/fallback.rs — Fallback chain for provider resilience

use std::future::Future;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::classifier::{FailureClass, QuotaClassifier};
use super::retry::RetryPolicy;
use super::{Payload, ProviderDescriptor};
use crate::infra::errors::GenerationError;

/// Build the per-call candidate order: preferred first, then backups, no repeats.
pub fn candidate_ids(preferred: Option<&str>, backups: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::with_capacity(backups.len() + 1);
    let preferred = preferred.map(str::trim).filter(|p| !p.is_empty());
    for id in preferred.into_iter().chain(backups.iter().map(|s| s.trim())) {
        if !id.is_empty() && !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// A payload together with the provider that produced it.
#[derive(Debug, Clone)]
pub struct Generated<T> {
    pub provider: String,
    pub payload: T,
}

/// One recorded attempt outcome, in traversal order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateReport {
    pub provider: String,
    pub attempts: u32,
    pub class: Option<FailureClass>,
}

/// Sequential, first-success-wins traversal of a candidate list.
///
/// Holds no state across calls; each `run` walks the list it is given.
pub struct FallbackChain<'a> {
    retry: &'a RetryPolicy,
    classifier: &'a QuotaClassifier,
}

impl<'a> FallbackChain<'a> {
    pub fn new(retry: &'a RetryPolicy, classifier: &'a QuotaClassifier) -> Self {
        Self { retry, classifier }
    }

    /// Try each candidate in order, retrying within a candidate before moving on.
    ///
    /// Quota, fatal and exhausted-transient failures all advance to the next
    /// candidate. When every candidate has failed the last error is returned
    /// inside `AllProvidersExhausted`.
    pub async fn run<P, T, F, Fut>(
        &self,
        candidates: &[Arc<P>],
        cancel: &CancellationToken,
        invoke: F,
    ) -> Result<Generated<T>, GenerationError>
    where
        P: ProviderDescriptor + ?Sized,
        T: Payload,
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        self.run_with_report(candidates, cancel, invoke)
            .await
            .map(|(generated, _)| generated)
    }

    /// Like `run`, also returning the per-candidate trail for diagnostics.
    pub async fn run_with_report<P, T, F, Fut>(
        &self,
        candidates: &[Arc<P>],
        cancel: &CancellationToken,
        invoke: F,
    ) -> Result<(Generated<T>, Vec<CandidateReport>), GenerationError>
    where
        P: ProviderDescriptor + ?Sized,
        T: Payload,
        F: Fn(Arc<P>) -> Fut,
        Fut: Future<Output = Result<T, GenerationError>>,
    {
        if candidates.is_empty() {
            return Err(GenerationError::NoProvider {
                mode: "this request".into(),
            });
        }

        let mut report = Vec::with_capacity(candidates.len());
        let mut last_error = None;

        for (index, candidate) in candidates.iter().enumerate() {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }

            let id = candidate.id().to_string();
            let outcome = self
                .retry
                .run(&id, self.classifier, cancel, || invoke(Arc::clone(candidate)))
                .await;

            match outcome {
                Ok(succeeded) => {
                    report.push(CandidateReport {
                        provider: id.clone(),
                        attempts: succeeded.attempts,
                        class: None,
                    });
                    if index > 0 {
                        tracing::info!(
                            provider = %id,
                            position = index + 1,
                            "Fallback provider succeeded"
                        );
                    }
                    return Ok((
                        Generated {
                            provider: id,
                            payload: succeeded.payload,
                        },
                        report,
                    ));
                }
                Err(failure) if failure.error.is_cancelled() => {
                    return Err(GenerationError::Cancelled);
                }
                Err(failure) => {
                    tracing::warn!(
                        provider = %id,
                        class = %failure.class,
                        attempts = failure.attempts,
                        "Provider failed, trying fallback: {}",
                        failure.error
                    );
                    report.push(CandidateReport {
                        provider: id,
                        attempts: failure.attempts,
                        class: Some(failure.class),
                    });
                    last_error = Some(failure.error);
                }
            }
        }

        Err(GenerationError::AllProvidersExhausted {
            last: Box::new(last_error.unwrap_or(GenerationError::NoProvider {
                mode: "this request".into(),
            })),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;
    use std::time::Duration;

    struct Named(&'static str);

    impl ProviderDescriptor for Named {
        fn id(&self) -> &str {
            self.0
        }
        fn name(&self) -> &str {
            self.0
        }
        fn kind(&self) -> ProviderKind {
            ProviderKind::Text
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default().with_delays(Duration::from_millis(1), Duration::from_millis(1))
    }

    #[test]
    fn test_candidate_ids_preferred_first() {
        let backups = vec!["gemini".to_string(), "deepseek".to_string()];
        assert_eq!(
            candidate_ids(Some("qwen"), &backups),
            vec!["qwen", "gemini", "deepseek"]
        );
    }

    #[test]
    fn test_candidate_ids_dedupes_preferred_in_backups() {
        let backups = vec![
            "gemini".to_string(),
            "deepseek".to_string(),
            "gemini".to_string(),
        ];
        assert_eq!(
            candidate_ids(Some("deepseek"), &backups),
            vec!["deepseek", "gemini"]
        );
    }

    #[test]
    fn test_candidate_ids_without_preferred() {
        let backups = vec!["gemini".to_string()];
        assert_eq!(candidate_ids(None, &backups), vec!["gemini"]);
        assert_eq!(candidate_ids(Some("  "), &backups), vec!["gemini"]);
    }

    #[tokio::test]
    async fn test_empty_candidates_is_no_provider() {
        let retry = fast_policy();
        let classifier = QuotaClassifier::default();
        let chain = FallbackChain::new(&retry, &classifier);
        let candidates: Vec<Arc<Named>> = vec![];
        let result = chain
            .run(&candidates, &CancellationToken::new(), |_| async {
                Ok::<_, GenerationError>("x".to_string())
            })
            .await;
        assert!(matches!(result, Err(GenerationError::NoProvider { .. })));
    }

    #[tokio::test]
    async fn test_report_records_trail() {
        let retry = fast_policy();
        let classifier = QuotaClassifier::default();
        let chain = FallbackChain::new(&retry, &classifier);
        let candidates = vec![Arc::new(Named("a")), Arc::new(Named("b"))];
        let (generated, report) = chain
            .run_with_report(&candidates, &CancellationToken::new(), |p| async move {
                if p.id() == "a" {
                    Err(GenerationError::provider("a", Some(429), "quota"))
                } else {
                    Ok("from b".to_string())
                }
            })
            .await
            .unwrap();
        assert_eq!(generated.provider, "b");
        assert_eq!(generated.payload, "from b");
        assert_eq!(
            report,
            vec![
                CandidateReport {
                    provider: "a".into(),
                    attempts: 1,
                    class: Some(FailureClass::QuotaExceeded),
                },
                CandidateReport {
                    provider: "b".into(),
                    attempts: 1,
                    class: None,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_chain_stops() {
        let retry = fast_policy();
        let classifier = QuotaClassifier::default();
        let chain = FallbackChain::new(&retry, &classifier);
        let candidates = vec![Arc::new(Named("a"))];
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = chain
            .run(&candidates, &cancel, |_| async {
                Ok::<_, GenerationError>("x".to_string())
            })
            .await;
        assert!(matches!(result, Err(GenerationError::Cancelled)));
    }
}
