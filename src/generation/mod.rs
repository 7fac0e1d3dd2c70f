// src/generation/mod.rs — Public generation surface

pub mod facade;
pub mod prompts;
pub mod teaser;

pub use facade::GenerationFacade;
pub use teaser::TeaserTicker;

use crate::infra::errors::GenerationError;
use crate::provider::fallback::Generated;

/// How one generation call ended.
#[derive(Debug)]
pub enum GenerationOutcome<T> {
    Success(Generated<T>),
    /// Every candidate failed; carries the failure that ended the chain.
    Exhausted(GenerationError),
    Cancelled,
}

impl<T> GenerationOutcome<T> {
    pub fn from_result(result: Result<Generated<T>, GenerationError>) -> Self {
        match result {
            Ok(generated) => GenerationOutcome::Success(generated),
            Err(GenerationError::Cancelled) => GenerationOutcome::Cancelled,
            Err(GenerationError::AllProvidersExhausted { last }) => {
                GenerationOutcome::Exhausted(*last)
            }
            Err(other) => GenerationOutcome::Exhausted(other),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, GenerationOutcome::Success(_))
    }

    /// Id of the provider that produced the payload.
    pub fn provider(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Success(g) => Some(&g.provider),
            _ => None,
        }
    }

    pub fn payload(&self) -> Option<&T> {
        match self {
            GenerationOutcome::Success(g) => Some(&g.payload),
            _ => None,
        }
    }

    pub fn into_payload(self) -> Option<T> {
        match self {
            GenerationOutcome::Success(g) => Some(g.payload),
            _ => None,
        }
    }
}
