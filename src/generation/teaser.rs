// src/generation/teaser.rs — Periodic teaser refresh for a bot card

use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use super::GenerationFacade;

/// Re-issues `generate_teaser` on a fixed cadence until cancelled.
#[derive(Debug, Clone)]
pub struct TeaserTicker {
    period: Duration,
}

impl Default for TeaserTicker {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PERIOD)
    }
}

impl TeaserTicker {
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(15);

    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(Duration::from_millis(1)),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// First teaser is produced immediately. A slow generation never causes a
    /// burst of catch-up calls. Returns how many teasers were delivered.
    pub async fn run<F>(
        &self,
        facade: &GenerationFacade,
        personality: &str,
        cancel: &CancellationToken,
        mut on_teaser: F,
    ) -> u64
    where
        F: FnMut(String),
    {
        let mut interval = tokio::time::interval(self.period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut delivered = 0;

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {}
            }
            let teaser = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                teaser = facade.generate_teaser(personality) => teaser,
            };
            delivered += 1;
            on_teaser(teaser);
        }

        tracing::debug!(delivered, "Teaser ticker stopped");
        delivered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::config::Config;
    use crate::provider::resolver::ProviderRegistry;

    fn empty_facade() -> GenerationFacade {
        GenerationFacade::new(&Config::default(), ProviderRegistry::new()).unwrap()
    }

    #[test]
    fn test_zero_period_clamped() {
        assert_eq!(TeaserTicker::new(Duration::ZERO).period(), Duration::from_millis(1));
        assert_eq!(TeaserTicker::default().period(), Duration::from_secs(15));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_delivers_nothing() {
        let facade = empty_facade();
        let cancel = CancellationToken::new();
        cancel.cancel();
        let count = TeaserTicker::new(Duration::from_millis(5))
            .run(&facade, "A witch.", &cancel, |_| {})
            .await;
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_ticks_until_cancelled() {
        let facade = empty_facade();
        let cancel = CancellationToken::new();
        let stop = cancel.clone();
        let mut seen = Vec::new();
        let count = TeaserTicker::new(Duration::from_millis(5))
            .run(&facade, "A witch.", &cancel, |t| {
                seen.push(t);
                if seen.len() == 3 {
                    stop.cancel();
                }
            })
            .await;
        assert_eq!(count, 3);
        // No provider registered, so every tick yields the placeholder.
        assert!(seen.iter().all(|t| t == "Tap to start chatting."));
    }
}
