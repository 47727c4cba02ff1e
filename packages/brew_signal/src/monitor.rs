//! Monitor loop
//!
//! Owns the brewer phase and drives sample → classify → notify → sleep.
//! Single task, no shared mutable state: the phase only changes inside
//! [`Monitor::step`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info};

use crate::classifier::{Classifier, Step};
use crate::notify::Notifier;
use crate::phase::BrewerPhase;
use crate::ports::{ChatChannel, Clock, LightChannel, PowerSource, TelemetrySink};
use crate::sampler::{NotReady, SampleOutcome, Sampler};
use crate::stats::{SessionStats, SessionSummary};

/// What one call to [`Monitor::step`] did.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cycle {
    /// No usable reading; waited half an interval
    NotReady(NotReady),
    /// A validated reading went through the classifier
    Classified {
        watts: f64,
        from: BrewerPhase,
        to: BrewerPhase,
    },
    /// Waited out the drip-down window and announced the coffee
    Settled,
    /// Woke before the drip-down window closed
    Draining(Duration),
}

pub struct Monitor<S, K, T, C, L> {
    sampler: Sampler<S, K, T>,
    classifier: Classifier,
    notifier: Notifier<C, L>,
    clock: K,
    phase: BrewerPhase,
    stats: Arc<SessionStats>,
}

impl<S, K, T, C, L> Monitor<S, K, T, C, L>
where
    S: PowerSource,
    K: Clock,
    T: TelemetrySink,
    C: ChatChannel,
    L: LightChannel,
{
    pub fn new(
        sampler: Sampler<S, K, T>,
        classifier: Classifier,
        notifier: Notifier<C, L>,
        clock: K,
        stats: Arc<SessionStats>,
    ) -> Self {
        Self {
            sampler,
            classifier,
            notifier,
            clock,
            phase: BrewerPhase::Idle,
            stats,
        }
    }

    /// Start from a phase other than idle.
    pub fn with_phase(mut self, phase: BrewerPhase) -> Self {
        self.phase = phase;
        self
    }

    pub fn phase(&self) -> BrewerPhase {
        self.phase
    }

    pub fn stats(&self) -> &Arc<SessionStats> {
        &self.stats
    }

    fn interval(&self) -> Duration {
        self.sampler.config().interval
    }

    /// Sleep before the next cycle: a full interval, or only up to the end
    /// of an open drip-down window.
    async fn pause(&self) {
        let interval = self.interval();
        let wait = match self.classifier.remaining(self.phase, self.clock.now()) {
            Some(left) => left.min(interval),
            None => interval,
        };
        self.clock.sleep(wait).await;
    }

    /// Run a single cycle.
    ///
    /// While a drip-down window is open no readings are taken; the cycle
    /// sleeps out the rest of the window and then announces the coffee.
    /// The window lasts exactly `drip_settle` from the reading that opened
    /// it, whatever the sampling interval.
    pub async fn step(&mut self) -> Cycle {
        if let Some(left) = self.classifier.remaining(self.phase, self.clock.now()) {
            if !left.is_zero() {
                debug!("Drip-down: {}s left", left.as_secs());
                self.clock.sleep(left).await;
            }
            let now = self.clock.now();
            return match self.classifier.settle(self.phase, now) {
                Some(step) => {
                    self.apply(step).await;
                    self.pause().await;
                    Cycle::Settled
                }
                // the next cycle sleeps whatever is left
                None => Cycle::Draining(
                    self.classifier
                        .remaining(self.phase, now)
                        .unwrap_or(Duration::ZERO),
                ),
            };
        }

        match self.sampler.sample().await {
            SampleOutcome::NotReady(reason) => {
                debug!("No stable reading ({:?}), retrying shortly", reason);
                self.clock.sleep(self.interval() / 2).await;
                Cycle::NotReady(reason)
            }
            SampleOutcome::Stable(watts) => {
                let from = self.phase;
                let step = self.classifier.classify(from, watts, self.clock.now());
                self.apply(step).await;
                self.pause().await;
                Cycle::Classified {
                    watts,
                    from,
                    to: self.phase,
                }
            }
        }
    }

    async fn apply(&mut self, step: Step) {
        if let Some(effect) = step.effect {
            self.notifier.dispatch(effect).await;
        }
        if step.next != self.phase {
            info!("Phase {} -> {}", self.phase, step.next);
            self.phase = step.next;
        }
    }

    /// Loop until `shutdown` resolves, then return the session counters.
    ///
    /// A cycle in flight when shutdown fires is abandoned at its current
    /// suspension point.
    pub async fn run<F>(mut self, shutdown: F) -> SessionSummary
    where
        F: Future<Output = ()>,
    {
        info!(
            "Monitoring brewer (interval {}s, drip-down {}s)",
            self.interval().as_secs(),
            self.classifier.config().drip_settle.as_secs()
        );
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    info!("Monitor stopping in phase {}", self.phase);
                    break;
                }
                _ = self.step() => {}
            }
        }

        self.stats.snapshot()
    }
}
