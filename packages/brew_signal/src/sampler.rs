//! Signal Sampler
//!
//! Takes two readings `interval` apart and decides whether the pair shows a
//! settled draw or a brewer still ramping between heating elements. A single
//! reading is never trusted on its own.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::SourceError;
use crate::ports::{Clock, PowerSource, Reading, TelemetrySink};
use crate::stats::SessionStats;

/// Tuning for the two-sample stability check.
#[derive(Debug, Clone, PartialEq)]
pub struct SamplerConfig {
    /// Gap between the two readings of a pair
    pub interval: Duration,
    /// Allowed drift between readings at normal load
    pub base_tolerance_w: f64,
    /// Allowed drift once the first reading exceeds `wide_above_w`
    /// (both carafes heating produce more jitter)
    pub wide_tolerance_w: f64,
    pub wide_above_w: f64,
    /// Drift at or below this is too flat to trust for a nonzero draw
    pub min_drift_w: f64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            base_tolerance_w: 40.0,
            wide_tolerance_w: 80.0,
            wide_above_w: 2000.0,
            min_drift_w: 1.0,
        }
    }
}

impl SamplerConfig {
    /// Tolerance that applies to a pair whose first reading is `first_w`.
    pub fn tolerance_for(&self, first_w: f64) -> f64 {
        if first_w > self.wide_above_w {
            self.wide_tolerance_w
        } else {
            self.base_tolerance_w
        }
    }
}

/// How an unstable pair failed the check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Drift {
    /// Still transitioning
    TooLarge,
    /// Nonzero but flat; could be jitter around a baseline, so not trusted
    TooSmall,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReady {
    SensorFault,
    Unstable(Drift),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SampleOutcome {
    Stable(f64),
    NotReady(NotReady),
}

impl SampleOutcome {
    pub fn watts(&self) -> Option<f64> {
        match self {
            Self::Stable(w) => Some(*w),
            Self::NotReady(_) => None,
        }
    }
}

/// Stability verdict for a pair of readings.
pub fn assess(first_w: f64, second_w: f64, config: &SamplerConfig) -> SampleOutcome {
    // zero draw has no jitter
    if first_w == 0.0 && second_w == 0.0 {
        return SampleOutcome::Stable(0.0);
    }

    let drift = (first_w - second_w).abs();
    if !drift.is_finite() || drift > config.tolerance_for(first_w) {
        SampleOutcome::NotReady(NotReady::Unstable(Drift::TooLarge))
    } else if drift <= config.min_drift_w {
        SampleOutcome::NotReady(NotReady::Unstable(Drift::TooSmall))
    } else {
        SampleOutcome::Stable(second_w)
    }
}

/// Polls a [`PowerSource`] twice per call and applies [`assess`].
pub struct Sampler<S, K, T> {
    source: S,
    clock: K,
    sink: Option<T>,
    config: SamplerConfig,
    stats: Arc<SessionStats>,
}

impl<S, K, T> Sampler<S, K, T>
where
    S: PowerSource,
    K: Clock,
    T: TelemetrySink,
{
    pub fn new(source: S, clock: K, config: SamplerConfig, stats: Arc<SessionStats>) -> Self {
        Self {
            source,
            clock,
            sink: None,
            config,
            stats,
        }
    }

    /// Forward every raw reading to `sink`, whatever the verdict.
    pub fn with_sink(mut self, sink: Option<T>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.config
    }

    /// Take a reading pair and return the validated wattage or why there is none.
    ///
    /// A failed read ends the call immediately; there is no retry in here.
    pub async fn sample(&mut self) -> SampleOutcome {
        let outcome = self.sample_pair().await;
        self.stats.record_sample(&outcome);
        outcome
    }

    async fn sample_pair(&mut self) -> SampleOutcome {
        let first = match self.read().await {
            Ok(reading) => reading,
            Err(e) => {
                debug!("First reading failed: {}", e);
                return SampleOutcome::NotReady(NotReady::SensorFault);
            }
        };

        self.clock.sleep(self.config.interval).await;

        let second = match self.read().await {
            Ok(reading) => reading,
            Err(e) => {
                debug!("Second reading failed: {}", e);
                return SampleOutcome::NotReady(NotReady::SensorFault);
            }
        };

        let outcome = assess(first.watts, second.watts, &self.config);
        if let SampleOutcome::NotReady(NotReady::Unstable(drift)) = outcome {
            debug!(
                "Unstable pair {:.1} W -> {:.1} W ({:?}, tolerance {:.0} W)",
                first.watts,
                second.watts,
                drift,
                self.config.tolerance_for(first.watts)
            );
        }
        outcome
    }

    async fn read(&mut self) -> Result<Reading, SourceError> {
        let watts = self.source.read().await?;
        let reading = Reading::new(watts, self.clock.now());
        debug!("{:.1} W", reading.watts);
        self.forward(reading);
        Ok(reading)
    }

    fn forward(&self, reading: Reading) {
        if let Some(sink) = &self.sink {
            if let Err(e) = sink.append(reading) {
                warn!("Telemetry append failed: {}", e);
                self.stats.collaborator_failed();
            }
        }
    }
}
