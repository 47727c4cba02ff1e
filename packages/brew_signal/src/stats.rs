//! Session statistics
//!
//! Cumulative counters for one monitoring session, reported on shutdown.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crate::classifier::Notification;
use crate::sampler::{NotReady, SampleOutcome};

/// Session-wide counters
#[derive(Debug, Default)]
pub struct SessionStats {
    // Phase transitions
    /// Brews that reached "coffee ready"
    pub pots_brewed: AtomicU64,
    /// Brews that started (high draw seen)
    pub brews_started: AtomicU64,
    /// Old coffee put back on the warmer
    pub reheats: AtomicU64,
    /// Brewer switched off
    pub power_offs: AtomicU64,

    // Sampling
    pub stable_samples: AtomicU64,
    pub unstable_samples: AtomicU64,
    pub sensor_faults: AtomicU64,

    /// Chat, light or telemetry calls that failed
    pub collaborator_failures: AtomicU64,

    start_time: Option<Instant>,
}

impl SessionStats {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    pub fn record_sample(&self, outcome: &SampleOutcome) {
        let counter = match outcome {
            SampleOutcome::Stable(_) => &self.stable_samples,
            SampleOutcome::NotReady(NotReady::SensorFault) => &self.sensor_faults,
            SampleOutcome::NotReady(NotReady::Unstable(_)) => &self.unstable_samples,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_notification(&self, notification: Notification) {
        let counter = match notification {
            Notification::ReheatingOldCoffee => &self.reheats,
            Notification::BrewingStarted => &self.brews_started,
            Notification::CoffeeReady => &self.pots_brewed,
            Notification::TurnedOff => &self.power_offs,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn collaborator_failed(&self) {
        self.collaborator_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    pub fn snapshot(&self) -> SessionSummary {
        SessionSummary {
            uptime_secs: self.uptime_secs(),
            pots_brewed: self.pots_brewed.load(Ordering::Relaxed),
            brews_started: self.brews_started.load(Ordering::Relaxed),
            reheats: self.reheats.load(Ordering::Relaxed),
            power_offs: self.power_offs.load(Ordering::Relaxed),
            samples: SampleCounts {
                stable: self.stable_samples.load(Ordering::Relaxed),
                unstable: self.unstable_samples.load(Ordering::Relaxed),
                sensor_faults: self.sensor_faults.load(Ordering::Relaxed),
            },
            collaborator_failures: self.collaborator_failures.load(Ordering::Relaxed),
        }
    }
}

/// Serializable snapshot of the session counters
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub uptime_secs: u64,
    pub pots_brewed: u64,
    pub brews_started: u64,
    pub reheats: u64,
    pub power_offs: u64,
    pub samples: SampleCounts,
    pub collaborator_failures: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleCounts {
    pub stable: u64,
    pub unstable: u64,
    pub sensor_faults: u64,
}
