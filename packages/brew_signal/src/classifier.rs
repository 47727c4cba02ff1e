//! Phase Classifier
//!
//! Maps a validated wattage and the current [`BrewerPhase`] to the next phase
//! plus at most one side effect. Level-triggered: the same input is fed every
//! cycle, and the phase guards keep a transition from firing twice.
//!
//! Rules, first match wins:
//!
//! | watts          | phase                                   | next               | effect            |
//! |----------------|-----------------------------------------|--------------------|-------------------|
//! | 1 < w <= 300   | idle                                    | reheating          | reheating notice  |
//! | 1 < w <= 300   | brewing                                 | awaiting drip-down | none (yet)        |
//! | w > 1000       | idle, reheating, ready                  | brewing            | brewing notice    |
//! | w > 1000       | brewing                                 | brewing            | light re-assert * |
//! | w == 0         | anything but idle                       | idle               | off notice        |
//! | w == 0         | idle                                    | idle               | none              |
//! | anything else  |                                         | unchanged          | none              |
//!
//! `*` only when enabled. The drip-down window ends in [`Classifier::settle`],
//! which announces the coffee and moves to ready.

use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::phase::BrewerPhase;

/// Draw at or below this (but above zero) is treated as noise.
pub const NOISE_CEILING_W: f64 = 1.0;
/// Upper bound of the warmer-plate band.
pub const WARMING_CEILING_W: f64 = 300.0;
/// Above this the water heater is running.
pub const BREWING_FLOOR_W: f64 = 1000.0;

/// Coarse band a validated wattage falls into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerBand {
    Off,
    /// Negative or at most [`NOISE_CEILING_W`]
    Noise,
    Warming,
    /// Between the warmer and heater bands; nothing is inferred here
    DeadBand,
    Heating,
}

impl PowerBand {
    pub fn of(watts: f64) -> Self {
        if watts == 0.0 {
            Self::Off
        } else if watts > BREWING_FLOOR_W {
            Self::Heating
        } else if watts > WARMING_CEILING_W {
            Self::DeadBand
        } else if watts > NOISE_CEILING_W {
            Self::Warming
        } else {
            Self::Noise
        }
    }
}

/// User-facing event announced on a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Notification {
    ReheatingOldCoffee,
    BrewingStarted,
    CoffeeReady,
    TurnedOff,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Notify(Notification),
    /// Re-send the brewing light without a chat message
    ReassertBrewingLight,
}

/// Result of one classification: where to go and what to fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Step {
    pub next: BrewerPhase,
    pub effect: Option<Effect>,
}

impl Step {
    fn quiet(next: BrewerPhase) -> Self {
        Self { next, effect: None }
    }

    fn stay(phase: BrewerPhase) -> Self {
        Self::quiet(phase)
    }

    fn to(next: BrewerPhase, notification: Notification) -> Self {
        Self {
            next,
            effect: Some(Effect::Notify(notification)),
        }
    }

    pub fn notification(&self) -> Option<Notification> {
        match self.effect {
            Some(Effect::Notify(n)) => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifierConfig {
    /// Wait after the heater stops before calling the coffee ready
    pub drip_settle: Duration,
    pub reassert_brewing_light: bool,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            drip_settle: Duration::from_secs(30),
            reassert_brewing_light: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Classifier {
    config: ClassifierConfig,
}

impl Classifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    /// Apply the rule table to a validated reading.
    pub fn classify(&self, phase: BrewerPhase, watts: f64, now: DateTime<Utc>) -> Step {
        use BrewerPhase::*;

        match (PowerBand::of(watts), phase) {
            (PowerBand::Warming, Idle) => {
                Step::to(ReheatingOldCoffee, Notification::ReheatingOldCoffee)
            }
            (PowerBand::Warming, Brewing) => Step::quiet(AwaitingDripDown { since: now }),

            (PowerBand::Heating, Idle | ReheatingOldCoffee | CoffeeReady) => {
                Step::to(Brewing, Notification::BrewingStarted)
            }
            (PowerBand::Heating, Brewing) if self.config.reassert_brewing_light => Step {
                next: Brewing,
                effect: Some(Effect::ReassertBrewingLight),
            },

            (PowerBand::Off, Idle) => Step::stay(Idle),
            (PowerBand::Off, _) => Step::to(Idle, Notification::TurnedOff),

            (_, current) => Step::stay(current),
        }
    }

    /// Time left in the drip-down window, if one is open.
    pub fn remaining(&self, phase: BrewerPhase, now: DateTime<Utc>) -> Option<Duration> {
        match phase {
            BrewerPhase::AwaitingDripDown { since } => {
                let elapsed = (now - since).to_std().unwrap_or(Duration::ZERO);
                Some(self.config.drip_settle.saturating_sub(elapsed))
            }
            _ => None,
        }
    }

    /// Close the drip-down window once it has fully elapsed.
    pub fn settle(&self, phase: BrewerPhase, now: DateTime<Utc>) -> Option<Step> {
        match self.remaining(phase, now) {
            Some(left) if left.is_zero() => {
                Some(Step::to(BrewerPhase::CoffeeReady, Notification::CoffeeReady))
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;

    fn classifier() -> Classifier {
        Classifier::default()
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000 + secs, 0).unwrap()
    }

    // ── PowerBand ──────────────────────────────────────────────────

    #[test]
    fn test_band_edges() {
        assert_eq!(PowerBand::of(0.0), PowerBand::Off);
        assert_eq!(PowerBand::of(0.5), PowerBand::Noise);
        assert_eq!(PowerBand::of(1.0), PowerBand::Noise);
        assert_eq!(PowerBand::of(-3.0), PowerBand::Noise);
        assert_eq!(PowerBand::of(1.01), PowerBand::Warming);
        assert_eq!(PowerBand::of(300.0), PowerBand::Warming);
        assert_eq!(PowerBand::of(300.1), PowerBand::DeadBand);
        assert_eq!(PowerBand::of(1000.0), PowerBand::DeadBand);
        assert_eq!(PowerBand::of(1000.1), PowerBand::Heating);
    }

    // ── Warming band ───────────────────────────────────────────────

    #[test]
    fn test_idle_warming_is_reheating_once() {
        let c = classifier();
        let step = c.classify(BrewerPhase::Idle, 150.0, at(0));
        assert_eq!(step.next, BrewerPhase::ReheatingOldCoffee);
        assert_eq!(step.notification(), Some(Notification::ReheatingOldCoffee));

        let again = c.classify(step.next, 150.0, at(10));
        assert_eq!(again.next, BrewerPhase::ReheatingOldCoffee);
        assert_eq!(again.effect, None);
    }

    #[test]
    fn test_brewing_warming_opens_drip_window_silently() {
        let step = classifier().classify(BrewerPhase::Brewing, 102.3, at(5));
        assert_eq!(step.next, BrewerPhase::AwaitingDripDown { since: at(5) });
        assert_eq!(step.effect, None);
    }

    #[test]
    fn test_open_drip_window_is_not_restarted() {
        let phase = BrewerPhase::AwaitingDripDown { since: at(0) };
        let step = classifier().classify(phase, 150.0, at(20));
        assert_eq!(step.next, phase);
        assert_eq!(step.effect, None);
    }

    #[test]
    fn test_ready_warming_is_silent() {
        let step = classifier().classify(BrewerPhase::CoffeeReady, 100.2, at(0));
        assert_eq!(step.next, BrewerPhase::CoffeeReady);
        assert_eq!(step.effect, None);
    }

    // ── Heating band ───────────────────────────────────────────────

    #[test]
    fn test_heating_starts_brew_from_any_non_brewing_phase() {
        for phase in [
            BrewerPhase::Idle,
            BrewerPhase::ReheatingOldCoffee,
            BrewerPhase::CoffeeReady,
        ] {
            let step = classifier().classify(phase, 1300.2, at(0));
            assert_eq!(step.next, BrewerPhase::Brewing, "from {phase}");
            assert_eq!(step.notification(), Some(Notification::BrewingStarted));
        }
    }

    #[test]
    fn test_heating_while_brewing_is_silent_by_default() {
        let step = classifier().classify(BrewerPhase::Brewing, 2600.0, at(0));
        assert_eq!(step.next, BrewerPhase::Brewing);
        assert_eq!(step.effect, None);
    }

    #[test]
    fn test_heating_while_brewing_reasserts_light_when_enabled() {
        let c = Classifier::new(ClassifierConfig {
            reassert_brewing_light: true,
            ..Default::default()
        });
        let step = c.classify(BrewerPhase::Brewing, 1493.6, at(0));
        assert_eq!(step.next, BrewerPhase::Brewing);
        assert_eq!(step.effect, Some(Effect::ReassertBrewingLight));
        assert_eq!(step.notification(), None);
    }

    #[test]
    fn test_heating_during_drip_window_keeps_window() {
        let phase = BrewerPhase::AwaitingDripDown { since: at(0) };
        let step = classifier().classify(phase, 1300.0, at(3));
        assert_eq!(step.next, phase);
        assert_eq!(step.effect, None);
    }

    // ── Off ────────────────────────────────────────────────────────

    #[test]
    fn test_zero_resets_every_active_phase() {
        for phase in [
            BrewerPhase::ReheatingOldCoffee,
            BrewerPhase::Brewing,
            BrewerPhase::AwaitingDripDown { since: at(0) },
            BrewerPhase::CoffeeReady,
        ] {
            let step = classifier().classify(phase, 0.0, at(1));
            assert_eq!(step.next, BrewerPhase::Idle, "from {phase}");
            assert_eq!(step.notification(), Some(Notification::TurnedOff));
        }
    }

    #[test]
    fn test_zero_while_idle_is_silent() {
        let step = classifier().classify(BrewerPhase::Idle, 0.0, at(0));
        assert_eq!(step.next, BrewerPhase::Idle);
        assert_eq!(step.effect, None);
    }

    // ── Unmatched ──────────────────────────────────────────────────

    #[test]
    fn test_dead_band_never_fires() {
        for phase in [
            BrewerPhase::Idle,
            BrewerPhase::ReheatingOldCoffee,
            BrewerPhase::Brewing,
            BrewerPhase::CoffeeReady,
        ] {
            let step = classifier().classify(phase, 500.0, at(0));
            assert_eq!(step, Step::stay(phase));
        }
    }

    #[test]
    fn test_noise_never_fires() {
        let step = classifier().classify(BrewerPhase::Idle, 0.7, at(0));
        assert_eq!(step, Step::stay(BrewerPhase::Idle));
    }

    // ── Drip-down window ───────────────────────────────────────────

    #[test]
    fn test_remaining_counts_down() {
        let c = classifier();
        let phase = BrewerPhase::AwaitingDripDown { since: at(0) };
        assert_eq!(c.remaining(phase, at(0)), Some(Duration::from_secs(30)));
        assert_eq!(c.remaining(phase, at(12)), Some(Duration::from_secs(18)));
        assert_eq!(c.remaining(phase, at(45)), Some(Duration::ZERO));
        assert_eq!(c.remaining(BrewerPhase::Brewing, at(0)), None);
    }

    #[test]
    fn test_remaining_with_clock_behind_window_start() {
        let phase = BrewerPhase::AwaitingDripDown { since: at(10) };
        assert_eq!(
            classifier().remaining(phase, at(0)),
            Some(Duration::from_secs(30))
        );
    }

    #[test]
    fn test_settle_only_after_full_window() {
        let c = classifier();
        let phase = BrewerPhase::AwaitingDripDown { since: at(0) };
        assert_eq!(c.settle(phase, at(29)), None);
        assert_eq!(
            c.settle(phase, at(0) + TimeDelta::milliseconds(29_999)),
            None
        );

        let step = c.settle(phase, at(30)).unwrap();
        assert_eq!(step.next, BrewerPhase::CoffeeReady);
        assert_eq!(step.notification(), Some(Notification::CoffeeReady));
    }

    #[test]
    fn test_settle_outside_window_is_none() {
        assert_eq!(classifier().settle(BrewerPhase::Brewing, at(100)), None);
        assert_eq!(classifier().settle(BrewerPhase::Idle, at(100)), None);
    }
}
