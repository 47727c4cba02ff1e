//! Brewer phase: the single source of truth for what the brewer is doing.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operating phase inferred from the power draw. Exactly one is active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum BrewerPhase {
    /// Switched off, off already announced
    #[default]
    Idle,
    /// Warmer plate on without a preceding brew
    ReheatingOldCoffee,
    /// Water heater running
    Brewing,
    /// Heater stopped; waiting for the last drips before announcing
    AwaitingDripDown { since: DateTime<Utc> },
    /// Fresh coffee on the warmer
    CoffeeReady,
}

impl BrewerPhase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ReheatingOldCoffee => "reheating_old_coffee",
            Self::Brewing => "brewing",
            Self::AwaitingDripDown { .. } => "awaiting_drip_down",
            Self::CoffeeReady => "coffee_ready",
        }
    }

    /// Heater is (or was, until the drip-down window closes) running.
    pub fn is_brewing(&self) -> bool {
        matches!(self, Self::Brewing | Self::AwaitingDripDown { .. })
    }

    /// Legacy three-boolean view of this phase.
    pub fn flags(&self) -> PhaseFlags {
        match self {
            Self::Idle => PhaseFlags {
                brewing: false,
                coffee_done: false,
                turned_off: true,
            },
            Self::ReheatingOldCoffee | Self::CoffeeReady => PhaseFlags {
                brewing: false,
                coffee_done: true,
                turned_off: false,
            },
            Self::Brewing | Self::AwaitingDripDown { .. } => PhaseFlags {
                brewing: true,
                coffee_done: false,
                turned_off: false,
            },
        }
    }
}

impl fmt::Display for BrewerPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingDripDown { since } => {
                write!(f, "awaiting_drip_down (since {})", since.format("%H:%M:%S"))
            }
            other => f.write_str(other.name()),
        }
    }
}

/// The three-boolean encoding older revisions kept as global state.
///
/// Only ever derived from a [`BrewerPhase`]; combinations such as
/// `brewing && turned_off` cannot be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseFlags {
    pub brewing: bool,
    pub coffee_done: bool,
    pub turned_off: bool,
}
