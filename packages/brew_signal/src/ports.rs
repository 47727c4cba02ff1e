//! Port traits: the boundary between the signal core and its collaborators.
//!
//! ```text
//!   meter ──▶ PowerSource ──▶ Sampler ──▶ classify ──▶ Notifier ──▶ ChatChannel / LightChannel
//!                               │
//!                               └──▶ TelemetrySink
//! ```
//!
//! The core consumes these through generics. Adapters for real services live
//! in the `brew_watch` binary; tests use the recording doubles in
//! `crate::testing`.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ChannelError, SourceError};

/// A single power observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub watts: f64,
    pub at: DateTime<Utc>,
}

impl Reading {
    pub fn new(watts: f64, at: DateTime<Utc>) -> Self {
        Self { watts, at }
    }
}

/// Opaque identifier of a posted chat message (Slack calls it `ts`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// CIE xy chromaticity plus brightness (0-254, the Hue range).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ColorSpec {
    pub x: f32,
    pub y: f32,
    pub brightness: u8,
}

/// Something that reports the brewer's instantaneous draw in watts.
pub trait PowerSource {
    fn read(&mut self) -> impl Future<Output = Result<f64, SourceError>> + Send;
}

/// Chat collaborator. Failures are logged by the caller and never retried.
pub trait ChatChannel {
    fn post(&mut self, text: &str) -> impl Future<Output = Result<MessageId, ChannelError>> + Send;

    fn delete(&mut self, id: &MessageId) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Smart-light collaborator driving one light group.
pub trait LightChannel {
    fn set_color(&mut self, color: ColorSpec)
    -> impl Future<Output = Result<(), ChannelError>> + Send;

    fn turn_off(&mut self) -> impl Future<Output = Result<(), ChannelError>> + Send;
}

/// Append-only numeric log. Must not block: adapters queue and write later.
pub trait TelemetrySink {
    fn append(&self, reading: Reading) -> Result<(), ChannelError>;
}

/// Time source for every suspension point in the core.
pub trait Clock: Clone {
    fn now(&self) -> DateTime<Utc>;

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Wall-clock time backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}
