//! Brew Signal - turns a coffee brewer's power draw into brewing events
//!
//! This crate holds the pure logic: the two-sample stability check, the phase
//! state machine, and the loop that ties them to chat, light and telemetry
//! collaborators. It has no HTTP dependencies; every outside service sits
//! behind a trait in [`ports`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use brew_signal::{
//!     Classifier, ClassifierConfig, Messages, Monitor, Notifier, Sampler, SamplerConfig,
//!     SessionStats, TokioClock,
//! };
//! # use brew_signal::{ChannelError, ChatChannel, ColorSpec, LightChannel, MessageId,
//! #     PowerSource, Reading, SourceError, TelemetrySink};
//! # struct Meter;
//! # impl PowerSource for Meter {
//! #     async fn read(&mut self) -> Result<f64, SourceError> { Ok(0.0) }
//! # }
//! # struct NoChat;
//! # impl ChatChannel for NoChat {
//! #     async fn post(&mut self, _: &str) -> Result<MessageId, ChannelError> {
//! #         Ok(MessageId(String::new()))
//! #     }
//! #     async fn delete(&mut self, _: &MessageId) -> Result<(), ChannelError> { Ok(()) }
//! # }
//! # struct NoLights;
//! # impl LightChannel for NoLights {
//! #     async fn set_color(&mut self, _: ColorSpec) -> Result<(), ChannelError> { Ok(()) }
//! #     async fn turn_off(&mut self) -> Result<(), ChannelError> { Ok(()) }
//! # }
//! # struct NoSink;
//! # impl TelemetrySink for NoSink {
//! #     fn append(&self, _: Reading) -> Result<(), ChannelError> { Ok(()) }
//! # }
//!
//! #[tokio::main]
//! async fn main() {
//!     let stats = Arc::new(SessionStats::new());
//!     let clock = TokioClock;
//!
//!     let sampler: Sampler<_, _, NoSink> =
//!         Sampler::new(Meter, clock, SamplerConfig::default(), stats.clone());
//!     let notifier: Notifier<NoChat, NoLights> =
//!         Notifier::new(Messages::default(), stats.clone());
//!     let monitor = Monitor::new(
//!         sampler,
//!         Classifier::new(ClassifierConfig::default()),
//!         notifier,
//!         clock,
//!         stats,
//!     );
//!
//!     let summary = monitor.run(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await;
//!     println!("{} pots brewed", summary.pots_brewed);
//! }
//! ```

pub mod classifier;
pub mod error;
pub mod monitor;
pub mod notify;
pub mod phase;
pub mod ports;
pub mod sampler;
pub mod stats;

#[cfg(test)]
mod testing;

pub use classifier::{Classifier, ClassifierConfig, Effect, Notification, PowerBand, Step};
pub use error::{ChannelError, SourceError};
pub use monitor::{Cycle, Monitor};
pub use notify::{LightAction, Messages, Notifier, StatusBoard};
pub use phase::{BrewerPhase, PhaseFlags};
pub use ports::{
    ChatChannel, Clock, ColorSpec, LightChannel, MessageId, PowerSource, Reading, TelemetrySink,
    TokioClock,
};
pub use sampler::{Drift, NotReady, SampleOutcome, Sampler, SamplerConfig, assess};
pub use stats::{SampleCounts, SessionStats, SessionSummary};
