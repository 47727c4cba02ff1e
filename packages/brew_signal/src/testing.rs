//! Recording test doubles. Every double writes into one shared [`EventLog`]
//! so tests can assert on the order of sleeps, posts and light changes.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};

use crate::error::{ChannelError, SourceError};
use crate::ports::{
    ChatChannel, Clock, ColorSpec, LightChannel, MessageId, PowerSource, Reading, TelemetrySink,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Slept(Duration),
    Posted(String),
    Deleted(MessageId),
    Color(ColorSpec),
    LightsOff,
    Appended(f64),
}

#[derive(Debug, Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<Event>>>);

impl EventLog {
    pub fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub fn posts(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Posted(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// Virtual clock: `sleep` returns at once and advances `now`.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Arc<Mutex<DateTime<Utc>>>,
    log: EventLog,
}

impl ManualClock {
    pub fn new(log: EventLog) -> Self {
        Self {
            now: Arc::new(Mutex::new(
                DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
            )),
            log,
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }

    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        {
            let mut now = self.now.lock().unwrap();
            *now += chrono::TimeDelta::from_std(duration).unwrap();
        }
        self.log.push(Event::Slept(duration));
        std::future::ready(())
    }
}

/// Replays a fixed list of readings, then fails.
#[derive(Debug)]
pub struct ScriptedSource {
    readings: VecDeque<Result<f64, SourceError>>,
}

impl ScriptedSource {
    pub fn new(readings: Vec<Result<f64, SourceError>>) -> Self {
        Self {
            readings: readings.into(),
        }
    }

    pub fn watts(readings: &[f64]) -> Self {
        Self::new(readings.iter().copied().map(Ok).collect())
    }
}

impl PowerSource for ScriptedSource {
    async fn read(&mut self) -> Result<f64, SourceError> {
        self.readings
            .pop_front()
            .unwrap_or_else(|| Err(SourceError::Transport("script exhausted".to_string())))
    }
}

#[derive(Debug)]
pub struct MockChat {
    log: EventLog,
    next_id: u64,
    pub fail_posts: bool,
    pub fail_deletes: bool,
}

impl MockChat {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            next_id: 1,
            fail_posts: false,
            fail_deletes: false,
        }
    }
}

impl ChatChannel for MockChat {
    async fn post(&mut self, text: &str) -> Result<MessageId, ChannelError> {
        if self.fail_posts {
            return Err(ChannelError::Transport {
                collaborator: "chat",
                reason: "offline".to_string(),
            });
        }
        self.log.push(Event::Posted(text.to_string()));
        let id = MessageId(format!("m{}", self.next_id));
        self.next_id += 1;
        Ok(id)
    }

    async fn delete(&mut self, id: &MessageId) -> Result<(), ChannelError> {
        if self.fail_deletes {
            return Err(ChannelError::Rejected {
                collaborator: "chat",
                reason: "message_not_found".to_string(),
            });
        }
        self.log.push(Event::Deleted(id.clone()));
        Ok(())
    }
}

#[derive(Debug)]
pub struct MockLights {
    log: EventLog,
    pub fail: bool,
}

impl MockLights {
    pub fn new(log: EventLog) -> Self {
        Self { log, fail: false }
    }

    fn outcome(&self, event: Event) -> Result<(), ChannelError> {
        if self.fail {
            return Err(ChannelError::Transport {
                collaborator: "lights",
                reason: "bridge offline".to_string(),
            });
        }
        self.log.push(event);
        Ok(())
    }
}

impl LightChannel for MockLights {
    async fn set_color(&mut self, color: ColorSpec) -> Result<(), ChannelError> {
        self.outcome(Event::Color(color))
    }

    async fn turn_off(&mut self) -> Result<(), ChannelError> {
        self.outcome(Event::LightsOff)
    }
}

#[derive(Debug)]
pub struct RecordingSink {
    log: EventLog,
    fail: bool,
}

impl RecordingSink {
    pub fn new(log: EventLog) -> Self {
        Self { log, fail: false }
    }

    pub fn failing(log: EventLog) -> Self {
        Self { log, fail: true }
    }
}

impl TelemetrySink for RecordingSink {
    fn append(&self, reading: Reading) -> Result<(), ChannelError> {
        if self.fail {
            return Err(ChannelError::QueueFull {
                collaborator: "telemetry",
            });
        }
        self.log.push(Event::Appended(reading.watts));
        Ok(())
    }
}
