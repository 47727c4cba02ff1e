//! HTTP power meter.
//!
//! Understands the Shelly plug status document (`{"meters":[{"power":N}]}`)
//! and the flat `{"power":N}` served by `brew-watch simulate`.

use std::time::Duration;

use serde::Deserialize;
use tracing::debug;

use brew_signal::{PowerSource, SourceError};

#[derive(Debug, Deserialize)]
struct MeterChannel {
    power: f64,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MeterPayload {
    Shelly { meters: Vec<MeterChannel> },
    Flat { power: f64 },
}

impl MeterPayload {
    fn watts(&self) -> Result<f64, SourceError> {
        let watts = match self {
            Self::Shelly { meters } => meters
                .first()
                .map(|m| m.power)
                .ok_or_else(|| SourceError::Payload("empty meters list".to_string()))?,
            Self::Flat { power } => *power,
        };
        if !watts.is_finite() || watts < 0.0 {
            return Err(SourceError::Payload(format!("implausible power {}", watts)));
        }
        Ok(watts)
    }
}

/// Parse a meter response body.
pub fn parse_watts(body: &[u8]) -> Result<f64, SourceError> {
    let payload: MeterPayload = serde_json::from_slice(body)
        .map_err(|e| SourceError::Payload(format!("no power field: {}", e)))?;
    payload.watts()
}

fn transport(err: reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::Transport("timed out".to_string())
    } else {
        SourceError::Transport(err.to_string())
    }
}

pub struct HttpMeter {
    client: reqwest::Client,
    url: String,
}

impl HttpMeter {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

impl PowerSource for HttpMeter {
    async fn read(&mut self) -> Result<f64, SourceError> {
        let resp = self.client.get(&self.url).send().await.map_err(transport)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SourceError::Status(status.as_u16()));
        }

        let body = resp.bytes().await.map_err(transport)?;
        let watts = parse_watts(&body)?;
        debug!("Meter {} reports {:.1} W", self.url, watts);
        Ok(watts)
    }
}
