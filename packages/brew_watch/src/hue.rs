//! Philips Hue bridge, API v1.
//!
//! All light changes go to one group action so a single request recolors
//! every lamp around the brewer.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info};

use brew_signal::{ChannelError, ColorSpec, LightChannel};

use crate::config::LightsConfig;

const COLLABORATOR: &str = "hue";

/// Bridge error type for "link button not pressed".
const LINK_BUTTON_NOT_PRESSED: u32 = 101;

/// One entry of the bridge's result array.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum BridgeResult {
    Success(Value),
    Error(BridgeError),
}

#[derive(Debug, Deserialize)]
struct BridgeError {
    #[serde(rename = "type")]
    kind: u32,
    description: String,
}

fn transport(err: reqwest::Error) -> ChannelError {
    ChannelError::Transport {
        collaborator: COLLABORATOR,
        reason: err.to_string(),
    }
}

fn rejected(reason: impl Into<String>) -> ChannelError {
    ChannelError::Rejected {
        collaborator: COLLABORATOR,
        reason: reason.into(),
    }
}

async fn results(resp: reqwest::Response) -> Result<Vec<BridgeResult>, ChannelError> {
    let status = resp.status();
    if !status.is_success() {
        return Err(rejected(format!("HTTP {}", status)));
    }
    resp.json().await.map_err(transport)
}

/// Body of a group action for `color`.
pub fn color_action(color: ColorSpec) -> Value {
    json!({
        "on": true,
        "xy": [color.x, color.y],
        "bri": color.brightness,
    })
}

pub struct HueLights {
    client: reqwest::Client,
    action_url: String,
}

impl HueLights {
    pub fn new(client: reqwest::Client, config: &LightsConfig) -> Self {
        Self {
            client,
            action_url: format!(
                "{}/api/{}/groups/{}/action",
                config.bridge_url, config.username, config.group
            ),
        }
    }

    async fn put_action(&self, body: Value) -> Result<(), ChannelError> {
        let resp = self
            .client
            .put(&self.action_url)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;

        for result in results(resp).await? {
            if let BridgeResult::Error(e) = result {
                return Err(rejected(format!("{} (type {})", e.description, e.kind)));
            }
        }
        debug!("Hue group action applied: {}", body);
        Ok(())
    }
}

impl LightChannel for HueLights {
    async fn set_color(&mut self, color: ColorSpec) -> Result<(), ChannelError> {
        self.put_action(color_action(color)).await
    }

    async fn turn_off(&mut self) -> Result<(), ChannelError> {
        self.put_action(json!({ "on": false })).await
    }
}

// =============================================================================
// Pairing
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum PairError {
    #[error("link button on the bridge was not pressed after {0} attempts")]
    NotPressed(u32),

    #[error(transparent)]
    Bridge(#[from] ChannelError),
}

/// `devicetype` sent when pairing: app name plus this host, at most 40 chars.
pub fn device_type() -> String {
    let host = std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "brewer".to_string());
    let host: String = host.chars().take(19).collect();
    format!("brew_watch#{}", host)
}

/// Ask the bridge for a new username, retrying while the link button has
/// not been pressed.
pub async fn pair(
    client: &reqwest::Client,
    bridge_url: &str,
    device_type: &str,
    attempts: u32,
    pause: Duration,
) -> Result<String, PairError> {
    let url = format!("{}/api", bridge_url);

    for attempt in 1..=attempts {
        let resp = client
            .post(&url)
            .json(&json!({ "devicetype": device_type }))
            .send()
            .await
            .map_err(transport)?;

        match results(resp).await?.into_iter().next() {
            Some(BridgeResult::Success(success)) => {
                return success
                    .get("username")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .ok_or_else(|| rejected("pairing succeeded without a username").into());
            }
            Some(BridgeResult::Error(e)) if e.kind == LINK_BUTTON_NOT_PRESSED => {
                info!(
                    "Press the link button on the Hue bridge (attempt {}/{})",
                    attempt, attempts
                );
                tokio::time::sleep(pause).await;
            }
            Some(BridgeResult::Error(e)) => return Err(rejected(e.description).into()),
            None => return Err(rejected("empty response").into()),
        }
    }

    Err(PairError::NotPressed(attempts))
}
