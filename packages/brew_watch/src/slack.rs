//! Slack Web API chat channel.

use std::time::Duration;

use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use brew_signal::{ChannelError, ChatChannel, MessageId};

use crate::config::ChatConfig;

const COLLABORATOR: &str = "slack";

/// Page size when walking the channel history.
const HISTORY_PAGE: u32 = 100;

/// Common envelope of Web API responses.
#[derive(Debug, Deserialize)]
struct ApiResponse {
    ok: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    ts: Option<String>,
    #[serde(default)]
    messages: Vec<HistoryMessage>,
}

#[derive(Debug, Deserialize)]
struct HistoryMessage {
    ts: String,
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

pub struct SlackChannel {
    client: reqwest::Client,
    api_base: String,
    token: String,
    channel_id: String,
}

impl SlackChannel {
    pub fn new(client: reqwest::Client, config: &ChatConfig) -> Self {
        Self {
            client,
            api_base: config.api_base.clone(),
            token: config.token.clone(),
            channel_id: config.channel_id.clone(),
        }
    }

    /// Slack answers 200 with `{"ok":false}` for most failures.
    async fn check(resp: reqwest::Response) -> Result<ApiResponse, ChannelError> {
        let status = resp.status();
        if !status.is_success() {
            return Err(rejected(format!("HTTP {}", status)));
        }
        let body: ApiResponse = resp.json().await.map_err(transport)?;
        if !body.ok {
            return Err(rejected(
                body.error.unwrap_or_else(|| "unknown_error".to_string()),
            ));
        }
        Ok(body)
    }

    async fn call(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<ApiResponse, ChannelError> {
        let resp = self
            .client
            .post(format!("{}/{}", self.api_base, method))
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .await
            .map_err(transport)?;
        Self::check(resp).await
    }

    /// Newest-first message ids, at most `limit`.
    pub async fn history(&self, limit: u32) -> Result<Vec<MessageId>, ChannelError> {
        let limit = limit.to_string();
        let resp = self
            .client
            .get(format!("{}/conversations.history", self.api_base))
            .bearer_auth(&self.token)
            .query(&[
                ("channel", self.channel_id.as_str()),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .map_err(transport)?;

        let body = Self::check(resp).await?;
        Ok(body.messages.into_iter().map(|m| MessageId(m.ts)).collect())
    }

    /// The channel's most recent message, used to seed the status cursor.
    pub async fn latest_message(&self) -> Result<Option<MessageId>, ChannelError> {
        Ok(self.history(1).await?.into_iter().next())
    }

    /// Delete every message in the channel, pausing between deletes for the
    /// rate limit. Stops at the first failed delete.
    pub async fn clear_channel(&mut self, pause: Duration) -> Result<usize, ChannelError> {
        let mut deleted = 0;
        loop {
            let page = self.history(HISTORY_PAGE).await?;
            if page.is_empty() {
                break;
            }
            for id in page {
                self.delete(&id).await?;
                deleted += 1;
                info!("Deleted message {} ({} so far)", id, deleted);
                tokio::time::sleep(pause).await;
            }
        }
        Ok(deleted)
    }
}

impl ChatChannel for SlackChannel {
    async fn post(&mut self, text: &str) -> Result<MessageId, ChannelError> {
        let body = self
            .call(
                "chat.postMessage",
                json!({ "channel": self.channel_id, "text": text }),
            )
            .await?;
        let ts = body.ts.ok_or_else(|| rejected("response without ts"))?;
        debug!("Slack message posted, ts {}", ts);
        Ok(MessageId(ts))
    }

    async fn delete(&mut self, id: &MessageId) -> Result<(), ChannelError> {
        self.call(
            "chat.delete",
            json!({ "channel": self.channel_id, "ts": id.0 }),
        )
        .await?;
        Ok(())
    }
}
