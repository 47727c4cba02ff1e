//! Notification dispatch to the chat and light collaborators.
//!
//! Delivery is best effort: every failure is logged and counted, nothing is
//! retried, and the phase machine never waits on the outcome.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::classifier::{Effect, Notification};
use crate::error::ChannelError;
use crate::ports::{ChatChannel, ColorSpec, LightChannel, MessageId};
use crate::stats::SessionStats;

/// Warm amber for old coffee being reheated.
pub const REHEATING_COLOR: ColorSpec = ColorSpec {
    x: 0.5267,
    y: 0.4133,
    brightness: 200,
};
/// Red while the heater runs.
pub const BREWING_COLOR: ColorSpec = ColorSpec {
    x: 0.6750,
    y: 0.3220,
    brightness: 254,
};
/// Green when fresh coffee is on the warmer.
pub const READY_COLOR: ColorSpec = ColorSpec {
    x: 0.4091,
    y: 0.5180,
    brightness: 254,
};

/// Chat texts per notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Messages {
    pub reheating: String,
    pub brewing: String,
    pub ready: String,
    pub off: String,
}

impl Default for Messages {
    fn default() -> Self {
        Self {
            reheating: "Någon räddar svalnande kaffe! :ambulance:".to_string(),
            brewing: "Nu bryggs det kaffe! :building_construction:".to_string(),
            ready: "Det finns kaffe! :coffee: :brown_heart:".to_string(),
            off: "Bryggare avstängd. :broken_heart:".to_string(),
        }
    }
}

impl Messages {
    pub fn text_for(&self, notification: Notification) -> &str {
        match notification {
            Notification::ReheatingOldCoffee => &self.reheating,
            Notification::BrewingStarted => &self.brewing,
            Notification::CoffeeReady => &self.ready,
            Notification::TurnedOff => &self.off,
        }
    }
}

/// What the light group should show for a notification.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightAction {
    Color(ColorSpec),
    Off,
}

impl LightAction {
    pub fn for_notification(notification: Notification) -> Self {
        match notification {
            Notification::ReheatingOldCoffee => Self::Color(REHEATING_COLOR),
            Notification::BrewingStarted => Self::Color(BREWING_COLOR),
            Notification::CoffeeReady => Self::Color(READY_COLOR),
            Notification::TurnedOff => Self::Off,
        }
    }
}

/// Keeps exactly one live status message in a chat channel.
///
/// Owns the id of the last message it posted; each update deletes that
/// message before posting the new one.
pub struct StatusBoard<C> {
    channel: C,
    last: Option<MessageId>,
}

impl<C: ChatChannel> StatusBoard<C> {
    /// `last` seeds the cursor, e.g. with the newest message found at startup.
    pub fn new(channel: C, last: Option<MessageId>) -> Self {
        Self { channel, last }
    }

    pub fn last(&self) -> Option<&MessageId> {
        self.last.as_ref()
    }

    /// Delete the previous status, post `text`. Returns the failures, if any.
    pub async fn replace(&mut self, text: &str) -> Vec<ChannelError> {
        let mut failures = Vec::new();

        if let Some(previous) = self.last.take() {
            match self.channel.delete(&previous).await {
                Ok(()) => debug!("Deleted status message {}", previous),
                Err(e) => failures.push(e),
            }
        }

        match self.channel.post(text).await {
            Ok(id) => {
                debug!("Posted status message {}", id);
                self.last = Some(id);
            }
            Err(e) => failures.push(e),
        }

        failures
    }
}

/// Fans transition effects out to the enabled collaborators.
pub struct Notifier<C, L> {
    status: Option<StatusBoard<C>>,
    lights: Option<L>,
    messages: Messages,
    stats: Arc<SessionStats>,
}

impl<C, L> Notifier<C, L>
where
    C: ChatChannel,
    L: LightChannel,
{
    pub fn new(messages: Messages, stats: Arc<SessionStats>) -> Self {
        Self {
            status: None,
            lights: None,
            messages,
            stats,
        }
    }

    pub fn with_chat(mut self, status: Option<StatusBoard<C>>) -> Self {
        self.status = status;
        self
    }

    pub fn with_lights(mut self, lights: Option<L>) -> Self {
        self.lights = lights;
        self
    }

    pub fn status(&self) -> Option<&StatusBoard<C>> {
        self.status.as_ref()
    }

    pub async fn dispatch(&mut self, effect: Effect) {
        match effect {
            Effect::Notify(notification) => self.notify(notification).await,
            Effect::ReassertBrewingLight => {
                self.apply_light(LightAction::Color(BREWING_COLOR)).await;
            }
        }
    }

    async fn notify(&mut self, notification: Notification) {
        self.stats.record_notification(notification);
        let text = self.messages.text_for(notification).to_string();
        info!("{}", text);

        if let Some(status) = self.status.as_mut() {
            for failure in status.replace(&text).await {
                warn!("Chat update failed: {}", failure);
                self.stats.collaborator_failed();
            }
        }

        self.apply_light(LightAction::for_notification(notification))
            .await;
    }

    async fn apply_light(&mut self, action: LightAction) {
        let Some(lights) = self.lights.as_mut() else {
            return;
        };
        let result = match action {
            LightAction::Color(color) => lights.set_color(color).await,
            LightAction::Off => lights.turn_off().await,
        };
        if let Err(e) = result {
            warn!("Light update failed: {}", e);
            self.stats.collaborator_failed();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Event, EventLog, MockChat, MockLights};

    fn notifier(log: &EventLog) -> Notifier<MockChat, MockLights> {
        Notifier::new(Messages::default(), Arc::new(SessionStats::new()))
            .with_chat(Some(StatusBoard::new(MockChat::new(log.clone()), None)))
            .with_lights(Some(MockLights::new(log.clone())))
    }

    // ── StatusBoard ────────────────────────────────────────────────

    #[tokio::test]
    async fn test_first_post_has_nothing_to_delete() {
        let log = EventLog::default();
        let mut board = StatusBoard::new(MockChat::new(log.clone()), None);

        assert!(board.replace("hello").await.is_empty());
        assert_eq!(log.events(), vec![Event::Posted("hello".to_string())]);
        assert_eq!(board.last(), Some(&MessageId("m1".to_string())));
    }

    #[tokio::test]
    async fn test_replace_deletes_previous_before_posting() {
        let log = EventLog::default();
        let mut board = StatusBoard::new(
            MockChat::new(log.clone()),
            Some(MessageId("seed".to_string())),
        );

        board.replace("one").await;
        board.replace("two").await;

        assert_eq!(
            log.events(),
            vec![
                Event::Deleted(MessageId("seed".to_string())),
                Event::Posted("one".to_string()),
                Event::Deleted(MessageId("m1".to_string())),
                Event::Posted("two".to_string()),
            ]
        );
        assert_eq!(board.last(), Some(&MessageId("m2".to_string())));
    }

    #[tokio::test]
    async fn test_failed_delete_still_posts() {
        let log = EventLog::default();
        let mut chat = MockChat::new(log.clone());
        chat.fail_deletes = true;
        let mut board = StatusBoard::new(chat, Some(MessageId("gone".to_string())));

        let failures = board.replace("fresh").await;
        assert_eq!(failures.len(), 1);
        assert_eq!(log.posts(), vec!["fresh".to_string()]);
        assert_eq!(board.last(), Some(&MessageId("m1".to_string())));
    }

    #[tokio::test]
    async fn test_failed_post_clears_cursor() {
        let log = EventLog::default();
        let mut chat = MockChat::new(log.clone());
        chat.fail_posts = true;
        let mut board = StatusBoard::new(chat, Some(MessageId("old".to_string())));

        let failures = board.replace("lost").await;
        assert_eq!(failures.len(), 1);
        assert_eq!(board.last(), None);
        assert_eq!(log.events(), vec![Event::Deleted(MessageId("old".to_string()))]);
    }

    // ── Notifier ───────────────────────────────────────────────────

    #[tokio::test]
    async fn test_notify_posts_text_then_sets_light() {
        let log = EventLog::default();
        let mut n = notifier(&log);

        n.dispatch(Effect::Notify(Notification::BrewingStarted))
            .await;

        assert_eq!(
            log.events(),
            vec![
                Event::Posted(Messages::default().brewing),
                Event::Color(BREWING_COLOR),
            ]
        );
        assert_eq!(n.stats.snapshot().brews_started, 1);
    }

    #[tokio::test]
    async fn test_turned_off_switches_lights_off() {
        let log = EventLog::default();
        let mut n = notifier(&log);

        n.dispatch(Effect::Notify(Notification::TurnedOff)).await;

        assert_eq!(log.events().last(), Some(&Event::LightsOff));
    }

    #[tokio::test]
    async fn test_reassert_only_touches_lights() {
        let log = EventLog::default();
        let mut n = notifier(&log);

        n.dispatch(Effect::ReassertBrewingLight).await;

        assert_eq!(log.events(), vec![Event::Color(BREWING_COLOR)]);
        assert_eq!(n.stats.snapshot().brews_started, 0);
    }

    #[tokio::test]
    async fn test_collaborator_failures_are_counted_not_raised() {
        let log = EventLog::default();
        let mut chat = MockChat::new(log.clone());
        chat.fail_posts = true;
        let mut lights = MockLights::new(log.clone());
        lights.fail = true;
        let mut n: Notifier<MockChat, MockLights> =
            Notifier::new(Messages::default(), Arc::new(SessionStats::new()))
                .with_chat(Some(StatusBoard::new(chat, None)))
                .with_lights(Some(lights));

        n.dispatch(Effect::Notify(Notification::CoffeeReady)).await;

        let summary = n.stats.snapshot();
        assert_eq!(summary.pots_brewed, 1);
        assert_eq!(summary.collaborator_failures, 2);
        assert!(log.events().is_empty());
    }

    #[tokio::test]
    async fn test_without_collaborators_only_counts() {
        let mut n: Notifier<MockChat, MockLights> =
            Notifier::new(Messages::default(), Arc::new(SessionStats::new()));

        n.dispatch(Effect::Notify(Notification::ReheatingOldCoffee))
            .await;

        assert_eq!(n.stats.snapshot().reheats, 1);
        assert!(n.status().is_none());
    }

    #[test]
    fn test_every_notification_has_text_and_light() {
        let messages = Messages::default();
        for n in [
            Notification::ReheatingOldCoffee,
            Notification::BrewingStarted,
            Notification::CoffeeReady,
            Notification::TurnedOff,
        ] {
            assert!(!messages.text_for(n).is_empty());
            let _ = LightAction::for_notification(n);
        }
        assert_eq!(
            LightAction::for_notification(Notification::TurnedOff),
            LightAction::Off
        );
    }
}
