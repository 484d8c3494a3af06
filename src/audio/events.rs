use futures::Stream;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

use super::GuildId;

/// What happened to a guild's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum QueueChange {
    Cleared,
    Enqueued { position: usize },
    Advanced,
    Truncated { removed: usize },
    Shuffled,
    Moved { from: usize, to: usize },
    Removed { index: usize },
    Pruned { removed: usize },
}

/// `queueUpdate` notification, sent after every successful mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueEvent {
    pub guild_id: GuildId,
    pub change: QueueChange,
    /// Queue length right after the change
    pub len: usize,
}

/// Publisher side of the queue notifications.
#[derive(Debug, Clone)]
pub(crate) struct QueueEvents {
    tx: broadcast::Sender<QueueEvent>,
}

impl QueueEvents {
    pub(crate) fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx }
    }

    /// Fire-and-forget; having no subscribers is not an error.
    pub(crate) fn publish(&self, event: QueueEvent) {
        if let Ok(count) = self.tx.send(event) {
            debug!("📣 Queue update delivered to {} subscribers", count);
        }
    }

    pub(crate) fn subscribe(&self, guild: Option<GuildId>) -> QueueSubscription {
        QueueSubscription {
            rx: self.tx.subscribe(),
            guild,
        }
    }

    pub(crate) fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

/// Receiving end of queue notifications, optionally filtered to one guild.
pub struct QueueSubscription {
    rx: broadcast::Receiver<QueueEvent>,
    guild: Option<GuildId>,
}

impl QueueSubscription {
    /// Waits for the next matching event. Returns `None` once the engine is gone.
    ///
    /// A subscriber that falls behind skips the events it missed.
    pub async fn recv(&mut self) -> Option<QueueEvent> {
        loop {
            match self.rx.recv().await {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(RecvError::Lagged(skipped)) => {
                    warn!("⚠️ Queue subscriber lagged, skipped {} events", skipped);
                }
                Err(RecvError::Closed) => return None,
            }
        }
    }

    /// Non-blocking variant of [`recv`](Self::recv).
    pub fn try_recv(&mut self) -> Option<QueueEvent> {
        use broadcast::error::TryRecvError;

        loop {
            match self.rx.try_recv() {
                Ok(event) if self.matches(&event) => return Some(event),
                Ok(_) => continue,
                Err(TryRecvError::Lagged(skipped)) => {
                    warn!("⚠️ Queue subscriber lagged, skipped {} events", skipped);
                }
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => return None,
            }
        }
    }

    pub fn into_stream(self) -> impl Stream<Item = QueueEvent> + Send + 'static {
        futures::stream::unfold(self, |mut sub| async move {
            sub.recv().await.map(|event| (event, sub))
        })
    }

    fn matches(&self, event: &QueueEvent) -> bool {
        self.guild.as_ref().map_or(true, |guild| guild == &event.guild_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use pretty_assertions::assert_eq;

    fn event(guild: &str, change: QueueChange, len: usize) -> QueueEvent {
        QueueEvent {
            guild_id: GuildId::from(guild),
            change,
            len,
        }
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_silent() {
        let events = QueueEvents::new(4);
        events.publish(event("g", QueueChange::Cleared, 0));
        assert_eq!(events.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn guild_filter_skips_other_guilds() {
        let events = QueueEvents::new(8);
        let mut only_a = events.subscribe(Some(GuildId::from("a")));
        let mut all = events.subscribe(None);

        events.publish(event("b", QueueChange::Shuffled, 3));
        events.publish(event("a", QueueChange::Advanced, 1));

        assert_eq!(only_a.recv().await, Some(event("a", QueueChange::Advanced, 1)));
        assert_eq!(all.recv().await.unwrap().guild_id, GuildId::from("b"));
        assert_eq!(all.recv().await.unwrap().guild_id, GuildId::from("a"));
        assert_eq!(only_a.try_recv(), None);
    }

    #[tokio::test]
    async fn lagging_subscriber_resumes_with_newest_events() {
        let events = QueueEvents::new(2);
        let mut sub = events.subscribe(None);

        for len in 0..5 {
            events.publish(event("g", QueueChange::Enqueued { position: len }, len + 1));
        }

        let first = sub.recv().await.unwrap();
        assert_eq!(first.len, 4);
    }

    #[tokio::test]
    async fn stream_ends_when_publisher_dropped() {
        let events = QueueEvents::new(4);
        let sub = events.subscribe(None);
        events.publish(event("g", QueueChange::Cleared, 0));
        drop(events);

        let collected: Vec<_> = sub.into_stream().collect().await;
        assert_eq!(collected, vec![event("g", QueueChange::Cleared, 0)]);
    }

    #[test]
    fn events_serialize_with_change_tag() {
        let json = serde_json::to_value(event("g", QueueChange::Moved { from: 2, to: 1 }, 3)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "guild_id": "g",
                "change": { "type": "moved", "from": 2, "to": 1 },
                "len": 3
            })
        );
    }
}
