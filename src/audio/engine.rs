use dashmap::DashMap;
use parking_lot::Mutex;
use std::{sync::Arc, time::Duration};
use tracing::{debug, info};

use super::{
    events::{QueueChange, QueueEvent, QueueEvents, QueueSubscription},
    player::{MembershipResolver, PlaybackDispatcher, PlaybackStarter},
    queue::{GuildQueue, QueueInfo, QueuedRequest, Requester},
    GuildId, UserId,
};
use crate::{
    config::Config,
    error::QueueError,
    sources::{MetadataResolver, PreparationHandle, TrackSource},
};

/// Result of a successful [`QueueEngine::enqueue`].
#[derive(Debug)]
pub struct Enqueued {
    /// Position the request was admitted at (0 means it is now current)
    pub position: usize,
    pub request: Arc<QueuedRequest>,
    /// Background preparation of the media, independent of the enqueue itself
    pub preparation: PreparationHandle,
}

impl Enqueued {
    pub fn metadata(&self) -> &TrackSource {
        &self.request.track
    }
}

/// Owns every guild's queue.
///
/// Each guild has its own lock, so operations on different guilds never wait
/// on each other. Every mutation publishes a [`QueueEvent`] while the guild is
/// still locked, which keeps each guild's events in mutation order.
pub struct QueueEngine {
    queues: DashMap<GuildId, Arc<Mutex<GuildQueue>>>,
    resolver: Arc<dyn MetadataResolver>,
    playback: PlaybackDispatcher,
    events: QueueEvents,
    max_queue_size: usize,
    max_song_duration: Duration,
}

impl QueueEngine {
    pub fn new(
        config: &Config,
        resolver: Arc<dyn MetadataResolver>,
        membership: Arc<dyn MembershipResolver>,
        starter: Arc<dyn PlaybackStarter>,
    ) -> Self {
        info!(
            "🎼 Queue engine ready (resolver: {}, max {} tracks per guild)",
            resolver.source_name(),
            config.max_queue_size
        );

        Self {
            queues: DashMap::new(),
            resolver,
            playback: PlaybackDispatcher::new(membership, starter, config.playback_start_timeout),
            events: QueueEvents::new(config.event_capacity),
            max_queue_size: config.max_queue_size,
            max_song_duration: config.max_song_duration(),
        }
    }

    /// Resolves `link` and appends it to the guild's queue.
    ///
    /// Resolution runs without holding the guild lock. If the queue was empty,
    /// playback start is dispatched in the background; its failure is logged
    /// and the request stays queued.
    pub async fn enqueue(
        &self,
        guild: &GuildId,
        link: &str,
        requester: Requester,
    ) -> Result<Enqueued, QueueError> {
        let resolved = self
            .resolver
            .resolve(link)
            .await
            .map_err(|e| QueueError::metadata(link, e))?;

        if let Some(duration) = resolved.metadata.duration() {
            if duration > self.max_song_duration {
                return Err(QueueError::metadata(
                    link,
                    anyhow::anyhow!(
                        "track is {} long, limit is {}",
                        humantime::format_duration(duration),
                        humantime::format_duration(self.max_song_duration)
                    ),
                ));
            }
        }

        let request = Arc::new(QueuedRequest::new(resolved.metadata, requester));
        let queue = self.queue_for(guild);

        let position = {
            let mut q = queue.lock();
            let position = q.try_push(request.clone()).ok_or_else(|| QueueError::QueueFull {
                guild: guild.clone(),
                max: q.max_size(),
            })?;
            self.publish(guild, QueueChange::Enqueued { position }, q.len());
            position
        };

        info!(
            "➕ [{}] {} queued at position {} by {}",
            guild,
            request.title(),
            position,
            request.requester.display_name
        );

        if position == 0 {
            self.playback.dispatch(guild.clone(), request.requester.id.clone());
        }

        Ok(Enqueued {
            position,
            request,
            preparation: resolved.preparation,
        })
    }

    /// Replaces the guild's queue with an empty one. Always notifies.
    pub fn clear(&self, guild: &GuildId) {
        let queue = self.queue_for(guild);
        let mut q = queue.lock();
        let removed = q.clear();
        self.publish(guild, QueueChange::Cleared, 0);
        info!("🗑️ [{}] Queue cleared ({} tracks removed)", guild, removed);
    }

    pub fn peek_current(&self, guild: &GuildId) -> Option<Arc<QueuedRequest>> {
        let queue = self.existing(guild)?;
        let q = queue.lock();
        q.current().cloned()
    }

    /// Drops the current item and returns the new current one.
    pub fn advance(&self, guild: &GuildId) -> Option<Arc<QueuedRequest>> {
        let queue = self.existing(guild)?;
        let mut q = queue.lock();

        let finished = q.advance()?;
        self.publish(guild, QueueChange::Advanced, q.len());

        let next = q.current().cloned();
        match &next {
            Some(item) => info!("⏭️ [{}] {} -> {}", guild, finished.title(), item.title()),
            None => info!("📭 [{}] {} finished, queue is empty", guild, finished.title()),
        }
        next
    }

    /// Truncates the queue to its current item. Notifies only if something was removed.
    pub fn clear_except_current(&self, guild: &GuildId) {
        let Some(queue) = self.existing(guild) else {
            return;
        };
        let mut q = queue.lock();

        let removed = q.truncate_to_current();
        if removed > 0 {
            self.publish(guild, QueueChange::Truncated { removed }, q.len());
            info!("🗑️ [{}] Removed {} upcoming tracks", guild, removed);
        }
    }

    /// Shuffles everything after the current item. Notifies when the queue had
    /// at least two items, even if the order happens not to change.
    pub fn shuffle(&self, guild: &GuildId) {
        let Some(queue) = self.existing(guild) else {
            return;
        };
        let mut q = queue.lock();

        if q.shuffle_with(&mut rand::thread_rng()) {
            self.publish(guild, QueueChange::Shuffled, q.len());
            info!("🔀 [{}] Queue shuffled", guild);
        }
    }

    /// Moves the item at `from` to `to`. Position 0 may be moved too.
    pub fn move_item(&self, guild: &GuildId, from: usize, to: usize) -> bool {
        let Some(queue) = self.existing(guild) else {
            return false;
        };
        let mut q = queue.lock();

        if !q.move_item(from, to) {
            debug!("[{}] Ignored move {} -> {} (len {})", guild, from, to, q.len());
            return false;
        }

        self.publish(guild, QueueChange::Moved { from, to }, q.len());
        debug!("📍 [{}] Track moved from {} to {}", guild, from, to);
        true
    }

    pub fn remove_at(&self, guild: &GuildId, index: usize) -> Option<Arc<QueuedRequest>> {
        let queue = self.existing(guild)?;
        let mut q = queue.lock();

        let removed = q.remove(index)?;
        self.publish(guild, QueueChange::Removed { index }, q.len());
        debug!("❌ [{}] {} removed from position {}", guild, removed.title(), index);
        Some(removed)
    }

    /// Snapshot of the guild's queue. Empty for unknown guilds.
    pub fn list(&self, guild: &GuildId) -> Vec<Arc<QueuedRequest>> {
        self.with_queue(guild, GuildQueue::snapshot).unwrap_or_default()
    }

    pub fn len(&self, guild: &GuildId) -> usize {
        self.with_queue(guild, GuildQueue::len).unwrap_or(0)
    }

    pub fn is_empty(&self, guild: &GuildId) -> bool {
        self.len(guild) == 0
    }

    pub fn info(&self, guild: &GuildId) -> QueueInfo {
        self.with_queue(guild, GuildQueue::info).unwrap_or_default()
    }

    /// Removes later copies of links already in the queue.
    pub fn remove_duplicates(&self, guild: &GuildId) -> usize {
        self.prune(guild, |q| q.remove_duplicates(), "duplicates")
    }

    /// Removes a member's requests, except the current item.
    pub fn remove_requested_by(&self, guild: &GuildId, user: &UserId) -> usize {
        self.prune(guild, |q| q.remove_requested_by(user), "tracks from leaving member")
    }

    /// Guilds that currently have something queued.
    pub fn guilds(&self) -> Vec<GuildId> {
        let mut active = Vec::new();
        for entry in self.queues.iter() {
            let queue = entry.value();
            if !queue.lock().is_empty() {
                active.push(entry.key().clone());
            }
        }
        active
    }

    pub fn subscribe(&self) -> QueueSubscription {
        self.events.subscribe(None)
    }

    pub fn subscribe_guild(&self, guild: &GuildId) -> QueueSubscription {
        self.events.subscribe(Some(guild.clone()))
    }

    pub fn subscriber_count(&self) -> usize {
        self.events.subscriber_count()
    }

    /// Waits for in-flight playback starts. The engine stays usable afterwards.
    pub async fn shutdown(&self) {
        debug!("Waiting for pending playback starts");
        self.playback.drain().await;
    }

    fn prune(&self, guild: &GuildId, op: impl FnOnce(&mut GuildQueue) -> usize, what: &str) -> usize {
        let Some(queue) = self.existing(guild) else {
            return 0;
        };
        let mut q = queue.lock();

        let removed = op(&mut *q);
        if removed > 0 {
            self.publish(guild, QueueChange::Pruned { removed }, q.len());
            info!("🗑️ [{}] Removed {} {}", guild, removed, what);
        }
        removed
    }

    fn publish(&self, guild: &GuildId, change: QueueChange, len: usize) {
        self.events.publish(QueueEvent {
            guild_id: guild.clone(),
            change,
            len,
        });
    }

    fn with_queue<T>(&self, guild: &GuildId, read: impl FnOnce(&GuildQueue) -> T) -> Option<T> {
        let queue = self.existing(guild)?;
        let q = queue.lock();
        Some(read(&*q))
    }

    fn existing(&self, guild: &GuildId) -> Option<Arc<Mutex<GuildQueue>>> {
        self.queues.get(guild).map(|entry| entry.value().clone())
    }

    fn queue_for(&self, guild: &GuildId) -> Arc<Mutex<GuildQueue>> {
        if let Some(queue) = self.existing(guild) {
            return queue;
        }

        self.queues
            .entry(guild.clone())
            .or_insert_with(|| {
                debug!("Creating queue for guild {}", guild);
                Arc::new(Mutex::new(GuildQueue::new(self.max_queue_size)))
            })
            .clone()
    }
}
