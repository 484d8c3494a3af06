use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use super::{GuildId, UserId};
use crate::error::QueueError;

/// What the voice layer needs to know about the member that triggered playback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub guild_id: GuildId,
    pub user_id: UserId,
    pub display_name: String,
    /// Canal de voz en el que está el usuario, si está en alguno
    pub voice_channel: Option<String>,
}

/// Looks up a requester's current membership in a guild.
///
/// May fail when the member left the guild between the request and playback start.
#[async_trait]
pub trait MembershipResolver: Send + Sync {
    async fn resolve(&self, guild: &GuildId, user: &UserId) -> Result<Membership>;
}

/// Starts playback for a guild, e.g. by joining the member's voice channel and
/// playing the queue's current item.
#[async_trait]
pub trait PlaybackStarter: Send + Sync {
    async fn start(&self, guild: &GuildId, membership: &Membership) -> Result<()>;
}

/// Lanza el arranque de reproducción en segundo plano.
///
/// Failures never reach the caller: each one becomes a logged
/// [`QueueError::PlaybackStartFailed`].
pub(crate) struct PlaybackDispatcher {
    membership: Arc<dyn MembershipResolver>,
    starter: Arc<dyn PlaybackStarter>,
    timeout: Duration,
    tasks: TaskTracker,
}

impl PlaybackDispatcher {
    pub(crate) fn new(
        membership: Arc<dyn MembershipResolver>,
        starter: Arc<dyn PlaybackStarter>,
        timeout: Duration,
    ) -> Self {
        Self {
            membership,
            starter,
            timeout,
            tasks: TaskTracker::new(),
        }
    }

    /// Spawns the start sequence for `guild` on behalf of `requester`.
    pub(crate) fn dispatch(&self, guild: GuildId, requester: UserId) {
        let membership = self.membership.clone();
        let starter = self.starter.clone();
        let limit = self.timeout;

        self.tasks.spawn(async move {
            let attempt = start_playback(membership.as_ref(), starter.as_ref(), &guild, &requester);
            let result = match tokio::time::timeout(limit, attempt).await {
                Ok(result) => result,
                Err(_) => Err(QueueError::PlaybackStartFailed {
                    guild: guild.clone(),
                    source: anyhow::anyhow!("timed out after {}", humantime::format_duration(limit)),
                }),
            };

            match result {
                Ok(()) => info!("▶️ Playback started in guild {}", guild),
                Err(e) => error!("❌ {:#}", anyhow::Error::from(e)),
            }
        });
    }

    /// Waits for every dispatched start to finish.
    pub(crate) async fn drain(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

async fn start_playback(
    membership: &dyn MembershipResolver,
    starter: &dyn PlaybackStarter,
    guild: &GuildId,
    requester: &UserId,
) -> Result<(), QueueError> {
    let member = membership.resolve(guild, requester).await.map_err(|source| {
        QueueError::PlaybackStartFailed {
            guild: guild.clone(),
            source: QueueError::MembershipUnavailable {
                guild: guild.clone(),
                user: requester.clone(),
                source,
            }
            .into(),
        }
    })?;

    debug!(
        "🔊 Starting playback in guild {} for {} (voice channel: {:?})",
        guild, member.display_name, member.voice_channel
    );

    starter
        .start(guild, &member)
        .await
        .map_err(|source| QueueError::PlaybackStartFailed {
            guild: guild.clone(),
            source,
        })
}
