use thiserror::Error;

use crate::audio::{GuildId, UserId};

/// Errores del coordinador de colas.
///
/// Only [`QueueError::MetadataUnavailable`] and [`QueueError::QueueFull`] ever
/// reach a caller. The playback variants are built at the dispatch site so the
/// failure can be logged with its full cause chain.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("metadata unavailable for {link}")]
    MetadataUnavailable {
        link: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("queue for guild {guild} is full (max {max} tracks)")]
    QueueFull { guild: GuildId, max: usize },

    #[error("playback start failed in guild {guild}")]
    PlaybackStartFailed {
        guild: GuildId,
        #[source]
        source: anyhow::Error,
    },

    #[error("member {user} could not be resolved in guild {guild}")]
    MembershipUnavailable {
        guild: GuildId,
        user: UserId,
        #[source]
        source: anyhow::Error,
    },
}

impl QueueError {
    pub fn metadata(link: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::MetadataUnavailable {
            link: link.into(),
            source: source.into(),
        }
    }

    /// True for failures the caller is expected to report back to the user.
    pub fn is_user_facing(&self) -> bool {
        matches!(self, Self::MetadataUnavailable { .. } | Self::QueueFull { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn chained_rendering_lists_each_cause_once() {
        let guild = GuildId::from("g1");
        let err = QueueError::PlaybackStartFailed {
            guild: guild.clone(),
            source: QueueError::MembershipUnavailable {
                guild,
                user: UserId::from("u1"),
                source: anyhow::anyhow!("member left the guild"),
            }
            .into(),
        };

        let rendered = format!("{:#}", anyhow::Error::from(err));
        assert_eq!(
            rendered,
            "playback start failed in guild g1: member u1 could not be resolved in guild g1: member left the guild"
        );
        assert_eq!(rendered.matches("member left the guild").count(), 1);
    }

    #[test]
    fn only_enqueue_rejections_are_user_facing() {
        let full = QueueError::QueueFull {
            guild: GuildId::from("g1"),
            max: 3,
        };
        assert!(full.is_user_facing());
        assert_eq!(full.to_string(), "queue for guild g1 is full (max 3 tracks)");

        let missing = QueueError::metadata("https://x.example/a.mp3", anyhow::anyhow!("404"));
        assert!(missing.is_user_facing());
        assert_eq!(missing.to_string(), "metadata unavailable for https://x.example/a.mp3");

        let failed = QueueError::PlaybackStartFailed {
            guild: GuildId::from("g1"),
            source: anyhow::anyhow!("no voice channel"),
        };
        assert!(!failed.is_user_facing());
    }
}
