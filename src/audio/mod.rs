//! # Audio Module
//!
//! Per-guild queue management for playback.
//!
//! ## Architecture
//!
//! ### [`queue`] - Queue Model
//! - [`GuildQueue`]: the ordered collection for one guild, position 0 is the current item
//! - Pinned shuffle, moves, removals and paging, with no locking of its own
//!
//! ### [`engine`] - Queue Engine
//! - One lock per guild, so guilds never contend with each other
//! - Metadata resolution happens before the lock is taken
//! - Starts playback when a guild's queue goes from empty to one item
//!
//! ### [`events`] - Notifications
//! - A `queueUpdate` event per mutation over a broadcast channel
//! - Per-guild filtered subscriptions
//!
//! ### [`player`] - Playback Seams
//! - [`PlaybackStarter`] and [`MembershipResolver`], implemented by the voice layer
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use guild_queue::audio::{GuildId, QueueEngine, Requester};
//!
//! # async fn example(engine: &QueueEngine) -> anyhow::Result<()> {
//! let guild = GuildId::from("1234");
//! let enqueued = engine
//!     .enqueue(&guild, "https://cdn.example.com/song.mp3", Requester::new("42", "alice"))
//!     .await?;
//! println!("queued at {}", enqueued.position);
//!
//! engine.shuffle(&guild);
//! let next = engine.advance(&guild);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod events;
pub mod player;
pub mod queue;

use serde::{Deserialize, Serialize};
use std::fmt;

pub use engine::{Enqueued, QueueEngine};
pub use events::{QueueChange, QueueEvent, QueueSubscription};
pub use player::{Membership, MembershipResolver, PlaybackStarter};
pub use queue::{GuildQueue, QueueInfo, QueuePage, QueuedRequest, Requester};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Opaque key of an isolated guild. All queue state is partitioned by it.
    GuildId
);

string_id!(
    /// Opaque key of a guild member.
    UserId
);
