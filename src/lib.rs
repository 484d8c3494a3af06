//! # Guild Queue
//!
//! Per-guild playback queue coordinator.
//!
//! Each guild owns one ordered queue of requests. The element at position 0 is
//! the current (playing or about-to-play) item. Mutations are serialized per
//! guild, every change is published on a broadcast channel, and the first
//! request admitted to an empty queue kicks off playback through an injected
//! collaborator.
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use guild_queue::{audio::QueueEngine, config::Config};
//! # use guild_queue::audio::{MembershipResolver, PlaybackStarter};
//! # use guild_queue::sources::MetadataResolver;
//! # fn wire(
//! #     resolver: Arc<dyn MetadataResolver>,
//! #     members: Arc<dyn MembershipResolver>,
//! #     starter: Arc<dyn PlaybackStarter>,
//! # ) -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let engine = QueueEngine::new(&config, resolver, members, starter);
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod config;
pub mod error;
pub mod sources;

pub use audio::{GuildId, QueueEngine, QueuedRequest, Requester, UserId};
pub use error::QueueError;
