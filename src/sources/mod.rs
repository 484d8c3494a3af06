pub mod direct_url;

use anyhow::Result;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use serde::{Deserialize, Serialize};
use std::{
    fmt,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
    time::Duration,
};
use tracing::warn;

pub use direct_url::DirectUrlResolver;

/// Resuelve un link a metadata reproducible.
///
/// Implementations may be slow (network bound); the queue engine never holds a
/// guild lock while awaiting them.
#[async_trait]
pub trait MetadataResolver: Send + Sync {
    /// Resolves `link` to its metadata plus a handle on the background
    /// preparation (download, transcode) of the media.
    async fn resolve(&self, link: &str) -> Result<Resolved>;

    /// Nombre del resolver, para logs
    fn source_name(&self) -> &'static str;
}

/// Output of a successful [`MetadataResolver::resolve`].
#[derive(Debug)]
pub struct Resolved {
    pub metadata: TrackSource,
    pub preparation: PreparationHandle,
}

impl Resolved {
    pub fn new(metadata: TrackSource, preparation: PreparationHandle) -> Self {
        Self {
            metadata,
            preparation,
        }
    }
}

/// Immutable descriptor of a playable track.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackSource {
    title: String,
    artist: Option<String>,
    duration: Option<Duration>,
    thumbnail: Option<String>,
    url: String,
    source_type: SourceType,
}

impl TrackSource {
    pub fn new(title: impl Into<String>, url: impl Into<String>, source_type: SourceType) -> Self {
        Self {
            title: title.into(),
            artist: None,
            duration: None,
            thumbnail: None,
            url: url.into(),
            source_type,
        }
    }

    // Getters
    pub fn title(&self) -> &str {
        &self.title
    }
    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }
    pub fn duration(&self) -> Option<Duration> {
        self.duration
    }
    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }
    pub fn url(&self) -> &str {
        &self.url
    }
    pub fn source_type(&self) -> SourceType {
        self.source_type
    }

    // Setters
    pub fn with_artist(mut self, artist: impl Into<String>) -> Self {
        self.artist = Some(artist.into());
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }
}

/// Tipos de fuentes de música
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    DirectUrl,
    External,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::DirectUrl => "direct",
            SourceType::External => "external",
        }
    }
}

/// Completion of a track's background preparation.
///
/// Resolves to `true` once the media is ready to play and `false` if the
/// preparation failed or its task was lost. Awaiting it is optional: dropping
/// the handle does not cancel a spawned preparation.
pub struct PreparationHandle {
    inner: BoxFuture<'static, bool>,
}

impl PreparationHandle {
    /// A preparation that already finished with `ready`.
    pub fn ready(ready: bool) -> Self {
        Self {
            inner: futures::future::ready(ready).boxed(),
        }
    }

    /// Runs `work` on the tokio runtime and tracks its outcome.
    pub fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = bool> + Send + 'static,
    {
        let task = tokio::spawn(work);
        Self {
            inner: async move {
                match task.await {
                    Ok(ready) => ready,
                    Err(e) => {
                        warn!("⚠️ Preparation task aborted: {}", e);
                        false
                    }
                }
            }
            .boxed(),
        }
    }

    /// Wraps a completion signalled by some other component.
    pub fn from_receiver(rx: tokio::sync::oneshot::Receiver<bool>) -> Self {
        Self {
            inner: rx.map(|result| result.unwrap_or(false)).boxed(),
        }
    }
}

impl Future for PreparationHandle {
    type Output = bool;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<bool> {
        self.inner.as_mut().poll(cx)
    }
}

impl fmt::Debug for PreparationHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreparationHandle").finish_non_exhaustive()
    }
}
