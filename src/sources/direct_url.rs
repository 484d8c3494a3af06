use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::StreamExt;
use sha2::{Digest, Sha256};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use url::Url;

use super::{MetadataResolver, PreparationHandle, Resolved, SourceType, TrackSource};
use crate::config::Config;

const AUDIO_EXTENSIONS: [&str; 6] = ["mp3", "wav", "ogg", "flac", "m4a", "opus"];

/// Resolver for plain HTTP(S) links to audio files.
///
/// Metadata comes from the URL itself; a HEAD request confirms the resource
/// exists. Preparation streams the body into the cache directory.
pub struct DirectUrlResolver {
    client: reqwest::Client,
    cache_dir: PathBuf,
    request_timeout: Duration,
}

impl DirectUrlResolver {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.resolve_timeout)
            .user_agent(concat!("guild-queue/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            cache_dir: config.cache_dir.clone(),
            request_timeout: config.resolve_timeout,
        })
    }

    async fn probe(&self, url: &Url) -> Result<()> {
        let response = self
            .client
            .head(url.clone())
            .timeout(self.request_timeout)
            .send()
            .await
            .with_context(|| format!("Request to {} failed", url))?;

        let status = response.status();
        // Algunos CDNs no implementan HEAD
        if status == reqwest::StatusCode::METHOD_NOT_ALLOWED {
            debug!("HEAD not allowed for {}, assuming reachable", url);
            return Ok(());
        }
        if !status.is_success() {
            anyhow::bail!("Resource not available: {} ({})", url, status);
        }

        Ok(())
    }
}

#[async_trait]
impl MetadataResolver for DirectUrlResolver {
    async fn resolve(&self, link: &str) -> Result<Resolved> {
        let url = parse_link(link)?;
        self.probe(&url).await?;

        let title = title_from_url(&url);
        let metadata = TrackSource::new(title, url.as_str(), SourceType::DirectUrl);
        let dest = cache_path(&self.cache_dir, &url);

        let preparation = if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
            debug!("📦 Using cached download for {}", url);
            PreparationHandle::ready(true)
        } else {
            let client = self.client.clone();
            let cache_dir = self.cache_dir.clone();
            PreparationHandle::spawn(async move {
                match download(&client, &url, &cache_dir, &dest).await {
                    Ok(bytes) => {
                        info!("✅ Downloaded {} ({} bytes)", url, bytes);
                        true
                    }
                    Err(e) => {
                        warn!("❌ Download of {} failed: {:#}", url, e);
                        false
                    }
                }
            })
        };

        Ok(Resolved::new(metadata, preparation))
    }

    fn source_name(&self) -> &'static str {
        "direct"
    }
}

/// Parses a user supplied link, accepting only absolute http(s) URLs with a host.
pub fn parse_link(link: &str) -> Result<Url> {
    let url = Url::parse(link.trim()).map_err(|_| anyhow::anyhow!("Malformed URL: {}", link))?;

    if !matches!(url.scheme(), "http" | "https") {
        anyhow::bail!("Unsupported scheme: {}", url.scheme());
    }
    if url.host_str().is_none() {
        anyhow::bail!("URL has no host: {}", link);
    }

    Ok(url)
}

fn title_from_url(url: &Url) -> String {
    let segment = url
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(|s| {
            urlencoding::decode(s)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| s.to_string())
        });

    match segment {
        Some(name) => match name.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && is_audio_extension(ext) => stem.to_string(),
            _ => name,
        },
        None => url.host_str().unwrap_or("unknown").to_string(),
    }
}

fn is_audio_extension(ext: &str) -> bool {
    AUDIO_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str())
}

/// Cache file for `url`: the first 64 bits of its SHA-256, plus the audio extension.
fn cache_path(cache_dir: &Path, url: &Url) -> PathBuf {
    let digest = format!("{:x}", Sha256::digest(url.as_str().as_bytes()));

    let ext = url
        .path()
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| is_audio_extension(ext))
        .unwrap_or_else(|| "bin".to_string());

    cache_dir.join(format!("{}.{}", &digest[..16], ext))
}

/// Streams `url` into a private staging file in `cache_dir`, then moves it to `dest`.
///
/// Concurrent downloads of the same link never share a staging file. The
/// staging file is deleted if anything fails before the move.
async fn download(client: &reqwest::Client, url: &Url, cache_dir: &Path, dest: &Path) -> Result<u64> {
    tokio::fs::create_dir_all(cache_dir)
        .await
        .with_context(|| format!("Failed to create {}", cache_dir.display()))?;

    let response = client.get(url.clone()).send().await?.error_for_status()?;

    let staging = tempfile::Builder::new()
        .prefix(".download-")
        .suffix(".part")
        .tempfile_in(cache_dir)?;
    let mut file = tokio::fs::File::from_std(staging.reopen()?);
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    drop(file);

    if let Err(e) = staging.persist(dest) {
        // Otra descarga del mismo enlace pudo haberlo dejado ya
        if !tokio::fs::try_exists(dest).await.unwrap_or(false) {
            return Err(e.error).with_context(|| format!("Failed to store {}", dest.display()));
        }
        debug!("{} already cached by another download", url);
    }

    Ok(written)
}
