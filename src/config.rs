use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Cola
    pub max_queue_size: usize,
    pub max_song_duration: u64, // En segundos

    // Notificaciones
    pub event_capacity: usize,

    // Colaboradores externos
    #[serde(with = "humantime_serde_compat")]
    pub resolve_timeout: Duration,
    #[serde(with = "humantime_serde_compat")]
    pub playback_start_timeout: Duration,

    // Paths
    pub cache_dir: PathBuf,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            max_queue_size: std::env::var("MAX_QUEUE_SIZE")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .context("MAX_QUEUE_SIZE must be an integer")?,
            max_song_duration: std::env::var("MAX_SONG_DURATION")
                .unwrap_or_else(|_| "7200".to_string()) // 2 horas
                .parse()
                .context("MAX_SONG_DURATION must be a number of seconds")?,

            event_capacity: std::env::var("EVENT_CHANNEL_CAPACITY")
                .unwrap_or_else(|_| "256".to_string())
                .parse()
                .context("EVENT_CHANNEL_CAPACITY must be an integer")?,

            resolve_timeout: parse_duration_var("RESOLVE_TIMEOUT", "20s")?,
            playback_start_timeout: parse_duration_var("PLAYBACK_START_TIMEOUT", "30s")?,

            cache_dir: std::env::var("CACHE_DIR")
                .unwrap_or_else(|_| "./cache".to_string())
                .into(),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    ///
    /// # Validation Rules
    ///
    /// - Queue capacity and event buffer must be greater than 0
    /// - Collaborator timeouts must be non-zero
    /// - Max song duration must be greater than 0
    pub fn validate(&self) -> Result<()> {
        if self.max_queue_size == 0 {
            anyhow::bail!("Max queue size must be greater than 0");
        }

        if self.event_capacity == 0 {
            anyhow::bail!("Event channel capacity must be greater than 0");
        }

        if self.resolve_timeout.is_zero() {
            anyhow::bail!("Resolve timeout must be greater than 0");
        }

        if self.playback_start_timeout.is_zero() {
            anyhow::bail!("Playback start timeout must be greater than 0");
        }

        if self.max_song_duration == 0 {
            anyhow::bail!("Max song duration must be greater than 0");
        }

        Ok(())
    }

    pub fn max_song_duration(&self) -> Duration {
        Duration::from_secs(self.max_song_duration)
    }

    /// Returns a summary of the current configuration for logging.
    pub fn summary(&self) -> String {
        format!(
            "Config Summary:\n  \
            Queue: {} max tracks, {}s max duration\n  \
            Events: {} buffered per subscriber\n  \
            Timeouts: resolve {}, playback start {}\n  \
            Cache: {}",
            self.max_queue_size,
            self.max_song_duration,
            self.event_capacity,
            humantime::format_duration(self.resolve_timeout),
            humantime::format_duration(self.playback_start_timeout),
            self.cache_dir.display(),
        )
    }
}

/// Default configuration values.
///
/// Used as fallbacks when environment variables are not provided.
impl Default for Config {
    fn default() -> Self {
        Self {
            max_queue_size: 1000,
            max_song_duration: 7200,
            event_capacity: 256,
            resolve_timeout: Duration::from_secs(20),
            playback_start_timeout: Duration::from_secs(30),
            cache_dir: "./cache".into(),
        }
    }
}

fn parse_duration_var(name: &str, default: &str) -> Result<Duration> {
    let raw = std::env::var(name).unwrap_or_else(|_| default.to_string());
    humantime::parse_duration(raw.trim())
        .with_context(|| format!("{} must be a duration like '30s', got '{}'", name, raw))
}

mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let raw = String::deserialize(deserializer)?;
        humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_song_duration(), Duration::from_secs(7200));
    }

    #[test]
    fn rejects_zero_queue_size() {
        let config = Config {
            max_queue_size: 0,
            ..Config::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("queue size"));
    }

    #[test]
    fn rejects_zero_timeouts() {
        let config = Config {
            playback_start_timeout: Duration::ZERO,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn durations_round_trip_through_json() {
        let config = Config::default();
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["resolve_timeout"], "20s");

        let parsed: Config = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.playback_start_timeout, Duration::from_secs(30));
    }

    #[test]
    fn summary_mentions_limits() {
        let summary = Config::default().summary();
        assert!(summary.contains("1000 max tracks"));
        assert!(summary.contains("resolve 20s"));
    }
}
