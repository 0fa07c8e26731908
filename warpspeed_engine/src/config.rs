// WarpSpeed Engine - config.rs

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{EngineError, Result};

/// Engine tuning. Every field has a default, so a config file only needs the
/// keys it changes.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Upper bound on segment fetches running at once, across all downloads.
    pub max_concurrent_fetches: usize,
    pub default_segments: usize,
    pub min_segment_size: u64,
    /// Applies to each chunk read, not to a whole segment.
    pub chunk_timeout_secs: u64,
    pub pause_timeout_secs: u64,
    /// Lock acquisitions slower than this are reported as a bug.
    pub lock_timeout_secs: u64,
    pub event_capacity: usize,
    pub progress_interval_ms: u64,
    pub retry: RetryPolicy,
    pub persistence: PersistenceConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_fetches: 16,
            default_segments: 4,
            min_segment_size: 256 * 1024,
            chunk_timeout_secs: 30,
            pause_timeout_secs: 10,
            lock_timeout_secs: 30,
            event_capacity: 1024,
            progress_interval_ms: 250,
            retry: RetryPolicy::default(),
            persistence: PersistenceConfig::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: EngineConfig =
            toml::from_str(&text).map_err(|e| EngineError::Config(format!("{}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_concurrent_fetches == 0 {
            return Err(EngineError::Config("max_concurrent_fetches must be at least 1".into()));
        }
        if self.default_segments == 0 {
            return Err(EngineError::Config("default_segments must be at least 1".into()));
        }
        if self.event_capacity == 0 {
            return Err(EngineError::Config("event_capacity must be at least 1".into()));
        }
        if self.retry.attempts_per_location == 0 || self.retry.rounds == 0 {
            return Err(EngineError::Config("retry attempts and rounds must be at least 1".into()));
        }
        if self.persistence.save_interval_secs == 0 {
            return Err(EngineError::Config("save_interval_secs must be at least 1".into()));
        }
        Ok(())
    }

    pub fn chunk_timeout(&self) -> Duration {
        Duration::from_secs(self.chunk_timeout_secs)
    }

    pub fn pause_timeout(&self) -> Duration {
        Duration::from_secs(self.pause_timeout_secs)
    }

    pub fn lock_timeout(&self) -> Duration {
        Duration::from_secs(self.lock_timeout_secs)
    }

    pub fn progress_interval(&self) -> Duration {
        Duration::from_millis(self.progress_interval_ms)
    }
}

/// How a segment retries transient failures: `attempts_per_location` tries with
/// exponential backoff against one location, then the next mirror, for
/// `rounds` passes over the whole location list.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub attempts_per_location: u32,
    pub rounds: u32,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts_per_location: 3,
            rounds: 2,
            initial_backoff_ms: 500,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (0-based) against the same location.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let delay = self.initial_backoff_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_backoff_ms))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PersistenceConfig {
    pub path: PathBuf,
    pub save_interval_secs: u64,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("downloads.json"),
            save_interval_secs: 120,
        }
    }
}

impl PersistenceConfig {
    pub fn save_interval(&self) -> Duration {
        Duration::from_secs(self.save_interval_secs)
    }
}
