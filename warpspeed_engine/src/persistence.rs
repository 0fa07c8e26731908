// WarpSpeed Engine - persistence.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::time::{interval_at, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::PersistenceConfig;
use crate::download_manager::{DownloadManager, LockMode};
use crate::downloader::{DownloadParams, Downloader, DownloaderState};
use crate::engine::{Disposable, Initializable};
use crate::error::{EngineError, Result};
use crate::metadata::{RemoteFileInfo, ResourceLocation};
use crate::segment::Segment;

pub const SNAPSHOT_VERSION: u32 = 1;

/// On-disk form of the download list. Readers ignore keys they do not know and
/// default the ones an older writer did not produce.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Snapshot {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub downloads: Vec<DownloadItem>,
}

fn default_version() -> u32 {
    SNAPSHOT_VERSION
}

fn default_state() -> DownloaderState {
    DownloaderState::Queued
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DownloadItem {
    pub location: ResourceLocation,
    #[serde(default)]
    pub mirrors: Vec<ResourceLocation>,
    pub local_file: PathBuf,
    #[serde(default)]
    pub remote_info: Option<RemoteFileInfo>,
    #[serde(default)]
    pub requested_segments: usize,
    pub created_date_time: DateTime<Utc>,
    #[serde(default)]
    pub segments: Vec<SegmentItem>,
    #[serde(default)]
    pub extended_properties: BTreeMap<String, serde_json::Value>,
    #[serde(default = "default_state")]
    pub state: DownloaderState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct SegmentItem {
    pub index: usize,
    pub initial_start_position: u64,
    pub start_position: u64,
    pub end_position: u64,
}

impl From<&Segment> for SegmentItem {
    fn from(segment: &Segment) -> Self {
        SegmentItem {
            index: segment.index(),
            initial_start_position: segment.initial_start_position(),
            start_position: segment.start_position(),
            end_position: segment.end_position(),
        }
    }
}

impl DownloadItem {
    /// Copies a download's state. Takes its segment lock, so a caller holding
    /// the registry lock must have acquired that first.
    fn capture(download: &Downloader) -> Result<Self> {
        let segments = download.lock_segments()?.iter().map(SegmentItem::from).collect();
        Ok(DownloadItem {
            location: download.resource_location().clone(),
            mirrors: download.mirrors().to_vec(),
            local_file: download.local_file().to_path_buf(),
            remote_info: download.remote_file_info(),
            requested_segments: download.requested_segments(),
            created_date_time: download.created_date_time(),
            segments,
            extended_properties: download.extended_properties().into_iter().collect(),
            state: download.state(),
            last_error: download.last_error(),
        })
    }

    fn into_params(self) -> Result<DownloadParams> {
        let mut params = DownloadParams::new(self.location, self.local_file)
            .mirrors(self.mirrors)
            .requested_segments(self.requested_segments)
            .created_at(self.created_date_time);
        if let Some(info) = self.remote_info {
            params = params.remote_info(info);
        }
        if !self.segments.is_empty() {
            let segments = self
                .segments
                .iter()
                .map(|s| Segment::restore(s.index, s.initial_start_position, s.start_position, s.end_position))
                .collect::<Result<Vec<_>>>()?;
            params = params.segments(segments);
        }
        Ok(params)
    }
}

/// Keeps the download list on disk: restores it at startup, saves it on a
/// timer and once more at shutdown.
pub struct PersistedList {
    manager: Arc<DownloadManager>,
    path: PathBuf,
    interval: Duration,
    save_lock: tokio::sync::Mutex<()>,
}

impl PersistedList {
    pub fn new(manager: Arc<DownloadManager>, config: &PersistenceConfig) -> Self {
        PersistedList {
            manager,
            path: config.path.clone(),
            interval: config.save_interval(),
            save_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Consistent copy of every download that may still need resuming.
    pub fn snapshot(&self) -> Result<Snapshot> {
        let downloads = self.manager.lock_download_list(LockMode::Shared)?;
        let items = downloads
            .iter()
            .filter(|download| !download.is_terminal())
            .map(|download| DownloadItem::capture(download))
            .collect::<Result<Vec<_>>>()?;
        Ok(Snapshot {
            version: SNAPSHOT_VERSION,
            downloads: items,
        })
    }

    /// Writes the snapshot next to the target and renames it over the previous
    /// one, so an interrupted write leaves the last good file in place.
    pub async fn save(&self) -> Result<usize> {
        let _saving = self.save_lock.lock().await;
        let started = Instant::now();
        let snapshot = self.snapshot()?;
        let json = serde_json::to_vec_pretty(&snapshot)?;

        let temp = temp_path(&self.path);
        write_synced(&temp, &json)
            .await
            .map_err(|e| EngineError::Persistence(format!("writing {}: {}", temp.display(), e)))?;
        fs::rename(&temp, &self.path)
            .await
            .map_err(|e| EngineError::Persistence(format!("replacing {}: {}", self.path.display(), e)))?;

        debug!(
            downloads = snapshot.downloads.len(),
            elapsed = ?started.elapsed(),
            "Saved download list"
        );
        Ok(snapshot.downloads.len())
    }

    /// Restores saved downloads into the manager without starting them.
    /// A missing, unreadable or corrupt file means there is nothing to restore.
    pub async fn load(&self) -> Result<usize> {
        let bytes = match fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(err) => {
                warn!(path = %self.path.display(), "Could not read download list: {}", err);
                return Ok(0);
            }
        };
        let snapshot: Snapshot = match serde_json::from_slice(&bytes) {
            Ok(snapshot) => snapshot,
            Err(err) => {
                warn!(path = %self.path.display(), "Ignoring corrupt download list: {}", err);
                return Ok(0);
            }
        };
        if snapshot.version > SNAPSHOT_VERSION {
            warn!(
                version = snapshot.version,
                "Download list was written by a newer version, reading what is understood"
            );
        }

        let mut restored = 0;
        for item in snapshot.downloads {
            let local_file = item.local_file.clone();
            match self.restore(item).await {
                Ok(()) => restored += 1,
                Err(err) => warn!(file = %local_file.display(), "Skipping saved download: {}", err),
            }
        }
        info!(restored, path = %self.path.display(), "Restored download list");
        Ok(restored)
    }

    async fn restore(&self, mut item: DownloadItem) -> Result<()> {
        let state = item.state;
        let last_error = item.last_error.take();
        let properties = std::mem::take(&mut item.extended_properties);
        let download = self.manager.add(item.into_params()?, false).await?;
        for (key, value) in properties {
            download.set_property(key, value);
        }
        if state == DownloaderState::Error {
            download.restore_error(last_error);
        }
        Ok(())
    }

    /// Saves every `interval` until `shutdown` fires. Failed saves are retried
    /// on the next tick.
    pub async fn run(&self, shutdown: CancellationToken) {
        let start = tokio::time::Instant::now() + self.interval;
        let mut ticker = interval_at(start, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(err) = self.save().await {
                        warn!("Could not save download list, retrying next tick: {}", err);
                    }
                }
            }
        }
    }

    /// Pauses everything so segment positions hold still, then saves.
    pub async fn flush(&self) -> Result<()> {
        self.manager.pause_all().await?;
        self.save().await?;
        Ok(())
    }
}

#[async_trait]
impl Initializable for PersistedList {
    fn name(&self) -> &str {
        "Persisted Download List"
    }

    async fn init(&self) -> Result<()> {
        self.load().await.map(|_| ())
    }
}

#[async_trait]
impl Disposable for PersistedList {
    fn name(&self) -> &str {
        "Persisted Download List"
    }

    async fn dispose(&self) -> Result<()> {
        self.flush().await
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

async fn write_synced(path: &Path, data: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let mut file = fs::File::create(path).await?;
    file.write_all(data).await?;
    file.sync_all().await
}
