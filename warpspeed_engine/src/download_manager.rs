// WarpSpeed Engine - download_manager.rs

use std::ops::Deref;
use std::sync::Arc;

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::Semaphore;
use tracing::{error, info};

use crate::config::EngineConfig;
use crate::downloader::{DownloadId, DownloadParams, Downloader, DownloaderState, EngineContext};
use crate::error::{EngineError, Result};
use crate::events::EventHub;
use crate::transport::Transport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Enumeration; many readers at once.
    Shared,
    /// Keeps every other registry user out until dropped.
    Exclusive,
}

/// Scoped hold on the registry lock. Derefs to the downloads in insertion order.
pub enum DownloadListGuard<'a> {
    Shared(RwLockReadGuard<'a, Vec<Arc<Downloader>>>),
    Exclusive(RwLockWriteGuard<'a, Vec<Arc<Downloader>>>),
}

impl Deref for DownloadListGuard<'_> {
    type Target = [Arc<Downloader>];

    fn deref(&self) -> &[Arc<Downloader>] {
        match self {
            DownloadListGuard::Shared(guard) => guard,
            DownloadListGuard::Exclusive(guard) => guard,
        }
    }
}

/// Registry of every download the engine knows about.
///
/// The list is only changed through [`add`](Self::add) and
/// [`remove`](Self::remove). Whoever needs both the registry lock and a
/// download's segment lock takes the registry lock first.
pub struct DownloadManager {
    downloads: RwLock<Vec<Arc<Downloader>>>,
    ctx: EngineContext,
}

impl DownloadManager {
    pub fn new(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        let ctx = EngineContext {
            transport,
            events: EventHub::new(config.event_capacity),
            fetch_slots: Arc::new(Semaphore::new(config.max_concurrent_fetches)),
            config: Arc::new(config),
        };
        Self {
            downloads: RwLock::new(Vec::new()),
            ctx,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.ctx.config
    }

    pub fn events(&self) -> &EventHub {
        &self.ctx.events
    }

    /// Builds and registers a download. Saved segments in `params` are kept
    /// as they are, so a restored download resumes where it stopped.
    pub async fn add(&self, params: DownloadParams, auto_start: bool) -> Result<Arc<Downloader>> {
        let downloader = Downloader::new(params, self.ctx.clone())?;
        {
            let mut downloads = self.write_list()?;
            downloads.push(Arc::clone(&downloader));
        }
        info!(
            download = %downloader.id(),
            url = %downloader.resource_location(),
            file = %downloader.local_file().display(),
            "Download added"
        );
        if auto_start {
            downloader.start().await?;
        }
        Ok(downloader)
    }

    /// Cancels the download unless it already finished, then forgets it.
    pub async fn remove(&self, downloader: &Arc<Downloader>) -> Result<()> {
        if !downloader.is_terminal() {
            downloader.cancel().await?;
        }
        let mut downloads = self.write_list()?;
        let before = downloads.len();
        downloads.retain(|d| !Arc::ptr_eq(d, downloader));
        if downloads.len() == before {
            return Err(EngineError::NotFound(downloader.id().to_string()));
        }
        info!(download = %downloader.id(), "Download removed");
        Ok(())
    }

    /// Pauses every running download. Safe to call repeatedly.
    pub async fn pause_all(&self) -> Result<()> {
        for downloader in self.downloads()? {
            if downloader.state() == DownloaderState::Running {
                downloader.pause().await?;
            }
        }
        Ok(())
    }

    /// Starts every queued download.
    pub async fn start_all(&self) -> Result<()> {
        for downloader in self.downloads()? {
            if downloader.state() == DownloaderState::Queued {
                downloader.start().await?;
            }
        }
        Ok(())
    }

    /// Resumes paused downloads. Failed ones wait for an explicit resume.
    pub async fn resume_all(&self) -> Result<()> {
        for downloader in self.downloads()? {
            if downloader.state() == DownloaderState::Paused {
                downloader.resume().await?;
            }
        }
        Ok(())
    }

    pub fn lock_download_list(&self, mode: LockMode) -> Result<DownloadListGuard<'_>> {
        match mode {
            LockMode::Shared => self.read_list().map(DownloadListGuard::Shared),
            LockMode::Exclusive => self.write_list().map(DownloadListGuard::Exclusive),
        }
    }

    /// The registered downloads in insertion order, copied out under the
    /// shared lock.
    pub fn downloads(&self) -> Result<Vec<Arc<Downloader>>> {
        Ok(self.read_list()?.to_vec())
    }

    pub fn find(&self, id: DownloadId) -> Result<Option<Arc<Downloader>>> {
        Ok(self.read_list()?.iter().find(|d| d.id() == id).cloned())
    }

    pub fn len(&self) -> Result<usize> {
        Ok(self.read_list()?.len())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.read_list()?.is_empty())
    }

    /// Drops finished downloads from the registry and returns how many went.
    pub fn clear_ended(&self) -> Result<usize> {
        let mut downloads = self.write_list()?;
        let before = downloads.len();
        downloads.retain(|d| d.state() != DownloaderState::Ended);
        let cleared = before - downloads.len();
        if cleared > 0 {
            info!(cleared, "Cleared ended downloads");
        }
        Ok(cleared)
    }

    fn read_list(&self) -> Result<RwLockReadGuard<'_, Vec<Arc<Downloader>>>> {
        let limit = self.ctx.config.lock_timeout();
        self.downloads.try_read_for(limit).ok_or_else(|| {
            error!("Download list lock watchdog fired (shared)");
            EngineError::LockTimeout(limit, "download list")
        })
    }

    fn write_list(&self) -> Result<RwLockWriteGuard<'_, Vec<Arc<Downloader>>>> {
        let limit = self.ctx.config.lock_timeout();
        self.downloads.try_write_for(limit).ok_or_else(|| {
            error!("Download list lock watchdog fired (exclusive)");
            EngineError::LockTimeout(limit, "download list")
        })
    }
}
