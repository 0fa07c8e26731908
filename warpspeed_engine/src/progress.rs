// WarpSpeed Engine - progress.rs

use std::collections::HashMap;
use std::sync::Arc;

use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use parking_lot::Mutex;

use crate::downloader::{DownloadId, Downloader, DownloaderState};
use crate::events::LifecycleObserver;

/// Terminal progress bars, one per running download.
pub struct ProgressObserver {
    multi: MultiProgress,
    bars: Mutex<HashMap<DownloadId, ProgressBar>>,
}

impl Default for ProgressObserver {
    fn default() -> Self {
        Self::new(MultiProgress::new())
    }
}

impl ProgressObserver {
    pub fn new(multi: MultiProgress) -> Self {
        ProgressObserver {
            multi,
            bars: Mutex::new(HashMap::new()),
        }
    }

    /// Tracks bars without drawing anything.
    pub fn hidden() -> Self {
        Self::new(MultiProgress::with_draw_target(ProgressDrawTarget::hidden()))
    }

    pub fn position(&self, id: DownloadId) -> Option<u64> {
        self.bars.lock().get(&id).map(ProgressBar::position)
    }

    fn bar_for(&self, download: &Downloader) -> ProgressBar {
        let mut bars = self.bars.lock();
        bars.entry(download.id())
            .or_insert_with(|| {
                let bar = self.multi.add(ProgressBar::new(download.total_size().unwrap_or(0)));
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{spinner:.green} {msg:20!} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec})")
                {
                    bar.set_style(style.progress_chars("=> "));
                }
                let name = download
                    .local_file()
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| download.resource_location().url.clone());
                bar.set_message(name);
                bar
            })
            .clone()
    }

    fn refresh(&self, download: &Downloader) {
        let bar = self.bar_for(download);
        if let Some(total) = download.total_size() {
            bar.set_length(total);
        }
        bar.set_position(download.downloaded_bytes());
    }
}

impl LifecycleObserver for ProgressObserver {
    fn on_state_changed(&self, download: &Arc<Downloader>, _old: DownloaderState, new: DownloaderState) {
        self.refresh(download);
        let bar = self.bar_for(download);
        match new {
            DownloaderState::Ended => bar.finish_with_message("done"),
            DownloaderState::Error => {
                let reason = download.last_error().unwrap_or_else(|| "failed".to_string());
                bar.abandon_with_message(reason);
            }
            DownloaderState::Cancelled => bar.abandon_with_message("cancelled"),
            DownloaderState::Paused => bar.set_message("paused"),
            DownloaderState::Queued | DownloaderState::Running => {}
        }
    }

    fn on_progress(&self, download: &Arc<Downloader>) {
        self.refresh(download);
    }
}
