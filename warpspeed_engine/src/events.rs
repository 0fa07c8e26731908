// WarpSpeed Engine - events.rs

use std::sync::Arc;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::warn;

use crate::downloader::{Downloader, DownloaderState};

/// Something that happened to a download, in the order it happened.
#[derive(Debug, Clone)]
pub enum DownloadEvent {
    StateChanged {
        download: Arc<Downloader>,
        old: DownloaderState,
        new: DownloaderState,
    },
    Progress {
        download: Arc<Downloader>,
    },
    SegmentComplete {
        download: Arc<Downloader>,
        index: usize,
    },
}

/// Collaborator hooks (notifications, speed limiting, auto-download rules).
/// Every method defaults to doing nothing.
pub trait LifecycleObserver: Send + Sync {
    fn on_state_changed(&self, _download: &Arc<Downloader>, _old: DownloaderState, _new: DownloaderState) {}

    fn on_progress(&self, _download: &Arc<Downloader>) {}

    fn on_segment_complete(&self, _download: &Arc<Downloader>, _index: usize) {}
}

/// Fan-out point for [`DownloadEvent`]s.
///
/// Emitting never waits on observers: events go into a bounded broadcast
/// channel and each attached observer drains it on its own task. An observer
/// that falls more than the channel capacity behind skips events.
#[derive(Clone)]
pub struct EventHub {
    sender: broadcast::Sender<DownloadEvent>,
}

impl EventHub {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        EventHub { sender }
    }

    pub fn emit(&self, event: DownloadEvent) {
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<DownloadEvent> {
        self.sender.subscribe()
    }

    /// Runs `observer` on its own task until the hub goes away or the returned
    /// handle is aborted.
    pub fn attach(&self, observer: Arc<dyn LifecycleObserver>) -> JoinHandle<()> {
        let mut receiver = self.subscribe();
        tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(event) => dispatch(observer.as_ref(), &event),
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Lifecycle observer is too slow, events were dropped");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

fn dispatch(observer: &dyn LifecycleObserver, event: &DownloadEvent) {
    match event {
        DownloadEvent::StateChanged { download, old, new } => observer.on_state_changed(download, *old, *new),
        DownloadEvent::Progress { download } => observer.on_progress(download),
        DownloadEvent::SegmentComplete { download, index } => observer.on_segment_complete(download, *index),
    }
}
