// WarpSpeed Engine - engine.rs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EngineConfig;
use crate::download_manager::DownloadManager;
use crate::error::Result;
use crate::events::LifecycleObserver;
use crate::persistence::PersistedList;
use crate::transport::Transport;

/// A collaborator that needs to run once the engine is up.
#[async_trait]
pub trait Initializable: Send + Sync {
    fn name(&self) -> &str;

    async fn init(&self) -> Result<()>;
}

/// A collaborator that needs to clean up when the engine shuts down.
#[async_trait]
pub trait Disposable: Send + Sync {
    fn name(&self) -> &str;

    async fn dispose(&self) -> Result<()>;
}

/// Top-level owner of the registry and its collaborators.
///
/// [`init`](Self::init) runs the initializers in registration order and starts
/// the periodic save; [`shutdown`](Self::shutdown) stops the save timer and
/// disposes collaborators in registration order. The persisted list is always
/// registered first.
pub struct Engine {
    manager: Arc<DownloadManager>,
    persisted_list: Arc<PersistedList>,
    initializables: Vec<Arc<dyn Initializable>>,
    disposables: Vec<Arc<dyn Disposable>>,
    observers: Mutex<Vec<JoinHandle<()>>>,
    saver: Mutex<Option<JoinHandle<()>>>,
    stop_saver: CancellationToken,
    disposed: AtomicBool,
}

impl Engine {
    pub fn new(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        let persistence = config.persistence.clone();
        let manager = Arc::new(DownloadManager::new(config, transport));
        let persisted_list = Arc::new(PersistedList::new(Arc::clone(&manager), &persistence));
        Engine {
            initializables: vec![persisted_list.clone() as Arc<dyn Initializable>],
            disposables: vec![persisted_list.clone() as Arc<dyn Disposable>],
            manager,
            persisted_list,
            observers: Mutex::new(Vec::new()),
            saver: Mutex::new(None),
            stop_saver: CancellationToken::new(),
            disposed: AtomicBool::new(false),
        }
    }

    pub fn with_initializable(mut self, extension: Arc<dyn Initializable>) -> Self {
        self.initializables.push(extension);
        self
    }

    pub fn with_disposable(mut self, extension: Arc<dyn Disposable>) -> Self {
        self.disposables.push(extension);
        self
    }

    pub fn manager(&self) -> &Arc<DownloadManager> {
        &self.manager
    }

    pub fn persisted_list(&self) -> &Arc<PersistedList> {
        &self.persisted_list
    }

    /// Subscribes `observer` to lifecycle events until shutdown.
    pub fn attach_observer(&self, observer: Arc<dyn LifecycleObserver>) {
        let handle = self.manager.events().attach(observer);
        self.observers.lock().push(handle);
    }

    pub async fn init(&self) -> Result<()> {
        for extension in &self.initializables {
            debug!(extension = extension.name(), "Initializing");
            extension.init().await?;
        }

        let list = Arc::clone(&self.persisted_list);
        let stop = self.stop_saver.clone();
        *self.saver.lock() = Some(tokio::spawn(async move { list.run(stop).await }));
        info!("Engine started");
        Ok(())
    }

    /// Stops the periodic save, then disposes every collaborator; for the
    /// persisted list that means pause everything and save once more. Only the
    /// first call does anything.
    pub async fn shutdown(&self) {
        if self.disposed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.stop_saver.cancel();
        let saver = self.saver.lock().take();
        if let Some(saver) = saver {
            let _ = saver.await;
        }

        for extension in &self.disposables {
            debug!(extension = extension.name(), "Disposing");
            if let Err(err) = extension.dispose().await {
                warn!(extension = extension.name(), "Dispose failed: {}", err);
            }
        }

        for observer in self.observers.lock().drain(..) {
            observer.abort();
        }
        info!("Engine stopped");
    }
}
