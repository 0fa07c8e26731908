// WarpSpeed Engine - lib.rs
//
// Segmented, resumable download engine: downloads are split into byte-range
// segments fetched in parallel, and the download list is snapshotted to disk
// so interrupted downloads pick up where they stopped.

pub mod config;
pub mod download_manager;
pub mod downloader;
pub mod engine;
pub mod error;
pub mod events;
pub mod file_manager;
pub mod metadata;
pub mod persistence;
pub mod progress;
pub mod segment;
pub mod transport;

pub use config::{EngineConfig, PersistenceConfig, RetryPolicy};
pub use download_manager::{DownloadListGuard, DownloadManager, LockMode};
pub use downloader::{DownloadId, DownloadParams, Downloader, DownloaderState, SegmentsGuard};
pub use engine::{Disposable, Engine, Initializable};
pub use error::{EngineError, Result, TransportError};
pub use events::{DownloadEvent, EventHub, LifecycleObserver};
pub use metadata::{RemoteFileInfo, ResourceLocation};
pub use persistence::{PersistedList, Snapshot};
pub use segment::Segment;
pub use transport::{ByteStream, HttpTransport, Transport};
