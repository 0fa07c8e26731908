//! Shared fixtures: an in-memory transport with failure injection and request
//! recording, plus engine settings tuned for fast tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;

use warpspeed_engine::{
    ByteStream, DownloadManager, EngineConfig, RemoteFileInfo, ResourceLocation, Transport, TransportError,
};

/// Deterministic file contents, so misplaced bytes show up in comparisons.
pub fn pattern(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}

pub fn test_config(dir: &Path) -> EngineConfig {
    let mut config = EngineConfig::default();
    config.min_segment_size = 0;
    config.chunk_timeout_secs = 5;
    config.pause_timeout_secs = 5;
    config.lock_timeout_secs = 5;
    config.event_capacity = 4096;
    config.progress_interval_ms = 10;
    config.retry.initial_backoff_ms = 1;
    config.retry.max_backoff_ms = 5;
    config.persistence.path = dir.join("downloads.json");
    config
}

pub fn manager(dir: &Path, transport: Arc<MockTransport>) -> Arc<DownloadManager> {
    Arc::new(DownloadManager::new(test_config(dir), transport))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub start: u64,
    pub end: u64,
    pub ranged: bool,
}

#[derive(Debug, Clone)]
pub struct MockResource {
    pub data: Bytes,
    pub supports_ranges: bool,
    pub etag: Option<String>,
    pub chunk_size: usize,
    pub chunk_delay: Duration,
    /// Every fetch fails with a connection reset.
    pub always_fail: bool,
    /// The next N fetches fail with a connection reset.
    pub fail_next: usize,
    /// The next response ends after this many bytes.
    pub cut_after: Option<usize>,
}

impl MockResource {
    pub fn new(data: Vec<u8>) -> Self {
        MockResource {
            data: Bytes::from(data),
            supports_ranges: true,
            etag: None,
            chunk_size: 512,
            chunk_delay: Duration::ZERO,
            always_fail: false,
            fail_next: 0,
            cut_after: None,
        }
    }

    pub fn without_ranges(mut self) -> Self {
        self.supports_ranges = false;
        self
    }

    pub fn slow(mut self, chunk_size: usize, chunk_delay: Duration) -> Self {
        self.chunk_size = chunk_size;
        self.chunk_delay = chunk_delay;
        self
    }

    pub fn broken(mut self) -> Self {
        self.always_fail = true;
        self
    }

    pub fn etag(mut self, etag: &str) -> Self {
        self.etag = Some(etag.to_string());
        self
    }
}

#[derive(Default)]
pub struct MockTransport {
    resources: Mutex<HashMap<String, MockResource>>,
    requests: Mutex<Vec<Request>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn serve(&self, url: &str, resource: MockResource) {
        self.resources.lock().insert(url.to_string(), resource);
    }

    pub fn update(&self, url: &str, change: impl FnOnce(&mut MockResource)) {
        if let Some(resource) = self.resources.lock().get_mut(url) {
            change(resource);
        }
    }

    pub fn requests(&self) -> Vec<Request> {
        self.requests.lock().clone()
    }

    pub fn requests_to(&self, url: &str) -> usize {
        self.requests.lock().iter().filter(|r| r.url == url).count()
    }

    fn open(&self, location: &ResourceLocation, start: u64, end: Option<u64>, ranged: bool) -> Result<ByteStream, TransportError> {
        let mut resources = self.resources.lock();
        let resource = resources
            .get_mut(&location.url)
            .ok_or(TransportError::Unsuccessful(404))?;
        let end = end.unwrap_or(resource.data.len() as u64);
        self.requests.lock().push(Request {
            url: location.url.clone(),
            start,
            end,
            ranged,
        });

        if resource.always_fail {
            return Err(TransportError::Network("connection reset".to_string()));
        }
        if resource.fail_next > 0 {
            resource.fail_next -= 1;
            return Err(TransportError::Network("connection reset".to_string()));
        }

        let mut body = resource.data.slice(start as usize..end as usize);
        if let Some(cut) = resource.cut_after.take() {
            body = body.slice(..cut.min(body.len()));
        }
        let chunk_size = resource.chunk_size.max(1);
        let delay = resource.chunk_delay;
        let chunks: Vec<Bytes> = (0..body.len())
            .step_by(chunk_size)
            .map(|at| body.slice(at..(at + chunk_size).min(body.len())))
            .collect();

        Ok(stream::iter(chunks)
            .then(move |chunk| async move {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(chunk)
            })
            .boxed())
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn file_info(&self, location: &ResourceLocation) -> Result<RemoteFileInfo, TransportError> {
        let resources = self.resources.lock();
        let resource = resources
            .get(&location.url)
            .ok_or(TransportError::Unsuccessful(404))?;
        Ok(RemoteFileInfo {
            file_size: resource.data.len() as u64,
            supports_ranges: resource.supports_ranges,
            etag: resource.etag.clone(),
            last_modified: None,
            mime_type: None,
        })
    }

    async fn fetch_range(
        &self,
        location: &ResourceLocation,
        start: u64,
        end: u64,
    ) -> Result<ByteStream, TransportError> {
        self.open(location, start, Some(end), true)
    }

    async fn fetch_whole(&self, location: &ResourceLocation) -> Result<ByteStream, TransportError> {
        self.open(location, 0, None, false)
    }
}

/// Polls `condition` every few milliseconds for up to five seconds.
pub async fn wait_until(mut condition: impl FnMut() -> bool) -> bool {
    for _ in 0..1000 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
