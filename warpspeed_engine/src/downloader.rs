// WarpSpeed Engine - downloader.rs

use std::cmp::min;
use std::collections::HashMap;
use std::fmt;
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use parking_lot::{Mutex, MutexGuard, RwLock};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::{EngineError, Result, TransportError};
use crate::events::{DownloadEvent, EventHub};
use crate::file_manager::{self, part_path, FileManager};
use crate::metadata::{RemoteFileInfo, ResourceLocation};
use crate::segment::{plan_segments, validate_partition, Segment};
use crate::transport::Transport;

pub type DownloadId = Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DownloaderState {
    Queued,
    Running,
    Paused,
    Ended,
    Error,
    Cancelled,
}

impl DownloaderState {
    /// Ended and Cancelled downloads never run again and are not persisted.
    pub fn is_terminal(self) -> bool {
        matches!(self, DownloaderState::Ended | DownloaderState::Cancelled)
    }
}

impl fmt::Display for DownloaderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Shared engine pieces every download needs: the fetch capability, the event
/// hub, the global fetch pool and the tuning knobs.
#[derive(Clone)]
pub(crate) struct EngineContext {
    pub transport: Arc<dyn Transport>,
    pub events: EventHub,
    pub fetch_slots: Arc<Semaphore>,
    pub config: Arc<EngineConfig>,
}

/// Everything needed to build a [`Downloader`], whether fresh or restored.
#[derive(Debug, Clone)]
pub struct DownloadParams {
    pub location: ResourceLocation,
    pub mirrors: Vec<ResourceLocation>,
    pub local_file: PathBuf,
    /// Saved segments, used verbatim instead of re-splitting the file.
    pub segments: Option<Vec<Segment>>,
    pub remote_info: Option<RemoteFileInfo>,
    /// 0 means the engine default.
    pub requested_segments: usize,
    pub created_at: DateTime<Utc>,
}

impl DownloadParams {
    pub fn new(location: ResourceLocation, local_file: impl Into<PathBuf>) -> Self {
        Self {
            location,
            mirrors: Vec::new(),
            local_file: local_file.into(),
            segments: None,
            remote_info: None,
            requested_segments: 0,
            created_at: Utc::now(),
        }
    }

    pub fn mirrors(mut self, mirrors: Vec<ResourceLocation>) -> Self {
        self.mirrors = mirrors;
        self
    }

    pub fn segments(mut self, segments: Vec<Segment>) -> Self {
        self.segments = Some(segments);
        self
    }

    pub fn remote_info(mut self, info: RemoteFileInfo) -> Self {
        self.remote_info = Some(info);
        self
    }

    pub fn requested_segments(mut self, count: usize) -> Self {
        self.requested_segments = count;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }
}

/// Read access to a download's segments, holding its segment lock.
pub struct SegmentsGuard<'a>(MutexGuard<'a, Vec<Segment>>);

impl Deref for SegmentsGuard<'_> {
    type Target = [Segment];

    fn deref(&self) -> &[Segment] {
        &self.0
    }
}

struct RunHandle {
    stop: CancellationToken,
    supervisor: JoinHandle<()>,
}

/// One logical download: a resource, its mirrors, a local file and the
/// segments that cover it.
///
/// Control calls (`start`, `pause`, `resume`, `cancel`) are serialized with each
/// other. Fetch workers only touch the segment lock, one worker per segment index.
pub struct Downloader {
    id: DownloadId,
    resource_location: ResourceLocation,
    mirrors: Vec<ResourceLocation>,
    local_file: PathBuf,
    requested_segments: usize,
    created_date_time: DateTime<Utc>,
    remote_file_info: RwLock<Option<RemoteFileInfo>>,
    segments: Mutex<Vec<Segment>>,
    state: watch::Sender<DownloaderState>,
    last_error: Mutex<Option<String>>,
    extended_properties: RwLock<HashMap<String, serde_json::Value>>,
    last_progress: Mutex<Option<Instant>>,
    run: tokio::sync::Mutex<Option<RunHandle>>,
    ctx: EngineContext,
}

impl fmt::Debug for Downloader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Downloader")
            .field("id", &self.id)
            .field("location", &self.resource_location.url)
            .field("local_file", &self.local_file)
            .field("state", &self.state())
            .finish()
    }
}

impl Downloader {
    pub(crate) fn new(params: DownloadParams, ctx: EngineContext) -> Result<Arc<Self>> {
        let requested_segments = if params.requested_segments == 0 {
            ctx.config.default_segments
        } else {
            params.requested_segments
        };

        let segments = match (params.segments, &params.remote_info) {
            (Some(segments), Some(info)) => {
                validate_partition(&segments, info.file_size)?;
                segments
            }
            (Some(_), None) => {
                return Err(EngineError::InvariantViolation(
                    "saved segments need the remote file info they were cut from".to_string(),
                ))
            }
            (None, Some(info)) => plan_segments(
                info.file_size,
                requested_segments,
                info.supports_ranges,
                ctx.config.min_segment_size,
            ),
            // Planned once the transport has resolved the file.
            (None, None) => Vec::new(),
        };

        let (state, _) = watch::channel(DownloaderState::Queued);
        Ok(Arc::new(Downloader {
            id: Uuid::new_v4(),
            resource_location: params.location,
            mirrors: params.mirrors,
            local_file: params.local_file,
            requested_segments,
            created_date_time: params.created_at,
            remote_file_info: RwLock::new(params.remote_info),
            segments: Mutex::new(segments),
            state,
            last_error: Mutex::new(None),
            extended_properties: RwLock::new(HashMap::new()),
            last_progress: Mutex::new(None),
            run: tokio::sync::Mutex::new(None),
            ctx,
        }))
    }

    pub fn id(&self) -> DownloadId {
        self.id
    }

    pub fn resource_location(&self) -> &ResourceLocation {
        &self.resource_location
    }

    pub fn mirrors(&self) -> &[ResourceLocation] {
        &self.mirrors
    }

    pub fn local_file(&self) -> &Path {
        &self.local_file
    }

    pub fn requested_segments(&self) -> usize {
        self.requested_segments
    }

    pub fn created_date_time(&self) -> DateTime<Utc> {
        self.created_date_time
    }

    pub fn remote_file_info(&self) -> Option<RemoteFileInfo> {
        self.remote_file_info.read().clone()
    }

    pub fn state(&self) -> DownloaderState {
        *self.state.borrow()
    }

    pub fn is_terminal(&self) -> bool {
        self.state().is_terminal()
    }

    /// Message of the error that last moved this download to `Error`.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.lock().clone()
    }

    pub fn property(&self, key: &str) -> Option<serde_json::Value> {
        self.extended_properties.read().get(key).cloned()
    }

    pub fn set_property(&self, key: impl Into<String>, value: serde_json::Value) {
        self.extended_properties.write().insert(key.into(), value);
    }

    pub fn extended_properties(&self) -> HashMap<String, serde_json::Value> {
        self.extended_properties.read().clone()
    }

    /// Takes the segment lock for reading. Callers that also hold the
    /// registry lock must have taken it first.
    ///
    /// The timed wait blocks the calling thread, async workers included. Every
    /// holder only copies or bumps a few positions and never awaits, so the
    /// watchdog fires only when a holder is stuck.
    pub fn lock_segments(&self) -> Result<SegmentsGuard<'_>> {
        let limit = self.ctx.config.lock_timeout();
        match self.segments.try_lock_for(limit) {
            Some(guard) => Ok(SegmentsGuard(guard)),
            None => {
                error!(download = %self.id, "Segment lock watchdog fired");
                Err(EngineError::LockTimeout(limit, "segment"))
            }
        }
    }

    pub fn total_size(&self) -> Option<u64> {
        self.remote_file_info.read().as_ref().map(|info| info.file_size)
    }

    pub fn downloaded_bytes(&self) -> u64 {
        self.segments.lock().iter().map(Segment::downloaded).sum()
    }

    /// Fraction of the file that is on disk, between 0.0 and 1.0.
    pub fn progress(&self) -> f64 {
        let segments = self.segments.lock();
        if segments.is_empty() {
            return 0.0;
        }
        let total: u64 = segments.iter().map(Segment::len).sum();
        if total == 0 {
            return 1.0;
        }
        let remaining: u64 = segments.iter().map(Segment::remaining).sum();
        (total - remaining) as f64 / total as f64
    }

    /// Waits until the state satisfies `done` and returns it.
    pub async fn wait_for_state<F>(&self, done: F) -> DownloaderState
    where
        F: Fn(DownloaderState) -> bool,
    {
        let mut receiver = self.state.subscribe();
        let result = receiver.wait_for(|state| done(*state)).await.map(|state| *state);
        result.unwrap_or_else(|_| self.state())
    }

    /// Waits until the download stops on its own or is stopped.
    pub async fn wait_settled(&self) -> DownloaderState {
        self.wait_for_state(|state| state != DownloaderState::Running && state != DownloaderState::Queued)
            .await
    }

    /// `Queued → Running`. A no-op in any other non-terminal state.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let mut run = self.run.lock().await;
        match self.state() {
            DownloaderState::Queued => self.launch(&mut run).await,
            state if state.is_terminal() => Err(EngineError::InvalidState(state.to_string())),
            _ => Ok(()),
        }
    }

    /// `Paused/Error → Running`, re-spawning workers from each segment's resume
    /// point. A no-op while running.
    pub async fn resume(self: &Arc<Self>) -> Result<()> {
        let mut run = self.run.lock().await;
        match self.state() {
            DownloaderState::Running => Ok(()),
            state if state.is_terminal() => Err(EngineError::InvalidState(state.to_string())),
            _ => self.launch(&mut run).await,
        }
    }

    /// `Running → Paused`. Workers stop after their current chunk; progress is
    /// kept. Waits up to the pause timeout for them to acknowledge.
    pub async fn pause(self: &Arc<Self>) -> Result<()> {
        let mut run = self.run.lock().await;
        if self.state() != DownloaderState::Running {
            return Ok(());
        }
        if let Some(mut handle) = run.take() {
            handle.stop.cancel();
            let limit = self.ctx.config.pause_timeout();
            if timeout(limit, &mut handle.supervisor).await.is_err() {
                warn!(download = %self.id, "Workers did not acknowledge pause within {:?}", limit);
                // Keep the handle so the next launch waits for the stragglers.
                *run = Some(handle);
            }
        }
        self.transition(&[DownloaderState::Running], DownloaderState::Paused);
        Ok(())
    }

    /// Stops the download for good and deletes its partial file.
    pub async fn cancel(self: &Arc<Self>) -> Result<()> {
        let mut run = self.run.lock().await;
        if self.is_terminal() {
            return Ok(());
        }
        if let Some(mut handle) = run.take() {
            handle.stop.cancel();
            if timeout(self.ctx.config.pause_timeout(), &mut handle.supervisor).await.is_err() {
                warn!(download = %self.id, "Workers did not stop in time, aborting them");
                handle.supervisor.abort();
                let _ = handle.supervisor.await;
            }
        }
        self.transition(
            &[
                DownloaderState::Queued,
                DownloaderState::Running,
                DownloaderState::Paused,
                DownloaderState::Error,
            ],
            DownloaderState::Cancelled,
        );
        if let Err(err) = file_manager::discard(&part_path(&self.local_file)).await {
            warn!(download = %self.id, "Could not delete partial file: {}", err);
        }
        Ok(())
    }

    /// Puts a restored download back into `Error` without running it.
    pub(crate) fn restore_error(self: &Arc<Self>, message: Option<String>) {
        *self.last_error.lock() = message;
        self.transition(&[DownloaderState::Queued], DownloaderState::Error);
    }

    async fn launch(self: &Arc<Self>, run: &mut Option<RunHandle>) -> Result<()> {
        if let Some(previous) = run.take() {
            previous.stop.cancel();
            let _ = previous.supervisor.await;
        }
        *self.last_error.lock() = None;
        let from = [DownloaderState::Queued, DownloaderState::Paused, DownloaderState::Error];
        if !self.transition(&from, DownloaderState::Running) {
            return Err(EngineError::InvalidState(self.state().to_string()));
        }

        let stop = CancellationToken::new();
        let supervisor = tokio::spawn(Arc::clone(self).supervise(stop.clone()));
        *run = Some(RunHandle { stop, supervisor });
        Ok(())
    }

    /// Moves to `to` if the current state is one of `from`, emitting the change
    /// while the state is still held so observers see transitions in order.
    fn transition(self: &Arc<Self>, from: &[DownloaderState], to: DownloaderState) -> bool {
        let mut old = to;
        let changed = self.state.send_if_modified(|state| {
            if !from.contains(state) {
                return false;
            }
            old = std::mem::replace(state, to);
            self.ctx.events.emit(DownloadEvent::StateChanged {
                download: Arc::clone(self),
                old,
                new: to,
            });
            true
        });
        if changed {
            info!(download = %self.id, "State changed: {} -> {}", old, to);
        }
        changed
    }

    fn fail(self: &Arc<Self>, err: EngineError) {
        error!(download = %self.id, "Download failed: {}", err);
        *self.last_error.lock() = Some(err.to_string());
        self.transition(&[DownloaderState::Running, DownloaderState::Paused], DownloaderState::Error);
    }

    async fn supervise(self: Arc<Self>, stop: CancellationToken) {
        match self.run_segments(&stop).await {
            // A finished file is final even if a pause raced the rename.
            Ok(RunOutcome::Finished) => {
                self.transition(&[DownloaderState::Running, DownloaderState::Paused], DownloaderState::Ended);
            }
            Ok(RunOutcome::Stopped) => debug!(download = %self.id, "Supervisor stopped"),
            Err(err) if stop.is_cancelled() => {
                debug!(download = %self.id, "Ignoring error after stop: {}", err);
            }
            Err(err) => self.fail(err),
        }
    }

    async fn run_segments(self: &Arc<Self>, stop: &CancellationToken) -> Result<RunOutcome> {
        let info = tokio::select! {
            _ = stop.cancelled() => return Ok(RunOutcome::Stopped),
            info = self.prepare() => info?,
        };

        let part = part_path(&self.local_file);
        if self.already_finalized(&part).await? {
            info!(download = %self.id, "{} is already complete", self.local_file.display());
            return Ok(RunOutcome::Finished);
        }
        let file = Arc::new(tokio::sync::Mutex::new(FileManager::open(&part, info.file_size).await?));

        let pending: Vec<usize> = self
            .lock_segments()?
            .iter()
            .filter(|s| !s.is_complete())
            .map(Segment::index)
            .collect();
        debug!(download = %self.id, "Spawning {} segment workers", pending.len());

        // Child token: a failing segment stops its siblings without looking like a pause.
        let workers_stop = stop.child_token();
        let mut workers = JoinSet::new();
        for index in pending {
            let worker = SegmentWorker {
                download: Arc::clone(self),
                index,
                file: Arc::clone(&file),
                stop: workers_stop.clone(),
                ranged: info.supports_ranges,
            };
            workers.spawn(worker.run());
        }

        let mut failure = None;
        while let Some(joined) = workers.join_next().await {
            let result = joined.unwrap_or_else(|err| {
                Err(EngineError::InvariantViolation(format!("segment worker died: {}", err)))
            });
            if let Err(err) = result {
                if failure.is_none() {
                    workers_stop.cancel();
                    failure = Some(err);
                }
            }
        }
        if let Some(err) = failure {
            return Err(err);
        }

        // Once every byte is written the rename runs even if a stop arrived.
        if let Some(segment) = self.lock_segments()?.iter().find(|s| !s.is_complete()) {
            if stop.is_cancelled() {
                return Ok(RunOutcome::Stopped);
            }
            return Err(EngineError::InvariantViolation(format!(
                "segment {} still has {} bytes left after its worker finished",
                segment.index(),
                segment.remaining()
            )));
        }

        let file = Arc::try_unwrap(file)
            .map_err(|_| EngineError::InvariantViolation("partial file is still shared".to_string()))?
            .into_inner();
        file.finalize(&self.local_file).await?;
        info!(download = %self.id, "Saved {}", self.local_file.display());
        Ok(RunOutcome::Finished)
    }

    /// True when a previous run already renamed the complete partial file into
    /// place, so reopening it would clobber the finished download.
    async fn already_finalized(&self, part: &Path) -> Result<bool> {
        let complete = self.lock_segments()?.iter().all(Segment::is_complete);
        if !complete || fs::try_exists(part).await? {
            return Ok(false);
        }
        Ok(fs::try_exists(&self.local_file).await?)
    }

    /// Resolves the remote file on first run, or checks it has not changed
    /// when resuming a download that already has bytes on disk.
    async fn prepare(&self) -> Result<RemoteFileInfo> {
        let known = self.remote_file_info();
        let Some(info) = known else {
            let info = self.query_file_info().await?;
            let segments = plan_segments(
                info.file_size,
                self.requested_segments,
                info.supports_ranges,
                self.ctx.config.min_segment_size,
            );
            debug!(download = %self.id, size = info.file_size, "Split into {} segments", segments.len());
            *self.segments.lock() = segments;
            *self.remote_file_info.write() = Some(info.clone());
            return Ok(info);
        };

        if self.downloaded_bytes() > 0 {
            match self.query_file_info().await {
                Ok(current) => info.validate_resume(&current)?,
                Err(err) if err.is_transient() => {
                    warn!(download = %self.id, "Could not revalidate remote file, resuming anyway: {}", err);
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(info)
    }

    async fn query_file_info(&self) -> std::result::Result<RemoteFileInfo, TransportError> {
        let mut last_error = None;
        for location in self.locations() {
            match self.ctx.transport.file_info(location).await {
                Ok(info) => return Ok(info),
                Err(err) => {
                    warn!(download = %self.id, %location, "Could not get file info: {}", err);
                    last_error = Some(err);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| TransportError::Unsupported("no locations".to_string())))
    }

    fn locations(&self) -> impl Iterator<Item = &ResourceLocation> {
        std::iter::once(&self.resource_location).chain(self.mirrors.iter())
    }

    /// Called only after the chunk's write has completed. Same blocking
    /// watchdog as [`lock_segments`](Self::lock_segments).
    fn advance_segment(&self, index: usize, bytes: u64) -> Result<u64> {
        let limit = self.ctx.config.lock_timeout();
        let mut segments = self
            .segments
            .try_lock_for(limit)
            .ok_or(EngineError::LockTimeout(limit, "segment"))?;
        let segment = segments
            .get_mut(index)
            .ok_or_else(|| EngineError::InvariantViolation(format!("no segment with index {}", index)))?;
        segment.advance(bytes)?;
        Ok(segment.start_position())
    }

    fn note_progress(self: &Arc<Self>) {
        let now = Instant::now();
        {
            let mut last = self.last_progress.lock();
            if matches!(*last, Some(at) if now.duration_since(at) < self.ctx.config.progress_interval()) {
                return;
            }
            *last = Some(now);
        }
        self.ctx.events.emit(DownloadEvent::Progress {
            download: Arc::clone(self),
        });
    }
}

enum RunOutcome {
    Finished,
    Stopped,
}

enum FetchOutcome {
    Complete,
    Stopped,
}

/// Drives one segment to completion against the download's locations.
struct SegmentWorker {
    download: Arc<Downloader>,
    index: usize,
    file: Arc<tokio::sync::Mutex<FileManager>>,
    stop: CancellationToken,
    ranged: bool,
}

impl SegmentWorker {
    async fn run(self) -> Result<()> {
        let slots = Arc::clone(&self.download.ctx.fetch_slots);
        let _permit = tokio::select! {
            _ = self.stop.cancelled() => return Ok(()),
            permit = slots.acquire_owned() => permit
                .map_err(|_| EngineError::InvalidState("fetch pool closed".to_string()))?,
        };

        let policy = self.download.ctx.config.retry.clone();
        let locations: Vec<ResourceLocation> = self.download.locations().cloned().collect();
        let mut last_error = None;

        for round in 0..policy.rounds {
            for location in &locations {
                let mut attempt = 0;
                while attempt < policy.attempts_per_location {
                    if self.stop.is_cancelled() {
                        return Ok(());
                    }
                    let before = self.position()?;
                    match self.fetch_from(location).await {
                        Ok(FetchOutcome::Complete) => {
                            debug!(download = %self.download.id, segment = self.index, "Segment complete");
                            self.download.ctx.events.emit(DownloadEvent::SegmentComplete {
                                download: Arc::clone(&self.download),
                                index: self.index,
                            });
                            return Ok(());
                        }
                        Ok(FetchOutcome::Stopped) => return Ok(()),
                        Err(err) if err.is_fatal() => return Err(err),
                        Err(err) => {
                            warn!(
                                download = %self.download.id,
                                segment = self.index,
                                %location,
                                round,
                                attempt,
                                "Segment fetch failed: {}",
                                err
                            );
                            last_error = Some(err);
                            // A connection that moved the cursor earns a fresh set of attempts.
                            attempt = if self.position()? > before { 0 } else { attempt + 1 };
                            if attempt < policy.attempts_per_location {
                                tokio::select! {
                                    _ = self.stop.cancelled() => return Ok(()),
                                    _ = sleep(policy.backoff(attempt.saturating_sub(1))) => {}
                                }
                            }
                        }
                    }
                }
            }
        }

        error!(download = %self.download.id, segment = self.index, "All locations exhausted");
        Err(last_error.unwrap_or_else(|| {
            EngineError::Transport(TransportError::Unsupported("no locations to fetch from".to_string()))
        }))
    }

    fn position(&self) -> Result<u64> {
        let segments = self.download.lock_segments()?;
        segments
            .get(self.index)
            .map(Segment::start_position)
            .ok_or_else(|| EngineError::InvariantViolation(format!("no segment with index {}", self.index)))
    }

    async fn fetch_from(&self, location: &ResourceLocation) -> Result<FetchOutcome> {
        let (start, end) = {
            let segments = self.download.lock_segments()?;
            let segment = segments
                .get(self.index)
                .ok_or_else(|| EngineError::InvariantViolation(format!("no segment with index {}", self.index)))?;
            (segment.start_position(), segment.end_position())
        };
        if start == end {
            return Ok(FetchOutcome::Complete);
        }

        let transport = &self.download.ctx.transport;
        let chunk_timeout = self.download.ctx.config.chunk_timeout();
        // Without range support the body always starts at byte 0, so bytes
        // already on disk are skipped rather than rewound.
        let (request, mut skip) = if self.ranged {
            (transport.fetch_range(location, start, end), 0)
        } else {
            (transport.fetch_whole(location), start)
        };
        let mut stream = tokio::select! {
            _ = self.stop.cancelled() => return Ok(FetchOutcome::Stopped),
            opened = timeout(chunk_timeout, request) => {
                opened.map_err(|_| TransportError::Timeout(chunk_timeout))??
            }
        };

        let mut position = start;
        loop {
            let next = tokio::select! {
                biased;
                _ = self.stop.cancelled() => return Ok(FetchOutcome::Stopped),
                next = timeout(chunk_timeout, stream.next()) => {
                    next.map_err(|_| TransportError::Timeout(chunk_timeout))?
                }
            };
            let mut chunk = match next {
                Some(chunk) => chunk?,
                None => {
                    return Err(TransportError::ConnectionClosed {
                        remaining: end - position,
                    }
                    .into())
                }
            };

            if skip > 0 {
                let skipped = min(skip, chunk.len() as u64);
                skip -= skipped;
                chunk = chunk.slice(skipped as usize..);
                if chunk.is_empty() {
                    continue;
                }
            }

            let take = min(chunk.len() as u64, end - position) as usize;
            self.file.lock().await.write_chunk(position, &chunk[..take]).await?;
            position = self.download.advance_segment(self.index, take as u64)?;
            self.download.note_progress();

            if position == end {
                return Ok(FetchOutcome::Complete);
            }
        }
    }
}
