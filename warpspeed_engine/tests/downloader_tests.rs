mod common;

use std::time::Duration;

use common::{manager, pattern, wait_until, MockResource, MockTransport, Request};
use tempfile::TempDir;
use tokio::time::timeout;

use warpspeed_engine::file_manager::part_path;
use warpspeed_engine::segment::validate_partition;
use warpspeed_engine::{
    DownloadEvent, DownloadParams, DownloaderState, EngineError, RemoteFileInfo, ResourceLocation, Segment,
};

const URL: &str = "http://files.test/archive.bin";
const MIRROR: &str = "http://mirror.test/archive.bin";

#[tokio::test]
async fn downloads_every_segment_into_the_local_file() {
    let dir = TempDir::new().unwrap();
    let data = pattern(10_000);
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(data.clone()));
    let manager = manager(dir.path(), transport.clone());

    let target = dir.path().join("archive.bin");
    let params = DownloadParams::new(ResourceLocation::new(URL), &target)
        .remote_info(RemoteFileInfo::new(10_000, true))
        .requested_segments(4);
    let download = manager.add(params, true).await.unwrap();

    assert_eq!(download.wait_settled().await, DownloaderState::Ended);
    assert_eq!(std::fs::read(&target).unwrap(), data);
    assert!(!part_path(&target).exists());
    assert_eq!(download.progress(), 1.0);

    let segments = download.lock_segments().unwrap();
    assert_eq!(segments.len(), 4);
    assert!(segments.iter().all(Segment::is_complete));
    validate_partition(&segments, 10_000).unwrap();
    assert_eq!(transport.requests_to(URL), 4);
}

#[tokio::test]
async fn resolves_file_info_before_splitting() {
    let dir = TempDir::new().unwrap();
    let data = pattern(4_096);
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(data.clone()));
    let manager = manager(dir.path(), transport.clone());

    let target = dir.path().join("nested/dir/archive.bin");
    let params = DownloadParams::new(ResourceLocation::new(URL), &target).requested_segments(2);
    let download = manager.add(params, false).await.unwrap();
    assert!(download.lock_segments().unwrap().is_empty());
    assert_eq!(download.total_size(), None);

    download.start().await.unwrap();
    assert_eq!(download.wait_settled().await, DownloaderState::Ended);
    assert_eq!(download.total_size(), Some(4_096));
    assert_eq!(download.lock_segments().unwrap().len(), 2);
    assert_eq!(std::fs::read(&target).unwrap(), data);
}

#[tokio::test]
async fn server_without_ranges_gets_a_single_whole_file_request() {
    let dir = TempDir::new().unwrap();
    let data = pattern(3_000);
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(data.clone()).without_ranges());
    let manager = manager(dir.path(), transport.clone());

    let target = dir.path().join("archive.bin");
    let params = DownloadParams::new(ResourceLocation::new(URL), &target).requested_segments(8);
    let download = manager.add(params, true).await.unwrap();

    assert_eq!(download.wait_settled().await, DownloaderState::Ended);
    assert_eq!(download.lock_segments().unwrap().len(), 1);
    assert_eq!(std::fs::read(&target).unwrap(), data);
    let requests = transport.requests();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].ranged);
}

#[tokio::test]
async fn pause_and_resume_are_idempotent_and_keep_progress() {
    let dir = TempDir::new().unwrap();
    let data = pattern(20_000);
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(data.clone()).slow(100, Duration::from_millis(5)));
    let manager = manager(dir.path(), transport.clone());

    let target = dir.path().join("archive.bin");
    let params = DownloadParams::new(ResourceLocation::new(URL), &target)
        .remote_info(RemoteFileInfo::new(20_000, true))
        .requested_segments(2);
    let download = manager.add(params, true).await.unwrap();
    assert!(wait_until(|| download.downloaded_bytes() > 0).await);

    download.pause().await.unwrap();
    assert_eq!(download.state(), DownloaderState::Paused);
    download.pause().await.unwrap();
    assert_eq!(download.state(), DownloaderState::Paused);

    let paused_at = download.downloaded_bytes();
    assert!(paused_at < 20_000);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(download.downloaded_bytes(), paused_at, "workers kept writing after pause");
    validate_partition(&download.lock_segments().unwrap(), 20_000).unwrap();

    download.resume().await.unwrap();
    assert_eq!(download.state(), DownloaderState::Running);
    download.resume().await.unwrap();
    assert_eq!(download.state(), DownloaderState::Running);

    assert_eq!(download.wait_settled().await, DownloaderState::Ended);
    assert_eq!(std::fs::read(&target).unwrap(), data);
}

#[tokio::test]
async fn restored_segments_resume_from_their_saved_offsets() {
    let dir = TempDir::new().unwrap();
    let data = pattern(2_000);
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(data.clone()));
    let manager = manager(dir.path(), transport.clone());

    // What an interrupted earlier run left on disk.
    let target = dir.path().join("archive.bin");
    let mut partial = vec![0u8; 2_000];
    partial[..400].copy_from_slice(&data[..400]);
    partial[1_000..1_500].copy_from_slice(&data[1_000..1_500]);
    std::fs::write(part_path(&target), &partial).unwrap();

    let params = DownloadParams::new(ResourceLocation::new(URL), &target)
        .remote_info(RemoteFileInfo::new(2_000, true))
        .segments(vec![
            Segment::restore(0, 0, 400, 1_000).unwrap(),
            Segment::restore(1, 1_000, 1_500, 2_000).unwrap(),
        ]);
    let download = manager.add(params, false).await.unwrap();
    assert_eq!(download.downloaded_bytes(), 900);

    download.start().await.unwrap();
    assert_eq!(download.wait_settled().await, DownloaderState::Ended);

    let mut requests = transport.requests();
    requests.sort_by_key(|r| r.start);
    assert_eq!(
        requests,
        vec![
            Request { url: URL.to_string(), start: 400, end: 1_000, ranged: true },
            Request { url: URL.to_string(), start: 1_500, end: 2_000, ranged: true },
        ]
    );
    assert_eq!(std::fs::read(&target).unwrap(), data);
}

#[tokio::test]
async fn dropped_connection_continues_from_the_last_written_byte() {
    let dir = TempDir::new().unwrap();
    let data = pattern(4_000);
    let transport = MockTransport::new();
    let mut resource = MockResource::new(data.clone());
    resource.cut_after = Some(1_500);
    transport.serve(URL, resource);
    let manager = manager(dir.path(), transport.clone());

    let target = dir.path().join("archive.bin");
    let params = DownloadParams::new(ResourceLocation::new(URL), &target)
        .remote_info(RemoteFileInfo::new(4_000, true))
        .requested_segments(1);
    let download = manager.add(params, true).await.unwrap();

    assert_eq!(download.wait_settled().await, DownloaderState::Ended);
    let starts: Vec<u64> = transport.requests().iter().map(|r| r.start).collect();
    assert_eq!(starts, vec![0, 1_500]);
    assert_eq!(std::fs::read(&target).unwrap(), data);
}

#[tokio::test]
async fn failing_source_falls_back_to_a_mirror() {
    let dir = TempDir::new().unwrap();
    let data = pattern(5_000);
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(data.clone()).broken());
    transport.serve(MIRROR, MockResource::new(data.clone()));
    let manager = manager(dir.path(), transport.clone());

    let target = dir.path().join("archive.bin");
    let params = DownloadParams::new(ResourceLocation::new(URL), &target)
        .mirrors(vec![ResourceLocation::new(MIRROR)])
        .remote_info(RemoteFileInfo::new(5_000, true))
        .requested_segments(2);
    let download = manager.add(params, true).await.unwrap();

    assert_eq!(download.wait_settled().await, DownloaderState::Ended);
    assert!(transport.requests_to(URL) > 0);
    assert_eq!(transport.requests_to(MIRROR), 2);
    assert_eq!(std::fs::read(&target).unwrap(), data);
}

#[tokio::test]
async fn exhausting_every_location_moves_to_error_and_stops_fetching() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(pattern(1_000)).broken());
    transport.serve(MIRROR, MockResource::new(pattern(1_000)).broken());
    let mut config = common::test_config(dir.path());
    config.retry.attempts_per_location = 2;
    config.retry.rounds = 2;
    let manager = std::sync::Arc::new(warpspeed_engine::DownloadManager::new(config, transport.clone()));

    let target = dir.path().join("archive.bin");
    let params = DownloadParams::new(ResourceLocation::new(URL), &target)
        .mirrors(vec![ResourceLocation::new(MIRROR)])
        .remote_info(RemoteFileInfo::new(1_000, true))
        .requested_segments(1);
    let download = manager.add(params, true).await.unwrap();

    assert_eq!(download.wait_settled().await, DownloaderState::Error);
    assert!(download.last_error().unwrap().contains("connection reset"));
    // 2 rounds over 2 locations, 2 attempts each.
    assert_eq!(transport.requests().len(), 8);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.requests().len(), 8);
    assert!(!target.exists());

    // A failed download can be retried explicitly.
    transport.update(URL, |r| r.always_fail = false);
    download.resume().await.unwrap();
    assert_eq!(download.wait_settled().await, DownloaderState::Ended);
    assert_eq!(download.last_error(), None);
}

#[tokio::test]
async fn changed_remote_file_fails_the_resume() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(pattern(2_000)).etag("\"v2\""));
    let manager = manager(dir.path(), transport.clone());

    let target = dir.path().join("archive.bin");
    let params = DownloadParams::new(ResourceLocation::new(URL), &target)
        .remote_info(RemoteFileInfo::new(2_000, true).with_etag("\"v1\""))
        .segments(vec![
            Segment::restore(0, 0, 700, 1_000).unwrap(),
            Segment::restore(1, 1_000, 1_000, 2_000).unwrap(),
        ]);
    let download = manager.add(params, true).await.unwrap();

    assert_eq!(download.wait_settled().await, DownloaderState::Error);
    assert!(download.last_error().is_some());
    assert!(transport.requests().is_empty(), "no bytes should be fetched from a changed file");
    assert_eq!(download.lock_segments().unwrap()[0].start_position(), 700);
}

#[tokio::test]
async fn changed_size_fails_the_resume() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(pattern(2_500)));
    let manager = manager(dir.path(), transport.clone());

    let params = DownloadParams::new(ResourceLocation::new(URL), dir.path().join("archive.bin"))
        .remote_info(RemoteFileInfo::new(2_000, true))
        .segments(vec![Segment::restore(0, 0, 100, 2_000).unwrap()]);
    let download = manager.add(params, true).await.unwrap();

    assert_eq!(download.wait_settled().await, DownloaderState::Error);
}

#[tokio::test]
async fn cancel_discards_the_partial_file_and_is_final() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(pattern(20_000)).slow(100, Duration::from_millis(5)));
    let manager = manager(dir.path(), transport.clone());

    let target = dir.path().join("archive.bin");
    let params = DownloadParams::new(ResourceLocation::new(URL), &target)
        .remote_info(RemoteFileInfo::new(20_000, true))
        .requested_segments(2);
    let download = manager.add(params, true).await.unwrap();
    assert!(wait_until(|| part_path(&target).exists()).await);

    download.cancel().await.unwrap();
    assert_eq!(download.state(), DownloaderState::Cancelled);
    assert!(!part_path(&target).exists());
    assert!(!target.exists());

    assert!(matches!(download.resume().await, Err(EngineError::InvalidState(_))));
    assert!(matches!(download.start().await, Err(EngineError::InvalidState(_))));
    download.pause().await.unwrap();
    assert_eq!(download.state(), DownloaderState::Cancelled);
}

#[tokio::test]
async fn state_events_arrive_in_transition_order() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(pattern(3_000)));
    let manager = manager(dir.path(), transport.clone());
    let mut events = manager.events().subscribe();

    let params = DownloadParams::new(ResourceLocation::new(URL), dir.path().join("archive.bin"))
        .remote_info(RemoteFileInfo::new(3_000, true))
        .requested_segments(3);
    let download = manager.add(params, true).await.unwrap();
    assert_eq!(download.wait_settled().await, DownloaderState::Ended);

    let mut transitions = Vec::new();
    let mut completed = Vec::new();
    while let Ok(Ok(event)) = timeout(Duration::from_millis(100), events.recv()).await {
        match event {
            DownloadEvent::StateChanged { download: d, old, new } => {
                assert_eq!(d.id(), download.id());
                transitions.push((old, new));
            }
            DownloadEvent::SegmentComplete { index, .. } => completed.push(index),
            DownloadEvent::Progress { .. } => {}
        }
    }
    assert_eq!(
        transitions,
        vec![
            (DownloaderState::Queued, DownloaderState::Running),
            (DownloaderState::Running, DownloaderState::Ended),
        ]
    );
    completed.sort_unstable();
    assert_eq!(completed, vec![0, 1, 2]);
}

#[tokio::test]
async fn empty_remote_file_completes_immediately() {
    let dir = TempDir::new().unwrap();
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(Vec::new()));
    let manager = manager(dir.path(), transport.clone());

    let target = dir.path().join("empty.bin");
    let download = manager
        .add(DownloadParams::new(ResourceLocation::new(URL), &target), true)
        .await
        .unwrap();

    assert_eq!(download.wait_settled().await, DownloaderState::Ended);
    assert_eq!(std::fs::read(&target).unwrap().len(), 0);
    assert!(transport.requests().is_empty());
}

async fn wait_for_last_byte(download: &warpspeed_engine::Downloader) {
    for _ in 0..1_000_000 {
        if download.progress() == 1.0 {
            return;
        }
        tokio::task::yield_now().await;
    }
    panic!("download never reached its last byte");
}

#[tokio::test]
async fn pause_landing_on_completion_never_loses_the_file() {
    let dir = TempDir::new().unwrap();
    let data = pattern(4 * 1024 * 1024);
    let transport = MockTransport::new();
    let mut resource = MockResource::new(data.clone());
    resource.chunk_size = 64 * 1024;
    transport.serve(URL, resource);
    let manager = manager(dir.path(), transport.clone());

    let target = dir.path().join("archive.bin");
    let params = DownloadParams::new(ResourceLocation::new(URL), &target)
        .remote_info(RemoteFileInfo::new(data.len() as u64, true))
        .requested_segments(1);
    let download = manager.add(params, true).await.unwrap();

    wait_for_last_byte(&download).await;
    download.pause().await.unwrap();
    if download.state() == DownloaderState::Paused {
        download.resume().await.unwrap();
    }

    assert_eq!(download.wait_settled().await, DownloaderState::Ended);
    assert_eq!(std::fs::read(&target).unwrap(), data);
    assert!(!part_path(&target).exists());
    assert!(matches!(download.resume().await, Err(EngineError::InvalidState(_))));
}

#[tokio::test]
async fn pause_all_during_completion_leaves_nothing_to_resume() {
    let dir = TempDir::new().unwrap();
    let data = pattern(2 * 1024 * 1024);
    let transport = MockTransport::new();
    let mut resource = MockResource::new(data.clone());
    resource.chunk_size = 64 * 1024;
    transport.serve(URL, resource);
    let manager = manager(dir.path(), transport.clone());

    let target = dir.path().join("archive.bin");
    let params = DownloadParams::new(ResourceLocation::new(URL), &target)
        .remote_info(RemoteFileInfo::new(data.len() as u64, true))
        .requested_segments(2);
    let download = manager.add(params, true).await.unwrap();

    wait_for_last_byte(&download).await;
    manager.pause_all().await.unwrap();
    manager.resume_all().await.unwrap();

    assert_eq!(download.wait_settled().await, DownloaderState::Ended);
    assert_eq!(std::fs::read(&target).unwrap(), data);
}

#[tokio::test]
async fn restarting_a_finalized_download_keeps_the_local_file() {
    let dir = TempDir::new().unwrap();
    let data = pattern(2_000);
    let transport = MockTransport::new();
    transport.serve(URL, MockResource::new(data.clone()));
    let manager = manager(dir.path(), transport.clone());

    // The partial file was renamed into place but the state never reached Ended.
    let target = dir.path().join("archive.bin");
    std::fs::write(&target, &data).unwrap();
    let params = DownloadParams::new(ResourceLocation::new(URL), &target)
        .remote_info(RemoteFileInfo::new(2_000, true))
        .segments(vec![
            Segment::restore(0, 0, 1_000, 1_000).unwrap(),
            Segment::restore(1, 1_000, 2_000, 2_000).unwrap(),
        ]);
    let download = manager.add(params, true).await.unwrap();

    assert_eq!(download.wait_settled().await, DownloaderState::Ended);
    assert_eq!(std::fs::read(&target).unwrap(), data);
    assert!(!part_path(&target).exists());
    assert!(transport.requests().is_empty());
}
