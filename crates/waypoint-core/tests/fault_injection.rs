//! Behavior when the remote store is unreachable or rejects writes.

use std::sync::Arc;

use waypoint_core::cache::SnapshotCache;
use waypoint_core::error::SyncError;
use waypoint_core::gateway::{LoadSource, SyncGateway};
use waypoint_core::model::{Period, starter_initiatives};
use waypoint_core::remote::memory::MemoryRemote;
use waypoint_core::session::{NoticeLevel, Session, SessionHandle, SessionOptions};
use waypoint_core::view::ViewFilter;

fn start(remote: &Arc<MemoryRemote>, cache: Option<SnapshotCache>) -> SessionHandle {
    let mut options =
        SessionOptions::new(ViewFilter::new(Period::new(1, 2026))).with_subscribe(false);
    if let Some(cache) = cache {
        options = options.with_cache(cache);
    }
    let (session, handle) = Session::new(SyncGateway::new(remote.clone()), options);
    tokio::spawn(session.run());
    handle
}

#[tokio::test]
async fn unreachable_remote_falls_back_to_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path().join("snapshot.json"));
    let remote = Arc::new(MemoryRemote::new());

    let first = start(&remote, Some(cache.clone()));
    first.reload().await.unwrap();
    let deleted = first.records().await.unwrap()[0].id.clone();
    first.delete(deleted.clone()).await.unwrap();
    let expected = first.records().await.unwrap();
    first.shutdown().await;

    remote.set_offline(true);
    let second = start(&remote, Some(cache));
    let mut notices = second.notices();

    assert_eq!(second.reload().await, Ok(LoadSource::Cache));
    assert_eq!(second.records().await.unwrap(), expected);
    assert_eq!(second.view().summary.total, 5);

    let notice = notices.recv().await.unwrap();
    assert_eq!(notice.level, NoticeLevel::Error);
    assert_eq!(notice.message, "Failed to load data. Using local cache.");
}

#[tokio::test]
async fn unreachable_remote_without_snapshot_is_an_error() {
    let remote = Arc::new(MemoryRemote::new());
    remote.set_offline(true);
    let handle = start(&remote, None);

    assert!(matches!(
        handle.reload().await,
        Err(SyncError::RemoteUnavailable(_))
    ));
    assert!(handle.records().await.unwrap().is_empty());
}

#[tokio::test]
async fn corrupt_snapshot_is_treated_as_missing() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("snapshot.json");
    std::fs::write(&path, "garbage").unwrap();

    let remote = Arc::new(MemoryRemote::new());
    remote.set_offline(true);
    let handle = start(&remote, Some(SnapshotCache::new(&path)));

    assert!(matches!(
        handle.reload().await,
        Err(SyncError::RemoteUnavailable(_))
    ));
}

#[tokio::test]
async fn failed_seed_keeps_previous_records() {
    let remote = Arc::new(MemoryRemote::new());
    let handle = start(&remote, None);
    let mut notices = handle.notices();

    remote.fail_next_writes(1);
    assert!(matches!(
        handle.reload().await,
        Err(SyncError::WriteFailed(_))
    ));
    assert!(handle.records().await.unwrap().is_empty());
    assert_eq!(notices.recv().await.unwrap().message, "Failed to seed data");

    assert_eq!(handle.reload().await, Ok(LoadSource::Seeded));
    assert_eq!(remote.len(), starter_initiatives().len());
}

#[tokio::test]
async fn failed_writes_touch_neither_store_nor_snapshot() {
    let dir = tempfile::tempdir().unwrap();
    let cache = SnapshotCache::new(dir.path().join("snapshot.json"));
    let remote = Arc::new(MemoryRemote::new());
    let handle = start(&remote, Some(cache.clone()));
    handle.reload().await.unwrap();
    let before = handle.records().await.unwrap();

    remote.fail_next_writes(2);
    let target = before[0].clone();
    let mut patch = target.fields.clone();
    patch.progress = 99;
    assert!(matches!(
        handle.update(target.id.clone(), patch).await,
        Err(SyncError::WriteFailed(_))
    ));
    assert!(matches!(
        handle.delete(target.id.clone()).await,
        Err(SyncError::WriteFailed(_))
    ));

    assert_eq!(handle.records().await.unwrap(), before);
    assert_eq!(cache.load().unwrap().unwrap().initiatives, before);
}
