// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::Harness;
use outpost_provider::FakeCall;

#[tokio::test]
async fn shared_volume_crud() {
    let h = Harness::new();
    let volume = h.volumes.create_shared("datasets", 1 << 30).await.unwrap();
    assert_eq!(volume.provider_id, "fs-datasets");
    assert!(volume.mounted_on.is_empty());

    assert_eq!(h.volumes.list_shared().unwrap().len(), 1);
    h.volumes.delete_shared("datasets").await.unwrap();
    assert!(h.volumes.list_shared().unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_shared_volume_conflicts() {
    let h = Harness::new();
    h.volumes.create_shared("datasets", 1 << 30).await.unwrap();
    assert!(matches!(
        h.volumes.create_shared("datasets", 1 << 30).await,
        Err(VolumeError::Conflict(_))
    ));
}

#[tokio::test]
async fn mount_tracks_both_records() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.launch_running("w2").await;
    h.volumes.create_shared("datasets", 1 << 30).await.unwrap();

    let volume = h.volumes.mount_shared("datasets", "w1").unwrap();
    assert_eq!(volume.mounted_on, vec!["w1"]);
    assert_eq!(h.registry.get("w1").unwrap().shared_volumes, vec!["datasets"]);

    // Shared volumes mount concurrently.
    let volume = h.volumes.mount_shared("datasets", "w2").unwrap();
    assert_eq!(volume.mounted_on, vec!["w1", "w2"]);

    // Mounting twice is idempotent on both sides.
    h.volumes.mount_shared("datasets", "w1").unwrap();
    assert_eq!(h.volumes.get_shared("datasets").unwrap().mounted_on, vec!["w1", "w2"]);
    assert_eq!(h.registry.get("w1").unwrap().shared_volumes, vec!["datasets"]);
}

#[tokio::test]
async fn unmount_clears_both_records() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.volumes.create_shared("datasets", 1 << 30).await.unwrap();
    h.volumes.mount_shared("datasets", "w1").unwrap();

    let volume = h.volumes.unmount_shared("datasets", "w1").unwrap();
    assert!(volume.mounted_on.is_empty());
    assert!(h.registry.get("w1").unwrap().shared_volumes.is_empty());

    // Unmounting again is a no-op.
    h.volumes.unmount_shared("datasets", "w1").unwrap();
}

#[tokio::test]
async fn mount_requires_an_existing_workspace() {
    let h = Harness::new();
    h.volumes.create_shared("datasets", 1 << 30).await.unwrap();
    assert!(matches!(
        h.volumes.mount_shared("datasets", "ghost"),
        Err(VolumeError::Registry(RegistryError::NotFound(_)))
    ));
    assert!(h.volumes.get_shared("datasets").unwrap().mounted_on.is_empty());
}

#[tokio::test]
async fn mounted_shared_volume_refuses_deletion() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.volumes.create_shared("datasets", 1 << 30).await.unwrap();
    h.volumes.mount_shared("datasets", "w1").unwrap();

    assert!(matches!(
        h.volumes.delete_shared("datasets").await,
        Err(VolumeError::Mounted(_))
    ));

    h.volumes.unmount_shared("datasets", "w1").unwrap();
    h.volumes.delete_shared("datasets").await.unwrap();
}

#[tokio::test]
async fn block_volume_single_writer() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.launch_running("w2").await;
    h.volumes.create_block("scratch", 1 << 33).await.unwrap();

    let volume = h.volumes.attach_block("scratch", "w1").await.unwrap();
    assert_eq!(volume.attached_to.as_deref(), Some("w1"));
    assert_eq!(h.registry.get("w1").unwrap().block_volumes, vec!["scratch"]);

    // Re-attaching to the same workspace is idempotent.
    h.volumes.attach_block("scratch", "w1").await.unwrap();
    assert_eq!(h.registry.get("w1").unwrap().block_volumes, vec!["scratch"]);

    // A second writer is refused without touching the provider again.
    let attach_calls_before = h
        .provider
        .calls()
        .iter()
        .filter(|c| matches!(c, FakeCall::AttachBlockVolume { .. }))
        .count();
    assert!(matches!(
        h.volumes.attach_block("scratch", "w2").await,
        Err(VolumeError::Attached { .. })
    ));
    let attach_calls_after = h
        .provider
        .calls()
        .iter()
        .filter(|c| matches!(c, FakeCall::AttachBlockVolume { .. }))
        .count();
    assert_eq!(attach_calls_before, attach_calls_after);
    assert!(h.registry.get("w2").unwrap().block_volumes.is_empty());
}

#[tokio::test]
async fn detach_clears_the_workspace_record() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.volumes.create_block("scratch", 1 << 33).await.unwrap();
    h.volumes.attach_block("scratch", "w1").await.unwrap();

    let volume = h.volumes.detach_block("scratch").await.unwrap();
    assert!(volume.attached_to.is_none());
    assert!(h.registry.get("w1").unwrap().block_volumes.is_empty());
}

#[tokio::test]
async fn attached_block_volume_refuses_deletion() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.volumes.create_block("scratch", 1 << 33).await.unwrap();
    h.volumes.attach_block("scratch", "w1").await.unwrap();

    assert!(matches!(
        h.volumes.delete_block("scratch").await,
        Err(VolumeError::Attached { .. })
    ));

    h.volumes.detach_block("scratch").await.unwrap();
    h.volumes.delete_block("scratch").await.unwrap();
}

#[tokio::test]
async fn detach_is_idempotent() {
    let h = Harness::new();
    h.volumes.create_block("scratch", 1 << 33).await.unwrap();
    let volume = h.volumes.detach_block("scratch").await.unwrap();
    assert!(volume.attached_to.is_none());
}

#[tokio::test]
async fn detach_all_for_clears_every_holding() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.volumes.create_block("a", 1 << 30).await.unwrap();
    h.volumes.create_block("b", 1 << 30).await.unwrap();
    h.volumes.attach_block("a", "w1").await.unwrap();
    h.volumes.attach_block("b", "w1").await.unwrap();

    h.volumes.detach_all_for("w1").await.unwrap();
    assert!(h.volumes.get_block("a").unwrap().attached_to.is_none());
    assert!(h.volumes.get_block("b").unwrap().attached_to.is_none());
    assert!(h.registry.get("w1").unwrap().block_volumes.is_empty());
}

#[tokio::test]
async fn unmount_all_for_releases_shared_mounts() {
    let h = Harness::new();
    h.launch_running("w1").await;
    h.launch_running("w2").await;
    h.volumes.create_shared("datasets", 1 << 30).await.unwrap();
    h.volumes.mount_shared("datasets", "w1").unwrap();
    h.volumes.mount_shared("datasets", "w2").unwrap();

    h.volumes.unmount_all_for("w1").unwrap();
    assert_eq!(h.volumes.get_shared("datasets").unwrap().mounted_on, vec!["w2"]);
    assert!(h.registry.get("w1").unwrap().shared_volumes.is_empty());
    assert_eq!(h.registry.get("w2").unwrap().shared_volumes, vec!["datasets"]);
}
