// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use outpost_core::{FakeClock, Workspace, WorkspaceState};
use tempfile::tempdir;

fn registry(dir: &std::path::Path) -> Registry<FakeClock> {
    let store = Arc::new(StateStore::open(dir).unwrap());
    Registry::new(store, FakeClock::new())
}

#[test]
fn create_then_get() {
    let dir = tempdir().unwrap();
    let registry = registry(dir.path());
    let ws = Workspace::builder().name("w1").build();

    registry.create(&ws).unwrap();
    assert_eq!(registry.get("w1").unwrap(), ws);
}

#[test]
fn duplicate_create_conflicts() {
    let dir = tempdir().unwrap();
    let registry = registry(dir.path());
    let ws = Workspace::builder().name("w1").build();

    registry.create(&ws).unwrap();
    assert!(matches!(registry.create(&ws), Err(RegistryError::Conflict(_))));
}

#[test]
fn get_unknown_is_not_found() {
    let dir = tempdir().unwrap();
    let registry = registry(dir.path());
    assert!(matches!(registry.get("nope"), Err(RegistryError::NotFound(_))));
}

#[test]
fn list_filters_by_state() {
    let dir = tempdir().unwrap();
    let registry = registry(dir.path());
    registry
        .create(&Workspace::builder().name("a").state(WorkspaceState::Running).build())
        .unwrap();
    registry
        .create(&Workspace::builder().name("b").state(WorkspaceState::Stopped).build())
        .unwrap();

    assert_eq!(registry.list(None).unwrap().len(), 2);
    let running = registry.list(Some(WorkspaceState::Running)).unwrap();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].name, "a");
}

#[test]
fn update_with_stale_tag_fails() {
    let dir = tempdir().unwrap();
    let registry = registry(dir.path());
    let ws = Workspace::builder().name("w1").last_transition_at_ms(1_000_000).build();
    registry.create(&ws).unwrap();

    // Another writer transitions the workspace.
    registry
        .update_with("w1", None, |ws| {
            ws.transition(WorkspaceState::Stopping, 2_000_000);
            Ok(())
        })
        .unwrap();

    // A caller still holding the old tag must fail.
    let result = registry.update_with("w1", Some(1_000_000), |_| Ok(()));
    assert!(matches!(result, Err(RegistryError::Stale(_))));

    // Re-reading and retrying with the fresh tag succeeds.
    let fresh = registry.get("w1").unwrap();
    registry
        .update_with("w1", Some(fresh.last_transition_at_ms), |ws| {
            ws.hourly_rate = 1.0;
            Ok(())
        })
        .unwrap();
}

#[test]
fn terminated_records_are_immutable() {
    let dir = tempdir().unwrap();
    let registry = registry(dir.path());
    let ws = Workspace::builder().name("w1").state(WorkspaceState::Terminated).build();
    registry.create(&ws).unwrap();

    let result = registry.update_with("w1", None, |ws| {
        ws.hourly_rate = 99.0;
        Ok(())
    });
    assert!(matches!(result, Err(RegistryError::Terminated(_))));
}

#[test]
fn counts_by_state() {
    let dir = tempdir().unwrap();
    let registry = registry(dir.path());
    for (name, state) in [
        ("a", WorkspaceState::Running),
        ("b", WorkspaceState::Running),
        ("c", WorkspaceState::Hibernated),
    ] {
        registry.create(&Workspace::builder().name(name).state(state).build()).unwrap();
    }
    let counts = registry.counts_by_state().unwrap();
    assert_eq!(counts.get("running"), Some(&2));
    assert_eq!(counts.get("hibernated"), Some(&1));
}

#[test]
fn remove_deletes_the_record() {
    let dir = tempdir().unwrap();
    let registry = registry(dir.path());
    registry.create(&Workspace::builder().name("w1").build()).unwrap();
    registry.remove("w1").unwrap();
    assert!(matches!(registry.get("w1"), Err(RegistryError::NotFound(_))));
}
