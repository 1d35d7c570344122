// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::io::Write as _;
use tempfile::tempdir;

#[test]
fn put_get_delete() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();

    assert_eq!(store.get("workspace/w1"), None);
    store.put("workspace/w1", b"alpha".to_vec()).unwrap();
    assert_eq!(store.get("workspace/w1"), Some(b"alpha".to_vec()));

    store.delete("workspace/w1").unwrap();
    assert_eq!(store.get("workspace/w1"), None);
}

#[test]
fn deleting_absent_key_is_a_noop() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    store.delete("no/such/key").unwrap();
}

#[test]
fn writes_survive_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = StateStore::open(dir.path()).unwrap();
        store.put("workspace/w1", b"alpha".to_vec()).unwrap();
        store.put("workspace/w2", b"beta".to_vec()).unwrap();
        store.delete("workspace/w1").unwrap();
        // No compact: reopening must replay the journal.
    }
    let store = StateStore::open(dir.path()).unwrap();
    assert_eq!(store.get("workspace/w1"), None);
    assert_eq!(store.get("workspace/w2"), Some(b"beta".to_vec()));
}

#[test]
fn compact_then_reopen() {
    let dir = tempdir().unwrap();
    {
        let store = StateStore::open(dir.path()).unwrap();
        store.put("policy/balanced", b"p".to_vec()).unwrap();
        store.compact().unwrap();
        store.put("policy/aggressive", b"q".to_vec()).unwrap();
    }
    let store = StateStore::open(dir.path()).unwrap();
    assert_eq!(store.get("policy/balanced"), Some(b"p".to_vec()));
    assert_eq!(store.get("policy/aggressive"), Some(b"q".to_vec()));
}

#[test]
fn versions_start_at_one_and_increment() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();

    assert_eq!(store.version("k"), 0, "absent key has version 0");
    store.put("k", b"1".to_vec()).unwrap();
    assert_eq!(store.version("k"), 1);
    store.put("k", b"2".to_vec()).unwrap();
    assert_eq!(store.version("k"), 2);
}

#[test]
fn versions_survive_compaction() {
    let dir = tempdir().unwrap();
    {
        let store = StateStore::open(dir.path()).unwrap();
        store.put("k", b"1".to_vec()).unwrap();
        store.put("k", b"2".to_vec()).unwrap();
        store.compact().unwrap();
    }
    let store = StateStore::open(dir.path()).unwrap();
    assert_eq!(store.version("k"), 2);
}

#[test]
fn transact_commits_when_versions_hold() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    store.put("a", b"1".to_vec()).unwrap();

    let outcome = store
        .transact(
            &[("a", 1), ("b", 0)],
            vec![
                WriteOp::Put { key: "b".to_string(), value: b"2".to_vec() },
                WriteOp::Delete { key: "a".to_string() },
            ],
        )
        .unwrap();
    assert_eq!(outcome, TransactOutcome::Committed);
    assert_eq!(store.get("a"), None);
    assert_eq!(store.get("b"), Some(b"2".to_vec()));
}

#[test]
fn transact_conflicts_on_stale_version() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    store.put("a", b"1".to_vec()).unwrap();
    store.put("a", b"2".to_vec()).unwrap();

    let outcome = store
        .transact(&[("a", 1)], vec![WriteOp::Delete { key: "a".to_string() }])
        .unwrap();
    assert_eq!(outcome, TransactOutcome::Conflict);
    assert_eq!(store.get("a"), Some(b"2".to_vec()), "conflicting writes must not apply");
}

#[test]
fn transact_conflicts_when_expected_key_appeared() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    store.put("a", b"1".to_vec()).unwrap();

    // Caller believed "a" was absent.
    let outcome = store
        .transact(&[("a", 0)], vec![WriteOp::Put { key: "a".to_string(), value: b"x".to_vec() }])
        .unwrap();
    assert_eq!(outcome, TransactOutcome::Conflict);
}

#[test]
fn list_prefix_is_ordered_and_scoped() {
    let dir = tempdir().unwrap();
    let store = StateStore::open(dir.path()).unwrap();
    store.put("workspace/b", b"2".to_vec()).unwrap();
    store.put("workspace/a", b"1".to_vec()).unwrap();
    store.put("volume/shared/x", b"3".to_vec()).unwrap();

    let all = store.list_prefix("workspace/");
    let keys: Vec<&str> = all.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["workspace/a", "workspace/b"]);
}

#[test]
fn torn_journal_tail_is_dropped() {
    let dir = tempdir().unwrap();
    {
        let store = StateStore::open(dir.path()).unwrap();
        store.put("k", b"1".to_vec()).unwrap();
    }
    // Simulate a crash mid-append.
    let journal = dir.path().join("journal.log");
    let mut file = std::fs::OpenOptions::new().append(true).open(&journal).unwrap();
    file.write_all(b"[{\"op\":\"put\",\"key\":\"k\"").unwrap();

    let store = StateStore::open(dir.path()).unwrap();
    assert_eq!(store.get("k"), Some(b"1".to_vec()));
}

#[test]
fn corrupt_journal_body_is_reported() {
    let dir = tempdir().unwrap();
    {
        let store = StateStore::open(dir.path()).unwrap();
        store.put("k", b"1".to_vec()).unwrap();
    }
    let journal = dir.path().join("journal.log");
    let good = std::fs::read_to_string(&journal).unwrap();
    std::fs::write(&journal, format!("garbage\n{good}")).unwrap();

    match StateStore::open(dir.path()) {
        Err(StoreError::Corrupt(_)) => {}
        other => panic!("expected Corrupt, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn corrupt_snapshot_is_reported() {
    let dir = tempdir().unwrap();
    {
        let store = StateStore::open(dir.path()).unwrap();
        store.put("k", b"1".to_vec()).unwrap();
        store.compact().unwrap();
    }
    std::fs::write(dir.path().join("snapshot.json.zst"), b"not zstd").unwrap();

    match StateStore::open(dir.path()) {
        Err(StoreError::Corrupt(_)) => {}
        other => panic!("expected Corrupt, got {:?}", other.map(|_| ())),
    }
}
