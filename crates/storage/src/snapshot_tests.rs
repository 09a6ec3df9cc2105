// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use ty_core::Task;

fn sample_state() -> StoreState {
    let mut state = StoreState::default();
    state.apply(&crate::state::StoreEvent::TaskCreated {
        task: Task::new(1, "snapshot me", Utc::now()),
    });
    state
}

#[test]
fn save_and_load_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.snapshot");

    Snapshot::new(7, sample_state()).save(&path).unwrap();

    let loaded = Snapshot::load(&path).unwrap().expect("snapshot exists");
    assert_eq!(loaded.seq, 7);
    assert_eq!(loaded.state.tasks.len(), 1);
    assert_eq!(loaded.state.tasks[&1].title, "snapshot me");
}

#[test]
fn load_missing_returns_none() {
    let dir = tempfile::tempdir().unwrap();
    let loaded = Snapshot::load(&dir.path().join("nope.snapshot")).unwrap();
    assert!(loaded.is_none());
}

#[test]
fn corrupt_snapshot_moves_to_bak() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.snapshot");
    std::fs::write(&path, b"not a snapshot").unwrap();

    let loaded = Snapshot::load(&path).unwrap();
    assert!(loaded.is_none());
    assert!(!path.exists());
    assert!(path.with_extension("bak").exists());
}

#[test]
fn bak_rotation_keeps_three() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.snapshot");

    for round in 0..5u8 {
        std::fs::write(&path, [round]).unwrap();
        let _ = Snapshot::load(&path).unwrap();
    }

    assert!(path.with_extension("bak").exists());
    assert!(path.with_extension("bak.2").exists());
    assert!(path.with_extension("bak.3").exists());
    assert!(!path.with_extension("bak.4").exists());
}

#[test]
fn save_overwrites_atomically() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("store.snapshot");

    Snapshot::new(1, StoreState::default()).save(&path).unwrap();
    Snapshot::new(2, sample_state()).save(&path).unwrap();

    let loaded = Snapshot::load(&path).unwrap().expect("snapshot exists");
    assert_eq!(loaded.seq, 2);
    assert!(!path.with_extension("tmp").exists());
}
