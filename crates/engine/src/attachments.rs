// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Attachment staging.
//!
//! Files dropped under `<state>/attachments/{task_id}/` are copied into a
//! fresh temp directory before launch so the agent sees stable paths that
//! outlive edits to the staging area. The temp directory is removed when
//! the returned guard drops.

use std::path::{Path, PathBuf};
use tempfile::TempDir;
use ty_core::TaskId;

/// Materialized attachments: the guard owns the temp directory.
pub struct Materialized {
    pub paths: Vec<PathBuf>,
    _dir: Option<TempDir>,
}

impl Materialized {
    pub fn empty() -> Self {
        Self {
            paths: Vec::new(),
            _dir: None,
        }
    }
}

/// The staging directory for a task.
pub fn staging_dir(state_dir: &Path, task_id: TaskId) -> PathBuf {
    state_dir.join("attachments").join(task_id.to_string())
}

/// Copy staged attachments into a temp directory.
pub fn materialize(state_dir: &Path, task_id: TaskId) -> std::io::Result<Materialized> {
    let staging = staging_dir(state_dir, task_id);
    if !staging.is_dir() {
        return Ok(Materialized::empty());
    }

    let dir = tempfile::Builder::new()
        .prefix(&format!("taskyou-attach-{}-", task_id))
        .tempdir()?;

    let mut paths = Vec::new();
    for entry in std::fs::read_dir(&staging)? {
        let entry = entry?;
        if !entry.path().is_file() {
            continue;
        }
        let target = dir.path().join(entry.file_name());
        std::fs::copy(entry.path(), &target)?;
        paths.push(target);
    }
    paths.sort();

    Ok(Materialized {
        paths,
        _dir: Some(dir),
    })
}

#[cfg(test)]
#[path = "attachments_tests.rs"]
mod tests;
