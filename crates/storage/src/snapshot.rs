// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot persistence for crash recovery.
//!
//! Snapshots store the complete store state at a point in time, identified
//! by the WAL sequence number. Recovery loads the snapshot and replays WAL
//! entries after that sequence. Snapshots are zstd-compressed JSON written
//! atomically (tmp + fsync + rename).

use crate::state::StoreState;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

/// zstd compression level for snapshots (3 is the zstd default).
const COMPRESSION_LEVEL: i32 = 3;

/// Errors that can occur in snapshot operations
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A snapshot of the store state at a point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    /// WAL sequence number at the time of snapshot
    pub seq: u64,
    /// The complete store state
    pub state: StoreState,
    /// When this snapshot was created
    pub created_at: DateTime<Utc>,
}

impl Snapshot {
    /// Create a new snapshot.
    pub fn new(seq: u64, state: StoreState) -> Self {
        Self {
            seq,
            state,
            created_at: Utc::now(),
        }
    }

    /// Save snapshot atomically (write to .tmp, fsync, then rename).
    pub fn save(&self, path: &Path) -> Result<(), SnapshotError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let tmp_path = path.with_extension("tmp");

        {
            let file = File::create(&tmp_path)?;
            let mut encoder = zstd::Encoder::new(BufWriter::new(file), COMPRESSION_LEVEL)?;
            serde_json::to_writer(&mut encoder, self)?;
            let writer = encoder.finish()?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }

        fs::rename(&tmp_path, path)?;

        Ok(())
    }

    /// Load snapshot if it exists.
    ///
    /// Returns `Ok(None)` if the file doesn't exist or is corrupt. Corrupt
    /// snapshots are moved to a `.bak` file so the store can recover via
    /// WAL replay.
    pub fn load(path: &Path) -> Result<Option<Self>, SnapshotError> {
        if !path.exists() {
            return Ok(None);
        }

        let file = File::open(path)?;
        let decoder = match zstd::Decoder::new(BufReader::new(file)) {
            Ok(d) => d,
            Err(e) => return Self::quarantine(path, &e.to_string()),
        };
        match serde_json::from_reader(decoder) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => Self::quarantine(path, &e.to_string()),
        }
    }

    /// Non-mutating load: a missing or corrupt snapshot reads as `None`
    /// without touching the file (used by read-only observers while
    /// another process owns the store).
    pub fn peek(path: &Path) -> Option<Self> {
        let file = File::open(path).ok()?;
        let decoder = zstd::Decoder::new(BufReader::new(file)).ok()?;
        serde_json::from_reader(decoder).ok()
    }

    fn quarantine(path: &Path, reason: &str) -> Result<Option<Self>, SnapshotError> {
        let bak_path = rotate_bak_path(path);
        warn!(
            error = %reason,
            path = %path.display(),
            bak = %bak_path.display(),
            "Corrupt snapshot, moving to .bak and starting fresh",
        );
        fs::rename(path, &bak_path)?;
        Ok(None)
    }
}

const MAX_BAK_FILES: u32 = 3;

/// Pick the next `.bak` / `.bak.N` path, rotating older backups out.
///
/// Keeps up to [`MAX_BAK_FILES`] backups: `.bak`, `.bak.2`, `.bak.3`.
/// The oldest backup is removed when the limit is reached.
pub(crate) fn rotate_bak_path(path: &Path) -> PathBuf {
    let bak = |n: u32| {
        if n == 1 {
            path.with_extension("bak")
        } else {
            path.with_extension(format!("bak.{n}"))
        }
    };

    let oldest = bak(MAX_BAK_FILES);
    if oldest.exists() {
        let _ = fs::remove_file(&oldest);
    }

    for n in (1..MAX_BAK_FILES).rev() {
        let src = bak(n);
        if src.exists() {
            let _ = fs::rename(&src, bak(n + 1));
        }
    }

    bak(1)
}

#[cfg(test)]
#[path = "snapshot_tests.rs"]
mod tests;
