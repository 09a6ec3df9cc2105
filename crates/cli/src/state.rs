// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! State directory resolution and the daemon single-instance lock.

use anyhow::{bail, Context};
use fs2::FileExt;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Resolve the state directory: `$TASKYOU_STATE_DIR`, else the platform
/// state dir, else `~/.local/state/taskyou`.
pub fn state_dir() -> anyhow::Result<PathBuf> {
    let dir = match std::env::var("TASKYOU_STATE_DIR") {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|h| h.join(".local/state")))
            .context("no home directory")?
            .join("taskyou"),
    };
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("creating state dir {}", dir.display()))?;
    Ok(dir)
}

/// Guard holding the daemon's exclusive lock; released on drop.
pub struct DaemonLock {
    _file: File,
}

/// Take the single-instance lock, writing our pid into the lock file.
pub fn acquire_daemon_lock(state_dir: &Path) -> anyhow::Result<DaemonLock> {
    let path = state_dir.join("daemon.lock");
    let mut file = File::options()
        .create(true)
        .write(true)
        .truncate(false)
        .open(&path)
        .with_context(|| format!("opening {}", path.display()))?;

    if file.try_lock_exclusive().is_err() {
        let pid = std::fs::read_to_string(&path).unwrap_or_default();
        bail!(
            "taskyou daemon is already running{}",
            if pid.trim().is_empty() {
                String::new()
            } else {
                format!(" (pid {})", pid.trim())
            }
        );
    }

    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(DaemonLock { _file: file })
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
