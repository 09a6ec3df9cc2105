// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable control mailbox for cross-process commands.
//!
//! The store is single-writer (the daemon owns the WAL). Commands that
//! originate in other processes (lifecycle hook invocations, `ty
//! interrupt`, `ty queue`, `ty retry`) are written here as one JSON file
//! per message and drained by the daemon. The scheduler drains every tick
//! and each per-task poll iteration, so a message is applied within about
//! a second. Files are claimed by atomic rename, which makes concurrent
//! drains safe.

use crate::hooks::HookPayload;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use ty_core::{HookEvent, TaskId};

static MSG_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A cross-process command.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlMsg {
    Hook {
        event: HookEvent,
        task_id: TaskId,
        payload: HookPayload,
    },
    Interrupt {
        task_id: TaskId,
    },
    Queue {
        task_id: TaskId,
    },
    Retry {
        task_id: TaskId,
        feedback: Option<String>,
    },
}

/// File-based mailbox under `<state>/control/`.
pub struct Mailbox {
    dir: PathBuf,
}

impl Mailbox {
    pub fn new(state_dir: &Path) -> Self {
        Self {
            dir: state_dir.join("control"),
        }
    }

    /// Durably enqueue a message (tmp write + atomic rename).
    pub fn push(&self, msg: &ControlMsg) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let name = format!(
            "{}-{}-{}.json",
            std::time::SystemTime::now()
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_nanos(),
            std::process::id(),
            MSG_COUNTER.fetch_add(1, Ordering::SeqCst),
        );
        let tmp = self.dir.join(format!(".{}.tmp", name));
        std::fs::write(&tmp, serde_json::to_vec(msg)?)?;
        std::fs::rename(&tmp, self.dir.join(name))?;
        Ok(())
    }

    /// Claim and return all pending messages, oldest first.
    ///
    /// Claiming renames the file away before reading, so two concurrent
    /// drains never both apply the same message. Unparseable files are
    /// discarded with a warning.
    pub fn drain(&self) -> Vec<ControlMsg> {
        let Ok(entries) = std::fs::read_dir(&self.dir) else {
            return Vec::new();
        };

        let mut names: Vec<String> = entries
            .flatten()
            .filter_map(|e| e.file_name().into_string().ok())
            .filter(|n| n.ends_with(".json") && !n.starts_with('.'))
            .collect();
        names.sort();

        let mut messages = Vec::new();
        for name in names {
            let path = self.dir.join(&name);
            let claimed = self.dir.join(format!(".{}.claimed", name));
            if std::fs::rename(&path, &claimed).is_err() {
                // Another drain claimed it first.
                continue;
            }
            match std::fs::read_to_string(&claimed)
                .map_err(|e| e.to_string())
                .and_then(|c| serde_json::from_str(&c).map_err(|e| e.to_string()))
            {
                Ok(msg) => messages.push(msg),
                Err(e) => {
                    tracing::warn!(file = name, error = %e, "discarding malformed control message")
                }
            }
            let _ = std::fs::remove_file(&claimed);
        }
        messages
    }
}

#[cfg(test)]
#[path = "mailbox_tests.rs"]
mod tests;
