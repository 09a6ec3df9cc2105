// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Compaction summaries: captured transcript snapshots.

use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A captured transcript snapshot for one agent session.
///
/// Rows are append-only; the newest row for a task is the distillation
/// pipeline's input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompactionSummary {
    pub id: i64,
    pub task_id: TaskId,
    pub session_id: String,
    /// Free-form trigger description (e.g. "auto", "pre_compact").
    pub trigger: String,
    #[serde(default)]
    pub pre_token_count: u64,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}
