// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only task log entries.

use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a task log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogLineType {
    System,
    Text,
    Tool,
    Error,
    Output,
    Question,
    Relay,
}

impl fmt::Display for LogLineType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LogLineType::System => "system",
            LogLineType::Text => "text",
            LogLineType::Tool => "tool",
            LogLineType::Error => "error",
            LogLineType::Output => "output",
            LogLineType::Question => "question",
            LogLineType::Relay => "relay",
        };
        write!(f, "{}", s)
    }
}

/// One persisted log line, ordered by `id` within a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub id: i64,
    pub task_id: TaskId,
    pub line_type: LogLineType,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Marker line written between executions of the same task.
///
/// The prompt composer scans for this to reconstruct conversation turns.
pub const CONTINUATION_MARKER: &str = "--- Continuation ---";
