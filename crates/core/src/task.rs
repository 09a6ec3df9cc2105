// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task record and status state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Store-assigned monotonic task identifier.
pub type TaskId = i64;

/// First port in the shared allocation range.
pub const PORT_RANGE_START: u16 = 3100;

/// Last port in the shared allocation range (inclusive).
pub const PORT_RANGE_END: u16 = 4099;

/// Lifecycle status of a task.
///
/// Transitions: backlog → queued → processing → (blocked ↔ processing)
/// → done | archived. Backlog is the re-entry state on interrupt; blocked
/// returns to processing via retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Backlog,
    Queued,
    Processing,
    Blocked,
    Done,
    Archived,
}

impl TaskStatus {
    /// Whether the task has reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Archived)
    }

    /// Whether `next` is a legal direct transition from this status.
    ///
    /// Interrupt (anything → backlog) and archive are always allowed.
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        use TaskStatus::*;
        if next == Backlog || next == Archived {
            return true;
        }
        matches!(
            (self, next),
            (Backlog, Queued)
                | (Blocked, Queued)
                | (Queued, Processing)
                | (Processing, Blocked)
                | (Blocked, Processing)
                | (Processing, Done)
                | (Blocked, Done)
                | (Backlog, Done)
        )
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Backlog => "backlog",
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Blocked => "blocked",
            TaskStatus::Done => "done",
            TaskStatus::Archived => "archived",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "backlog" => Ok(TaskStatus::Backlog),
            "queued" => Ok(TaskStatus::Queued),
            "processing" => Ok(TaskStatus::Processing),
            "blocked" => Ok(TaskStatus::Blocked),
            "done" => Ok(TaskStatus::Done),
            "archived" => Ok(TaskStatus::Archived),
            other => Err(format!("unknown task status: {}", other)),
        }
    }
}

/// A persistent task record.
///
/// The store is the one mutator of these fields; in-process copies are
/// never cached longer than one scheduler tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub status: TaskStatus,
    /// Task type name, resolved against the task-type catalog.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_type: Option<String>,
    /// Short project name this task belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    /// Absolute worktree path. Once set and existing on disk it is never
    /// recomputed from the title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub worktree_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    /// Allocated port in [3100, 4099]; 0 if unallocated.
    #[serde(default)]
    pub port: u16,
    /// Opaque agent session identifier; semantics per adapter.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_session_id: Option<String>,
    /// Multiplexer window identifier owning this task's agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mux_window: Option<String>,
    /// Multiplexer session that owns the window.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mux_session: Option<String>,
    #[serde(default)]
    pub dangerous_mode: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pr_number: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheduled_at: Option<DateTime<Utc>>,
    /// Recurrence descriptor ("daily", "every 2h", ...), parsed lazily.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recurrence: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_run_at: Option<DateTime<Utc>>,
    /// Distilled summary text from the post-run pipeline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_distilled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// Create a new backlog task.
    pub fn new(id: TaskId, title: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: title.into(),
            body: String::new(),
            status: TaskStatus::Backlog,
            task_type: None,
            project: None,
            worktree_path: None,
            branch: None,
            port: 0,
            agent_session_id: None,
            mux_window: None,
            mux_session: None,
            dangerous_mode: false,
            pr_url: None,
            pr_number: None,
            scheduled_at: None,
            recurrence: None,
            last_run_at: None,
            summary: None,
            last_distilled_at: None,
            created_at: now,
            updated_at: now,
            started_at: None,
            completed_at: None,
        }
    }

    /// The deterministic multiplexer window name for this task.
    pub fn window_name(&self) -> String {
        window_name(self.id)
    }

    /// Whether the task is too thin to execute without triage guidance.
    pub fn is_under_specified(&self) -> bool {
        self.project.is_none()
            || self.task_type.is_none()
            || (self.body.len() < 20 && self.title.len() < 30)
    }
}

/// Window name for a task id (`task-{id}`).
pub fn window_name(id: TaskId) -> String {
    format!("task-{}", id)
}

/// Parse a task id back out of a `task-{id}` window name.
pub fn task_id_from_window_name(name: &str) -> Option<TaskId> {
    name.strip_prefix("task-")?.parse().ok()
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
