// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task events and agent lifecycle callback events.

use crate::task::Task;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of change a task event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskEventKind {
    Created,
    Updated,
    Deleted,
    StatusChanged,
}

/// A change notification broadcast on the global task-event stream.
///
/// Events are emitted only after the corresponding store write has
/// committed, so a subscriber never observes a phantom state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEvent {
    pub kind: TaskEventKind,
    pub task: Task,
}

impl TaskEvent {
    pub fn new(kind: TaskEventKind, task: Task) -> Self {
        Self { kind, task }
    }
}

/// Lifecycle callback events delivered by the agent's hook configuration.
///
/// The agent invokes the host binary with `--event <name>`; the names here
/// match the agent's own hook vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookEvent {
    PreToolUse,
    PostToolUse,
    Notification,
    Stop,
    PreCompact,
}

impl HookEvent {
    pub const ALL: [HookEvent; 5] = [
        HookEvent::PreToolUse,
        HookEvent::PostToolUse,
        HookEvent::Notification,
        HookEvent::Stop,
        HookEvent::PreCompact,
    ];

    /// The event name as the agent spells it.
    pub fn as_str(&self) -> &'static str {
        match self {
            HookEvent::PreToolUse => "PreToolUse",
            HookEvent::PostToolUse => "PostToolUse",
            HookEvent::Notification => "Notification",
            HookEvent::Stop => "Stop",
            HookEvent::PreCompact => "PreCompact",
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for HookEvent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PreToolUse" => Ok(HookEvent::PreToolUse),
            "PostToolUse" => Ok(HookEvent::PostToolUse),
            "Notification" => Ok(HookEvent::Notification),
            "Stop" => Ok(HookEvent::Stop),
            "PreCompact" => Ok(HookEvent::PreCompact),
            other => Err(format!("unknown hook event: {}", other)),
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
