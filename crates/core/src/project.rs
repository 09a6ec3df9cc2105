// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Projects and project-scoped memories.

use crate::task::TaskId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A registered project: a named VCS working tree tasks run against.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Unique short name.
    pub name: String,
    /// Absolute path; must be a git working tree.
    pub path: PathBuf,
    #[serde(default)]
    pub aliases: Vec<String>,
    /// Natural-language instructions injected into prompts.
    #[serde(default)]
    pub instructions: String,
    /// Per-project agent-config override directory, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_config_dir: Option<PathBuf>,
}

impl Project {
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            aliases: Vec::new(),
            instructions: String::new(),
            agent_config_dir: None,
        }
    }
}

/// Category of a project memory.
///
/// Prompt injection order follows the declaration order here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    Pattern,
    Context,
    Decision,
    Gotcha,
    General,
}

impl MemoryCategory {
    /// All categories, in prompt-injection order.
    pub const ALL: [MemoryCategory; 5] = [
        MemoryCategory::Pattern,
        MemoryCategory::Context,
        MemoryCategory::Decision,
        MemoryCategory::Gotcha,
        MemoryCategory::General,
    ];

    /// Normalize a free-form category name from distillation output.
    ///
    /// Plural and synonym forms collapse onto the canonical category;
    /// anything unrecognized lands in `General`.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "pattern" | "patterns" => MemoryCategory::Pattern,
            "context" | "background" => MemoryCategory::Context,
            "decision" | "decisions" | "choice" | "choices" => MemoryCategory::Decision,
            "gotcha" | "gotchas" | "pitfall" | "pitfalls" | "warning" | "warnings" => {
                MemoryCategory::Gotcha
            }
            _ => MemoryCategory::General,
        }
    }
}

impl fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MemoryCategory::Pattern => "pattern",
            MemoryCategory::Context => "context",
            MemoryCategory::Decision => "decision",
            MemoryCategory::Gotcha => "gotcha",
            MemoryCategory::General => "general",
        };
        write!(f, "{}", s)
    }
}

/// A short project-scoped learning, injected into future prompts.
///
/// Mutated only by the post-run pipeline; read-only everywhere else.
/// Memories reference their source task by id only, never by pointer,
/// which keeps tasks and memories free of reference cycles.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectMemory {
    pub id: i64,
    pub project: String,
    pub category: MemoryCategory,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_task_id: Option<TaskId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
