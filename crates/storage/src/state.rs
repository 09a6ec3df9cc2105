// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Materialized state built from WAL replay.

use crate::search::SearchIndex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use ty_core::{CompactionSummary, LogEntry, Project, ProjectMemory, Task, TaskId, TaskType};

/// Events that mutate the store.
///
/// Serializes with `{"type": "kind", ...fields}` format. Every event is
/// self-contained (rows carry their own timestamps) so WAL replay is
/// deterministic.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreEvent {
    #[serde(rename = "task:created")]
    TaskCreated { task: Task },

    /// Full-row task update (the store computes the row before appending).
    #[serde(rename = "task:updated")]
    TaskUpdated { task: Task },

    #[serde(rename = "task:deleted")]
    TaskDeleted { id: TaskId },

    #[serde(rename = "log:appended")]
    LogAppended { entry: LogEntry },

    #[serde(rename = "project:upserted")]
    ProjectUpserted { project: Project },

    #[serde(rename = "memory:created")]
    MemoryCreated { memory: ProjectMemory },

    #[serde(rename = "compaction:saved")]
    CompactionSaved { row: CompactionSummary },

    #[serde(rename = "task_type:upserted")]
    TaskTypeUpserted { task_type: TaskType },

    /// Search-index refresh for a task; `text` is the rendered document.
    #[serde(rename = "task:indexed")]
    TaskIndexed { id: TaskId, text: String },
}

/// Materialized store state.
///
/// Tasks are keyed by their monotonic integer id; `BTreeMap` keeps listing
/// order stable without a sort.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreState {
    pub tasks: BTreeMap<TaskId, Task>,
    pub logs: HashMap<TaskId, Vec<LogEntry>>,
    pub projects: HashMap<String, Project>,
    pub memories: Vec<ProjectMemory>,
    pub compactions: HashMap<TaskId, Vec<CompactionSummary>>,
    pub task_types: HashMap<String, TaskType>,
    #[serde(default)]
    pub search: SearchIndex,
    #[serde(default)]
    pub next_task_id: TaskId,
    #[serde(default)]
    pub next_log_id: i64,
    #[serde(default)]
    pub next_memory_id: i64,
    #[serde(default)]
    pub next_compaction_id: i64,
}

impl StoreState {
    /// Apply one event to the tables.
    pub fn apply(&mut self, event: &StoreEvent) {
        match event {
            StoreEvent::TaskCreated { task } => {
                self.next_task_id = self.next_task_id.max(task.id + 1);
                self.tasks.insert(task.id, task.clone());
            }
            StoreEvent::TaskUpdated { task } => {
                self.tasks.insert(task.id, task.clone());
            }
            StoreEvent::TaskDeleted { id } => {
                self.tasks.remove(id);
                self.logs.remove(id);
                self.compactions.remove(id);
                self.search.remove(*id);
            }
            StoreEvent::LogAppended { entry } => {
                self.next_log_id = self.next_log_id.max(entry.id + 1);
                self.logs.entry(entry.task_id).or_default().push(entry.clone());
            }
            StoreEvent::ProjectUpserted { project } => {
                self.projects.insert(project.name.clone(), project.clone());
            }
            StoreEvent::MemoryCreated { memory } => {
                self.next_memory_id = self.next_memory_id.max(memory.id + 1);
                self.memories.push(memory.clone());
            }
            StoreEvent::CompactionSaved { row } => {
                self.next_compaction_id = self.next_compaction_id.max(row.id + 1);
                self.compactions.entry(row.task_id).or_default().push(row.clone());
            }
            StoreEvent::TaskTypeUpserted { task_type } => {
                self.task_types.insert(task_type.name.clone(), task_type.clone());
            }
            StoreEvent::TaskIndexed { id, text } => {
                self.search.index(*id, text);
            }
        }
    }

    /// Next task id to assign (ids start at 1).
    pub fn take_task_id(&mut self) -> TaskId {
        if self.next_task_id < 1 {
            self.next_task_id = 1;
        }
        let id = self.next_task_id;
        self.next_task_id += 1;
        id
    }

    /// Next log id to assign.
    pub fn take_log_id(&mut self) -> i64 {
        if self.next_log_id < 1 {
            self.next_log_id = 1;
        }
        let id = self.next_log_id;
        self.next_log_id += 1;
        id
    }

    /// Next memory id to assign.
    pub fn take_memory_id(&mut self) -> i64 {
        if self.next_memory_id < 1 {
            self.next_memory_id = 1;
        }
        let id = self.next_memory_id;
        self.next_memory_id += 1;
        id
    }

    /// Next compaction id to assign.
    pub fn take_compaction_id(&mut self) -> i64 {
        if self.next_compaction_id < 1 {
            self.next_compaction_id = 1;
        }
        let id = self.next_compaction_id;
        self.next_compaction_id += 1;
        id
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
