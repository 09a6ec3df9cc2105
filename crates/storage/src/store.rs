// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The task store facade.
//!
//! All mutations go WAL-first: the event is durable before the in-memory
//! tables change. The store is internally locked; callers share it behind
//! an `Arc` without extra synchronization. Port and id assignment happen
//! under the same lock, which is what makes `allocate_port` atomic.

use crate::snapshot::{Snapshot, SnapshotError};
use crate::state::{StoreEvent, StoreState};
use crate::wal::{Wal, WalError};
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use ty_core::task::{PORT_RANGE_END, PORT_RANGE_START};
use ty_core::{
    Clock, CompactionSummary, LogEntry, LogLineType, MemoryCategory, Project, ProjectMemory,
    SystemClock, Task, TaskId, TaskStatus, TaskType,
};

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("task not found: {0}")]
    TaskNotFound(TaskId),
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("no free port in 3100-4099")]
    PortsExhausted,
    #[error(transparent)]
    Wal(#[from] WalError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Fields a caller can set when creating a task.
#[derive(Debug, Default, Clone)]
pub struct TaskDraft {
    pub title: String,
    pub body: String,
    pub project: Option<String>,
    pub task_type: Option<String>,
    pub scheduled_at: Option<DateTime<Utc>>,
    pub recurrence: Option<String>,
}

struct Inner {
    state: StoreState,
    /// `None` for in-memory stores (tests).
    wal: Option<Wal>,
    snapshot_path: Option<PathBuf>,
}

/// The persistent store collaborator.
pub struct TaskStore {
    inner: Mutex<Inner>,
    clock: Arc<dyn Clock>,
}

impl TaskStore {
    /// Open (or create) a store rooted at `dir`.
    ///
    /// Loads the latest snapshot, replays the WAL tail, and seeds the
    /// built-in task-type catalog on first use.
    pub fn open(dir: &Path) -> Result<Self, StoreError> {
        Self::open_with_clock(dir, Arc::new(SystemClock))
    }

    /// Open with an explicit clock (tests).
    pub fn open_with_clock(dir: &Path, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let snapshot_path = dir.join("store.snapshot");
        let wal_path = dir.join("store.wal");

        let (mut state, seq) = match Snapshot::load(&snapshot_path)? {
            Some(snapshot) => (snapshot.state, snapshot.seq),
            None => (StoreState::default(), 0),
        };

        let wal = Wal::open(&wal_path)?;
        for entry in wal.entries_after(seq)? {
            state.apply(&entry.event);
        }

        let store = Self {
            inner: Mutex::new(Inner {
                state,
                wal: Some(wal),
                snapshot_path: Some(snapshot_path),
            }),
            clock,
        };
        store.seed_task_types()?;
        Ok(store)
    }

    /// Read-only view of a store another process may be writing.
    ///
    /// Loads the snapshot and the WAL's valid prefix without rotating or
    /// truncating anything; mutations on the returned store stay in
    /// memory only.
    pub fn open_read_only(dir: &Path) -> Self {
        let snapshot_path = dir.join("store.snapshot");
        let wal_path = dir.join("store.wal");

        let (mut state, seq) = match Snapshot::peek(&snapshot_path) {
            Some(snapshot) => (snapshot.state, snapshot.seq),
            None => (StoreState::default(), 0),
        };
        for entry in Wal::read_entries(&wal_path) {
            if entry.seq > seq {
                state.apply(&entry.event);
            }
        }

        Self {
            inner: Mutex::new(Inner {
                state,
                wal: None,
                snapshot_path: None,
            }),
            clock: Arc::new(SystemClock),
        }
    }

    /// A store with no disk backing. State is lost on drop.
    pub fn in_memory() -> Self {
        Self::in_memory_with_clock(Arc::new(SystemClock))
    }

    /// In-memory store with an explicit clock (tests).
    pub fn in_memory_with_clock(clock: Arc<dyn Clock>) -> Self {
        let store = Self {
            inner: Mutex::new(Inner {
                state: StoreState::default(),
                wal: None,
                snapshot_path: None,
            }),
            clock,
        };
        // Seeding an in-memory store cannot fail: there is no WAL.
        let _ = store.seed_task_types();
        store
    }

    fn seed_task_types(&self) -> Result<(), StoreError> {
        let missing: Vec<TaskType> = {
            let inner = self.inner.lock();
            TaskType::builtin_catalog()
                .into_iter()
                .filter(|t| !inner.state.task_types.contains_key(&t.name))
                .collect()
        };
        for task_type in missing {
            self.commit(StoreEvent::TaskTypeUpserted { task_type })?;
        }
        Ok(())
    }

    /// Write an event to the WAL, then apply it to the state.
    fn commit(&self, event: StoreEvent) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if let Some(wal) = inner.wal.as_mut() {
            wal.append(&event)?;
        }
        inner.state.apply(&event);
        Ok(())
    }

    fn now(&self) -> DateTime<Utc> {
        self.clock.now_utc()
    }

    /// Snapshot the state and truncate the WAL.
    pub fn checkpoint(&self) -> Result<(), StoreError> {
        let (state, seq, snapshot_path) = {
            let inner = self.inner.lock();
            let Some(path) = inner.snapshot_path.clone() else {
                return Ok(());
            };
            let seq = inner.wal.as_ref().map(|w| w.write_seq()).unwrap_or(0);
            (inner.state.clone(), seq, path)
        };

        Snapshot::new(seq, state).save(&snapshot_path)?;

        let mut inner = self.inner.lock();
        if let Some(wal) = inner.wal.as_mut() {
            wal.truncate_through(seq)?;
        }
        Ok(())
    }

    // === Tasks ===

    /// Create a task in backlog.
    pub fn create_task(&self, draft: TaskDraft) -> Result<Task, StoreError> {
        let now = self.now();
        let mut task = {
            let mut inner = self.inner.lock();
            Task::new(inner.state.take_task_id(), draft.title, now)
        };
        task.body = draft.body;
        task.project = draft.project;
        task.task_type = draft.task_type;
        task.scheduled_at = draft.scheduled_at;
        task.recurrence = draft.recurrence;

        self.commit(StoreEvent::TaskCreated { task: task.clone() })?;
        Ok(task)
    }

    pub fn get_task(&self, id: TaskId) -> Option<Task> {
        self.inner.lock().state.tasks.get(&id).cloned()
    }

    pub fn list_tasks(&self) -> Vec<Task> {
        self.inner.lock().state.tasks.values().cloned().collect()
    }

    /// Tasks in the given status, ordered by id.
    pub fn tasks_by_status(&self, status: TaskStatus) -> Vec<Task> {
        self.inner
            .lock()
            .state
            .tasks
            .values()
            .filter(|t| t.status == status)
            .cloned()
            .collect()
    }

    /// Persist a full task row, stamping `updated_at`.
    pub fn update_task(&self, mut task: Task) -> Result<Task, StoreError> {
        if self.get_task(task.id).is_none() {
            return Err(StoreError::TaskNotFound(task.id));
        }
        task.updated_at = self.now();
        self.commit(StoreEvent::TaskUpdated { task: task.clone() })?;
        Ok(task)
    }

    /// Delete a task and everything it owns (logs, compactions, port).
    pub fn delete_task(&self, id: TaskId) -> Result<(), StoreError> {
        if self.get_task(id).is_none() {
            return Err(StoreError::TaskNotFound(id));
        }
        self.commit(StoreEvent::TaskDeleted { id })
    }

    fn mutate_task(
        &self,
        id: TaskId,
        mutate: impl FnOnce(&mut Task),
    ) -> Result<Task, StoreError> {
        let mut task = self.get_task(id).ok_or(StoreError::TaskNotFound(id))?;
        mutate(&mut task);
        task.updated_at = self.now();
        self.commit(StoreEvent::TaskUpdated { task: task.clone() })?;
        Ok(task)
    }

    /// Allocate a port for the task from the shared range.
    ///
    /// Idempotent: a task that already holds a port keeps it. Ports stay
    /// unique across all non-deleted tasks.
    pub fn allocate_port(&self, id: TaskId) -> Result<u16, StoreError> {
        let port = {
            let inner = self.inner.lock();
            let task = inner
                .state
                .tasks
                .get(&id)
                .ok_or(StoreError::TaskNotFound(id))?;
            if task.port != 0 {
                return Ok(task.port);
            }
            let in_use: std::collections::HashSet<u16> = inner
                .state
                .tasks
                .values()
                .map(|t| t.port)
                .filter(|p| *p != 0)
                .collect();
            (PORT_RANGE_START..=PORT_RANGE_END)
                .find(|p| !in_use.contains(p))
                .ok_or(StoreError::PortsExhausted)?
        };
        self.mutate_task(id, |t| t.port = port)?;
        Ok(port)
    }

    /// Update a task's status, stamping started/completed timestamps.
    pub fn update_status(&self, id: TaskId, status: TaskStatus) -> Result<Task, StoreError> {
        let now = self.now();
        self.mutate_task(id, |t| {
            if t.status != status && !t.status.can_transition_to(status) {
                tracing::warn!(
                    task_id = id,
                    from = %t.status,
                    to = %status,
                    "unusual status transition"
                );
            }
            t.status = status;
            match status {
                TaskStatus::Processing if t.started_at.is_none() => t.started_at = Some(now),
                TaskStatus::Done => t.completed_at = Some(now),
                _ => {}
            }
        })
    }

    pub fn update_session_id(&self, id: TaskId, session: &str) -> Result<Task, StoreError> {
        let session = session.to_string();
        self.mutate_task(id, |t| t.agent_session_id = Some(session))
    }

    /// Persist the multiplexer session that owns the task's window.
    pub fn update_daemon_session(&self, id: TaskId, session: &str) -> Result<Task, StoreError> {
        let session = session.to_string();
        self.mutate_task(id, |t| t.mux_session = Some(session))
    }

    pub fn update_window_id(&self, id: TaskId, window: &str) -> Result<Task, StoreError> {
        let window = window.to_string();
        self.mutate_task(id, |t| t.mux_window = Some(window))
    }

    pub fn update_dangerous_mode(&self, id: TaskId, dangerous: bool) -> Result<Task, StoreError> {
        self.mutate_task(id, |t| t.dangerous_mode = dangerous)
    }

    pub fn save_task_summary(&self, id: TaskId, summary: &str) -> Result<Task, StoreError> {
        let summary = summary.to_string();
        self.mutate_task(id, |t| t.summary = Some(summary))
    }

    /// Stamp `last_distilled_at`, rate-limiting distillation retries.
    pub fn update_last_distilled_at(&self, id: TaskId) -> Result<Task, StoreError> {
        let now = self.now();
        self.mutate_task(id, |t| t.last_distilled_at = Some(now))
    }

    /// Move a due scheduled task to queued and advance its schedule.
    pub fn queue_scheduled_task(
        &self,
        id: TaskId,
        next: Option<DateTime<Utc>>,
    ) -> Result<Task, StoreError> {
        let now = self.now();
        self.mutate_task(id, |t| {
            t.status = TaskStatus::Queued;
            t.last_run_at = Some(now);
            t.scheduled_at = next;
        })
    }

    /// Scheduled tasks whose `scheduled_at` has passed.
    pub fn due_scheduled_tasks(&self, now: DateTime<Utc>) -> Vec<Task> {
        self.inner
            .lock()
            .state
            .tasks
            .values()
            .filter(|t| {
                !t.status.is_terminal()
                    && t.status != TaskStatus::Queued
                    && t.status != TaskStatus::Processing
                    && t.scheduled_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect()
    }

    /// Tasks carrying a branch name (merge-sweep candidates).
    pub fn tasks_with_branches(&self) -> Vec<Task> {
        self.inner
            .lock()
            .state
            .tasks
            .values()
            .filter(|t| t.branch.is_some())
            .cloned()
            .collect()
    }

    // === Logs ===

    /// Append a log line for a task.
    pub fn append_log(
        &self,
        task_id: TaskId,
        line_type: LogLineType,
        content: &str,
    ) -> Result<LogEntry, StoreError> {
        let entry = {
            let mut inner = self.inner.lock();
            LogEntry {
                id: inner.state.take_log_id(),
                task_id,
                line_type,
                content: content.to_string(),
                created_at: self.clock.now_utc(),
            }
        };
        self.commit(StoreEvent::LogAppended {
            entry: entry.clone(),
        })?;
        Ok(entry)
    }

    /// Log lines for a task with id greater than `after`, oldest first.
    pub fn logs_after(&self, task_id: TaskId, after: i64) -> Vec<LogEntry> {
        self.inner
            .lock()
            .state
            .logs
            .get(&task_id)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.id > after)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// All log lines for a task, oldest first.
    pub fn logs(&self, task_id: TaskId) -> Vec<LogEntry> {
        self.logs_after(task_id, 0)
    }

    // === Projects and memories ===

    pub fn upsert_project(&self, project: Project) -> Result<Project, StoreError> {
        self.commit(StoreEvent::ProjectUpserted {
            project: project.clone(),
        })?;
        Ok(project)
    }

    /// Look up a project by name or alias.
    pub fn get_project(&self, name: &str) -> Option<Project> {
        let inner = self.inner.lock();
        if let Some(project) = inner.state.projects.get(name) {
            return Some(project.clone());
        }
        inner
            .state
            .projects
            .values()
            .find(|p| p.aliases.iter().any(|a| a == name))
            .cloned()
    }

    pub fn list_projects(&self) -> Vec<Project> {
        let mut projects: Vec<Project> =
            self.inner.lock().state.projects.values().cloned().collect();
        projects.sort_by(|a, b| a.name.cmp(&b.name));
        projects
    }

    /// Memories for a project, grouped stable by insertion order.
    pub fn list_memories(&self, project: &str) -> Vec<ProjectMemory> {
        self.inner
            .lock()
            .state
            .memories
            .iter()
            .filter(|m| m.project == project)
            .cloned()
            .collect()
    }

    pub fn create_memory(
        &self,
        project: &str,
        category: MemoryCategory,
        content: &str,
        source_task_id: Option<TaskId>,
    ) -> Result<ProjectMemory, StoreError> {
        if self.get_project(project).is_none() {
            return Err(StoreError::ProjectNotFound(project.to_string()));
        }
        let now = self.now();
        let memory = {
            let mut inner = self.inner.lock();
            ProjectMemory {
                id: inner.state.take_memory_id(),
                project: project.to_string(),
                category,
                content: content.to_string(),
                source_task_id,
                created_at: now,
                updated_at: now,
            }
        };
        self.commit(StoreEvent::MemoryCreated {
            memory: memory.clone(),
        })?;
        Ok(memory)
    }

    // === Compaction summaries ===

    pub fn save_compaction(
        &self,
        task_id: TaskId,
        session_id: &str,
        trigger: &str,
        pre_token_count: u64,
        summary: &str,
    ) -> Result<CompactionSummary, StoreError> {
        if self.get_task(task_id).is_none() {
            return Err(StoreError::TaskNotFound(task_id));
        }
        let row = {
            let mut inner = self.inner.lock();
            CompactionSummary {
                id: inner.state.take_compaction_id(),
                task_id,
                session_id: session_id.to_string(),
                trigger: trigger.to_string(),
                pre_token_count,
                summary: summary.to_string(),
                created_at: self.clock.now_utc(),
            }
        };
        self.commit(StoreEvent::CompactionSaved { row: row.clone() })?;
        Ok(row)
    }

    pub fn list_compactions(&self, task_id: TaskId) -> Vec<CompactionSummary> {
        self.inner
            .lock()
            .state
            .compactions
            .get(&task_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Most recent compaction row for a task.
    pub fn latest_compaction(&self, task_id: TaskId) -> Option<CompactionSummary> {
        self.list_compactions(task_id).into_iter().last()
    }

    // === Search ===

    /// Rebuild the search document for a task from its current fields.
    pub fn index_task(&self, id: TaskId) -> Result<(), StoreError> {
        let task = self.get_task(id).ok_or(StoreError::TaskNotFound(id))?;
        let text = [
            task.project.as_deref().unwrap_or(""),
            &task.title,
            &task.body,
            task.task_type.as_deref().unwrap_or(""),
            task.summary.as_deref().unwrap_or(""),
        ]
        .join("\n");
        self.commit(StoreEvent::TaskIndexed { id, text })
    }

    /// Tasks most similar to the query text, best match first.
    pub fn find_similar(&self, query: &str, limit: usize, exclude: Option<TaskId>) -> Vec<Task> {
        let ids = {
            let inner = self.inner.lock();
            inner.state.search.find_similar(query, limit, exclude)
        };
        ids.into_iter().filter_map(|id| self.get_task(id)).collect()
    }

    // === Task type catalog ===

    pub fn get_task_type(&self, name: &str) -> Option<TaskType> {
        self.inner.lock().state.task_types.get(name).cloned()
    }

    pub fn list_task_types(&self) -> Vec<TaskType> {
        let mut types: Vec<TaskType> =
            self.inner.lock().state.task_types.values().cloned().collect();
        types.sort_by(|a, b| a.name.cmp(&b.name));
        types
    }

    pub fn upsert_task_type(&self, task_type: TaskType) -> Result<(), StoreError> {
        self.commit(StoreEvent::TaskTypeUpserted { task_type })
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
