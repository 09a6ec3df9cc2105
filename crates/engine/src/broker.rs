// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Log stream broker.
//!
//! Append-only task logs with per-task subscriber fan-out, plus a global
//! task-event stream. Delivery is best-effort over bounded channels: a
//! full subscriber buffer drops the newest entry so the writer never
//! blocks. Per-subscriber ordering of one task's entries is preserved;
//! nothing is implied across subscribers.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use ty_core::{LogEntry, LogLineType, Task, TaskEvent, TaskEventKind, TaskId, TaskStatus};
use ty_storage::{StoreError, TaskStore};

/// Per-subscriber buffer size.
const SUBSCRIBER_BUFFER: usize = 100;

/// A live log subscription. Drop the receiver (or call `unsubscribe`) to
/// detach; a closed channel is detached lazily on the next broadcast.
pub struct LogSubscription {
    pub id: u64,
    pub rx: mpsc::Receiver<LogEntry>,
}

/// A live task-event subscription.
pub struct TaskEventSubscription {
    pub id: u64,
    pub rx: mpsc::Receiver<TaskEvent>,
}

struct Sink<T> {
    id: u64,
    tx: mpsc::Sender<T>,
}

/// Fan-out hub for task logs and task events.
pub struct LogBroker {
    store: Arc<TaskStore>,
    log_subs: Mutex<HashMap<TaskId, Vec<Sink<LogEntry>>>>,
    event_subs: Mutex<Vec<Sink<TaskEvent>>>,
    next_sub_id: AtomicU64,
}

impl LogBroker {
    pub fn new(store: Arc<TaskStore>) -> Self {
        Self {
            store,
            log_subs: Mutex::new(HashMap::new()),
            event_subs: Mutex::new(Vec::new()),
            next_sub_id: AtomicU64::new(1),
        }
    }

    /// Persist a log line, then broadcast it to the task's subscribers.
    pub fn append_log(
        &self,
        task_id: TaskId,
        line_type: LogLineType,
        content: &str,
    ) -> Result<LogEntry, StoreError> {
        let entry = self.store.append_log(task_id, line_type, content)?;

        let mut subs = self.log_subs.lock();
        if let Some(sinks) = subs.get_mut(&task_id) {
            fan_out(sinks, &entry);
            if sinks.is_empty() {
                subs.remove(&task_id);
            }
        }
        Ok(entry)
    }

    /// Convenience for system lines.
    pub fn log_system(&self, task_id: TaskId, content: &str) -> Result<LogEntry, StoreError> {
        self.append_log(task_id, LogLineType::System, content)
    }

    /// Subscribe to a task's log stream.
    pub fn subscribe(&self, task_id: TaskId) -> LogSubscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.next_sub_id.fetch_add(1, Ordering::SeqCst);
        self.log_subs
            .lock()
            .entry(task_id)
            .or_default()
            .push(Sink { id, tx });
        LogSubscription { id, rx }
    }

    /// Detach a log subscriber. Safe to call after the channel closed.
    pub fn unsubscribe(&self, task_id: TaskId, sub_id: u64) {
        let mut subs = self.log_subs.lock();
        if let Some(sinks) = subs.get_mut(&task_id) {
            sinks.retain(|s| s.id != sub_id);
            if sinks.is_empty() {
                subs.remove(&task_id);
            }
        }
    }

    /// Subscribe to the global task-event stream
    /// (created/updated/deleted/status-changed).
    pub fn subscribe_task_events(&self) -> TaskEventSubscription {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_BUFFER);
        let id = self.next_sub_id.fetch_add(1, Ordering::SeqCst);
        self.event_subs.lock().push(Sink { id, tx });
        TaskEventSubscription { id, rx }
    }

    /// Detach a task-event subscriber.
    pub fn unsubscribe_task_events(&self, sub_id: u64) {
        self.event_subs.lock().retain(|s| s.id != sub_id);
    }

    /// Broadcast a task change to event subscribers.
    ///
    /// The task passed here must be the row read back from the store after
    /// the write committed.
    pub fn notify_task_change(&self, kind: TaskEventKind, task: &Task) {
        let event = TaskEvent::new(kind, task.clone());
        let mut sinks = self.event_subs.lock();
        fan_out(&mut sinks, &event);
    }

    /// The one path for status mutations: write to the store, read the
    /// committed row back, then broadcast. Subscribers never observe a
    /// state that is not already committed.
    pub fn update_status(&self, task_id: TaskId, status: TaskStatus) -> Result<Task, StoreError> {
        self.store.update_status(task_id, status)?;
        let task = self
            .store
            .get_task(task_id)
            .ok_or(StoreError::TaskNotFound(task_id))?;
        self.notify_task_change(TaskEventKind::StatusChanged, &task);
        Ok(task)
    }
}

/// Non-blocking send to every sink; a full buffer drops this entry for
/// that subscriber, a closed channel drops the subscriber.
fn fan_out<T: Clone>(sinks: &mut Vec<Sink<T>>, item: &T) {
    sinks.retain(|sink| match sink.tx.try_send(item.clone()) {
        Ok(()) => true,
        Err(mpsc::error::TrySendError::Full(_)) => {
            tracing::debug!(sub_id = sink.id, "subscriber buffer full, dropping entry");
            true
        }
        Err(mpsc::error::TrySendError::Closed(_)) => false,
    });
}

#[cfg(test)]
#[path = "broker_tests.rs"]
mod tests;
