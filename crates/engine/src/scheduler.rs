// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scheduler and worker loop.
//!
//! One tick thread drives everything: queued pickup every tick, the
//! scheduled-task sweep every 5 ticks, merge detection every 15, and the
//! idle-suspend sweep plus done-task janitor every 30. Each running task
//! gets its own spawned runner; the at-most-one invariant is enforced by
//! the local running map, and across hosts by the persisted window and
//! session identifiers. Sweep errors log and never stop the loop.

use crate::broker::LogBroker;
use crate::error::RuntimeError;
use crate::mailbox::{ControlMsg, Mailbox};
use crate::worktree::WorktreeManager;
use crate::{hooks, merge, runner};
use chrono::Duration as ChronoDuration;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use ty_adapters::agent::{self, Agent, ProcessControl};
use ty_adapters::mux::Multiplexer;
use ty_core::log::CONTINUATION_MARKER;
use ty_core::{Clock, LogLineType, Recurrence, Task, TaskEventKind, TaskId, TaskStatus};
use ty_storage::TaskStore;

/// Tick cadence.
pub const TICK_INTERVAL: Duration = Duration::from_secs(2);

/// Ticks between scheduled-task sweeps.
const SCHEDULED_EVERY: u64 = 5;

/// Ticks between merge-detection sweeps.
const MERGE_EVERY: u64 = 15;

/// Ticks between idle-suspend sweeps.
const SUSPEND_EVERY: u64 = 30;

/// Blocked tasks idle longer than this get suspended.
const IDLE_THRESHOLD_MINUTES: i64 = 5;

/// Done tasks keep their agent alive this long for cheap retry.
const DONE_AGENT_REAP_MINUTES: i64 = 30;

/// Done tasks keep their window around this long for inspection.
const DONE_WINDOW_REAP_HOURS: i64 = 24;

/// Everything the engine components share.
pub struct Deps {
    pub store: Arc<TaskStore>,
    pub broker: Arc<LogBroker>,
    pub mux: Arc<dyn Multiplexer>,
    pub agents: HashMap<String, Arc<dyn Agent>>,
    pub process: Arc<ProcessControl>,
    pub clock: Arc<dyn Clock>,
    pub worktrees: WorktreeManager,
    pub mailbox: Mailbox,
    pub state_dir: PathBuf,
    /// Host binary the lifecycle hooks invoke.
    pub host_binary: PathBuf,
    /// Executor name tasks run under (from `TASK_EXECUTOR` by default).
    pub default_agent: String,
    /// Monotonic per-host counter behind `WORKTREE_SESSION_ID`.
    pub session_seq: AtomicU64,
}

impl Deps {
    /// Wire up the standard dependency graph.
    pub fn new(
        store: Arc<TaskStore>,
        mux: Arc<dyn Multiplexer>,
        clock: Arc<dyn Clock>,
        state_dir: PathBuf,
        host_binary: PathBuf,
    ) -> Arc<Self> {
        let broker = Arc::new(LogBroker::new(Arc::clone(&store)));
        let (agents, process) = agent::registry(Arc::clone(&mux));
        let worktrees = WorktreeManager::new(Arc::clone(&store), Arc::clone(&broker));
        let mailbox = Mailbox::new(&state_dir);
        Arc::new(Self {
            store,
            broker,
            mux,
            agents,
            process,
            clock,
            worktrees,
            mailbox,
            state_dir,
            host_binary,
            default_agent: ty_adapters::env::default_executor(),
            session_seq: AtomicU64::new(1),
        })
    }

    /// The adapter tasks execute under.
    pub fn agent(&self) -> Option<Arc<dyn Agent>> {
        agent::resolve(&self.agents, Some(&self.default_agent)).cloned()
    }

    /// Next `WORKTREE_SESSION_ID` value.
    pub fn next_session_seq(&self) -> u64 {
        self.session_seq.fetch_add(1, Ordering::SeqCst)
    }

    /// Apply a cross-process control message through the store.
    pub fn apply_control(&self, msg: ControlMsg) {
        let result = match msg {
            ControlMsg::Hook {
                event,
                task_id,
                payload,
            } => hooks::handle_event(&self.store, &self.broker, event, task_id, &payload),
            ControlMsg::Interrupt { task_id } => self
                .broker
                .update_status(task_id, TaskStatus::Backlog)
                .map(|_| {
                    let _ = self.broker.log_system(task_id, "Task interrupted");
                })
                .map_err(RuntimeError::from),
            ControlMsg::Queue { task_id } => self
                .broker
                .update_status(task_id, TaskStatus::Queued)
                .map(|_| ())
                .map_err(RuntimeError::from),
            ControlMsg::Retry { task_id, feedback } => self.apply_retry(task_id, feedback),
        };
        if let Err(e) = result {
            tracing::warn!(error = %e, "control message failed");
        }
    }

    fn apply_retry(&self, task_id: TaskId, feedback: Option<String>) -> Result<(), RuntimeError> {
        self.broker.log_system(task_id, CONTINUATION_MARKER)?;
        if let Some(feedback) = feedback.filter(|f| !f.trim().is_empty()) {
            self.broker
                .append_log(task_id, LogLineType::Relay, &feedback)?;
        }
        self.broker.update_status(task_id, TaskStatus::Queued)?;
        Ok(())
    }
}

/// The scheduler: owns the running map and the tick loop.
pub struct Supervisor {
    pub deps: Arc<Deps>,
    running: Mutex<HashMap<TaskId, CancellationToken>>,
    ticker: Mutex<Option<tokio::task::JoinHandle<()>>>,
    /// Self-handle for spawning runners that report back on completion.
    me: std::sync::Weak<Supervisor>,
}

impl Supervisor {
    pub fn new(deps: Arc<Deps>) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            deps,
            running: Mutex::new(HashMap::new()),
            ticker: Mutex::new(None),
            me: me.clone(),
        })
    }

    /// Begin background ticking. Idempotent.
    pub fn start(&self) {
        let mut ticker = self.ticker.lock();
        if ticker.is_some() {
            return;
        }
        let Some(supervisor) = self.me.upgrade() else {
            return;
        };
        *ticker = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            let mut tick: u64 = 0;
            loop {
                interval.tick().await;
                tick += 1;
                supervisor.tick(tick).await;
            }
        }));
    }

    /// Stop the tick loop. In-flight tasks keep running.
    pub fn stop(&self) {
        if let Some(handle) = self.ticker.lock().take() {
            handle.abort();
        }
    }

    pub fn running_tasks(&self) -> Vec<TaskId> {
        self.running.lock().keys().copied().collect()
    }

    pub fn is_running(&self, task_id: TaskId) -> bool {
        self.running.lock().contains_key(&task_id)
    }

    /// Interrupt a task: persist backlog (the cross-host signal), then
    /// cancel the local execution context if this host owns it.
    pub fn interrupt(&self, task_id: TaskId) -> Result<(), RuntimeError> {
        self.deps.broker.update_status(task_id, TaskStatus::Backlog)?;
        self.deps.broker.log_system(task_id, "Task interrupted")?;
        if let Some(token) = self.running.lock().get(&task_id) {
            token.cancel();
        }
        Ok(())
    }

    /// Re-queue a blocked task, optionally with user feedback for the
    /// resumed conversation. Cancels the old execution context so the
    /// queued pickup can take the slot with a fresh resume.
    pub fn retry(&self, task_id: TaskId, feedback: Option<String>) -> Result<(), RuntimeError> {
        self.deps.apply_retry(task_id, feedback)?;
        if let Some(token) = self.running.lock().get(&task_id) {
            token.cancel();
        }
        Ok(())
    }

    /// One scheduler tick. Public so tests can drive time by hand.
    pub async fn tick(&self, tick: u64) {
        for msg in self.deps.mailbox.drain() {
            match &msg {
                ControlMsg::Interrupt { task_id } | ControlMsg::Retry { task_id, .. } => {
                    if let Some(token) = self.running.lock().get(task_id) {
                        token.cancel();
                    }
                }
                _ => {}
            }
            self.deps.apply_control(msg);
        }

        self.pick_up_queued();

        if tick % SCHEDULED_EVERY == 0 {
            self.run_scheduled_sweep().await;
        }
        if tick % MERGE_EVERY == 0 {
            self.run_merge_sweep().await;
        }
        if tick % SUSPEND_EVERY == 0 {
            self.run_suspend_sweep().await;
            self.run_janitor().await;
            self.run_distill_sweep().await;
        }
    }

    /// Launch a runner for every queued task this host is not already
    /// executing.
    fn pick_up_queued(&self) {
        let queued = self.deps.store.tasks_by_status(TaskStatus::Queued);
        for task in queued {
            let Some(supervisor) = self.me.upgrade() else {
                return;
            };
            let token = {
                let mut running = self.running.lock();
                if running.contains_key(&task.id) {
                    continue;
                }
                let token = CancellationToken::new();
                running.insert(task.id, token.clone());
                token
            };

            tracing::info!(task_id = task.id, title = %task.title, "picking up queued task");
            tokio::spawn(async move {
                runner::run_task(Arc::clone(&supervisor.deps), task.id, token).await;
                supervisor.finish_task(task.id);
            });
        }
    }

    /// Runner completion: release the slot and any suspended record.
    fn finish_task(&self, task_id: TaskId) {
        self.running.lock().remove(&task_id);
        self.deps.process.clear(task_id);
    }

    /// Queue scheduled tasks whose time has come; advance recurrences.
    async fn run_scheduled_sweep(&self) {
        let now = self.deps.clock.now_utc();
        for task in self.deps.store.due_scheduled_tasks(now) {
            let next = task
                .recurrence
                .as_deref()
                .and_then(|r| r.parse::<Recurrence>().ok())
                .map(|r| r.next_after(now));

            let result = self
                .deps
                .store
                .queue_scheduled_task(task.id, next)
                .map(|queued| {
                    let _ = self
                        .deps
                        .broker
                        .log_system(task.id, "--- Scheduled run ---");
                    self.deps
                        .broker
                        .notify_task_change(TaskEventKind::Updated, &queued);
                });
            if let Err(e) = result {
                tracing::warn!(task_id = task.id, error = %e, "scheduled sweep failed for task");
            }
        }
    }

    /// Close backlog tasks whose branch has been merged.
    async fn run_merge_sweep(&self) {
        for task in self.deps.store.tasks_with_branches() {
            if task.status != TaskStatus::Backlog {
                continue;
            }
            let (Some(branch), Some(project)) = (
                task.branch.clone(),
                task.project.as_deref().and_then(|p| self.deps.store.get_project(p)),
            ) else {
                continue;
            };

            if merge::is_branch_merged(&project.path, &branch, task.pr_number).await {
                let message = format!(
                    "Branch {} has been merged - automatically closing task",
                    branch
                );
                if let Err(e) = self
                    .deps
                    .broker
                    .update_status(task.id, TaskStatus::Done)
                    .and_then(|_| self.deps.broker.log_system(task.id, &message))
                {
                    tracing::warn!(task_id = task.id, error = %e, "merge sweep failed for task");
                }
            }
        }
    }

    /// Suspend agents of blocked tasks that have been idle too long.
    async fn run_suspend_sweep(&self) {
        let Some(agent) = self.deps.agent() else {
            return;
        };
        let now = self.deps.clock.now_utc();
        let threshold = ChronoDuration::minutes(IDLE_THRESHOLD_MINUTES);

        for task in self.deps.store.tasks_by_status(TaskStatus::Blocked) {
            if now - task.updated_at < threshold || agent.is_suspended(task.id) {
                continue;
            }
            if agent.process_id(task.id).await.is_none() {
                continue;
            }
            if agent.suspend(task.id).await {
                let _ = self.deps.broker.log_system(
                    task.id,
                    &format!("Agent for task {} suspended (idle timeout)", task.id),
                );
            }
        }
    }

    /// Reap agents of long-done tasks; much later, their windows too.
    async fn run_janitor(&self) {
        let Some(agent) = self.deps.agent() else {
            return;
        };
        let now = self.deps.clock.now_utc();

        for task in self.deps.store.tasks_by_status(TaskStatus::Done) {
            let Some(completed_at) = task.completed_at else {
                continue;
            };
            let age = now - completed_at;

            if age > ChronoDuration::minutes(DONE_AGENT_REAP_MINUTES)
                && agent.process_id(task.id).await.is_some()
                && agent.kill(task.id).await
            {
                let _ = self
                    .deps
                    .broker
                    .log_system(task.id, "Agent reaped after completion");
            }

            if age > ChronoDuration::hours(DONE_WINDOW_REAP_HOURS) {
                let _ = self.deps.mux.kill_windows_by_name(&task.window_name()).await;
            }
        }
    }
}

impl Supervisor {
    /// Distill long-running tasks when fresh compaction content exists.
    ///
    /// Completion-time distillation happens in the runner; this sweep
    /// covers multi-hour runs whose transcripts would otherwise only be
    /// captured at the end. `should_distill` rate-limits to one attempt
    /// per ten minutes.
    async fn run_distill_sweep(&self) {
        let now = self.deps.clock.now_utc();
        for task in self.deps.store.tasks_by_status(TaskStatus::Processing) {
            let latest = self.deps.store.latest_compaction(task.id);
            if crate::distill::should_distill(&task, latest.as_ref(), now) {
                crate::distill::run_and_stamp(&self.deps, task.id).await;
            }
        }
    }
}

/// Candidate check used by the suspend sweep; split out for tests.
pub fn is_idle_candidate(task: &Task, now: chrono::DateTime<chrono::Utc>) -> bool {
    task.status == TaskStatus::Blocked
        && now - task.updated_at >= ChronoDuration::minutes(IDLE_THRESHOLD_MINUTES)
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
