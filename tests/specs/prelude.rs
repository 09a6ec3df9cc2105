// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared wiring for scenario tests.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use ty_adapters::agent::{Agent, FakeAgent, ProcessControl};
use ty_adapters::mux::{FakeMux, Multiplexer};
use ty_core::{Clock, FakeClock, Project, TaskId, TaskStatus};
use ty_engine::{Deps, LogBroker, Mailbox, Supervisor, WorktreeManager};
use ty_storage::{TaskDraft, TaskStore};

pub struct World {
    pub deps: Arc<Deps>,
    pub supervisor: Arc<Supervisor>,
    pub mux: FakeMux,
    pub agent: Arc<FakeAgent>,
    pub clock: FakeClock,
    pub _state_dir: tempfile::TempDir,
}

pub fn world() -> World {
    let clock = FakeClock::new();
    let clock_arc: Arc<dyn Clock> = Arc::new(clock.clone());
    let store = Arc::new(TaskStore::in_memory_with_clock(Arc::clone(&clock_arc)));
    let broker = Arc::new(LogBroker::new(Arc::clone(&store)));

    let mux = FakeMux::new();
    let mux_arc: Arc<dyn Multiplexer> = Arc::new(mux.clone());
    let process = Arc::new(ProcessControl::new(Arc::clone(&mux_arc)));
    let agent = Arc::new(FakeAgent::new(Arc::clone(&process)));

    let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
    agents.insert("fake".to_string(), Arc::clone(&agent) as Arc<dyn Agent>);

    let state_dir = tempfile::tempdir().expect("state dir");
    let worktrees = WorktreeManager::new(Arc::clone(&store), Arc::clone(&broker));
    let mailbox = Mailbox::new(state_dir.path());

    let deps = Arc::new(Deps {
        store,
        broker,
        mux: mux_arc,
        agents,
        process,
        clock: clock_arc,
        worktrees,
        mailbox,
        state_dir: state_dir.path().to_path_buf(),
        host_binary: PathBuf::from("/usr/local/bin/ty"),
        default_agent: "fake".to_string(),
        session_seq: AtomicU64::new(1),
    });
    let supervisor = Supervisor::new(Arc::clone(&deps));

    World {
        deps,
        supervisor,
        mux,
        agent,
        clock,
        _state_dir: state_dir,
    }
}

impl World {
    /// Register a git-backed project named `proj`.
    pub fn project(&self) -> tempfile::TempDir {
        let repo = git_repo();
        self.deps
            .store
            .upsert_project(Project::new("proj", repo.path()))
            .expect("project");
        repo
    }

    pub fn create_task(&self, title: &str) -> TaskId {
        self.deps
            .store
            .create_task(TaskDraft {
                title: title.to_string(),
                body: "Scenario task with a reasonably descriptive body.".to_string(),
                project: Some("proj".to_string()),
                task_type: Some("code".to_string()),
                ..TaskDraft::default()
            })
            .expect("task")
            .id
    }

    /// Queue the task and tick until the runner has a window up.
    pub async fn start_task(&self, task_id: TaskId) {
        self.deps
            .store
            .update_status(task_id, TaskStatus::Queued)
            .expect("queue");
        self.supervisor.tick(1).await;
        self.wait_for_window(task_id).await;
    }

    pub async fn wait_for_window(&self, task_id: TaskId) {
        for _ in 0..200 {
            if self
                .deps
                .store
                .get_task(task_id)
                .and_then(|t| t.mux_window)
                .is_some()
            {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("window for task {} never appeared", task_id);
    }

    pub async fn wait_for_status(&self, task_id: TaskId, status: TaskStatus) {
        for _ in 0..300 {
            if self.deps.store.get_task(task_id).map(|t| t.status) == Some(status) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("task {} never reached {}", task_id, status);
    }

    /// Wait until the supervisor has released the task slot.
    pub async fn wait_for_idle(&self, task_id: TaskId) {
        for _ in 0..300 {
            if !self.supervisor.is_running(task_id) {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        }
        panic!("runner for task {} never finished", task_id);
    }
}

/// Initialize a git repo with an initial commit.
pub fn git_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("repo dir");
    run_git(dir.path(), &["init", "-b", "main"]);
    run_git(dir.path(), &["commit", "--allow-empty", "-m", "init"]);
    dir
}

pub fn run_git(repo: &std::path::Path, args: &[&str]) {
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(repo)
        .args(["-c", "user.name=test", "-c", "user.email=test@example.com"])
        .args(args)
        .output()
        .expect("git runs");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
}
