// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for engine tests.
#![cfg_attr(coverage_nightly, coverage(off))]

use crate::broker::LogBroker;
use crate::mailbox::Mailbox;
use crate::scheduler::Deps;
use crate::worktree::WorktreeManager;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use ty_adapters::agent::{Agent, FakeAgent, ProcessControl};
use ty_adapters::mux::{FakeMux, Multiplexer};
use ty_core::{Clock, FakeClock, Task, TaskId};
use ty_storage::{TaskDraft, TaskStore};

/// A fully faked dependency graph rooted in a temp state dir.
pub struct Fixture {
    pub deps: Arc<Deps>,
    pub mux: FakeMux,
    pub agent: Arc<FakeAgent>,
    pub clock: FakeClock,
    pub state_dir: tempfile::TempDir,
}

pub fn fixture() -> Fixture {
    fixture_with(false)
}

/// Fixture whose fake agent supports neither resume nor dangerous mode.
pub fn fixture_minimal() -> Fixture {
    fixture_with(true)
}

fn fixture_with(minimal: bool) -> Fixture {
    let clock = FakeClock::new();
    let clock_arc: Arc<dyn Clock> = Arc::new(clock.clone());
    let store = Arc::new(TaskStore::in_memory_with_clock(Arc::clone(&clock_arc)));
    let broker = Arc::new(LogBroker::new(Arc::clone(&store)));

    let mux = FakeMux::new();
    let mux_arc: Arc<dyn Multiplexer> = Arc::new(mux.clone());
    let process = Arc::new(ProcessControl::new(Arc::clone(&mux_arc)));
    let agent = if minimal {
        Arc::new(FakeAgent::minimal(Arc::clone(&process)))
    } else {
        Arc::new(FakeAgent::new(Arc::clone(&process)))
    };

    let mut agents: HashMap<String, Arc<dyn Agent>> = HashMap::new();
    agents.insert("fake".to_string(), Arc::clone(&agent) as Arc<dyn Agent>);

    let state_dir = tempfile::tempdir().expect("temp state dir");
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

    Fixture {
        deps,
        mux,
        agent,
        clock,
        state_dir,
    }
}

impl Fixture {
    /// Create a task directly in the store.
    pub fn task(&self, title: &str) -> Task {
        self.deps
            .store
            .create_task(TaskDraft {
                title: title.to_string(),
                ..TaskDraft::default()
            })
            .expect("create task")
    }

    /// Create a task bound to a registered project.
    pub fn task_in_project(&self, title: &str, project: &str) -> Task {
        self.deps
            .store
            .create_task(TaskDraft {
                title: title.to_string(),
                project: Some(project.to_string()),
                ..TaskDraft::default()
            })
            .expect("create task")
    }

    /// Put a fake worktree path on a task (inside an isolation subtree).
    pub fn with_worktree(&self, task_id: TaskId, dir: &std::path::Path) -> Task {
        let worktree = dir.join(".task-worktrees").join(format!("{}-t", task_id));
        std::fs::create_dir_all(&worktree).expect("worktree dir");
        let mut task = self.deps.store.get_task(task_id).expect("task");
        task.worktree_path = Some(worktree);
        task.branch = Some(format!("task/{}-t", task_id));
        self.deps.store.update_task(task).expect("update task")
    }
}

/// Initialize a git repo with an initial commit; returns its tempdir.
pub fn git_repo() -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("repo dir");
    run_git(dir.path(), &["init", "-b", "main"]);
    run_git(dir.path(), &["commit", "--allow-empty", "-m", "init"]);
    dir
}

/// Run a git command in a test repo, panicking on failure.
pub fn run_git(repo: &std::path::Path, args: &[&str]) {
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(repo)
        .args([
            "-c",
            "user.name=test",
            "-c",
            "user.email=test@example.com",
        ])
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
