// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::agent::LaunchRequest;
use crate::mux::FakeMux;

fn agent() -> OpenCodeAgent {
    OpenCodeAgent::new(Arc::new(ProcessControl::new(Arc::new(FakeMux::new()))))
}

fn request() -> LaunchRequest {
    LaunchRequest {
        task_id: 8,
        session_id: None,
        prompt_path: Some("/tmp/p.md".into()),
        dangerous: false,
        env: vec![("WORKTREE_TASK_ID".to_string(), "8".to_string())],
        work_dir: "/proj/.task-worktrees/8-x".into(),
    }
}

#[test]
fn command_uses_run_subcommand() {
    assert_eq!(
        agent().build_command(&request()),
        "WORKTREE_TASK_ID='8' opencode run \"$(cat '/tmp/p.md')\""
    );
}

#[test]
fn command_without_prompt_still_runs() {
    let mut req = request();
    req.prompt_path = None;
    req.env = Vec::new();
    assert_eq!(agent().build_command(&req), "opencode run");
}

#[test]
fn no_capabilities() {
    let agent = agent();
    assert!(!agent.supports_session_resume());
    assert!(!agent.supports_dangerous_mode());
    assert!(agent.dangerous_args().is_empty());
}

#[test]
fn never_discovers_a_session() {
    assert!(agent()
        .find_session_id(8, Path::new("/proj/.task-worktrees/8-x"))
        .is_none());
}

#[test]
fn dangerous_request_adds_nothing() {
    // The flag is ignored for an adapter without dangerous mode.
    let mut req = request();
    req.dangerous = true;
    assert_eq!(
        agent().build_command(&req),
        "WORKTREE_TASK_ID='8' opencode run \"$(cat '/tmp/p.md')\""
    );
}
