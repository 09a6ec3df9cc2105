// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::agent::LaunchRequest;
use crate::mux::FakeMux;
use serial_test::serial;

fn agent() -> PiAgent {
    PiAgent::new(Arc::new(ProcessControl::new(Arc::new(FakeMux::new()))))
}

fn restore_home(orig: Option<std::ffi::OsString>) {
    match orig {
        Some(v) => std::env::set_var("HOME", v),
        None => std::env::remove_var("HOME"),
    }
}

#[test]
fn session_file_lives_next_to_worktrees() {
    let path = PiAgent::session_file(5, Path::new("/proj/.task-worktrees/5-fix")).unwrap();
    assert_eq!(
        path,
        Path::new("/proj/.task-worktrees/sessions/task-5.jsonl")
    );
}

#[test]
fn command_always_passes_session_path() {
    let req = LaunchRequest {
        task_id: 5,
        session_id: None,
        prompt_path: Some("/tmp/p.md".into()),
        dangerous: false,
        env: Vec::new(),
        work_dir: "/proj/.task-worktrees/5-fix".into(),
    };
    let command = agent().build_command(&req);
    assert!(command.contains("--session '/proj/.task-worktrees/sessions/task-5.jsonl'"));
    assert!(!command.contains("--continue"));
}

#[test]
fn resume_adds_continue() {
    let req = LaunchRequest {
        task_id: 5,
        session_id: Some("/proj/.task-worktrees/sessions/task-5.jsonl".to_string()),
        prompt_path: None,
        dangerous: false,
        env: Vec::new(),
        work_dir: "/proj/.task-worktrees/5-fix".into(),
    };
    assert!(agent().build_command(&req).contains("--continue"));
}

#[test]
fn no_dangerous_mode() {
    let agent = agent();
    assert!(!agent.supports_dangerous_mode());
    assert!(agent.dangerous_args().is_empty());
}

#[test]
#[serial]
fn finds_explicit_session_file_first() {
    let orig_home = std::env::var_os("HOME");
    let home = tempfile::tempdir().unwrap();
    std::env::set_var("HOME", home.path());

    let project = tempfile::tempdir().unwrap();
    let work_dir = project.path().join(".task-worktrees/6-x");
    let sessions = project.path().join(".task-worktrees/sessions");
    std::fs::create_dir_all(&work_dir).unwrap();
    std::fs::create_dir_all(&sessions).unwrap();
    let session_file = sessions.join("task-6.jsonl");
    std::fs::write(&session_file, "{}").unwrap();

    assert_eq!(
        agent().find_session_id(6, &work_dir).as_deref(),
        Some(session_file.display().to_string().as_str())
    );

    restore_home(orig_home);
}

#[test]
#[serial]
fn falls_back_to_legacy_dir() {
    let orig_home = std::env::var_os("HOME");
    let home = tempfile::tempdir().unwrap();
    std::env::set_var("HOME", home.path());

    let work_dir = Path::new("/proj/.task-worktrees/6-x");
    let legacy = home
        .path()
        .join(".pi/agent/sessions")
        .join(super::escape_project_dir(work_dir));
    std::fs::create_dir_all(&legacy).unwrap();
    std::fs::write(legacy.join("legacy.jsonl"), "{}").unwrap();

    let found = agent().find_session_id(6, work_dir).unwrap();
    assert!(found.ends_with("legacy.jsonl"));

    restore_home(orig_home);
}
