// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-task isolated git worktrees.
//!
//! Every task executes inside `{project}/.task-worktrees/{id}-{slug}` on
//! branch `task/{id}-{slug}`. The worktree path is sticky: once set and
//! present on disk it is reused verbatim, so renaming a task never moves
//! its working copy.

use crate::broker::LogBroker;
use crate::git;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use ty_adapters::subprocess::{GIT_TIMEOUT, GIT_WORKTREE_TIMEOUT, HOOK_SCRIPT_TIMEOUT};
use ty_core::{slugify, LogLineType, Task, TaskId};
use ty_storage::TaskStore;

/// Directory under the project root holding all task worktrees.
pub const WORKTREES_DIR: &str = ".task-worktrees";

/// Project configuration file names, tried in order.
const CONFIG_FILES: [&str; 3] = [".taskyou.yml", ".taskyou.yaml", "taskyou.yml"];

/// Conventional hook script locations.
const SETUP_SCRIPT: &str = "bin/worktree-setup";
const TEARDOWN_SCRIPT: &str = "bin/worktree-teardown";

/// Errors from worktree provisioning
#[derive(Debug, Error)]
pub enum WorktreeError {
    #[error("task {0} has no project")]
    NoProject(TaskId),
    #[error("project not found: {0}")]
    ProjectNotFound(String),
    #[error("git error: {0}")]
    Git(String),
    #[error("refusing workdir outside {WORKTREES_DIR}: {0}")]
    OutsideWorktree(PathBuf),
    #[error(transparent)]
    Store(#[from] ty_storage::StoreError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// `.taskyou.yml` contents.
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub worktree: WorktreeHooks,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct WorktreeHooks {
    #[serde(default)]
    pub init_script: Option<String>,
    #[serde(default)]
    pub teardown_script: Option<String>,
}

impl ProjectConfig {
    /// Load the project config, tolerating a missing or malformed file.
    pub fn load(project_path: &Path) -> Self {
        for name in CONFIG_FILES {
            let path = project_path.join(name);
            let Ok(content) = std::fs::read_to_string(&path) else {
                continue;
            };
            match serde_yaml::from_str(&content) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "malformed project config");
                    return Self::default();
                }
            }
        }
        Self::default()
    }
}

/// Creates, reuses, and destroys per-task worktrees.
pub struct WorktreeManager {
    store: Arc<TaskStore>,
    broker: Arc<LogBroker>,
}

impl WorktreeManager {
    pub fn new(store: Arc<TaskStore>, broker: Arc<LogBroker>) -> Self {
        Self { store, broker }
    }

    /// Provision (or reuse) the task's worktree and return its path.
    ///
    /// The returned directory is guaranteed absolute, existing, and inside
    /// a `.task-worktrees` subtree; launch is refused otherwise.
    pub async fn setup_worktree(&self, task: &Task) -> Result<PathBuf, WorktreeError> {
        // Reuse an existing worktree verbatim; never recompute from a
        // renamed title.
        if let Some(existing) = &task.worktree_path {
            if existing.is_dir() {
                ensure_isolated(existing)?;
                if task.port == 0 {
                    self.store.allocate_port(task.id)?;
                }
                return Ok(existing.clone());
            }
        }

        let project_name = task
            .project
            .as_deref()
            .ok_or(WorktreeError::NoProject(task.id))?;
        let project = self
            .store
            .get_project(project_name)
            .ok_or_else(|| WorktreeError::ProjectNotFound(project_name.to_string()))?;

        // Legacy recovery: a registered project directory that was never
        // initialized gets a repo with an empty root commit.
        if !git::is_work_tree(&project.path).await {
            init_repo(&project.path).await?;
        }

        let slug = slugify(&task.title);
        let leaf = if slug.is_empty() {
            task.id.to_string()
        } else {
            format!("{}-{}", task.id, slug)
        };
        let branch = format!("task/{}", leaf);
        let work_dir = project.path.join(WORKTREES_DIR).join(&leaf);

        ensure_gitignore(&project.path)?;

        let default = git::default_branch(&project.path).await;
        add_worktree(&project.path, &work_dir, &branch, &default).await?;
        ensure_isolated(&work_dir)?;

        let port = self.store.allocate_port(task.id)?;

        let mut updated = self
            .store
            .get_task(task.id)
            .ok_or(ty_storage::StoreError::TaskNotFound(task.id))?;
        updated.worktree_path = Some(work_dir.clone());
        updated.branch = Some(branch);
        self.store.update_task(updated)?;

        self.run_hook_script(task.id, &project.path, &work_dir, port, HookKind::Init)
            .await;

        Ok(work_dir)
    }

    /// Remove the worktree and its branch; already-gone is fine.
    pub async fn cleanup_worktree(&self, task: &Task) -> Result<(), WorktreeError> {
        let Some(work_dir) = &task.worktree_path else {
            return Ok(());
        };
        let Some(project) = task.project.as_deref().and_then(|p| self.store.get_project(p))
        else {
            return Ok(());
        };

        if work_dir.is_dir() {
            self.run_hook_script(
                task.id,
                &project.path,
                work_dir,
                task.port,
                HookKind::Teardown,
            )
            .await;
        }

        let dir_str = work_dir.display().to_string();
        let (ok, stderr) = git::git_run(
            &project.path,
            &["worktree", "remove", "--force", &dir_str],
            GIT_WORKTREE_TIMEOUT,
        )
        .await;
        if !ok {
            tracing::debug!(task_id = task.id, stderr, "worktree remove failed (tolerated)");
        }

        if let Some(branch) = &task.branch {
            let (ok, stderr) =
                git::git_run(&project.path, &["branch", "-D", branch], GIT_TIMEOUT).await;
            if !ok {
                tracing::debug!(task_id = task.id, stderr, "branch delete failed (tolerated)");
            }
        }

        if work_dir.exists() {
            tokio::fs::remove_dir_all(work_dir).await?;
        }
        Ok(())
    }

    /// Run the configured init/teardown script, streaming its output into
    /// the task log. Script failure is a warning, never fatal.
    async fn run_hook_script(
        &self,
        task_id: TaskId,
        project_path: &Path,
        work_dir: &Path,
        port: u16,
        kind: HookKind,
    ) {
        let Some(script) = resolve_hook_script(project_path, kind) else {
            return;
        };

        let _ = self.broker.log_system(
            task_id,
            &format!("Running {} script: {}", kind.label(), script.display()),
        );

        let mut cmd = tokio::process::Command::new(&script);
        cmd.current_dir(work_dir)
            .env("WORKTREE_TASK_ID", task_id.to_string())
            .env("WORKTREE_PORT", port.to_string())
            .env("WORKTREE_PATH", work_dir)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => {
                let _ = self.broker.append_log(
                    task_id,
                    LogLineType::Error,
                    &format!("{} script failed to start: {}", kind.label(), e),
                );
                return;
            }
        };

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let out_task = self.stream_lines(task_id, stdout, LogLineType::Output);
        let err_task = self.stream_lines(task_id, stderr, LogLineType::Error);

        let status = tokio::time::timeout(HOOK_SCRIPT_TIMEOUT, child.wait()).await;
        let _ = tokio::join!(out_task, err_task);

        match status {
            Ok(Ok(status)) if status.success() => {}
            Ok(Ok(status)) => {
                let _ = self.broker.log_system(
                    task_id,
                    &format!(
                        "Warning: {} script exited with {}",
                        kind.label(),
                        status.code().unwrap_or(-1)
                    ),
                );
            }
            Ok(Err(e)) => {
                let _ = self
                    .broker
                    .log_system(task_id, &format!("Warning: {} script: {}", kind.label(), e));
            }
            Err(_) => {
                let _ = child.kill().await;
                let _ = self.broker.log_system(
                    task_id,
                    &format!("Warning: {} script timed out", kind.label()),
                );
            }
        }
    }

    fn stream_lines<R>(
        &self,
        task_id: TaskId,
        reader: Option<R>,
        line_type: LogLineType,
    ) -> tokio::task::JoinHandle<()>
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
    {
        let broker = Arc::clone(&self.broker);
        tokio::spawn(async move {
            let Some(reader) = reader else { return };
            let mut lines = BufReader::new(reader).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let _ = broker.append_log(task_id, line_type, &line);
            }
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HookKind {
    Init,
    Teardown,
}

impl HookKind {
    fn label(&self) -> &'static str {
        match self {
            HookKind::Init => "init",
            HookKind::Teardown => "teardown",
        }
    }
}

/// Resolve the hook script for a project: explicit config first, then the
/// conventional executable location.
fn resolve_hook_script(project_path: &Path, kind: HookKind) -> Option<PathBuf> {
    let config = ProjectConfig::load(project_path);
    let configured = match kind {
        HookKind::Init => config.worktree.init_script,
        HookKind::Teardown => config.worktree.teardown_script,
    };

    if let Some(script) = configured {
        let path = PathBuf::from(&script);
        let path = if path.is_absolute() {
            path
        } else {
            project_path.join(path)
        };
        if path.is_file() {
            return Some(path);
        }
        tracing::warn!(script, "configured hook script not found");
    }

    let conventional = project_path.join(match kind {
        HookKind::Init => SETUP_SCRIPT,
        HookKind::Teardown => TEARDOWN_SCRIPT,
    });
    (conventional.is_file() && is_executable(&conventional)).then_some(conventional)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path)
        .map(|m| m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(_path: &Path) -> bool {
    true
}

/// Security invariant: the working directory handed to an agent is
/// absolute, exists, and sits inside a `.task-worktrees` subtree.
pub fn ensure_isolated(path: &Path) -> Result<(), WorktreeError> {
    let inside = path
        .components()
        .any(|c| c.as_os_str() == WORKTREES_DIR);
    if !path.is_absolute() || !inside || !path.is_dir() {
        return Err(WorktreeError::OutsideWorktree(path.to_path_buf()));
    }
    Ok(())
}

/// Idempotently add `.task-worktrees/` to the project's gitignore.
fn ensure_gitignore(project_path: &Path) -> Result<(), WorktreeError> {
    let path = project_path.join(".gitignore");
    let line = format!("{}/", WORKTREES_DIR);
    let current = std::fs::read_to_string(&path).unwrap_or_default();
    if current.lines().any(|l| l.trim() == line || l.trim() == WORKTREES_DIR) {
        return Ok(());
    }
    let mut updated = current;
    if !updated.is_empty() && !updated.ends_with('\n') {
        updated.push('\n');
    }
    updated.push_str(&line);
    updated.push('\n');
    std::fs::write(&path, updated)?;
    Ok(())
}

/// Initialize a bare project directory as a repo with an empty root
/// commit (legacy recovery path).
async fn init_repo(path: &Path) -> Result<(), WorktreeError> {
    std::fs::create_dir_all(path)?;
    let (ok, stderr) = git::git_run(path, &["init"], GIT_TIMEOUT).await;
    if !ok {
        return Err(WorktreeError::Git(format!("git init: {}", stderr)));
    }
    let (ok, stderr) = git::git_run(
        path,
        &[
            "-c",
            "user.name=taskyou",
            "-c",
            "user.email=taskyou@localhost",
            "commit",
            "--allow-empty",
            "-m",
            "Initial commit",
        ],
        GIT_TIMEOUT,
    )
    .await;
    if !ok {
        return Err(WorktreeError::Git(format!("initial commit: {}", stderr)));
    }
    Ok(())
}

/// Create the worktree, recovering from branch/checkout races.
async fn add_worktree(
    project_path: &Path,
    work_dir: &Path,
    branch: &str,
    default_branch: &str,
) -> Result<(), WorktreeError> {
    if work_dir.is_dir() {
        return Ok(());
    }
    let dir_str = work_dir.display().to_string();

    let (ok, stderr) = git::git_run(
        project_path,
        &["worktree", "add", "-b", branch, &dir_str, default_branch],
        GIT_WORKTREE_TIMEOUT,
    )
    .await;
    if ok {
        return Ok(());
    }

    if stderr.contains("already exists") {
        // Branch exists from an earlier attempt: attach it instead.
        let (ok, stderr) = git::git_run(
            project_path,
            &["worktree", "add", &dir_str, branch],
            GIT_WORKTREE_TIMEOUT,
        )
        .await;
        if ok {
            return Ok(());
        }
        if stderr.contains("already checked out") && work_dir.is_dir() {
            return Ok(());
        }
        return Err(WorktreeError::Git(stderr));
    }

    if stderr.contains("already checked out") && work_dir.is_dir() {
        return Ok(());
    }

    Err(WorktreeError::Git(stderr))
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
