// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent CLI adapters.
//!
//! One adapter per supported coding-agent CLI (Claude, Codex, Gemini, Pi,
//! OpenClaw, OpenCode), all behind the uniform [`Agent`] contract:
//! availability, launch-command construction, session discovery, dangerous
//! -mode support, and process identification. Capability differences are
//! expressed through the `supports_*` predicates rather than sniffing.
//!
//! Prompts are passed to the CLI via shell substitution over a short-lived
//! temp file (`"$(cat <file>)"`), which sidesteps quoting problems; the
//! engine unlinks the file once the window is up.

mod claude;
mod codex;
mod gemini;
mod openclaw;
mod opencode;
mod pi;
mod process;

pub use claude::ClaudeAgent;
pub use codex::CodexAgent;
pub use gemini::GeminiAgent;
pub use openclaw::OpenClawAgent;
pub use opencode::OpenCodeAgent;
pub use pi::PiAgent;
pub use process::ProcessControl;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAgent;

use crate::mux::Multiplexer;
use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::NamedTempFile;
use thiserror::Error;
use ty_core::TaskId;

/// Errors from agent operations
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("agent not available: {0}")]
    Unavailable(String),
    #[error("launch failed: {0}")]
    LaunchFailed(String),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Everything an adapter needs to build a launch command.
#[derive(Debug, Clone)]
pub struct LaunchRequest {
    pub task_id: TaskId,
    /// Session to resume; `None` for a first run.
    pub session_id: Option<String>,
    /// Temp file holding the composed prompt.
    pub prompt_path: Option<PathBuf>,
    pub dangerous: bool,
    /// `WORKTREE_*` variables, prefixed onto the command.
    pub env: Vec<(String, String)>,
    pub work_dir: PathBuf,
}

/// Uniform contract over the supported agent CLIs.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Adapter identifier ("claude", "codex", ...).
    fn name(&self) -> &'static str;

    /// Binary the CLI runs as; overridable per adapter.
    fn binary(&self) -> String {
        self.name().to_string()
    }

    /// Whether the CLI is on the search path.
    fn is_available(&self) -> bool {
        which::which(self.binary()).is_ok()
    }

    fn supports_session_resume(&self) -> bool;

    fn supports_dangerous_mode(&self) -> bool;

    /// Args enabling dangerous mode; empty when unsupported.
    fn dangerous_args(&self) -> Vec<String> {
        Vec::new()
    }

    /// The shell command a multiplexer window should run.
    fn build_command(&self, req: &LaunchRequest) -> String;

    /// Adapter-specific discovery of the most recent session associated
    /// with the working directory.
    fn find_session_id(&self, task_id: TaskId, work_dir: &Path) -> Option<String>;

    /// Shared signal-driven process controller.
    fn process(&self) -> &ProcessControl;

    /// PID of this agent's process inside the task window, if any.
    async fn process_id(&self, task_id: TaskId) -> Option<i32> {
        self.process().find_pid(task_id, &self.binary()).await
    }

    /// Terminate the agent process. The window is intentionally retained
    /// so the user can inspect output.
    async fn kill(&self, task_id: TaskId) -> bool {
        self.process().kill(task_id, &self.binary()).await
    }

    /// Pause the agent process with the stop signal.
    async fn suspend(&self, task_id: TaskId) -> bool {
        self.process().suspend(task_id, &self.binary()).await
    }

    fn is_suspended(&self, task_id: TaskId) -> bool {
        self.process().is_suspended(task_id)
    }

    /// Continue a previously suspended agent process.
    async fn resume_process(&self, task_id: TaskId) -> bool {
        self.process().resume(task_id, &self.binary()).await
    }
}

/// Build the full adapter registry.
pub fn registry(
    mux: Arc<dyn Multiplexer>,
) -> (HashMap<String, Arc<dyn Agent>>, Arc<ProcessControl>) {
    let process = Arc::new(ProcessControl::new(mux));
    let agents: Vec<Arc<dyn Agent>> = vec![
        Arc::new(ClaudeAgent::new(process.clone())),
        Arc::new(CodexAgent::new(process.clone())),
        Arc::new(GeminiAgent::new(process.clone())),
        Arc::new(PiAgent::new(process.clone())),
        Arc::new(OpenClawAgent::new(process.clone())),
        Arc::new(OpenCodeAgent::new(process.clone())),
    ];
    let map = agents
        .into_iter()
        .map(|a| (a.name().to_string(), a))
        .collect();
    (map, process)
}

/// Resolve an adapter by name, falling back to the configured default.
pub fn resolve<'a>(
    agents: &'a HashMap<String, Arc<dyn Agent>>,
    name: Option<&str>,
) -> Option<&'a Arc<dyn Agent>> {
    let default = crate::env::default_executor();
    name.and_then(|n| agents.get(n))
        .or_else(|| agents.get(&default))
        .or_else(|| agents.get(crate::env::DEFAULT_EXECUTOR))
}

/// Write a prompt to a short-lived temp file.
///
/// The returned guard unlinks the file on drop; keep it alive until the
/// window has started.
pub fn write_prompt_file(prompt: &str) -> io::Result<NamedTempFile> {
    use std::io::Write as _;
    let mut file = tempfile::Builder::new()
        .prefix("taskyou-prompt-")
        .suffix(".md")
        .tempfile()?;
    file.write_all(prompt.as_bytes())?;
    file.flush()?;
    Ok(file)
}

/// Shell-quote a value with single quotes.
pub fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}

/// Render `KEY='value'` pairs for prefixing onto a launch command.
pub fn env_prefix(env: &[(String, String)]) -> String {
    env.iter()
        .map(|(k, v)| format!("{}={}", k, shell_quote(v)))
        .collect::<Vec<_>>()
        .join(" ")
}

/// The `"$(cat <file>)"` substitution used to pass prompts.
pub fn prompt_substitution(path: &Path) -> String {
    format!("\"$(cat {})\"", shell_quote(&path.display().to_string()))
}

/// Escape a directory path the way per-project agent state dirs do
/// (every non-alphanumeric character becomes a hyphen).
pub fn escape_project_dir(path: &Path) -> String {
    path.display()
        .to_string()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '-' })
        .collect()
}

/// Newest regular file in `dir`, by modification time.
pub fn newest_file_in(dir: &Path) -> Option<PathBuf> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .filter(|e| e.path().is_file())
        .filter_map(|e| {
            let mtime = e.metadata().ok()?.modified().ok()?;
            Some((mtime, e.path()))
        })
        .max_by_key(|(mtime, _)| *mtime)
        .map(|(_, path)| path)
}

/// Assemble the standard command shape: env prefix, binary, args, prompt.
fn assemble_command(
    env: &[(String, String)],
    binary: &str,
    args: &[String],
    prompt_path: Option<&Path>,
) -> String {
    let mut parts: Vec<String> = Vec::new();
    let prefix = env_prefix(env);
    if !prefix.is_empty() {
        parts.push(prefix);
    }
    parts.push(binary.to_string());
    parts.extend(args.iter().cloned());
    if let Some(path) = prompt_path {
        parts.push(prompt_substitution(path));
    }
    parts.join(" ")
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
