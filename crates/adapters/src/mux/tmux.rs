// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tmux multiplexer gateway

use super::{Multiplexer, MuxError, PaneInfo, DAEMON_SESSION};
use crate::subprocess::{run_with_timeout, MUX_TIMEOUT, PROBE_TIMEOUT};
use async_trait::async_trait;
use std::path::Path;
use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Field separator for tmux format strings; unlikely to appear in names.
const FIELD_SEP: char = '\u{1f}';

/// Tmux-based multiplexer gateway
#[derive(Clone, Default)]
pub struct TmuxMux;

impl TmuxMux {
    pub fn new() -> Self {
        Self
    }

    async fn tmux(&self, args: &[&str], timeout: Duration) -> Result<Output, MuxError> {
        let mut cmd = Command::new("tmux");
        cmd.args(args);
        run_with_timeout(cmd, timeout, "tmux")
            .await
            .map_err(MuxError::CommandFailed)
    }

    async fn session_exists(&self, session: &str) -> Result<bool, MuxError> {
        let output = self
            .tmux(&["has-session", "-t", session], PROBE_TIMEOUT)
            .await?;
        Ok(output.status.success())
    }

    async fn create_window_once(
        &self,
        session: &str,
        name: &str,
        cwd: &Path,
        command: &str,
        env: &[(String, String)],
    ) -> Result<Output, MuxError> {
        let cwd_str = cwd.display().to_string();
        let mut args: Vec<String> = vec![
            "new-window".to_string(),
            "-d".to_string(),
            "-t".to_string(),
            session.to_string(),
            "-n".to_string(),
            name.to_string(),
            "-c".to_string(),
            cwd_str,
        ];
        for (key, value) in env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }
        args.push(command.to_string());

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        self.tmux(&arg_refs, MUX_TIMEOUT).await
    }
}

#[async_trait]
impl Multiplexer for TmuxMux {
    async fn ensure_daemon_session(&self) -> Result<String, MuxError> {
        if self.session_exists(DAEMON_SESSION).await? {
            return Ok(DAEMON_SESSION.to_string());
        }

        // Placeholder window keeps the session alive when the last task
        // window closes.
        let output = self
            .tmux(
                &[
                    "new-session",
                    "-d",
                    "-s",
                    DAEMON_SESSION,
                    "-n",
                    "placeholder",
                ],
                MUX_TIMEOUT,
            )
            .await?;

        // A concurrent create is fine as long as the session now exists.
        if !output.status.success() && !self.session_exists(DAEMON_SESSION).await? {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MuxError::SpawnFailed(stderr.to_string()));
        }

        Ok(DAEMON_SESSION.to_string())
    }

    async fn create_window(
        &self,
        session: &str,
        name: &str,
        cwd: &Path,
        command: &str,
        env: &[(String, String)],
    ) -> Result<String, MuxError> {
        if !cwd.exists() {
            return Err(MuxError::SpawnFailed(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }

        let mut owner = session.to_string();
        let mut output = self
            .create_window_once(&owner, name, cwd, command, env)
            .await?;

        if !output.status.success() {
            // The session may have vanished between lookup and create.
            tracing::warn!(
                session,
                window = name,
                stderr = %String::from_utf8_lossy(&output.stderr),
                "window create failed, recreating session and retrying"
            );
            owner = self.ensure_daemon_session().await?;
            output = self
                .create_window_once(&owner, name, cwd, command, env)
                .await?;
            if !output.status.success() {
                let stderr = String::from_utf8_lossy(&output.stderr);
                return Err(MuxError::SpawnFailed(stderr.to_string()));
            }
        }

        self.get_window_id(&owner, name)
            .await?
            .ok_or_else(|| MuxError::SpawnFailed(format!("window {} not found after create", name)))
    }

    async fn kill_windows_by_name(&self, name: &str) -> Result<usize, MuxError> {
        let mut killed = 0;
        for pane in self.list_panes_global().await? {
            if pane.window_name == name {
                let target = format!("{}:{}", pane.session, pane.window_id);
                let output = self.tmux(&["kill-window", "-t", &target], MUX_TIMEOUT).await?;
                if output.status.success() {
                    killed += 1;
                }
            }
        }
        Ok(killed)
    }

    async fn split_pane_horizontal(
        &self,
        target: &str,
        cwd: &Path,
        env: &[(String, String)],
    ) -> Result<(), MuxError> {
        let cwd_str = cwd.display().to_string();
        let mut args: Vec<String> = vec![
            "split-window".to_string(),
            "-h".to_string(),
            "-d".to_string(),
            "-t".to_string(),
            target.to_string(),
            "-c".to_string(),
            cwd_str,
        ];
        for (key, value) in env {
            args.push("-e".to_string());
            args.push(format!("{}={}", key, value));
        }

        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.tmux(&arg_refs, MUX_TIMEOUT).await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(target.to_string()));
        }
        Ok(())
    }

    async fn send_keys(&self, target: &str, keys: &[String]) -> Result<(), MuxError> {
        let mut args: Vec<&str> = vec!["send-keys", "-t", target];
        args.extend(keys.iter().map(String::as_str));
        let output = self.tmux(&args, MUX_TIMEOUT).await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(target.to_string()));
        }
        Ok(())
    }

    async fn capture_output(&self, target: &str, lines: u32) -> Result<String, MuxError> {
        let start = format!("-{}", lines);
        let output = self
            .tmux(
                &["capture-pane", "-t", target, "-p", "-S", &start],
                MUX_TIMEOUT,
            )
            .await?;
        if !output.status.success() {
            return Err(MuxError::NotFound(target.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn get_window_id(&self, session: &str, name: &str) -> Result<Option<String>, MuxError> {
        let format = format!("#{{window_name}}{}#{{window_id}}", FIELD_SEP);
        let output = self
            .tmux(
                &["list-windows", "-t", session, "-F", &format],
                PROBE_TIMEOUT,
            )
            .await?;
        if !output.status.success() {
            return Ok(None);
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(stdout.lines().find_map(|line| {
            let (window_name, window_id) = line.split_once(FIELD_SEP)?;
            (window_name == name).then(|| window_id.to_string())
        }))
    }

    async fn list_panes_global(&self) -> Result<Vec<PaneInfo>, MuxError> {
        let format = [
            "#{session_name}",
            "#{window_name}",
            "#{window_id}",
            "#{pane_id}",
            "#{pane_pid}",
            "#{pane_current_command}",
        ]
        .join(&FIELD_SEP.to_string());

        let output = self
            .tmux(&["list-panes", "-a", "-F", &format], MUX_TIMEOUT)
            .await?;
        if !output.status.success() {
            // No server running means no panes.
            return Ok(Vec::new());
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        Ok(parse_pane_lines(&stdout))
    }

    async fn window_exists(&self, target: &str) -> Result<bool, MuxError> {
        let output = self
            .tmux(&["list-panes", "-t", target], PROBE_TIMEOUT)
            .await?;
        Ok(output.status.success())
    }
}

/// Parse `list-panes -a` output into pane records.
///
/// Lines that do not have all six fields (or a numeric pid) are skipped.
fn parse_pane_lines(stdout: &str) -> Vec<PaneInfo> {
    stdout
        .lines()
        .filter_map(|line| {
            let fields: Vec<&str> = line.split(FIELD_SEP).collect();
            let [session, window_name, window_id, pane_id, pid, command] = fields[..] else {
                return None;
            };
            Some(PaneInfo {
                session: session.to_string(),
                window_name: window_name.to_string(),
                window_id: window_id.to_string(),
                pane_id: pane_id.to_string(),
                pid: pid.parse().ok()?,
                command: command.to_string(),
            })
        })
        .collect()
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
