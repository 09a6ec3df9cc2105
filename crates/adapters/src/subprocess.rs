// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for multiplexer commands.
pub const MUX_TIMEOUT: Duration = Duration::from_secs(10);

/// Short timeout for liveness probes (window existence checks).
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Default timeout for local git queries.
pub const GIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for network operations (remote ref listing, PR lookup).
pub const NETWORK_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for git worktree add/remove.
pub const GIT_WORKTREE_TIMEOUT: Duration = Duration::from_secs(60);

/// Timeout for worktree init/teardown scripts.
pub const HOOK_SCRIPT_TIMEOUT: Duration = Duration::from_secs(300);

/// Timeout for the one-shot distillation agent call.
pub const DISTILL_TIMEOUT: Duration = Duration::from_secs(180);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting
/// timeout expiration into a descriptive error message. The child process
/// is killed automatically if the timeout elapses (via the tokio `Child`
/// drop implementation).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{} failed: {}", description, io_err)),
        Err(_elapsed) => Err(format!(
            "{} timed out after {}s",
            description,
            timeout.as_secs()
        )),
    }
}

/// Run a command and return trimmed stdout on success, `None` otherwise.
pub async fn run_capture(
    cmd: Command,
    timeout: Duration,
    description: &str,
) -> Option<String> {
    match run_with_timeout(cmd, timeout, description).await {
        Ok(output) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        Ok(_) => None,
        Err(e) => {
            tracing::debug!(error = %e, "{} failed", description);
            None
        }
    }
}

#[cfg(test)]
#[path = "subprocess_tests.rs"]
mod tests;
