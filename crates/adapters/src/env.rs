// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the adapters crate.

/// Executor override variable, checked first.
pub const TASK_EXECUTOR: &str = "TASK_EXECUTOR";

/// Legacy aliases for [`TASK_EXECUTOR`], checked in order.
pub const TASK_EXECUTOR_ALIASES: [&str; 2] = ["TASKYOU_EXECUTOR", "TY_EXECUTOR"];

/// Name of the default executor when nothing is configured.
pub const DEFAULT_EXECUTOR: &str = "claude";

/// Resolve the configured executor name.
///
/// `TASK_EXECUTOR` wins; the legacy aliases are honored for older setups.
pub fn default_executor() -> String {
    std::iter::once(TASK_EXECUTOR)
        .chain(TASK_EXECUTOR_ALIASES)
        .find_map(|var| std::env::var(var).ok())
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| DEFAULT_EXECUTOR.to_string())
}

/// Extra dangerous-mode args for the Gemini CLI (overrides `--yolo`).
pub fn gemini_dangerous_args() -> Option<String> {
    std::env::var("GEMINI_DANGEROUS_ARGS")
        .ok()
        .filter(|v| !v.trim().is_empty())
}

/// OpenClaw binary override.
pub fn openclaw_bin() -> Option<String> {
    std::env::var("OPENCLAW_BIN").ok().filter(|v| !v.is_empty())
}

/// Extra args appended to every OpenClaw launch.
pub fn openclaw_args() -> Option<String> {
    std::env::var("OPENCLAW_ARGS")
        .ok()
        .filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
