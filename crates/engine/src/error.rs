// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error type.

use thiserror::Error;

/// Errors from engine operations.
///
/// Foreseeable external faults (missing CLIs, dead sessions, git races)
/// are converted into task log lines and status transitions before they
/// reach this type; what remains is surfaced to the caller.
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Store(#[from] ty_storage::StoreError),
    #[error(transparent)]
    Mux(#[from] ty_adapters::MuxError),
    #[error(transparent)]
    Agent(#[from] ty_adapters::AgentError),
    #[error(transparent)]
    Worktree(#[from] crate::worktree::WorktreeError),
    #[error("task not found: {0}")]
    TaskNotFound(ty_core::TaskId),
    #[error("unsupported operation: {0}")]
    Unsupported(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
