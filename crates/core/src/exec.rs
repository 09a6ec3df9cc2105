// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Outcome of one agent execution.

use serde::{Deserialize, Serialize};

/// Result of running an agent to completion.
///
/// On normal completion exactly one of `success` / `needs_input` /
/// `interrupted` is true; a hard launch failure leaves all three false
/// with the error in `message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecResult {
    pub success: bool,
    pub needs_input: bool,
    pub interrupted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ExecResult {
    pub fn success() -> Self {
        Self {
            success: true,
            needs_input: false,
            interrupted: false,
            message: None,
        }
    }

    pub fn needs_input(message: impl Into<String>) -> Self {
        Self {
            success: false,
            needs_input: true,
            interrupted: false,
            message: Some(message.into()),
        }
    }

    pub fn interrupted() -> Self {
        Self {
            success: false,
            needs_input: false,
            interrupted: true,
            message: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            needs_input: false,
            interrupted: false,
            message: Some(message.into()),
        }
    }
}

#[cfg(test)]
#[path = "exec_tests.rs"]
mod tests;
