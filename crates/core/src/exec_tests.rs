// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn flag_count(result: &ExecResult) -> usize {
    [result.success, result.needs_input, result.interrupted]
        .iter()
        .filter(|b| **b)
        .count()
}

#[test]
fn constructors_set_exactly_one_flag() {
    assert_eq!(flag_count(&ExecResult::success()), 1);
    assert_eq!(flag_count(&ExecResult::needs_input("waiting")), 1);
    assert_eq!(flag_count(&ExecResult::interrupted()), 1);
}

#[test]
fn error_sets_no_flag_but_carries_message() {
    let result = ExecResult::error("claude not found");
    assert_eq!(flag_count(&result), 0);
    assert_eq!(result.message.as_deref(), Some("claude not found"));
}

#[test]
fn needs_input_carries_message() {
    let result = ExecResult::needs_input("Task needs review");
    assert_eq!(result.message.as_deref(), Some("Task needs review"));
}
