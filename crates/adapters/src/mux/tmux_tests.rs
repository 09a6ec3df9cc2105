// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn line(fields: &[&str]) -> String {
    fields.join(&FIELD_SEP.to_string())
}

#[test]
fn parses_well_formed_pane_lines() {
    let stdout = format!(
        "{}\n{}\n",
        line(&["taskyou", "task-1", "@3", "%7", "1234", "claude"]),
        line(&["taskyou", "shell", "@4", "%8", "1235", "zsh"]),
    );

    let panes = parse_pane_lines(&stdout);
    assert_eq!(panes.len(), 2);
    assert_eq!(panes[0].session, "taskyou");
    assert_eq!(panes[0].window_name, "task-1");
    assert_eq!(panes[0].window_id, "@3");
    assert_eq!(panes[0].pane_id, "%7");
    assert_eq!(panes[0].pid, 1234);
    assert_eq!(panes[0].command, "claude");
}

#[test]
fn skips_malformed_lines() {
    let stdout = format!(
        "{}\nnot a pane line\n{}\n",
        line(&["taskyou", "task-1", "@3", "%7", "not-a-pid", "claude"]),
        line(&["taskyou", "task-2", "@5", "%9", "99", "node"]),
    );

    let panes = parse_pane_lines(&stdout);
    assert_eq!(panes.len(), 1);
    assert_eq!(panes[0].window_name, "task-2");
}

#[test]
fn window_names_may_contain_hyphens_and_digits() {
    let stdout = line(&["dev", "task-42", "@1", "%1", "42", "sh"]);
    let panes = parse_pane_lines(&stdout);
    assert_eq!(panes[0].window_name, "task-42");
}

#[test]
fn empty_output_parses_to_no_panes() {
    assert!(parse_pane_lines("").is_empty());
    assert!(parse_pane_lines("\n\n").is_empty());
}
