// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    pattern = { "pattern", MemoryCategory::Pattern },
    patterns = { "patterns", MemoryCategory::Pattern },
    decision = { "decisions", MemoryCategory::Decision },
    gotcha = { "Gotchas", MemoryCategory::Gotcha },
    pitfall = { "pitfalls", MemoryCategory::Gotcha },
    context = { "context", MemoryCategory::Context },
    unknown = { "misc", MemoryCategory::General },
    whitespace = { "  pattern  ", MemoryCategory::Pattern },
)]
fn category_normalization(raw: &str, expected: MemoryCategory) {
    assert_eq!(MemoryCategory::normalize(raw), expected);
}

#[test]
fn category_order_matches_prompt_order() {
    assert_eq!(
        MemoryCategory::ALL,
        [
            MemoryCategory::Pattern,
            MemoryCategory::Context,
            MemoryCategory::Decision,
            MemoryCategory::Gotcha,
            MemoryCategory::General,
        ]
    );
}

#[test]
fn project_defaults() {
    let project = Project::new("proj", "/proj");
    assert!(project.aliases.is_empty());
    assert!(project.instructions.is_empty());
    assert!(project.agent_config_dir.is_none());
}
