// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use chrono::Utc;
use ty_core::{Task, TaskStatus};

fn task(title: &str, body: &str) -> Task {
    let mut task = Task::new(1, title, Utc::now());
    task.body = body.to_string();
    task.project = Some("proj".to_string());
    task.task_type = Some("code".to_string());
    task
}

fn memory(category: MemoryCategory, content: &str) -> ProjectMemory {
    ProjectMemory {
        id: 1,
        project: "proj".to_string(),
        category,
        content: content.to_string(),
        source_task_id: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    }
}

fn log_entry(id: i64, line_type: LogLineType, content: &str) -> LogEntry {
    LogEntry {
        id,
        task_id: 1,
        line_type,
        content: content.to_string(),
        created_at: Utc::now(),
    }
}

fn base_input<'a>(task: &'a Task) -> PromptInput<'a> {
    PromptInput {
        task,
        project: None,
        task_type: None,
        memories: &[],
        similar: &[],
        log: &[],
        attachments: &[],
        first_run: true,
    }
}

#[test]
fn substitutes_known_placeholders_only() {
    let mut vars = HashMap::new();
    vars.insert("title", "Add email".to_string());
    vars.insert("project", "proj".to_string());

    let out = substitute("{title} in {project} keeps {unknown}", &vars);
    assert_eq!(out, "Add email in proj keeps {unknown}");
}

#[test]
fn generic_template_used_without_type() {
    let task = task("Add contact email", "Put it in the footer.");
    let out = compose(&base_input(&task));
    assert!(out.contains("# Task: Add contact email"));
    assert!(out.contains("Put it in the footer."));
    assert!(out.contains("## Task Conventions"));
}

#[test]
fn memories_grouped_in_category_order() {
    let task = task("t", "a body that is long enough to not be under-specified at all");
    let memories = vec![
        memory(MemoryCategory::General, "general note"),
        memory(MemoryCategory::Pattern, "use the service layer"),
        memory(MemoryCategory::Gotcha, "cache invalidation bites"),
    ];
    let mut input = base_input(&task);
    input.memories = &memories;

    let out = compose(&input);
    let pattern_pos = out.find("use the service layer").unwrap();
    let gotcha_pos = out.find("cache invalidation bites").unwrap();
    let general_pos = out.find("general note").unwrap();
    assert!(pattern_pos < gotcha_pos && gotcha_pos < general_pos);
}

#[test]
fn similar_tasks_render_as_pointers() {
    let task = task("t", "a body that is long enough to not be under-specified at all");
    let mut similar = Task::new(7, "Earlier email work", Utc::now());
    similar.status = TaskStatus::Done;
    let similar = vec![similar];

    let mut input = base_input(&task);
    input.similar = &similar;

    let out = compose(&input);
    assert!(out.contains("#7 Earlier email work (done)"));
}

#[test]
fn triage_block_only_for_thin_first_runs() {
    let thin = Task::new(1, "Fix", Utc::now());
    let out = compose(&base_input(&thin));
    assert!(out.contains("## Before You Start"));

    // Same task on a later run: no triage.
    let mut input = base_input(&thin);
    input.first_run = false;
    assert!(!compose(&input).contains("## Before You Start"));

    // A well-specified task never gets it.
    let full = task(
        "Add contact email to the footer",
        "Replace the footer address with the new support alias everywhere.",
    );
    assert!(!compose(&base_input(&full)).contains("## Before You Start"));
}

#[test]
fn on_create_action_overrides_triage() {
    let thin = Task::new(1, "Fix", Utc::now());
    let task_type = TaskType {
        name: "code".to_string(),
        template: "{title}".to_string(),
        on_create: Some("Run the linter first.".to_string()),
    };
    let mut input = base_input(&thin);
    input.task_type = Some(&task_type);

    let out = compose(&input);
    assert!(out.contains("Run the linter first."));
    assert!(!out.contains("## Before You Start"));
}

#[test]
fn history_requires_continuation_marker() {
    let task = task("t", "a body that is long enough to not be under-specified at all");
    let log_without_marker = vec![
        log_entry(1, LogLineType::Question, "Which TLS version?"),
        log_entry(2, LogLineType::Relay, "1.3 only"),
    ];
    let mut input = base_input(&task);
    input.log = &log_without_marker;
    assert!(!compose(&input).contains("## Conversation History"));

    let log_with_marker = vec![
        log_entry(1, LogLineType::Question, "Which TLS version?"),
        log_entry(2, LogLineType::System, CONTINUATION_MARKER),
        log_entry(3, LogLineType::Relay, "1.3 only"),
    ];
    input.log = &log_with_marker;
    let out = compose(&input);
    assert!(out.contains("## Conversation History"));
    assert!(out.contains("Which TLS version?"));
    assert!(out.contains("1.3 only"));
}

#[test]
fn attachments_listed_by_path() {
    let task = task("t", "a body that is long enough to not be under-specified at all");
    let attachments = vec![PathBuf::from("/tmp/attach/design.png")];
    let mut input = base_input(&task);
    input.attachments = &attachments;

    let out = compose(&input);
    assert!(out.contains("/tmp/attach/design.png"));
}

#[test]
fn empty_sections_leave_no_blank_runs() {
    let task = task("t", "a body that is long enough to not be under-specified at all");
    let out = compose(&base_input(&task));
    assert!(!out.contains("\n\n\n"));
}

#[test]
fn feedback_section_format() {
    let out = feedback_section("use TLS 1.3 only");
    assert_eq!(out, "## User Feedback\n\nuse TLS 1.3 only");
}
