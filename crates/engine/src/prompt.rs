// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Initial prompt composition.
//!
//! The prompt is assembled from the task-type template (or a generic
//! fallback) with placeholder substitution, wrapped by optional pre-task
//! instructions and a fixed guidance epilogue. Empty sections vanish.

use std::collections::HashMap;
use std::path::PathBuf;
use ty_core::log::CONTINUATION_MARKER;
use ty_core::{LogEntry, LogLineType, MemoryCategory, Project, ProjectMemory, Task, TaskType};

/// The placeholders a template may reference; anything else stays
/// literal.
pub const PLACEHOLDERS: [&str; 8] = [
    "project",
    "title",
    "body",
    "project_instructions",
    "memories",
    "similar_tasks",
    "attachments",
    "history",
];

/// Guidance appended to every prompt.
const EPILOGUE: &str = "\
## Task Conventions

- When the task is complete, say so explicitly and stop.
- If you are blocked on a question only the user can answer, ask it as
  your final message and stop; the task will wait for input.
- Do not push branches or open pull requests unless the task asks for it.";

/// Default triage instructions for under-specified tasks on first run.
const TRIAGE: &str = "\
## Before You Start

This task is thin on detail. Begin by restating what you believe is being
asked, list any assumptions you are making, and only then proceed. If an
assumption feels risky, stop and ask instead.";

/// Everything the composer reads.
pub struct PromptInput<'a> {
    pub task: &'a Task,
    pub project: Option<&'a Project>,
    pub task_type: Option<&'a TaskType>,
    pub memories: &'a [ProjectMemory],
    pub similar: &'a [Task],
    pub log: &'a [LogEntry],
    pub attachments: &'a [PathBuf],
    pub first_run: bool,
}

/// Build the initial prompt.
pub fn compose(input: &PromptInput) -> String {
    let mut vars: HashMap<&str, String> = HashMap::new();
    vars.insert("project", input.task.project.clone().unwrap_or_default());
    vars.insert("title", input.task.title.clone());
    vars.insert("body", input.task.body.clone());
    vars.insert(
        "project_instructions",
        render_instructions(input.project),
    );
    vars.insert("memories", render_memories(input.memories));
    vars.insert("similar_tasks", render_similar(input.similar));
    vars.insert("attachments", render_attachments(input.attachments));
    vars.insert("history", render_history(input.log));

    let template = input
        .task_type
        .map(|t| t.template.as_str())
        .unwrap_or_else(|| TaskType::generic_template());

    let mut sections: Vec<String> = Vec::new();
    if input.first_run {
        if let Some(action) = input.task_type.and_then(|t| t.on_create.as_deref()) {
            sections.push(action.to_string());
        } else if input.task.is_under_specified() {
            sections.push(TRIAGE.to_string());
        }
    }
    sections.push(substitute(template, &vars));
    sections.push(EPILOGUE.to_string());

    let joined = sections
        .iter()
        .filter(|s| !s.trim().is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("\n\n");

    collapse_blank_runs(&joined)
}

/// Replace `{placeholder}` occurrences for the recognized names only.
pub fn substitute(template: &str, vars: &HashMap<&str, String>) -> String {
    let mut result = template.to_string();
    for key in PLACEHOLDERS {
        let needle = format!("{{{}}}", key);
        if let Some(value) = vars.get(key) {
            result = result.replace(&needle, value);
        }
    }
    result
}

fn render_instructions(project: Option<&Project>) -> String {
    match project {
        Some(p) if !p.instructions.trim().is_empty() => {
            format!("## Project Instructions\n\n{}", p.instructions.trim())
        }
        _ => String::new(),
    }
}

/// Memories grouped by category, in pattern → context → decision →
/// gotcha → general order.
fn render_memories(memories: &[ProjectMemory]) -> String {
    if memories.is_empty() {
        return String::new();
    }
    let mut out = String::from("## Project Memories\n");
    for category in MemoryCategory::ALL {
        let in_category: Vec<&ProjectMemory> =
            memories.iter().filter(|m| m.category == category).collect();
        if in_category.is_empty() {
            continue;
        }
        out.push_str(&format!("\n### {}\n", category));
        for memory in in_category {
            out.push_str(&format!("- {}\n", memory.content.trim()));
        }
    }
    out.trim_end().to_string()
}

/// A lightweight pointer, not a dump: the agent can look tasks up itself.
fn render_similar(similar: &[Task]) -> String {
    if similar.is_empty() {
        return String::new();
    }
    let mut out = String::from(
        "## Similar Past Tasks\n\nRelated work that may have useful context:\n",
    );
    for task in similar {
        out.push_str(&format!("- #{} {} ({})\n", task.id, task.title, task.status));
    }
    out.trim_end().to_string()
}

fn render_attachments(attachments: &[PathBuf]) -> String {
    if attachments.is_empty() {
        return String::new();
    }
    let mut out = String::from("## Attachments\n");
    for path in attachments {
        out.push_str(&format!("- {}\n", path.display()));
    }
    out.trim_end().to_string()
}

/// Reconstruct question/response turns from the task log.
///
/// Only produced when a prior continuation marker exists; a first run has
/// no history section at all.
fn render_history(log: &[LogEntry]) -> String {
    let has_marker = log
        .iter()
        .any(|e| e.line_type == LogLineType::System && e.content.contains(CONTINUATION_MARKER));
    if !has_marker {
        return String::new();
    }

    let mut turns: Vec<String> = Vec::new();
    for entry in log {
        match entry.line_type {
            LogLineType::Question => turns.push(format!("Agent asked:\n{}", entry.content)),
            LogLineType::Relay => turns.push(format!("User replied:\n{}", entry.content)),
            _ => {}
        }
    }
    if turns.is_empty() {
        return String::new();
    }

    format!("## Conversation History\n\n{}", turns.join("\n\n"))
}

/// Collapse runs of 3+ newlines left behind by empty placeholders.
fn collapse_blank_runs(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut blank_run = 0;
    for line in s.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            if blank_run > 1 {
                continue;
            }
        } else {
            blank_run = 0;
        }
        out.push_str(line);
        out.push('\n');
    }
    out.trim_end().to_string()
}

/// The feedback block appended to a resume prompt.
pub fn feedback_section(feedback: &str) -> String {
    format!("## User Feedback\n\n{}", feedback.trim())
}

/// Header prepended when a recurring task re-runs with prior history.
pub fn recurring_header() -> &'static str {
    "This is a recurring task. Review the prior conversation and repeat \
the work for the current period."
}

#[cfg(test)]
#[path = "prompt_tests.rs"]
mod tests;
