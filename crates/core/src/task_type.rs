// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task type catalog entries.

use serde::{Deserialize, Serialize};

/// A task type: a named prompt template plus optional first-run action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskType {
    pub name: String,
    /// Prompt template with `{placeholder}` substitution.
    pub template: String,
    /// Project-defined pre-task action injected on the first execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub on_create: Option<String>,
}

impl TaskType {
    /// The built-in catalog seeded into a fresh store.
    pub fn builtin_catalog() -> Vec<TaskType> {
        vec![
            TaskType {
                name: "code".to_string(),
                template: "\
# Task: {title}

Project: {project}

{body}

{project_instructions}

{memories}

{similar_tasks}

{attachments}

{history}

Work in the current directory. Commit as you go with clear messages."
                    .to_string(),
                on_create: None,
            },
            TaskType {
                name: "research".to_string(),
                template: "\
# Research: {title}

Project: {project}

{body}

{memories}

{history}

Summarize findings in a markdown document; do not modify project code."
                    .to_string(),
                on_create: None,
            },
        ]
    }

    /// Fallback template used when a task declares no type.
    pub fn generic_template() -> &'static str {
        "\
# Task: {title}

Project: {project}

{body}

{project_instructions}

{memories}

{similar_tasks}

{attachments}

{history}"
    }
}
