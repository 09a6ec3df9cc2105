// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Post-run knowledge pipeline.
//!
//! Distills the latest captured transcript into a structured record via a
//! one-shot, JSON-constrained invocation of the default agent CLI, then
//! persists the summary, derives project memories, refreshes the search
//! index, and regenerates the project's memories file.

use crate::error::RuntimeError;
use crate::scheduler::Deps;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Deserialize;
use std::process::Stdio;
use std::sync::Arc;
use ty_adapters::subprocess::DISTILL_TIMEOUT;
use ty_core::{CompactionSummary, MemoryCategory, Project, Task, TaskId};
use ty_storage::TaskStore;

/// Minimum gap between distillation attempts for a long-running task.
const REDISTILL_MINUTES: i64 = 10;

/// Structured record the distiller asks the agent for.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DistilledRecord {
    #[serde(default)]
    pub what_was_done: String,
    #[serde(default)]
    pub files_changed: Vec<String>,
    #[serde(default)]
    pub decisions: Vec<DistilledDecision>,
    #[serde(default)]
    pub learnings: Vec<DistilledLearning>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistilledDecision {
    pub description: String,
    #[serde(default)]
    pub rationale: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DistilledLearning {
    #[serde(default)]
    pub category: String,
    pub content: String,
}

/// Whether the task should be distilled now.
///
/// True when it was never distilled and a compaction exists, when a
/// compaction row is newer than the last distillation, or when the last
/// distillation is older than ten minutes on a started task.
pub fn should_distill(
    task: &Task,
    latest: Option<&CompactionSummary>,
    now: DateTime<Utc>,
) -> bool {
    match (task.last_distilled_at, latest) {
        (None, Some(_)) => true,
        (Some(at), Some(compaction)) if compaction.created_at > at => true,
        (Some(at), _) => {
            task.started_at.is_some() && now - at > ChronoDuration::minutes(REDISTILL_MINUTES)
        }
        (None, None) => false,
    }
}

/// Run distillation and always stamp `last_distilled_at`, so a failing
/// distiller is rate-limited rather than retried every pass.
pub async fn run_and_stamp(deps: &Arc<Deps>, task_id: TaskId) {
    let result = run(deps, task_id).await;
    if let Err(e) = &result {
        tracing::warn!(task_id, error = %e, "distillation failed");
        let _ = deps
            .broker
            .log_system(task_id, &format!("Distillation failed: {}", e));
    }
    if let Err(e) = deps.store.update_last_distilled_at(task_id) {
        tracing::warn!(task_id, error = %e, "failed to stamp distillation time");
    }
}

async fn run(deps: &Arc<Deps>, task_id: TaskId) -> Result<(), RuntimeError> {
    let task = deps
        .store
        .get_task(task_id)
        .ok_or(RuntimeError::TaskNotFound(task_id))?;
    let Some(compaction) = deps.store.latest_compaction(task_id) else {
        tracing::debug!(task_id, "no captured transcript, skipping distillation");
        return Ok(());
    };

    let Some(agent) = deps.agent() else {
        return Err(RuntimeError::Unsupported("no agent configured".to_string()));
    };
    if !agent.is_available() {
        return Err(RuntimeError::Unsupported(format!(
            "agent CLI '{}' not installed",
            agent.binary()
        )));
    }

    let record = invoke_distiller(&agent.binary(), &compaction.summary).await?;

    let summary = render_summary(&record);
    deps.store.save_task_summary(task_id, &summary)?;

    if let Some(project) = task.project.as_deref().and_then(|p| deps.store.get_project(p)) {
        persist_memories(&deps.store, &project.name, task_id, &record);
        if let Err(e) = write_memories_file(&deps.store, &project) {
            tracing::warn!(project = %project.name, error = %e, "memories file write failed");
        }
    }

    deps.store.index_task(task_id)?;
    Ok(())
}

/// One-shot agent call: transcript in on stdin, JSON record out.
async fn invoke_distiller(binary: &str, transcript: &str) -> Result<DistilledRecord, RuntimeError> {
    let mut child = tokio::process::Command::new(binary)
        .arg("-p")
        .arg(distill_prompt())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()?;

    if let Some(mut stdin) = child.stdin.take() {
        use tokio::io::AsyncWriteExt as _;
        let _ = stdin.write_all(transcript.as_bytes()).await;
        drop(stdin);
    }

    let output = tokio::time::timeout(DISTILL_TIMEOUT, child.wait_with_output())
        .await
        .map_err(|_| RuntimeError::Unsupported("distiller timed out".to_string()))??;

    if !output.status.success() {
        return Err(RuntimeError::Unsupported(format!(
            "distiller exited with {}",
            output.status.code().unwrap_or(-1)
        )));
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    parse_distilled(&stdout)
        .ok_or_else(|| RuntimeError::Unsupported("distiller returned no parseable JSON".to_string()))
}

fn distill_prompt() -> String {
    "Read the session transcript on stdin and respond with ONLY a JSON \
object, no prose, matching: {\"what_was_done\": string, \
\"files_changed\": [string], \"decisions\": [{\"description\": string, \
\"rationale\": string}], \"learnings\": [{\"category\": string, \
\"content\": string}]}. Categories: pattern, context, decision, gotcha, \
general."
        .to_string()
}

/// Parse distiller output: bare JSON, a `{"result": "..."}` envelope, or
/// JSON embedded in surrounding prose.
pub fn parse_distilled(stdout: &str) -> Option<DistilledRecord> {
    let trimmed = stdout.trim();

    if let Ok(record) = serde_json::from_str::<DistilledRecord>(trimmed) {
        return Some(record);
    }

    // Envelope form: {"result": "<json string>", ...}
    if let Ok(envelope) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if let Some(inner) = envelope.get("result").and_then(|v| v.as_str()) {
            if let Some(record) = parse_embedded(inner) {
                return Some(record);
            }
        }
    }

    parse_embedded(trimmed)
}

/// Extract the outermost `{...}` span and try to parse it.
fn parse_embedded(text: &str) -> Option<DistilledRecord> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

/// Search-friendly flat rendering persisted on the task.
pub fn render_summary(record: &DistilledRecord) -> String {
    let mut out = String::new();
    out.push_str(record.what_was_done.trim());

    if !record.files_changed.is_empty() {
        out.push_str("\n\nFiles changed:\n");
        for file in &record.files_changed {
            out.push_str(&format!("- {}\n", file));
        }
    }
    if !record.decisions.is_empty() {
        out.push_str("\nDecisions:\n");
        for decision in &record.decisions {
            if decision.rationale.is_empty() {
                out.push_str(&format!("- {}\n", decision.description));
            } else {
                out.push_str(&format!(
                    "- {} ({})\n",
                    decision.description, decision.rationale
                ));
            }
        }
    }
    if !record.learnings.is_empty() {
        out.push_str("\nLearnings:\n");
        for learning in &record.learnings {
            out.push_str(&format!("- [{}] {}\n", learning.category, learning.content));
        }
    }
    out.trim_end().to_string()
}

/// Decisions and learnings become project memories; categories are
/// normalized through the synonym table.
fn persist_memories(store: &Arc<TaskStore>, project: &str, task_id: TaskId, record: &DistilledRecord) {
    for decision in &record.decisions {
        let content = if decision.rationale.is_empty() {
            decision.description.clone()
        } else {
            format!("{}: {}", decision.description, decision.rationale)
        };
        if let Err(e) =
            store.create_memory(project, MemoryCategory::Decision, &content, Some(task_id))
        {
            tracing::warn!(error = %e, "memory write failed");
        }
    }
    for learning in &record.learnings {
        let category = MemoryCategory::normalize(&learning.category);
        if let Err(e) = store.create_memory(project, category, &learning.content, Some(task_id)) {
            tracing::warn!(error = %e, "memory write failed");
        }
    }
}

/// Regenerate `<project>/.claude/memories.md` (or the configured
/// agent-config dir) from all stored memories.
pub fn write_memories_file(store: &Arc<TaskStore>, project: &Project) -> std::io::Result<()> {
    let dir = project
        .agent_config_dir
        .clone()
        .unwrap_or_else(|| project.path.join(".claude"));
    std::fs::create_dir_all(&dir)?;

    let memories = store.list_memories(&project.name);
    let mut out = format!("# {} memories\n", project.name);
    for category in MemoryCategory::ALL {
        let in_category: Vec<_> = memories.iter().filter(|m| m.category == category).collect();
        if in_category.is_empty() {
            continue;
        }
        out.push_str(&format!("\n## {}\n\n", category));
        for memory in in_category {
            out.push_str(&format!("- {}\n", memory.content.trim()));
        }
    }

    std::fs::write(dir.join("memories.md"), out)
}

#[cfg(test)]
#[path = "distill_tests.rs"]
mod tests;
