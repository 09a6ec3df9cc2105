// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Full-text-ish search index over tasks.
//!
//! Tokenized documents with overlap scoring; good enough for "similar past
//! task" hints without an external index.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use ty_core::TaskId;

/// Minimum token length kept in the index.
const MIN_TOKEN_LEN: usize = 3;

/// Tokenized task documents keyed by task id.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SearchIndex {
    docs: HashMap<TaskId, BTreeSet<String>>,
}

impl SearchIndex {
    /// Index (or re-index) a task document.
    pub fn index(&mut self, id: TaskId, text: &str) {
        self.docs.insert(id, tokenize(text));
    }

    /// Drop a task from the index.
    pub fn remove(&mut self, id: TaskId) {
        self.docs.remove(&id);
    }

    /// Whether a task has been indexed.
    pub fn contains(&self, id: TaskId) -> bool {
        self.docs.contains_key(&id)
    }

    /// Rank indexed tasks by token overlap with `query`.
    ///
    /// Returns up to `limit` task ids, best match first; tasks with no
    /// overlap are omitted.
    pub fn find_similar(&self, query: &str, limit: usize, exclude: Option<TaskId>) -> Vec<TaskId> {
        let query_tokens = tokenize(query);
        if query_tokens.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<(usize, TaskId)> = self
            .docs
            .iter()
            .filter(|(id, _)| Some(**id) != exclude)
            .map(|(id, tokens)| (tokens.intersection(&query_tokens).count(), *id))
            .filter(|(score, _)| *score > 0)
            .collect();

        // Highest score first; ties broken by newest task.
        scored.sort_by(|a, b| b.cmp(a));
        scored.into_iter().take(limit).map(|(_, id)| id).collect()
    }
}

fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(|t| t.to_lowercase())
        .filter(|t| t.len() >= MIN_TOKEN_LEN)
        .collect()
}

#[cfg(test)]
#[path = "search_tests.rs"]
mod tests;
