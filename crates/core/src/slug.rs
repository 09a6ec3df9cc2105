// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Slugify task titles for branch and worktree naming.

/// Maximum slug length.
pub const MAX_SLUG_LEN: usize = 40;

/// Slugify a task title.
///
/// Lowercases, maps spaces and underscores to hyphens, drops every other
/// non-alphanumeric character, collapses hyphen runs, trims leading and
/// trailing hyphens, and truncates to [`MAX_SLUG_LEN`]. The result
/// contains only `[a-z0-9-]` and the function is idempotent:
/// `slugify(slugify(t)) == slugify(t)`.
pub fn slugify(input: &str) -> String {
    let mut slug = String::with_capacity(input.len());
    let mut last_was_hyphen = true; // suppress leading hyphens

    for ch in input.chars() {
        let lowered = ch.to_ascii_lowercase();
        if lowered.is_ascii_alphanumeric() {
            slug.push(lowered);
            last_was_hyphen = false;
        } else if (lowered == ' ' || lowered == '_' || lowered == '-') && !last_was_hyphen {
            slug.push('-');
            last_was_hyphen = true;
        }
        // Any other character is stripped entirely.
    }

    if slug.len() > MAX_SLUG_LEN {
        slug.truncate(MAX_SLUG_LEN);
    }

    let trimmed = slug.trim_end_matches('-');
    if trimmed.len() != slug.len() {
        slug.truncate(trimmed.len());
    }

    slug
}

#[cfg(test)]
#[path = "slug_tests.rs"]
mod tests;
