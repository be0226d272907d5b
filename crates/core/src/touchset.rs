// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Touch-set validation: which files a job may modify.
//!
//! Patterns use the `glob` crate's shell-style dialect matched against
//! repository-relative paths: `*` matches within a path segment (it
//! does not cross `/`), `**` spans directories, `?` matches a single
//! character, and `[...]` character classes work as in a shell.

use glob::{MatchOptions, Pattern};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid touch-set pattern {pattern:?}: {message}")]
pub struct PatternError {
    pub pattern: String,
    pub message: String,
}

fn options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        // `*` stays within one path segment; `**` crosses.
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}

fn compile(patterns: &[String]) -> Result<Vec<Pattern>, PatternError> {
    patterns
        .iter()
        .map(|p| {
            Pattern::new(p).map_err(|e| PatternError {
                pattern: p.clone(),
                message: e.msg.to_string(),
            })
        })
        .collect()
}

/// Changed files that match none of the patterns, in input order.
///
/// An empty pattern list means the job declared no touch-set and is
/// unrestricted; callers skip validation in that case.
pub fn violations(changed: &[String], patterns: &[String]) -> Result<Vec<String>, PatternError> {
    let compiled = compile(patterns)?;
    let opts = options();
    Ok(changed
        .iter()
        .filter(|file| !compiled.iter().any(|p| p.matches_with(file, opts)))
        .cloned()
        .collect())
}

/// Whether a single path is covered by any pattern.
pub fn matches_any(path: &str, patterns: &[String]) -> Result<bool, PatternError> {
    let compiled = compile(patterns)?;
    let opts = options();
    Ok(compiled.iter().any(|p| p.matches_with(path, opts)))
}

#[cfg(test)]
#[path = "touchset_tests.rs"]
mod tests;
