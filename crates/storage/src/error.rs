// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Storage error types

use std::path::PathBuf;
use thiserror::Error;

/// Errors from the state store.
///
/// `Schema` is raised for any validation failure on read; callers must
/// surface it rather than overwrite the offending file.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid state file {}{}: {message}", .file.display(), field_suffix(.field))]
    Schema {
        file: PathBuf,
        field: Option<String>,
        message: String,
    },

    #[error("a different plan already exists: store has {existing}, attempted {attempted}")]
    PlanMismatch { existing: String, attempted: String },

    #[error("plan {0} not found")]
    PlanNotFound(String),

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("no free port in range {start}-{end}")]
    PortRangeExhausted { start: u16, end: u16 },
}

fn field_suffix(field: &Option<String>) -> String {
    match field {
        Some(f) => format!(" (field `{f}`)"),
        None => String::new(),
    }
}

impl StorageError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Build a schema error from a serde failure, extracting the
    /// offending field name from the message when one is quoted.
    pub fn schema(file: impl Into<PathBuf>, err: &serde_json::Error) -> Self {
        let message = err.to_string();
        let field = message
            .split('`')
            .nth(1)
            .map(|s| s.to_string())
            .filter(|s| !s.is_empty());
        Self::Schema {
            file: file.into(),
            field,
            message,
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
