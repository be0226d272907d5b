// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pending agent questions awaiting a user answer.

use serde::{Deserialize, Serialize};

/// A question an agent is currently showing, detected from its event
/// stream. At most one exists per `(job_id, part_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingQuestion {
    pub job_id: String,
    /// Message part carrying the question tool call.
    pub part_id: String,
    /// Agent-side session the answer must be routed to.
    pub remote_session_id: String,
    pub port: u16,
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
    /// Whether multiple options may be selected.
    #[serde(default)]
    pub multiple: bool,
    /// Epoch milliseconds when first observed.
    pub detected_at: u64,
}

impl PendingQuestion {
    /// Dedup key: one live question per job message part.
    pub fn key(&self) -> (String, String) {
        (self.job_id.clone(), self.part_id.clone())
    }
}
