// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! No-op chat adapter for headless operation

use super::{ChatAdapter, ChatError, ToastVariant};
use async_trait::async_trait;

/// Chat adapter that drops everything (headless / tests without
/// assertions on notifications).
#[derive(Clone, Default)]
pub struct NoOpChatAdapter;

impl NoOpChatAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ChatAdapter for NoOpChatAdapter {
    async fn send_message(&self, _session_id: &str, _text: &str) -> Result<(), ChatError> {
        Ok(())
    }

    async fn session_title(&self, session_id: &str) -> Result<String, ChatError> {
        Ok(session_id.to_string())
    }

    async fn update_title(&self, _session_id: &str, _title: &str) -> Result<(), ChatError> {
        Ok(())
    }

    async fn show_toast(&self, _message: &str, _variant: ToastVariant) -> Result<(), ChatError> {
        Ok(())
    }

    async fn active_session(&self) -> Option<String> {
        None
    }
}
