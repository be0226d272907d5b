// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake chat adapter for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{ChatAdapter, ChatError, ToastVariant};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Recorded chat call
#[derive(Debug, Clone, PartialEq)]
pub enum ChatCall {
    SendMessage { session_id: String, text: String },
    UpdateTitle { session_id: String, title: String },
    ShowToast { message: String, variant_error: bool },
}

#[derive(Default)]
struct FakeChatState {
    calls: Vec<ChatCall>,
    titles: HashMap<String, String>,
    active: Option<String>,
    subagents: HashSet<String>,
    fail_sends: bool,
}

/// Fake chat adapter for testing
#[derive(Clone, Default)]
pub struct FakeChatAdapter {
    inner: Arc<Mutex<FakeChatState>>,
}

impl FakeChatAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<ChatCall> {
        self.inner.lock().calls.clone()
    }

    pub fn messages_for(&self, session_id: &str) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                ChatCall::SendMessage { session_id: s, text } if s == session_id => {
                    Some(text.clone())
                }
                _ => None,
            })
            .collect()
    }

    pub fn title_of(&self, session_id: &str) -> Option<String> {
        self.inner.lock().titles.get(session_id).cloned()
    }

    pub fn set_title(&self, session_id: &str, title: &str) {
        self.inner
            .lock()
            .titles
            .insert(session_id.to_string(), title.to_string());
    }

    pub fn set_active(&self, session_id: Option<&str>) {
        self.inner.lock().active = session_id.map(String::from);
    }

    pub fn mark_subagent(&self, session_id: &str) {
        self.inner.lock().subagents.insert(session_id.to_string());
    }

    pub fn fail_sends(&self, fail: bool) {
        self.inner.lock().fail_sends = fail;
    }
}

#[async_trait]
impl ChatAdapter for FakeChatAdapter {
    async fn send_message(&self, session_id: &str, text: &str) -> Result<(), ChatError> {
        let mut inner = self.inner.lock();
        if inner.fail_sends {
            return Err(ChatError::SendFailed("scripted failure".into()));
        }
        inner.calls.push(ChatCall::SendMessage {
            session_id: session_id.to_string(),
            text: text.to_string(),
        });
        Ok(())
    }

    async fn session_title(&self, session_id: &str) -> Result<String, ChatError> {
        self.inner
            .lock()
            .titles
            .get(session_id)
            .cloned()
            .ok_or_else(|| ChatError::SessionNotFound(session_id.to_string()))
    }

    async fn update_title(&self, session_id: &str, title: &str) -> Result<(), ChatError> {
        let mut inner = self.inner.lock();
        inner.calls.push(ChatCall::UpdateTitle {
            session_id: session_id.to_string(),
            title: title.to_string(),
        });
        inner
            .titles
            .insert(session_id.to_string(), title.to_string());
        Ok(())
    }

    async fn show_toast(&self, message: &str, variant: ToastVariant) -> Result<(), ChatError> {
        self.inner.lock().calls.push(ChatCall::ShowToast {
            message: message.to_string(),
            variant_error: variant == ToastVariant::Error,
        });
        Ok(())
    }

    async fn active_session(&self) -> Option<String> {
        self.inner.lock().active.clone()
    }

    async fn is_subagent(&self, session_id: &str) -> bool {
        self.inner.lock().subagents.contains(session_id)
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
