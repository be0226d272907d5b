// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host chat surface adapters.
//!
//! The orchestration core only needs a narrow slice of the host plugin
//! API: send a message to a session, read/update its title, and show a
//! toast. Everything here is best-effort from the caller's view.

mod noop;

pub use noop::NoOpChatAdapter;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{ChatCall, FakeChatAdapter};

use async_trait::async_trait;
use thiserror::Error;

/// Errors from chat operations
#[derive(Debug, Error)]
pub enum ChatError {
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Toast styling, mapped from event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastVariant {
    Info,
    Success,
    Warning,
    Error,
}

/// Adapter over the host chat plugin surface.
#[async_trait]
pub trait ChatAdapter: Clone + Send + Sync + 'static {
    /// Deliver a message into a chat session.
    async fn send_message(&self, session_id: &str, text: &str) -> Result<(), ChatError>;

    /// Human-readable title of a session.
    async fn session_title(&self, session_id: &str) -> Result<String, ChatError>;

    /// Annotate a session's title.
    async fn update_title(&self, session_id: &str, title: &str) -> Result<(), ChatError>;

    async fn show_toast(&self, message: &str, variant: ToastVariant) -> Result<(), ChatError>;

    /// The session currently focused in the host, if any.
    async fn active_session(&self) -> Option<String>;

    /// Whether a session belongs to a subagent (notifications for
    /// those are suppressed).
    async fn is_subagent(&self, _session_id: &str) -> bool {
        false
    }
}
