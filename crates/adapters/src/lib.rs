// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! mc-adapters: External tool adapters for Mission Control
//!
//! Thin, awaited wrappers around the tools the orchestrator drives:
//! the terminal multiplexer, git, the host chat surface, the agent's
//! event stream, and the VCS CLI. Nothing here holds orchestration
//! state.

pub mod chat;
pub mod events;
pub mod git;
pub mod session;
pub mod subprocess;
pub mod vcs;

pub use chat::{ChatAdapter, ChatError, NoOpChatAdapter, ToastVariant};
pub use events::{AgentStreamEvent, EventStreamClient, QuestionPayload, Subscription};
pub use git::{Git, GitError};
pub use session::{MultiplexerAdapter, MultiplexerError, TmuxAdapter};
pub use subprocess::{run, run_shell, run_with_timeout, CommandOutput, SubprocessError};
pub use vcs::{VcsCli, VcsError};

#[cfg(any(test, feature = "test-support"))]
pub use chat::{ChatCall, FakeChatAdapter};
#[cfg(any(test, feature = "test-support"))]
pub use session::{FakeMultiplexer, FakePane, MultiplexerCall};
