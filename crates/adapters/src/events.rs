// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent event-stream client.
//!
//! Agents that expose a port serve their lifecycle as server-sent
//! events at `/event`. The client keeps one long-lived subscription per
//! job, reconnecting with exponential backoff (100ms doubling to 30s,
//! reset on any delivered event).

use futures_util::StreamExt;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::mpsc;

/// First reconnect delay after a disconnect.
pub const INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Ceiling for the reconnect delay.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

/// Next delay in the backoff sequence (doubling, capped).
pub fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

/// Question payload extracted from a question tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionPayload {
    pub question: String,
    pub options: Vec<String>,
    pub multiple: bool,
}

/// Decoded agent event.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentStreamEvent {
    /// Agent session went idle (task finished).
    SessionIdle,
    SessionError {
        message: String,
    },
    /// A message part changed; carries question-tool state when present.
    MessagePartUpdated {
        part_id: String,
        session_id: String,
        tool: Option<String>,
        status: Option<String>,
        question: Option<QuestionPayload>,
    },
    FileEdited {
        path: String,
    },
    /// Agent is waiting on a permission decision.
    PermissionUpdated {
        id: String,
        title: String,
    },
    Unknown,
}

/// Decode one SSE `data:` payload.
pub fn parse_event(data: &str) -> AgentStreamEvent {
    let Ok(value) = serde_json::from_str::<Value>(data) else {
        return AgentStreamEvent::Unknown;
    };
    let props = value.get("properties").cloned().unwrap_or(Value::Null);

    match value.get("type").and_then(Value::as_str) {
        Some("session.idle") => AgentStreamEvent::SessionIdle,
        Some("session.status") => {
            let idle = props.get("status").and_then(Value::as_str) == Some("idle");
            if idle {
                AgentStreamEvent::SessionIdle
            } else {
                AgentStreamEvent::Unknown
            }
        }
        Some("session.error") => {
            let message = props
                .get("error")
                .map(|e| match e {
                    Value::String(s) => s.clone(),
                    other => other
                        .get("message")
                        .and_then(Value::as_str)
                        .unwrap_or("unknown error")
                        .to_string(),
                })
                .unwrap_or_else(|| "unknown error".to_string());
            AgentStreamEvent::SessionError { message }
        }
        Some("message.part.updated") => {
            let part = props.get("part").cloned().unwrap_or(Value::Null);
            let part_id = part
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let session_id = part
                .get("sessionId")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let tool = part
                .get("tool")
                .and_then(Value::as_str)
                .map(String::from);
            let status = part
                .pointer("/state/status")
                .and_then(Value::as_str)
                .map(String::from);
            let question = parse_question(&part);
            AgentStreamEvent::MessagePartUpdated {
                part_id,
                session_id,
                tool,
                status,
                question,
            }
        }
        Some("file.edited") => {
            let path = props
                .get("file")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            AgentStreamEvent::FileEdited { path }
        }
        Some("permission.updated") => AgentStreamEvent::PermissionUpdated {
            id: props
                .get("id")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            title: props
                .get("title")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        },
        _ => AgentStreamEvent::Unknown,
    }
}

fn parse_question(part: &Value) -> Option<QuestionPayload> {
    let input = part.pointer("/state/input")?;
    let question = input.get("question").and_then(Value::as_str)?.to_string();
    let options = input
        .get("options")
        .and_then(Value::as_array)
        .map(|opts| {
            opts.iter()
                .filter_map(|o| match o {
                    Value::String(s) => Some(s.clone()),
                    other => other
                        .get("label")
                        .and_then(Value::as_str)
                        .map(String::from),
                })
                .collect()
        })
        .unwrap_or_default();
    let multiple = input
        .get("multiple")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    Some(QuestionPayload {
        question,
        options,
        multiple,
    })
}

/// Live subscription to one agent's event stream.
pub struct Subscription {
    handle: tokio::task::JoinHandle<()>,
    pub rx: mpsc::Receiver<AgentStreamEvent>,
}

impl Subscription {
    /// Stop the consumer task.
    pub fn abort(&self) {
        self.handle.abort();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// SSE client over the agent's local event port.
#[derive(Clone, Default)]
pub struct EventStreamClient {
    http: reqwest::Client,
}

impl EventStreamClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a long-lived subscription to `127.0.0.1:<port>/event`.
    ///
    /// The consumer reconnects forever with capped exponential backoff;
    /// it stops when the subscription is aborted or the receiver is
    /// dropped.
    pub fn subscribe(&self, port: u16) -> Subscription {
        let (tx, rx) = mpsc::channel(64);
        let http = self.http.clone();
        let url = format!("http://127.0.0.1:{port}/event");

        let handle = tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;
            loop {
                match http.get(&url).send().await {
                    Ok(response) => {
                        let mut stream = response.bytes_stream();
                        let mut buffer = String::new();
                        while let Some(chunk) = stream.next().await {
                            let Ok(bytes) = chunk else { break };
                            buffer.push_str(&String::from_utf8_lossy(&bytes));
                            while let Some(pos) = buffer.find('\n') {
                                let line = buffer[..pos].trim().to_string();
                                buffer.drain(..=pos);
                                let Some(data) = line.strip_prefix("data: ") else {
                                    continue;
                                };
                                let event = parse_event(data);
                                if matches!(event, AgentStreamEvent::Unknown) {
                                    continue;
                                }
                                // Any successful event resets the backoff.
                                backoff = INITIAL_BACKOFF;
                                if tx.send(event).await.is_err() {
                                    return;
                                }
                            }
                        }
                    }
                    Err(e) => {
                        tracing::debug!(url = %url, error = %e, "event stream connect failed");
                    }
                }

                if tx.is_closed() {
                    return;
                }
                tokio::time::sleep(backoff).await;
                backoff = next_backoff(backoff);
            }
        });

        Subscription { handle, rx }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
