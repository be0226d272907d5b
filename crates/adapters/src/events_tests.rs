// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn backoff_doubles_and_caps() {
    let mut delay = INITIAL_BACKOFF;
    let mut steps = Vec::new();
    for _ in 0..12 {
        steps.push(delay.as_millis());
        delay = next_backoff(delay);
    }
    assert_eq!(steps[0], 100);
    assert_eq!(steps[1], 200);
    assert_eq!(steps[2], 400);
    assert_eq!(*steps.last().unwrap(), 30_000);
    assert_eq!(next_backoff(MAX_BACKOFF), MAX_BACKOFF);
}

#[test]
fn session_idle_variants() {
    assert_eq!(
        parse_event(r#"{"type":"session.idle"}"#),
        AgentStreamEvent::SessionIdle
    );
    assert_eq!(
        parse_event(r#"{"type":"session.status","properties":{"status":"idle"}}"#),
        AgentStreamEvent::SessionIdle
    );
    assert_eq!(
        parse_event(r#"{"type":"session.status","properties":{"status":"busy"}}"#),
        AgentStreamEvent::Unknown
    );
}

#[test]
fn session_error_message_shapes() {
    assert_eq!(
        parse_event(r#"{"type":"session.error","properties":{"error":"boom"}}"#),
        AgentStreamEvent::SessionError {
            message: "boom".into()
        }
    );
    assert_eq!(
        parse_event(r#"{"type":"session.error","properties":{"error":{"message":"deep boom"}}}"#),
        AgentStreamEvent::SessionError {
            message: "deep boom".into()
        }
    );
    assert_eq!(
        parse_event(r#"{"type":"session.error"}"#),
        AgentStreamEvent::SessionError {
            message: "unknown error".into()
        }
    );
}

#[test]
fn message_part_with_question_tool() {
    let data = r#"{
        "type": "message.part.updated",
        "properties": {
            "part": {
                "id": "part-9",
                "sessionId": "remote-1",
                "tool": "question",
                "state": {
                    "status": "running",
                    "input": {
                        "question": "Which database?",
                        "options": [{"label": "postgres"}, {"label": "sqlite"}],
                        "multiple": false
                    }
                }
            }
        }
    }"#;
    let event = parse_event(data);
    match event {
        AgentStreamEvent::MessagePartUpdated {
            part_id,
            session_id,
            tool,
            status,
            question,
        } => {
            assert_eq!(part_id, "part-9");
            assert_eq!(session_id, "remote-1");
            assert_eq!(tool.as_deref(), Some("question"));
            assert_eq!(status.as_deref(), Some("running"));
            let q = question.unwrap();
            assert_eq!(q.question, "Which database?");
            assert_eq!(q.options, ["postgres", "sqlite"]);
            assert!(!q.multiple);
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn message_part_without_tool() {
    let data = r#"{
        "type": "message.part.updated",
        "properties": {"part": {"id": "p1", "sessionId": "s1"}}
    }"#;
    match parse_event(data) {
        AgentStreamEvent::MessagePartUpdated { tool, question, .. } => {
            assert!(tool.is_none());
            assert!(question.is_none());
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

#[test]
fn file_edited_carries_path() {
    assert_eq!(
        parse_event(r#"{"type":"file.edited","properties":{"file":"src/lib.rs"}}"#),
        AgentStreamEvent::FileEdited {
            path: "src/lib.rs".into()
        }
    );
}

#[test]
fn permission_updated() {
    assert_eq!(
        parse_event(r#"{"type":"permission.updated","properties":{"id":"perm-1","title":"Run npm install?"}}"#),
        AgentStreamEvent::PermissionUpdated {
            id: "perm-1".into(),
            title: "Run npm install?".into()
        }
    );
}

#[test]
fn garbage_is_unknown() {
    assert_eq!(parse_event("not json"), AgentStreamEvent::Unknown);
    assert_eq!(parse_event(r#"{"type":"wat"}"#), AgentStreamEvent::Unknown);
    assert_eq!(parse_event(r#"{}"#), AgentStreamEvent::Unknown);
}
