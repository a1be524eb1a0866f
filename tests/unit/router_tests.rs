//! Unit tests for inbound event routing and the outbound user path.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use acp_session_client::acp::events::CloseInfo;
use acp_session_client::acp::message::{
    ProtocolMessage, StreamChunk, StreamKind, ToolCallRequest,
};
use acp_session_client::session::router::Flow;
use acp_session_client::session::{InboundEvent, SessionOutbox, SessionRouter};
use acp_session_client::stream::StreamReassembler;
use acp_session_client::tools::path::Workspace;
use acp_session_client::tools::ToolDispatcher;
use acp_session_client::transcript::{Direction, Transcript};

use super::fakes::{FakeRunner, MemoryFs, RecordingPresenter, RecordingSender, ScriptedApprover};

struct Harness {
    router: SessionRouter,
    sender: Arc<RecordingSender>,
    presenter: Arc<RecordingPresenter>,
    transcript: Arc<Transcript>,
}

fn harness() -> Harness {
    let sender = Arc::new(RecordingSender::default());
    let presenter = Arc::new(RecordingPresenter::default());
    let transcript = Arc::new(Transcript::new());
    let dispatcher = ToolDispatcher::with_capabilities(
        Workspace::new("/ws"),
        Arc::clone(&sender) as _,
        Arc::new(ScriptedApprover::always(true)),
        Arc::new(MemoryFs::with_file(PathBuf::from("/ws/notes.txt"), "hello")),
        Arc::new(FakeRunner::exiting(Some(0), "", "")),
    );
    let router = SessionRouter::new(
        StreamReassembler::new(Duration::from_secs(1), Duration::from_secs(5)),
        dispatcher,
        Arc::clone(&presenter) as _,
        Arc::clone(&transcript) as _,
    );
    Harness {
        router,
        sender,
        presenter,
        transcript,
    }
}

fn text_chunk(stream_id: &str, chunk: &str, done: bool) -> InboundEvent {
    InboundEvent::StreamChunk(StreamChunk {
        stream_id: stream_id.into(),
        kind: StreamKind::Text,
        chunk: chunk.into(),
        done,
    })
}

fn tool_chunk(stream_id: &str, chunk: &str, done: bool) -> InboundEvent {
    InboundEvent::StreamChunk(StreamChunk {
        stream_id: stream_id.into(),
        kind: StreamKind::ToolCall,
        chunk: chunk.into(),
        done,
    })
}

fn read_call(id: &str) -> ToolCallRequest {
    ToolCallRequest {
        id: id.into(),
        tool: "read_file".into(),
        args: json!({ "path": "notes.txt" }),
    }
}

#[tokio::test]
async fn completed_text_stream_is_displayed_and_recorded_once() {
    let mut h = harness();

    for event in [
        text_chunk("s1", "Hel", false),
        text_chunk("s1", "lo", false),
        text_chunk("s1", "", true),
    ] {
        assert_eq!(h.router.handle_event(event).await, Flow::Continue);
    }

    assert_eq!(
        h.presenter.events(),
        vec![
            "started:s1",
            "update:s1:Hel",
            "update:s1:lo",
            "update:s1:",
            "completed:s1:Hello",
        ]
    );
    let entries = h.transcript.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].direction, Direction::Incoming);
    assert_eq!(entries[0].message, ProtocolMessage::text("Hello"));
    assert!(h.router.displayed_stream().is_none());
    assert!(h.router.reassembler().is_empty());
}

#[tokio::test]
async fn switching_streams_cancels_the_previous_display() {
    let mut h = harness();
    h.router.handle_event(text_chunk("a", "one", false)).await;
    h.router.handle_event(text_chunk("b", "two", false)).await;

    assert_eq!(
        h.presenter.events(),
        vec!["started:a", "update:a:one", "cancelled:a", "started:b", "update:b:two"]
    );
    assert_eq!(h.router.displayed_stream(), Some("b"));
    assert_eq!(h.router.reassembler().get_content("a"), "one");
}

#[tokio::test]
async fn tool_call_interrupts_stream_and_sends_result() {
    let mut h = harness();
    h.router.handle_event(text_chunk("s1", "thinking", false)).await;
    h.router
        .handle_event(InboundEvent::Message(ProtocolMessage::ToolCall(read_call("t1"))))
        .await;

    assert_eq!(
        h.presenter.events(),
        vec![
            "started:s1",
            "update:s1:thinking",
            "cancelled:s1",
            "tool_call:t1",
            "tool_result:t1",
        ]
    );
    let results = h.sender.tool_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tool_call_id, "t1");
    assert!(results[0].result.success);
    assert_eq!(results[0].result.stdout.as_deref(), Some("hello"));

    let directions: Vec<_> = h.transcript.entries().iter().map(|e| e.direction).collect();
    assert_eq!(directions, vec![Direction::Incoming, Direction::Outgoing]);
}

#[tokio::test]
async fn streamed_tool_call_dispatches_when_done() {
    let mut h = harness();
    let body = serde_json::to_string(&read_call("t9")).unwrap();
    let (first, second) = body.split_at(body.len() / 2);

    h.router.handle_event(tool_chunk("tc", first, false)).await;
    assert!(h.sender.sent().is_empty());
    assert!(h.presenter.events().is_empty());

    h.router.handle_event(tool_chunk("tc", second, true)).await;

    let results = h.sender.tool_results();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].tool_call_id, "t9");
    assert!(h.router.reassembler().is_empty());
    assert_eq!(
        h.transcript.entries()[0].message,
        ProtocolMessage::ToolCall(read_call("t9"))
    );
}

#[tokio::test]
async fn undecodable_tool_stream_is_dropped() {
    let mut h = harness();
    h.router.handle_event(tool_chunk("tc", "{not json", true)).await;

    assert!(h.sender.sent().is_empty());
    assert!(h.transcript.is_empty());
    assert!(h.router.reassembler().is_empty());
}

#[tokio::test]
async fn complete_text_message_is_shown_and_recorded() {
    let mut h = harness();
    h.router
        .handle_event(InboundEvent::Message(ProtocolMessage::text("done")))
        .await;

    assert_eq!(h.presenter.events(), vec!["message:done"]);
    assert_eq!(h.transcript.len(), 1);
}

#[tokio::test]
async fn complete_text_is_hidden_while_a_stream_is_displayed() {
    let mut h = harness();
    h.router.handle_event(text_chunk("s1", "partial", false)).await;
    h.router
        .handle_event(InboundEvent::Message(ProtocolMessage::text("whole")))
        .await;

    assert_eq!(h.presenter.events(), vec!["started:s1", "update:s1:partial"]);
    assert_eq!(h.router.displayed_stream(), Some("s1"));
    assert_eq!(h.transcript.entries()[0].message, ProtocolMessage::text("whole"));
}

#[tokio::test]
async fn transport_error_is_reported_and_routing_continues() {
    let mut h = harness();
    let flow = h.router.handle_event(InboundEvent::Error("boom".into())).await;
    assert_eq!(flow, Flow::Continue);
    assert_eq!(h.presenter.events(), vec!["error:boom"]);
}

#[tokio::test]
async fn close_stops_routing_and_cancels_display() {
    let mut h = harness();
    h.router.handle_event(text_chunk("s1", "partial", false)).await;
    let flow = h
        .router
        .handle_event(InboundEvent::Closed(CloseInfo {
            code: Some(1000),
            reason: "bye".into(),
        }))
        .await;

    assert_eq!(flow, Flow::Stop);
    let events = h.presenter.events();
    assert_eq!(
        &events[2..],
        ["cancelled:s1", "warning:Connection closed (code 1000): bye"]
    );
}

#[tokio::test]
async fn close_without_code_or_reason_has_plain_notice() {
    let mut h = harness();
    h.router
        .handle_event(InboundEvent::Closed(CloseInfo {
            code: None,
            reason: String::new(),
        }))
        .await;
    assert_eq!(h.presenter.events(), vec!["warning:Connection closed"]);
}

#[tokio::test]
async fn run_stops_on_shutdown() {
    let h = harness();
    let (_tx, rx) = tokio::sync::mpsc::unbounded_channel();
    let shutdown = tokio_util::sync::CancellationToken::new();
    shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(1), h.router.run(rx, shutdown))
        .await
        .expect("router exits promptly");
}

#[tokio::test]
async fn run_drains_events_until_close() {
    let h = harness();
    let presenter = Arc::clone(&h.presenter);
    let (tx, rx) = tokio::sync::mpsc::unbounded_channel();
    tx.send(InboundEvent::Message(ProtocolMessage::text("a"))).unwrap();
    tx.send(InboundEvent::Closed(CloseInfo {
        code: None,
        reason: String::new(),
    }))
    .unwrap();
    tx.send(InboundEvent::Message(ProtocolMessage::text("after close")))
        .unwrap();

    tokio::time::timeout(
        Duration::from_secs(1),
        h.router.run(rx, tokio_util::sync::CancellationToken::new()),
    )
    .await
    .expect("router stops at close");

    assert_eq!(presenter.events(), vec!["message:a", "warning:Connection closed"]);
}

#[test]
fn outbox_sends_user_message_with_model_and_records_it() {
    let sender = Arc::new(RecordingSender::default());
    let transcript = Arc::new(Transcript::new());
    let outbox = SessionOutbox::new(
        Arc::clone(&sender) as _,
        Arc::clone(&transcript) as _,
        Some("m-1".into()),
    );

    outbox.send_user("hi there").unwrap();

    let expected = ProtocolMessage::user("hi there", Some("m-1".into()));
    assert_eq!(sender.sent(), vec![expected.clone()]);
    let entries = transcript.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].direction, Direction::Outgoing);
    assert_eq!(entries[0].message, expected);
}
