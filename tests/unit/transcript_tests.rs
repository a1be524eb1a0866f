//! Unit tests for the in-memory transcript.

use acp_session_client::acp::message::ProtocolMessage;
use acp_session_client::transcript::{Direction, Transcript, TranscriptEntry, TranscriptSink};

#[test]
fn entries_are_kept_in_recording_order() {
    let transcript = Transcript::new();
    transcript.record(Direction::Outgoing, &ProtocolMessage::user("q", None));
    transcript.record(Direction::Incoming, &ProtocolMessage::text("a"));

    let entries = transcript.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].direction, Direction::Outgoing);
    assert_eq!(entries[1].message, ProtocolMessage::text("a"));
    assert!(entries[0].timestamp <= entries[1].timestamp);
}

#[test]
fn seeded_transcript_appends_after_previous_entries() {
    let previous = vec![TranscriptEntry::now(
        Direction::Incoming,
        ProtocolMessage::text("earlier"),
    )];
    let transcript = Transcript::from_entries(previous);
    transcript.record(Direction::Incoming, &ProtocolMessage::text("later"));

    let contents: Vec<_> = transcript
        .entries()
        .into_iter()
        .map(|e| e.message)
        .collect();
    assert_eq!(
        contents,
        vec![ProtocolMessage::text("earlier"), ProtocolMessage::text("later")]
    );
}

#[test]
fn entry_serializes_direction_in_snake_case() {
    let entry = TranscriptEntry::now(Direction::Outgoing, ProtocolMessage::text("x"));
    let value = serde_json::to_value(&entry).unwrap();
    assert_eq!(value["direction"], "outgoing");
    assert_eq!(value["message"]["type"], "text");
    assert!(value["timestamp"].is_string());
}
