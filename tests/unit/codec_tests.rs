//! Unit tests for tolerant frame decoding.
//!
//! Covers the JSON, SSE and NDJSON framings, garbage input, large frames,
//! and outbound encoding.

use acp_session_client::acp::codec::{decode_frame, encode_message};
use acp_session_client::acp::message::{ProtocolMessage, StreamKind};

// ── Single-object framing ───────────────────────────────────────────────────

#[test]
fn plain_json_object_decodes_to_one_message() {
    let messages = decode_frame(r#"{"type":"text","content":"hello"}"#);
    assert_eq!(messages, vec![ProtocolMessage::text("hello")]);
}

#[test]
fn sse_data_line_decodes_like_the_bare_payload() {
    let bare = decode_frame(r#"{"type":"text","content":"x"}"#);
    let sse = decode_frame(r#"data: {"type":"text","content":"x"}"#);
    assert_eq!(sse, bare);
    assert_eq!(sse.len(), 1);
}

#[test]
fn sse_data_line_with_trailing_newline_decodes() {
    let messages = decode_frame("data: {\"type\":\"text\",\"content\":\"x\"}\n");
    assert_eq!(messages, vec![ProtocolMessage::text("x")]);
}

// ── NDJSON framing ──────────────────────────────────────────────────────────

#[test]
fn two_line_ndjson_frame_decodes_to_two_messages() {
    let frame = concat!(
        "{\"type\":\"text\",\"content\":\"one\"}\n",
        "{\"type\":\"text\",\"content\":\"two\"}",
    );
    let messages = decode_frame(frame);
    assert_eq!(
        messages,
        vec![ProtocolMessage::text("one"), ProtocolMessage::text("two")]
    );
}

#[test]
fn ndjson_skips_blank_and_bad_lines() {
    let frame = concat!(
        "{\"type\":\"text\",\"content\":\"one\"}\n",
        "\n",
        "not json\n",
        "   \n",
        "{\"type\":\"text\",\"content\":\"two\"}\n",
    );
    let messages = decode_frame(frame);
    assert_eq!(messages.len(), 2, "only the parseable lines are emitted");
}

#[test]
fn ndjson_lines_may_carry_sse_prefix() {
    let frame = concat!(
        "data: {\"type\":\"text\",\"content\":\"a\"}\n",
        "data: {\"type\":\"text\",\"content\":\"b\"}\n",
    );
    assert_eq!(
        decode_frame(frame),
        vec![ProtocolMessage::text("a"), ProtocolMessage::text("b")]
    );
}

// ── Rejections ──────────────────────────────────────────────────────────────

#[test]
fn garbage_yields_zero_messages() {
    assert!(decode_frame("this is not json at all").is_empty());
}

#[test]
fn empty_frame_yields_zero_messages() {
    assert!(decode_frame("").is_empty());
    assert!(decode_frame(" \n ").is_empty());
}

#[test]
fn json_without_type_yields_zero_messages() {
    assert!(decode_frame(r#"{"content":"orphan"}"#).is_empty());
}

#[test]
fn known_type_missing_required_field_is_dropped() {
    assert!(decode_frame(r#"{"type":"tool_call","tool":"read_file"}"#).is_empty());
}

#[test]
fn multi_megabyte_tool_call_decodes() {
    let content = "a".repeat(1_100_000);
    let frame = format!(
        r#"{{"type":"tool_call","id":"big","tool":"write_file","args":{{"path":"big.txt","content":"{content}"}}}}"#
    );
    let messages = decode_frame(&frame);
    assert_eq!(messages.len(), 1);
    let ProtocolMessage::ToolCall(call) = &messages[0] else {
        panic!("expected tool_call, got {:?}", messages[0].message_type());
    };
    assert_eq!(call.id, "big");
    assert_eq!(call.args["content"].as_str().map(str::len), Some(1_100_000));
}

// ── Streaming frames ────────────────────────────────────────────────────────

#[test]
fn delta_only_frame_decodes_to_a_chunk() {
    let messages = decode_frame(r#"{"type":"text_delta","stream_id":"s1","delta":"H","done":false}"#);
    assert_eq!(messages.len(), 1);
    let chunk = messages[0].as_stream_chunk().expect("streaming variant");
    assert_eq!(chunk.stream_id, "s1");
    assert_eq!(chunk.kind, StreamKind::Text);
    assert_eq!(chunk.chunk, "H");
    assert!(!chunk.done);
}

#[test]
fn content_only_chunk_still_decodes() {
    let messages = decode_frame(r#"{"type":"text_chunk","content":"Hi","done":true}"#);
    let chunk = messages[0].as_stream_chunk().expect("streaming variant");
    assert_eq!(chunk.chunk, "Hi");
    assert!(chunk.done);
}

#[test]
fn chunk_without_content_or_delta_is_dropped() {
    assert!(decode_frame(r#"{"type":"text_delta","stream_id":"s1","done":true}"#).is_empty());
    assert!(decode_frame(r#"{"type":"text_chunk"}"#).is_empty());
}

// ── Unknown passthrough ─────────────────────────────────────────────────────

#[test]
fn unknown_type_passes_through_with_all_fields() {
    let messages = decode_frame(r#"{"type":"heartbeat","seq":7,"extra":{"a":1}}"#);
    assert_eq!(messages.len(), 1);
    let ProtocolMessage::Unknown(map) = &messages[0] else {
        panic!("expected passthrough variant, got {:?}", messages[0]);
    };
    assert_eq!(map["type"], "heartbeat");
    assert_eq!(map["seq"], 7);
    assert_eq!(map["extra"]["a"], 1);
}

// ── Encoding ────────────────────────────────────────────────────────────────

#[test]
fn encoded_message_is_single_line_json_with_type() {
    let frame = encode_message(&ProtocolMessage::user("hi", Some("m-1".into())))
        .expect("encode must succeed");
    assert!(!frame.contains('\n'));
    let value: serde_json::Value = serde_json::from_str(&frame).expect("valid json");
    assert_eq!(value["type"], "client_message");
    assert_eq!(value["role"], "user");
    assert_eq!(value["content"], "hi");
    assert_eq!(value["model"], "m-1");
}

#[test]
fn encoded_frame_decodes_back_to_the_same_message() {
    let original = ProtocolMessage::user("round trip", None);
    let frame = encode_message(&original).expect("encode");
    assert_eq!(decode_frame(&frame), vec![original]);
}
