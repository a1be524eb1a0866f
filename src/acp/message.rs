//! ACP message model.
//!
//! Every frame carries a `type` discriminant. Known discriminants decode into
//! typed variants of [`ProtocolMessage`]; anything else is kept verbatim in
//! [`ProtocolMessage::Unknown`] so forward-compatible fields survive a
//! round trip through the client.
//!
//! | `type`                      | Variant                              |
//! |-----------------------------|--------------------------------------|
//! | `client_message`            | [`ProtocolMessage::ClientMessage`]   |
//! | `text`                      | [`ProtocolMessage::Text`]            |
//! | `text_chunk`                | [`ProtocolMessage::TextChunk`]       |
//! | `text_delta`                | [`ProtocolMessage::TextDelta`]       |
//! | `stream`                    | [`ProtocolMessage::Stream`]          |
//! | `tool_call`                 | [`ProtocolMessage::ToolCall`]        |
//! | `tool_result`               | [`ProtocolMessage::ToolResult`]      |
//! | *(any other)*               | [`ProtocolMessage::Unknown`]         |

use serde::de::Error as _;
use serde::ser::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};

use crate::{AppError, Result};

/// Stream identifier used when a chunk does not name its stream.
pub const DEFAULT_STREAM_ID: &str = "default";

/// Error string reported when the operator declines a tool call.
pub const USER_REJECTED: &str = "user_rejected";

/// A prompt sent by the user (or replayed assistant turn).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientMessage {
    /// `user` or `assistant`.
    pub role: String,
    /// Prompt text.
    pub content: String,
    /// Model the server should answer with, when configured.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

/// A complete, non-streamed reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextMessage {
    /// Reply text.
    pub content: String,
}

/// Payload shared by `text_chunk` and `text_delta` frames.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextChunk {
    /// Chunk text. May be absent when `delta` carries the text.
    #[serde(default)]
    pub content: String,
    /// Incremental text; preferred over `content` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
    /// Marks the final chunk of the stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    /// Stream the chunk belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
}

/// Payload of a `stream` frame.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamMessage {
    /// `text` or `tool_call`; anything else is treated as text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_type: Option<String>,
    /// Chunk text (used when `delta` is absent).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Incremental text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
    /// Marks the final chunk of the stream.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub done: Option<bool>,
    /// Stream the chunk belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stream_id: Option<String>,
}

/// A server-initiated request to run a local tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Correlation key echoed back in the matching `tool_result`.
    pub id: String,
    /// Tool name (`write_file`, `read_file`, `run_shell`).
    pub tool: String,
    /// Tool arguments; validated by the dispatcher, not here.
    #[serde(default)]
    pub args: Value,
}

/// Outcome of one tool call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool completed successfully.
    pub success: bool,
    /// Captured standard output or a human-readable summary.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    /// Captured standard error or the I/O failure text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    /// Failure reason.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Process exit code. `Some(None)` serializes as an explicit `null`
    /// (process could not be spawned or was killed by a signal).
    #[serde(
        default,
        deserialize_with = "nullable_code",
        skip_serializing_if = "Option::is_none"
    )]
    pub code: Option<Option<i32>>,
}

impl ToolResult {
    /// Failed result carrying `error`.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// Result reported when the operator declines the action.
    #[must_use]
    pub fn rejected() -> Self {
        Self::failure(USER_REJECTED)
    }

    /// Successful result with a summary in `stdout`.
    #[must_use]
    pub fn ok_message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: Some(message.into()),
            ..Self::default()
        }
    }

    /// Whether this result records an operator rejection.
    #[must_use]
    pub fn is_rejected(&self) -> bool {
        !self.success && self.error.as_deref() == Some(USER_REJECTED)
    }
}

fn nullable_code<'de, D>(deserializer: D) -> std::result::Result<Option<Option<i32>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<i32>::deserialize(deserializer).map(Some)
}

/// A `tool_result` frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResultMessage {
    /// Id of the `tool_call` this result answers.
    pub tool_call_id: String,
    /// The outcome.
    #[serde(flatten)]
    pub result: ToolResult,
}

/// Which consumer a stream feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    /// Reply text shown to the user as it arrives.
    Text,
    /// A tool call delivered in pieces.
    ToolCall,
}

/// One normalized piece of a streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    /// Stream identifier.
    pub stream_id: String,
    /// Stream classification.
    pub kind: StreamKind,
    /// Text to append.
    pub chunk: String,
    /// Whether this is the final chunk.
    pub done: bool,
}

/// A decoded ACP frame.
#[derive(Debug, Clone, PartialEq)]
pub enum ProtocolMessage {
    /// `client_message`.
    ClientMessage(ClientMessage),
    /// `text`.
    Text(TextMessage),
    /// `text_chunk`.
    TextChunk(TextChunk),
    /// `text_delta`.
    TextDelta(TextChunk),
    /// `stream`.
    Stream(StreamMessage),
    /// `tool_call`.
    ToolCall(ToolCallRequest),
    /// `tool_result`.
    ToolResult(ToolResultMessage),
    /// Any other `type`; the full field map, including `type`, is preserved.
    Unknown(Map<String, Value>),
}

impl ProtocolMessage {
    /// Build a `client_message` from the user.
    #[must_use]
    pub fn user(content: impl Into<String>, model: Option<String>) -> Self {
        Self::ClientMessage(ClientMessage {
            role: "user".into(),
            content: content.into(),
            model,
        })
    }

    /// Build a complete `text` message.
    #[must_use]
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(TextMessage {
            content: content.into(),
        })
    }

    /// Build a `tool_result` answering `tool_call_id`.
    #[must_use]
    pub fn tool_result(tool_call_id: impl Into<String>, result: ToolResult) -> Self {
        Self::ToolResult(ToolResultMessage {
            tool_call_id: tool_call_id.into(),
            result,
        })
    }

    /// The wire `type` discriminant.
    #[must_use]
    pub fn message_type(&self) -> &str {
        match self {
            Self::ClientMessage(_) => "client_message",
            Self::Text(_) => "text",
            Self::TextChunk(_) => "text_chunk",
            Self::TextDelta(_) => "text_delta",
            Self::Stream(_) => "stream",
            Self::ToolCall(_) => "tool_call",
            Self::ToolResult(_) => "tool_result",
            Self::Unknown(map) => map.get("type").and_then(Value::as_str).unwrap_or_default(),
        }
    }

    /// Whether the message is a piece of a streamed reply.
    #[must_use]
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::TextChunk(_) | Self::TextDelta(_) | Self::Stream(_))
    }

    /// Normalize a streaming variant into a [`StreamChunk`].
    ///
    /// Returns `None` for complete messages.
    #[must_use]
    pub fn as_stream_chunk(&self) -> Option<StreamChunk> {
        match self {
            Self::TextChunk(c) | Self::TextDelta(c) => Some(StreamChunk {
                stream_id: c
                    .stream_id
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STREAM_ID.to_owned()),
                kind: StreamKind::Text,
                chunk: c.delta.clone().unwrap_or_else(|| c.content.clone()),
                done: c.done.unwrap_or(false),
            }),
            Self::Stream(s) => Some(StreamChunk {
                stream_id: s
                    .stream_id
                    .clone()
                    .unwrap_or_else(|| DEFAULT_STREAM_ID.to_owned()),
                kind: match s.stream_type.as_deref() {
                    Some("tool_call") => StreamKind::ToolCall,
                    _ => StreamKind::Text,
                },
                chunk: s
                    .delta
                    .clone()
                    .or_else(|| s.content.clone())
                    .unwrap_or_default(),
                done: s.done.unwrap_or(false),
            }),
            _ => None,
        }
    }

    /// Classify a JSON value by its `type` field.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Decode`] if the value is not an object, has no
    /// string `type`, or a known type is missing a required field.
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(AppError::Decode("frame is not a JSON object".into()));
        };
        let kind = match map.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            _ => return Err(AppError::Decode("missing string `type` field".into())),
        };

        let message = match kind.as_str() {
            "client_message" => Self::ClientMessage(parse_body(&kind, map)?),
            "text" => Self::Text(parse_body(&kind, map)?),
            "text_chunk" => Self::TextChunk(parse_chunk(&kind, map)?),
            "text_delta" => Self::TextDelta(parse_chunk(&kind, map)?),
            "stream" => Self::Stream(parse_body(&kind, map)?),
            "tool_call" => Self::ToolCall(parse_body(&kind, map)?),
            "tool_result" => Self::ToolResult(parse_body(&kind, map)?),
            _ => Self::Unknown(map),
        };
        Ok(message)
    }

    /// Render the message as a JSON object including its `type`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Decode`] if a payload cannot be serialized.
    pub fn to_value(&self) -> Result<Value> {
        let body = match self {
            Self::ClientMessage(m) => serde_json::to_value(m)?,
            Self::Text(m) => serde_json::to_value(m)?,
            Self::TextChunk(m) | Self::TextDelta(m) => serde_json::to_value(m)?,
            Self::Stream(m) => serde_json::to_value(m)?,
            Self::ToolCall(m) => serde_json::to_value(m)?,
            Self::ToolResult(m) => serde_json::to_value(m)?,
            Self::Unknown(map) => return Ok(Value::Object(map.clone())),
        };

        let mut map = Map::new();
        map.insert("type".into(), Value::String(self.message_type().to_owned()));
        if let Value::Object(fields) = body {
            map.extend(fields);
        }
        Ok(Value::Object(map))
    }
}

/// A chunk frame must carry its text in `content`, `delta`, or both.
fn parse_chunk(kind: &str, map: Map<String, Value>) -> Result<TextChunk> {
    if !map.contains_key("content") && !map.contains_key("delta") {
        return Err(AppError::Decode(format!(
            "invalid `{kind}` message: neither `content` nor `delta` present"
        )));
    }
    parse_body(kind, map)
}

fn parse_body<T: for<'de> Deserialize<'de>>(kind: &str, map: Map<String, Value>) -> Result<T> {
    serde_json::from_value(Value::Object(map))
        .map_err(|e| AppError::Decode(format!("invalid `{kind}` message: {e}")))
}

impl Serialize for ProtocolMessage {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(S::Error::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for ProtocolMessage {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        Self::from_value(value).map_err(D::Error::custom)
    }
}
