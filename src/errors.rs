//! Error types shared across the client.

use std::fmt::{Display, Formatter};

/// Shared client result type.
pub type Result<T> = std::result::Result<T, AppError>;

/// Client error enumeration covering every failure mode of the session layer.
#[derive(Debug)]
pub enum AppError {
    /// Configuration parsing or validation failure.
    Config(String),
    /// Socket connect, handshake, or write failure.
    Transport(String),
    /// Frame or payload could not be decoded into a protocol message.
    Decode(String),
    /// Tool-call argument validation or execution failure.
    Tool(String),
    /// Tool path failed validation against the workspace root.
    PathViolation(String),
    /// Session transcript could not be saved or loaded.
    Transcript(String),
    /// Requested entity does not exist.
    NotFound(String),
    /// File-system or I/O operation failure.
    Io(String),
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(msg) => write!(f, "config: {msg}"),
            Self::Transport(msg) => write!(f, "transport: {msg}"),
            Self::Decode(msg) => write!(f, "decode: {msg}"),
            Self::Tool(msg) => write!(f, "tool: {msg}"),
            Self::PathViolation(msg) => write!(f, "path violation: {msg}"),
            Self::Transcript(msg) => write!(f, "transcript: {msg}"),
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::Io(msg) => write!(f, "io: {msg}"),
        }
    }
}

impl std::error::Error for AppError {}

impl From<toml::de::Error> for AppError {
    fn from(err: toml::de::Error) -> Self {
        Self::Config(format!("invalid config: {err}"))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
