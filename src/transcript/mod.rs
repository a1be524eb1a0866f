//! Session transcript.
//!
//! Provides the [`TranscriptSink`] trait and the in-memory [`Transcript`]
//! the session router appends to. [`store::SessionStore`] persists a
//! transcript as JSON so a later run can resume it.

pub mod store;

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::acp::message::ProtocolMessage;

/// Which way a recorded message travelled.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Received from the server.
    Incoming,
    /// Sent by the client.
    Outgoing,
}

/// One recorded message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptEntry {
    /// When the message was recorded.
    pub timestamp: DateTime<Utc>,
    /// Direction of travel.
    pub direction: Direction,
    /// The message itself.
    pub message: ProtocolMessage,
}

impl TranscriptEntry {
    /// Entry stamped with the current time.
    #[must_use]
    pub fn now(direction: Direction, message: ProtocolMessage) -> Self {
        Self {
            timestamp: Utc::now(),
            direction,
            message,
        }
    }
}

/// Append-only record of the conversation.
pub trait TranscriptSink: Send + Sync {
    /// Append `message` with the current time.
    fn record(&self, direction: Direction, message: &ProtocolMessage);
}

/// In-memory [`TranscriptSink`].
#[derive(Debug, Default)]
pub struct Transcript {
    entries: Mutex<Vec<TranscriptEntry>>,
}

impl Transcript {
    /// Empty transcript.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transcript seeded with previously saved entries.
    #[must_use]
    pub fn from_entries(entries: Vec<TranscriptEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
        }
    }

    /// Copy of every entry in recording order.
    #[must_use]
    pub fn entries(&self) -> Vec<TranscriptEntry> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TranscriptSink for Transcript {
    fn record(&self, direction: Direction, message: &ProtocolMessage) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(TranscriptEntry::now(direction, message.clone()));
        }
    }
}
