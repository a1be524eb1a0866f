//! Agent Client Protocol (ACP) socket handling.
//!
//! This module owns everything between the raw WebSocket and typed
//! protocol events:
//!
//! - `message`: the [`ProtocolMessage`](message::ProtocolMessage) tagged union.
//! - `codec`: tolerant frame decoding (JSON, SSE `data:` lines, NDJSON).
//! - `events`: ordered listener registries per event kind.
//! - `connection`: socket lifecycle, outbound queueing, event fan-out.

pub mod codec;
pub mod connection;
pub mod events;
pub mod message;

use crate::Result;
use message::ProtocolMessage;

/// Outbound half of a session: anything that can put a message on the wire.
///
/// Implemented by [`connection::Connection`]; tests substitute recorders.
pub trait MessageSender: Send + Sync {
    /// Transmit or queue `message`.
    ///
    /// # Errors
    ///
    /// Returns an error only when the message cannot be serialized.
    fn send_message(&self, message: &ProtocolMessage) -> Result<()>;
}
