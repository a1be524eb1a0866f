//! Typed listener registries for connection events.
//!
//! Each event kind owns a [`Subscribers`] list. Publishing invokes every
//! listener in registration order; a listener that panics is logged and the
//! remaining listeners still run.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::acp::message::{ProtocolMessage, StreamChunk};

/// A registered callback for events of type `T`.
pub type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

/// Ordered list of listeners for one event kind.
pub struct Subscribers<T> {
    kind: &'static str,
    listeners: Mutex<Vec<Listener<T>>>,
}

impl<T> Subscribers<T> {
    /// Create an empty registry labelled `kind` for diagnostics.
    #[must_use]
    pub fn new(kind: &'static str) -> Self {
        Self {
            kind,
            listeners: Mutex::new(Vec::new()),
        }
    }

    /// Append a listener. Listeners are never removed.
    pub fn subscribe(&self, listener: impl Fn(&T) + Send + Sync + 'static) {
        match self.listeners.lock() {
            Ok(mut guard) => guard.push(Arc::new(listener)),
            Err(poisoned) => poisoned.into_inner().push(Arc::new(listener)),
        }
    }

    /// Number of registered listeners.
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    /// Whether no listener is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Deliver `event` to every listener in registration order.
    ///
    /// Returns the number of listeners that completed without panicking.
    pub fn publish(&self, event: &T) -> usize {
        // Listeners run outside the lock so they may subscribe further listeners.
        let listeners = self.snapshot();
        let mut delivered = 0;
        for (index, listener) in listeners.iter().enumerate() {
            if catch_unwind(AssertUnwindSafe(|| listener(event))).is_ok() {
                delivered += 1;
            } else {
                warn!(kind = self.kind, index, "listener panicked; continuing");
            }
        }
        delivered
    }

    fn snapshot(&self) -> Vec<Listener<T>> {
        match self.listeners.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }
}

/// Why the socket closed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    /// WebSocket close code, when the peer sent one.
    pub code: Option<u16>,
    /// Close reason text (may be empty).
    pub reason: String,
}

/// Every listener registry owned by a connection.
pub struct ConnectionEvents {
    /// Complete (non-streaming) decoded messages.
    pub message: Subscribers<ProtocolMessage>,
    /// Normalized pieces of streamed replies.
    pub stream_chunk: Subscribers<StreamChunk>,
    /// Transport errors raised after the connection opened.
    pub error: Subscribers<String>,
    /// Connection close, delivered once.
    pub close: Subscribers<CloseInfo>,
    /// Raw text of every inbound frame, before decoding.
    pub raw: Subscribers<String>,
}

impl Default for ConnectionEvents {
    fn default() -> Self {
        Self {
            message: Subscribers::new("message"),
            stream_chunk: Subscribers::new("stream_chunk"),
            error: Subscribers::new("error"),
            close: Subscribers::new("close"),
            raw: Subscribers::new("raw"),
        }
    }
}
