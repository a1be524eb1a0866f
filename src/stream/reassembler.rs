//! Per-stream accumulation of chunked reply content.
//!
//! Content for a stream id is the exact concatenation of every chunk supplied
//! for that id, in call order. Completion is sticky: once a chunk arrives with
//! `done = true` the stream stays complete until its state is dropped.
//!
//! Completed streams stay readable for a short grace window so a consumer that
//! reacts to completion can still fetch the final text; after the window the
//! state is invisible to readers and is freed on the next mutation. Streams
//! that never complete are only removed by an explicit [`StreamReassembler::cleanup`].

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

/// How long a completed stream remains readable.
pub const DEFAULT_COMPLETION_GRACE: Duration = Duration::from_secs(1);

/// How long an incomplete stream may go without a chunk before `cleanup`
/// discards it.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug)]
struct StreamState {
    content: String,
    complete: bool,
    last_update: Instant,
    completed_at: Option<Instant>,
}

impl StreamState {
    fn expired(&self, now: Instant, grace: Duration) -> bool {
        self.completed_at
            .is_some_and(|at| now.saturating_duration_since(at) >= grace)
    }

    fn stale(&self, now: Instant, inactivity: Duration) -> bool {
        !self.complete && now.saturating_duration_since(self.last_update) > inactivity
    }
}

/// Accumulates stream chunks keyed by stream id.
#[derive(Debug)]
pub struct StreamReassembler {
    streams: HashMap<String, StreamState>,
    completion_grace: Duration,
    inactivity_timeout: Duration,
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETION_GRACE, DEFAULT_INACTIVITY_TIMEOUT)
    }
}

impl StreamReassembler {
    /// Create a reassembler with explicit retention windows.
    #[must_use]
    pub fn new(completion_grace: Duration, inactivity_timeout: Duration) -> Self {
        Self {
            streams: HashMap::new(),
            completion_grace,
            inactivity_timeout,
        }
    }

    /// Inactivity window used by [`StreamReassembler::cleanup`].
    #[must_use]
    pub fn inactivity_timeout(&self) -> Duration {
        self.inactivity_timeout
    }

    /// Append `chunk` to `stream_id` and return everything accumulated so far.
    ///
    /// Creates the stream on first use. `done = true` marks it complete;
    /// a later `done = false` never reverts that.
    pub fn accumulate(&mut self, stream_id: &str, chunk: &str, done: bool) -> &str {
        let now = Instant::now();
        self.purge_expired(now);

        let state = self
            .streams
            .entry(stream_id.to_owned())
            .or_insert_with(|| StreamState {
                content: String::new(),
                complete: false,
                last_update: now,
                completed_at: None,
            });

        state.content.push_str(chunk);
        state.last_update = now;
        if done && !state.complete {
            state.complete = true;
            state.completed_at = Some(now);
        }
        &state.content
    }

    /// Accumulated content for `stream_id`, or `""` if unknown.
    #[must_use]
    pub fn get_content(&self, stream_id: &str) -> &str {
        self.live(stream_id).map_or("", |s| s.content.as_str())
    }

    /// Whether `stream_id` has received its final chunk.
    #[must_use]
    pub fn is_complete(&self, stream_id: &str) -> bool {
        self.live(stream_id).is_some_and(|s| s.complete)
    }

    /// Number of streams currently readable.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.streams
            .values()
            .filter(|s| !s.expired(now, self.completion_grace))
            .count()
    }

    /// Whether no stream is currently readable.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop all state for `stream_id`.
    pub fn reset(&mut self, stream_id: &str) {
        self.streams.remove(stream_id);
    }

    /// Drop all state for every stream.
    pub fn clear(&mut self) {
        self.streams.clear();
    }

    /// Remove expired completed streams and incomplete streams that have
    /// been idle longer than the inactivity window.
    ///
    /// Returns the number of streams removed.
    pub fn cleanup(&mut self) -> usize {
        let now = Instant::now();
        let grace = self.completion_grace;
        let inactivity = self.inactivity_timeout;
        let before = self.streams.len();
        self.streams
            .retain(|_, s| !s.expired(now, grace) && !s.stale(now, inactivity));
        let removed = before - self.streams.len();
        if removed > 0 {
            debug!(removed, "stream reassembler: swept stale streams");
        }
        removed
    }

    fn live(&self, stream_id: &str) -> Option<&StreamState> {
        let now = Instant::now();
        self.streams
            .get(stream_id)
            .filter(|s| !s.expired(now, self.completion_grace))
    }

    fn purge_expired(&mut self, now: Instant) {
        let grace = self.completion_grace;
        self.streams.retain(|_, s| !s.expired(now, grace));
    }
}
