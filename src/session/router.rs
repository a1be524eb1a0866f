//! Session routing: connection events in, display and tool results out.
//!
//! [`SessionRouter::attach`] bridges the connection's listeners into one
//! ordered channel. [`SessionRouter::run`] drains it, handling each event to
//! completion (tool dispatch included) before taking the next, and sweeps
//! stale streams from the reassembler every inactivity window.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::presenter::Presenter;
use crate::acp::connection::Connection;
use crate::acp::events::CloseInfo;
use crate::acp::message::{ProtocolMessage, StreamChunk, StreamKind, ToolCallRequest};
use crate::acp::MessageSender;
use crate::stream::StreamReassembler;
use crate::tools::ToolDispatcher;
use crate::transcript::{Direction, TranscriptSink};
use crate::Result;

/// Everything the router reacts to, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    /// A complete message.
    Message(ProtocolMessage),
    /// A piece of a streamed reply.
    StreamChunk(StreamChunk),
    /// A transport error after the connection opened.
    Error(String),
    /// The connection closed.
    Closed(CloseInfo),
}

/// Whether the router should keep going after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep processing events.
    Continue,
    /// The session is over.
    Stop,
}

/// Composition root for inbound traffic.
pub struct SessionRouter {
    reassembler: StreamReassembler,
    dispatcher: ToolDispatcher,
    presenter: Arc<dyn Presenter>,
    transcript: Arc<dyn TranscriptSink>,
    displayed_stream: Option<String>,
}

impl SessionRouter {
    /// Router over the given collaborators.
    #[must_use]
    pub fn new(
        reassembler: StreamReassembler,
        dispatcher: ToolDispatcher,
        presenter: Arc<dyn Presenter>,
        transcript: Arc<dyn TranscriptSink>,
    ) -> Self {
        Self {
            reassembler,
            dispatcher,
            presenter,
            transcript,
            displayed_stream: None,
        }
    }

    /// Register listeners on `connection` that forward every event into the
    /// returned channel.
    #[must_use]
    pub fn attach(connection: &Connection) -> mpsc::UnboundedReceiver<InboundEvent> {
        let (tx, rx) = mpsc::unbounded_channel();

        let events = tx.clone();
        connection.on_message(move |message| {
            let _ = events.send(InboundEvent::Message(message.clone()));
        });
        let events = tx.clone();
        connection.on_stream_chunk(move |chunk| {
            let _ = events.send(InboundEvent::StreamChunk(chunk.clone()));
        });
        let events = tx.clone();
        connection.on_error(move |error| {
            let _ = events.send(InboundEvent::Error(error.clone()));
        });
        connection.on_close(move |info| {
            let _ = tx.send(InboundEvent::Closed(info.clone()));
        });

        rx
    }

    /// Stream reassembler state, for inspection.
    #[must_use]
    pub fn reassembler(&self) -> &StreamReassembler {
        &self.reassembler
    }

    /// Id of the text stream currently being displayed.
    #[must_use]
    pub fn displayed_stream(&self) -> Option<&str> {
        self.displayed_stream.as_deref()
    }

    /// Process events until the channel closes, the connection closes, or
    /// `shutdown` fires.
    pub async fn run(
        mut self,
        mut events: mpsc::UnboundedReceiver<InboundEvent>,
        shutdown: CancellationToken,
    ) {
        let period = self.reassembler.inactivity_timeout();
        let mut sweep = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                () = shutdown.cancelled() => {
                    debug!("session router: shutdown requested");
                    break;
                }

                event = events.recv() => {
                    let Some(event) = event else {
                        debug!("session router: event channel closed");
                        break;
                    };
                    if self.handle_event(event).await == Flow::Stop {
                        break;
                    }
                }

                _ = sweep.tick() => {
                    self.reassembler.cleanup();
                }
            }
        }
    }

    /// Handle one event to completion.
    pub async fn handle_event(&mut self, event: InboundEvent) -> Flow {
        match event {
            InboundEvent::StreamChunk(chunk) => {
                self.handle_chunk(chunk).await;
                Flow::Continue
            }
            InboundEvent::Message(message) => {
                self.handle_message(message).await;
                Flow::Continue
            }
            InboundEvent::Error(error) => {
                warn!(%error, "session router: transport error");
                self.presenter.error(&error);
                Flow::Continue
            }
            InboundEvent::Closed(info) => {
                self.cancel_displayed_stream();
                let mut line = String::from("Connection closed");
                if let Some(code) = info.code {
                    line.push_str(&format!(" (code {code})"));
                }
                if !info.reason.is_empty() {
                    line.push_str(&format!(": {}", info.reason));
                }
                info!(code = ?info.code, reason = %info.reason, "session router: connection closed");
                self.presenter.warning(&line);
                Flow::Stop
            }
        }
    }

    async fn handle_chunk(&mut self, chunk: StreamChunk) {
        match chunk.kind {
            StreamKind::Text => self.handle_text_chunk(&chunk),
            StreamKind::ToolCall => {
                self.reassembler
                    .accumulate(&chunk.stream_id, &chunk.chunk, chunk.done);
                if !chunk.done {
                    return;
                }
                let content = self.reassembler.get_content(&chunk.stream_id).to_owned();
                self.reassembler.reset(&chunk.stream_id);
                match serde_json::from_str::<ToolCallRequest>(&content) {
                    Ok(request) => {
                        self.transcript
                            .record(Direction::Incoming, &ProtocolMessage::ToolCall(request.clone()));
                        self.dispatch(&request).await;
                    }
                    Err(err) => {
                        warn!(stream_id = %chunk.stream_id, %err, "session router: streamed tool call did not decode");
                    }
                }
            }
        }
    }

    fn handle_text_chunk(&mut self, chunk: &StreamChunk) {
        if self.displayed_stream.as_deref() != Some(chunk.stream_id.as_str()) {
            self.cancel_displayed_stream();
            self.presenter.stream_started(&chunk.stream_id);
            self.displayed_stream = Some(chunk.stream_id.clone());
        }

        let accumulated = self
            .reassembler
            .accumulate(&chunk.stream_id, &chunk.chunk, chunk.done);
        self.presenter
            .stream_update(&chunk.stream_id, &chunk.chunk, accumulated);

        if chunk.done {
            let content = self.reassembler.get_content(&chunk.stream_id).to_owned();
            self.presenter.stream_completed(&chunk.stream_id, &content);
            self.transcript
                .record(Direction::Incoming, &ProtocolMessage::text(content));
            self.reassembler.reset(&chunk.stream_id);
            self.displayed_stream = None;
        }
    }

    async fn handle_message(&mut self, message: ProtocolMessage) {
        self.transcript.record(Direction::Incoming, &message);
        match &message {
            ProtocolMessage::Text(text) => {
                if let Some(stream_id) = self.displayed_stream.as_deref() {
                    debug!(%stream_id, "session router: complete text hidden behind live stream");
                } else {
                    self.presenter.model_message(&text.content);
                }
            }
            ProtocolMessage::ToolCall(request) => self.dispatch(request).await,
            ProtocolMessage::Unknown(_) => {
                debug!(message_type = message.message_type(), "session router: unhandled message type");
            }
            other => {
                debug!(message_type = other.message_type(), "session router: message recorded only");
            }
        }
    }

    async fn dispatch(&mut self, request: &ToolCallRequest) {
        self.cancel_displayed_stream();
        self.presenter.tool_call(request);
        let result = self.dispatcher.handle_tool_call(request).await;
        self.transcript.record(
            Direction::Outgoing,
            &ProtocolMessage::ToolResult(result.clone()),
        );
        self.presenter.tool_result(&result);
    }

    /// Stop displaying the current text stream. Accumulated content stays
    /// in the reassembler.
    fn cancel_displayed_stream(&mut self) {
        if let Some(stream_id) = self.displayed_stream.take() {
            self.presenter.stream_cancelled(&stream_id);
        }
    }
}

/// Outbound half of the session: user prompts go out through here so they
/// carry the configured model and land in the transcript.
#[derive(Clone)]
pub struct SessionOutbox {
    sender: Arc<dyn MessageSender>,
    transcript: Arc<dyn TranscriptSink>,
    model: Option<String>,
}

impl SessionOutbox {
    /// Outbox sending through `sender`.
    #[must_use]
    pub fn new(
        sender: Arc<dyn MessageSender>,
        transcript: Arc<dyn TranscriptSink>,
        model: Option<String>,
    ) -> Self {
        Self {
            sender,
            transcript,
            model,
        }
    }

    /// Send `content` as a user `client_message`.
    ///
    /// # Errors
    ///
    /// Returns an error if the message cannot be encoded.
    pub fn send_user(&self, content: &str) -> Result<()> {
        let message = ProtocolMessage::user(content, self.model.clone());
        self.sender.send_message(&message)?;
        self.transcript.record(Direction::Outgoing, &message);
        Ok(())
    }
}
