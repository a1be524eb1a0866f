//! WebSocket connection manager.
//!
//! Owns the socket for one session and drives the lifecycle
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──handshake ok──▶ Open ──close/EOF──▶ Closed
//!                               │                                             ▲
//!                               └────────────── timeout / error ──────────────┘
//! ```
//!
//! There is no way back from `Closed`; callers build a new [`Connection`].
//!
//! Outbound messages sent before the connection is open are queued and
//! flushed in FIFO order the moment the handshake completes. Inbound frames
//! are decoded with [`decode_frame`] and fanned out to the listeners in
//! [`ConnectionEvents`]: streaming variants to `stream_chunk`, everything else
//! to `message`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::acp::codec::{decode_frame, encode_message};
use crate::acp::events::{CloseInfo, ConnectionEvents};
use crate::acp::message::{ProtocolMessage, StreamChunk};
use crate::acp::MessageSender;
use crate::{AppError, Result};

/// Connect timeout applied when the caller has no preference.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Close code reported to listeners when the client closes the socket.
pub const NORMAL_CLOSURE: u16 = 1000;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Constructed, `connect` not yet called.
    Disconnected,
    /// Handshake in flight.
    Connecting,
    /// Frames flow in both directions.
    Open,
    /// Terminal.
    Closed,
}

struct Link {
    state: ConnectionState,
    pending: VecDeque<String>,
    outbound: Option<mpsc::UnboundedSender<Message>>,
}

struct Shared {
    url: String,
    bearer_token: Option<String>,
    link: Mutex<Link>,
    events: ConnectionEvents,
    cancel: CancellationToken,
}

/// Handle to one ACP socket. Cheap to clone; clones share the socket.
#[derive(Clone)]
pub struct Connection {
    shared: Arc<Shared>,
}

impl Connection {
    /// Create a disconnected handle for `url`, authenticating with
    /// `bearer_token` when one is given.
    #[must_use]
    pub fn new(url: impl Into<String>, bearer_token: Option<String>) -> Self {
        Self {
            shared: Arc::new(Shared {
                url: url.into(),
                bearer_token,
                link: Mutex::new(Link {
                    state: ConnectionState::Disconnected,
                    pending: VecDeque::new(),
                    outbound: None,
                }),
                events: ConnectionEvents::default(),
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Target URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.shared.url
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.shared.link().state
    }

    /// Number of outbound frames waiting for the connection to open.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.shared.link().pending.len()
    }

    /// Open the socket, waiting at most `timeout` for the handshake.
    ///
    /// Returns immediately when already open. On success every message
    /// queued by [`Connection::send`] is flushed in the order it was sent.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Transport`] when the handshake fails, the timeout
    /// elapses first, another connect is already in flight, or the
    /// connection was closed. A failed attempt leaves the connection
    /// `Closed`.
    pub async fn connect(&self, timeout: Duration) -> Result<()> {
        {
            let mut link = self.shared.link();
            match link.state {
                ConnectionState::Open => return Ok(()),
                ConnectionState::Connecting => {
                    return Err(AppError::Transport("connect already in progress".into()));
                }
                ConnectionState::Closed => {
                    return Err(AppError::Transport(
                        "connection is closed; create a new connection".into(),
                    ));
                }
                ConnectionState::Disconnected => link.state = ConnectionState::Connecting,
            }
        }

        let request = match self.shared.client_request() {
            Ok(request) => request,
            Err(err) => {
                self.shared.abandon_connect();
                return Err(err);
            }
        };

        let stream = match tokio::time::timeout(timeout, connect_async(request)).await {
            Ok(Ok((stream, _response))) => stream,
            Ok(Err(err)) => {
                self.shared.abandon_connect();
                warn!(url = %self.shared.url, %err, "acp connection: handshake failed");
                return Err(AppError::Transport(format!(
                    "connect to {} failed: {err}",
                    self.shared.url
                )));
            }
            Err(_elapsed) => {
                self.shared.abandon_connect();
                warn!(url = %self.shared.url, "acp connection: connect timed out");
                return Err(AppError::Transport(format!(
                    "connect to {} timed out after {} ms",
                    self.shared.url,
                    timeout.as_millis()
                )));
            }
        };

        let (sink, source) = stream.split();
        let (tx, rx) = mpsc::unbounded_channel();
        {
            let mut link = self.shared.link();
            if link.state != ConnectionState::Connecting {
                return Err(AppError::Transport(
                    "connection closed while connecting".into(),
                ));
            }
            let queued = link.pending.len();
            for frame in link.pending.drain(..) {
                // The receiver is alive until the writer task below ends.
                let _ = tx.send(Message::text(frame));
            }
            link.outbound = Some(tx);
            link.state = ConnectionState::Open;
            info!(url = %self.shared.url, queued, "acp connection open");
        }

        tokio::spawn(run_writer(Arc::clone(&self.shared), sink, rx));
        tokio::spawn(run_reader(Arc::clone(&self.shared), source));
        Ok(())
    }

    /// Send `message`, or queue it until the connection opens.
    ///
    /// Once the connection is `Closed` the message is dropped with a warning.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Decode`] only if the message cannot be
    /// serialized. Not being connected is not an error.
    pub fn send(&self, message: &ProtocolMessage) -> Result<()> {
        let frame = encode_message(message)?;
        let mut link = self.shared.link();
        if link.state == ConnectionState::Open {
            if let Some(tx) = link.outbound.as_ref() {
                if tx.send(Message::text(frame)).is_err() {
                    warn!("acp connection: writer stopped, outbound frame dropped");
                }
                return Ok(());
            }
        }
        if link.state == ConnectionState::Closed {
            warn!(
                message_type = message.message_type(),
                "acp connection: closed, outbound frame dropped"
            );
            return Ok(());
        }
        debug!(state = ?link.state, "acp connection: queueing outbound frame");
        link.pending.push_back(frame);
        Ok(())
    }

    /// Close the socket. Safe to call repeatedly.
    ///
    /// Close listeners are notified once if the connection was open.
    pub fn close(&self) {
        let was_open = {
            let mut link = self.shared.link();
            if link.state == ConnectionState::Closed {
                return;
            }
            let was_open = link.state == ConnectionState::Open;
            link.state = ConnectionState::Closed;
            if let Some(tx) = link.outbound.take() {
                let _ = tx.send(Message::Close(None));
            }
            was_open
        };
        self.shared.cancel.cancel();
        info!(url = %self.shared.url, "acp connection closed by client");

        if was_open {
            self.shared.events.close.publish(&CloseInfo {
                code: Some(NORMAL_CLOSURE),
                reason: "closed by client".into(),
            });
        }
    }

    /// Register a listener for complete (non-streaming) messages.
    pub fn on_message(&self, listener: impl Fn(&ProtocolMessage) + Send + Sync + 'static) {
        self.shared.events.message.subscribe(listener);
    }

    /// Register a listener for streamed reply chunks.
    pub fn on_stream_chunk(&self, listener: impl Fn(&StreamChunk) + Send + Sync + 'static) {
        self.shared.events.stream_chunk.subscribe(listener);
    }

    /// Register a listener for transport errors raised after opening.
    pub fn on_error(&self, listener: impl Fn(&String) + Send + Sync + 'static) {
        self.shared.events.error.subscribe(listener);
    }

    /// Register a listener for the close event.
    pub fn on_close(&self, listener: impl Fn(&CloseInfo) + Send + Sync + 'static) {
        self.shared.events.close.subscribe(listener);
    }

    /// Register a listener for raw inbound frame text.
    pub fn on_raw(&self, listener: impl Fn(&String) + Send + Sync + 'static) {
        self.shared.events.raw.subscribe(listener);
    }
}

impl MessageSender for Connection {
    fn send_message(&self, message: &ProtocolMessage) -> Result<()> {
        self.send(message)
    }
}

impl Shared {
    fn link(&self) -> MutexGuard<'_, Link> {
        match self.link.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn client_request(&self) -> Result<Request> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| AppError::Transport(format!("invalid url {}: {e}", self.url)))?;

        if let Some(token) = self.bearer_token.as_deref() {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| AppError::Transport(format!("invalid bearer token: {e}")))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        Ok(request)
    }

    fn abandon_connect(&self) {
        let mut link = self.link();
        if link.state == ConnectionState::Connecting {
            link.state = ConnectionState::Closed;
        }
    }

    /// Transition to `Closed` after the peer hung up, notifying listeners once.
    fn finish_remote(&self, info: CloseInfo) {
        {
            let mut link = self.link();
            if link.state == ConnectionState::Closed {
                return;
            }
            link.state = ConnectionState::Closed;
            link.outbound = None;
        }
        info!(url = %self.url, code = ?info.code, reason = %info.reason, "acp connection closed by peer");
        self.events.close.publish(&info);
    }

    fn dispatch_frame(&self, frame: &str) {
        self.events.raw.publish(&frame.to_owned());
        for message in decode_frame(frame) {
            match message.as_stream_chunk() {
                Some(chunk) => {
                    self.events.stream_chunk.publish(&chunk);
                }
                None => {
                    self.events.message.publish(&message);
                }
            }
        }
    }
}

// ── Socket tasks ──────────────────────────────────────────────────────────────

/// Forward queued frames to the socket until the channel closes.
async fn run_writer(
    shared: Arc<Shared>,
    mut sink: SplitSink<WsStream, Message>,
    mut outbound: mpsc::UnboundedReceiver<Message>,
) {
    while let Some(message) = outbound.recv().await {
        let closing = matches!(message, Message::Close(_));
        if let Err(err) = sink.send(message).await {
            warn!(%err, "acp writer: send failed");
            shared.events.error.publish(&format!("write failed: {err}"));
            break;
        }
        if closing {
            break;
        }
    }
    let _ = sink.close().await;
    debug!("acp writer: stopped");
}

/// Read frames until EOF, a close frame, or local cancellation.
async fn run_reader(shared: Arc<Shared>, mut source: SplitStream<WsStream>) {
    let cancel = shared.cancel.clone();
    let mut close = CloseInfo {
        code: None,
        reason: String::new(),
    };

    loop {
        tokio::select! {
            biased;

            () = cancel.cancelled() => {
                debug!("acp reader: cancellation received, stopping");
                return;
            }

            item = source.next() => {
                match item {
                    None => {
                        debug!("acp reader: EOF detected");
                        break;
                    }
                    Some(Ok(Message::Text(text))) => shared.dispatch_frame(text.as_str()),
                    Some(Ok(Message::Binary(bytes))) => {
                        shared.dispatch_frame(&String::from_utf8_lossy(&bytes));
                    }
                    Some(Ok(Message::Close(frame))) => {
                        if let Some(frame) = frame {
                            close.code = Some(u16::from(frame.code));
                            close.reason = frame.reason.as_str().to_owned();
                        }
                        break;
                    }
                    Some(Ok(_)) => {
                        // Ping/pong are answered by tungstenite itself.
                    }
                    Some(Err(err)) => {
                        warn!(%err, "acp reader: socket error");
                        shared.events.error.publish(&err.to_string());
                    }
                }
            }
        }
    }

    shared.finish_remote(close);
}
