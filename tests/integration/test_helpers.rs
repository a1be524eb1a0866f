//! Shared helpers: a scripted in-process WebSocket server and channel-backed
//! listeners.

#![allow(dead_code)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;

use acp_session_client::acp::message::ToolCallRequest;
use acp_session_client::session::Presenter;
use acp_session_client::tools::{ApprovalRequest, Approver, BoxFuture};

/// How long any single wait in a test may take.
pub const WAIT: Duration = Duration::from_secs(5);

/// What the test tells the server to do next.
pub enum ServerCommand {
    /// Send a text frame.
    Send(String),
    /// Send a close frame and stop.
    Close(u16, String),
}

/// Accepts exactly one client; forwards its text frames to `received`.
pub struct TestServer {
    pub url: String,
    /// Text frames from the client. Ends when the client disconnects.
    pub received: mpsc::UnboundedReceiver<String>,
    /// `Authorization` header of the handshake request.
    pub authorization: oneshot::Receiver<Option<String>>,
    commands: mpsc::UnboundedSender<ServerCommand>,
}

impl TestServer {
    pub async fn start() -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());
        let (received_tx, received) = mpsc::unbounded_channel();
        let (commands, mut command_rx) = mpsc::unbounded_channel();
        let (auth_tx, authorization) = oneshot::channel();

        tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let callback = move |request: &Request, response: Response| {
                let header = request
                    .headers()
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);
                let _ = auth_tx.send(header);
                Ok::<Response, ErrorResponse>(response)
            };
            let mut ws = tokio_tungstenite::accept_hdr_async(stream, callback)
                .await
                .unwrap();

            loop {
                tokio::select! {
                    command = command_rx.recv() => match command {
                        Some(ServerCommand::Send(text)) => {
                            if ws.send(Message::text(text)).await.is_err() {
                                break;
                            }
                        }
                        Some(ServerCommand::Close(code, reason)) => {
                            let _ = ws
                                .close(Some(CloseFrame {
                                    code: CloseCode::from(code),
                                    reason: reason.into(),
                                }))
                                .await;
                            break;
                        }
                        None => break,
                    },
                    frame = ws.next() => match frame {
                        Some(Ok(Message::Text(text))) => {
                            let _ = received_tx.send(text.as_str().to_owned());
                        }
                        Some(Ok(Message::Close(_)) | Err(_)) | None => break,
                        Some(Ok(_)) => {}
                    },
                }
            }
        });

        Self {
            url,
            received,
            authorization,
            commands,
        }
    }

    pub fn send(&self, frame: &str) {
        self.commands
            .send(ServerCommand::Send(frame.to_owned()))
            .unwrap();
    }

    pub fn close(&self, code: u16, reason: &str) {
        self.commands
            .send(ServerCommand::Close(code, reason.to_owned()))
            .unwrap();
    }

    /// Next client frame parsed as JSON.
    pub async fn next_json(&mut self) -> serde_json::Value {
        let frame = tokio::time::timeout(WAIT, self.received.recv())
            .await
            .expect("timed out waiting for client frame")
            .expect("client disconnected");
        serde_json::from_str(&frame).unwrap()
    }

    /// Wait until the client side of the socket is gone.
    pub async fn wait_disconnect(&mut self) {
        tokio::time::timeout(WAIT, async {
            while self.received.recv().await.is_some() {}
        })
        .await
        .expect("client never disconnected");
    }
}

/// Receive from `rx` with the shared timeout.
pub async fn recv<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
    tokio::time::timeout(WAIT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("channel closed")
}

/// Approver answering every request the same way.
pub struct FixedApprover(pub bool);

impl Approver for FixedApprover {
    fn approve(&self, _request: ApprovalRequest) -> BoxFuture<'_, bool> {
        let answer = self.0;
        Box::pin(async move { answer })
    }
}

/// Presenter forwarding completed streams and notices to a channel.
pub struct ChannelPresenter(pub mpsc::UnboundedSender<String>);

impl ChannelPresenter {
    fn push(&self, line: String) {
        let _ = self.0.send(line);
    }
}

impl Presenter for ChannelPresenter {
    fn stream_started(&self, _stream_id: &str) {}

    fn stream_update(&self, _stream_id: &str, _chunk: &str, _accumulated: &str) {}

    fn stream_completed(&self, stream_id: &str, content: &str) {
        self.push(format!("completed:{stream_id}:{content}"));
    }

    fn stream_cancelled(&self, stream_id: &str) {
        self.push(format!("cancelled:{stream_id}"));
    }

    fn model_message(&self, content: &str) {
        self.push(format!("message:{content}"));
    }

    fn tool_call(&self, request: &ToolCallRequest) {
        self.push(format!("tool_call:{}", request.id));
    }

    fn tool_result(&self, result: &acp_session_client::acp::message::ToolResultMessage) {
        self.push(format!("tool_result:{}", result.tool_call_id));
    }

    fn prompt(&self, _question: &str) {}

    fn preview(&self, _preview: &str) {}

    fn info(&self, message: &str) {
        self.push(format!("info:{message}"));
    }

    fn warning(&self, message: &str) {
        self.push(format!("warning:{message}"));
    }

    fn error(&self, message: &str) {
        self.push(format!("error:{message}"));
    }
}
