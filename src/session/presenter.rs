//! Display surface for the session.

use std::io::Write;

use crate::acp::message::{ToolCallRequest, ToolResultMessage};

/// Where the session shows what is happening.
///
/// Implementations must not block for long; they run on the router task.
pub trait Presenter: Send + Sync {
    /// A new text stream began.
    fn stream_started(&self, stream_id: &str);
    /// `chunk` was appended to a displayed stream; `accumulated` is the full
    /// text so far.
    fn stream_update(&self, stream_id: &str, chunk: &str, accumulated: &str);
    /// A displayed stream finished with `content`.
    fn stream_completed(&self, stream_id: &str, content: &str);
    /// A displayed stream was interrupted before finishing.
    fn stream_cancelled(&self, stream_id: &str);
    /// A complete reply arrived.
    fn model_message(&self, content: &str);
    /// The server asked for a tool call.
    fn tool_call(&self, request: &ToolCallRequest);
    /// A tool result was sent back.
    fn tool_result(&self, result: &ToolResultMessage);
    /// A question is waiting for input.
    fn prompt(&self, question: &str);
    /// Material to review before answering the next question.
    fn preview(&self, preview: &str);
    /// Informational status line.
    fn info(&self, message: &str);
    /// Something degraded but the session continues.
    fn warning(&self, message: &str);
    /// Something failed.
    fn error(&self, message: &str);
}

/// Plain-text [`Presenter`] writing to stdout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsolePresenter;

impl ConsolePresenter {
    fn emit(text: &str) {
        let mut out = std::io::stdout().lock();
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }
}

impl Presenter for ConsolePresenter {
    fn stream_started(&self, _stream_id: &str) {
        Self::emit("Model: ");
    }

    fn stream_update(&self, _stream_id: &str, chunk: &str, _accumulated: &str) {
        Self::emit(chunk);
    }

    fn stream_completed(&self, _stream_id: &str, _content: &str) {
        Self::emit("\n");
    }

    fn stream_cancelled(&self, _stream_id: &str) {
        Self::emit("\n[stream interrupted]\n");
    }

    fn model_message(&self, content: &str) {
        Self::emit(&format!("Model: {content}\n"));
    }

    fn tool_call(&self, request: &ToolCallRequest) {
        Self::emit(&format!("Tool call {}: {} {}\n", request.id, request.tool, request.args));
    }

    fn tool_result(&self, result: &ToolResultMessage) {
        let status = if result.result.success { "ok" } else { "failed" };
        let mut line = format!("Tool result {}: {status}", result.tool_call_id);
        if let Some(error) = result.result.error.as_deref() {
            line.push_str(&format!(" ({error})"));
        }
        line.push('\n');
        Self::emit(&line);
    }

    fn prompt(&self, question: &str) {
        if question.ends_with(' ') {
            Self::emit(question);
        } else {
            Self::emit(&format!("{question} "));
        }
    }

    fn preview(&self, preview: &str) {
        let mut block = String::from("----- preview -----\n");
        block.push_str(preview);
        if !preview.ends_with('\n') {
            block.push('\n');
        }
        block.push_str("-------------------\n");
        Self::emit(&block);
    }

    fn info(&self, message: &str) {
        Self::emit(&format!("{message}\n"));
    }

    fn warning(&self, message: &str) {
        Self::emit(&format!("warning: {message}\n"));
    }

    fn error(&self, message: &str) {
        Self::emit(&format!("error: {message}\n"));
    }
}
