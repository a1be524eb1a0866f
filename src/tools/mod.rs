//! Tool-call dispatch.
//!
//! [`ToolDispatcher`] turns each server `tool_call` into exactly one
//! `tool_result` carrying the same id. Destructive tools (`write_file`,
//! `run_shell`) are gated behind an [`Approver`]; `read_file` is not.
//! Side effects go through the [`fs::FileSystem`] and
//! [`process::ProcessRunner`] capabilities so tests can substitute fakes.

pub mod args;
pub mod fs;
pub mod path;
pub mod preview;
pub mod process;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{info, warn};

use crate::acp::message::{ProtocolMessage, ToolCallRequest, ToolResult, ToolResultMessage};
use crate::acp::MessageSender;
use crate::AppError;

use args::{ReadFileArgs, RunShellArgs, ToolInvocation, WriteFileArgs};
use fs::{FileSystem, LocalFileSystem};
use path::Workspace;
use process::{ProcessRunner, ShellRunner};

/// Boxed future returned by the capability traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A yes/no question put to the operator before a destructive action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalRequest {
    /// Question text.
    pub prompt: String,
    /// Optional material to show before the question (write previews).
    pub preview: Option<String>,
    /// Answer assumed when the operator enters an empty line.
    pub default_yes: bool,
}

/// Decides whether a destructive tool call may proceed.
pub trait Approver: Send + Sync {
    /// Ask the operator; resolves to `true` only on an affirmative answer.
    fn approve(&self, request: ApprovalRequest) -> BoxFuture<'_, bool>;
}

/// Executes tool calls against one workspace and reports their results.
pub struct ToolDispatcher {
    workspace: Workspace,
    sender: Arc<dyn MessageSender>,
    approver: Arc<dyn Approver>,
    fs: Arc<dyn FileSystem>,
    runner: Arc<dyn ProcessRunner>,
}

impl ToolDispatcher {
    /// Dispatcher using the local disk and the platform shell.
    #[must_use]
    pub fn new(
        workspace: Workspace,
        sender: Arc<dyn MessageSender>,
        approver: Arc<dyn Approver>,
    ) -> Self {
        Self::with_capabilities(
            workspace,
            sender,
            approver,
            Arc::new(LocalFileSystem),
            Arc::new(ShellRunner),
        )
    }

    /// Dispatcher with explicit filesystem and process capabilities.
    #[must_use]
    pub fn with_capabilities(
        workspace: Workspace,
        sender: Arc<dyn MessageSender>,
        approver: Arc<dyn Approver>,
        fs: Arc<dyn FileSystem>,
        runner: Arc<dyn ProcessRunner>,
    ) -> Self {
        Self {
            workspace,
            sender,
            approver,
            fs,
            runner,
        }
    }

    /// Workspace relative paths are resolved against.
    #[must_use]
    pub fn workspace(&self) -> &Workspace {
        &self.workspace
    }

    /// Execute `request` and send its `tool_result`.
    ///
    /// Always sends exactly one result, whatever the outcome. The sent
    /// message is also returned so the caller can record it.
    pub async fn handle_tool_call(&self, request: &ToolCallRequest) -> ToolResultMessage {
        let result = self.execute(request).await;
        if result.is_rejected() {
            info!(id = %request.id, tool = %request.tool, "tool call rejected by user");
        } else if !result.success {
            warn!(
                id = %request.id,
                tool = %request.tool,
                error = result.error.as_deref().unwrap_or_default(),
                "tool call failed"
            );
        }

        let message = ToolResultMessage {
            tool_call_id: request.id.clone(),
            result,
        };
        let outbound = ProtocolMessage::ToolResult(message.clone());
        if let Err(err) = self.sender.send_message(&outbound) {
            warn!(id = %request.id, %err, "failed to send tool result");
        }
        message
    }

    /// Execute `request` without sending anything.
    pub async fn execute(&self, request: &ToolCallRequest) -> ToolResult {
        let invocation = match ToolInvocation::parse(&request.tool, &request.args) {
            Ok(invocation) => invocation,
            Err(err) => return ToolResult::failure(error_text(err)),
        };

        match invocation {
            ToolInvocation::WriteFile(args) => self.write_file(args).await,
            ToolInvocation::ReadFile(args) => self.read_file(args).await,
            ToolInvocation::RunShell(args) => self.run_shell(args).await,
        }
    }

    async fn write_file(&self, args: WriteFileArgs) -> ToolResult {
        let target = match self.workspace.resolve(&args.path) {
            Ok(target) => target,
            Err(err) => return ToolResult::failure(error_text(err)),
        };

        let existing = self.fs.read(&target).await.ok();
        let preview = preview::render_write_preview(&args.path, existing.as_deref(), &args.content);
        let approved = self
            .approver
            .approve(ApprovalRequest {
                prompt: format!("Approve writing {}?", target.display()),
                preview: Some(preview),
                default_yes: false,
            })
            .await;
        if !approved {
            return ToolResult::rejected();
        }

        match self.fs.write(&target, &args.content, args.mode).await {
            Ok(summary) => ToolResult::ok_message(summary.message()),
            Err(err) => {
                let text = error_text(err);
                ToolResult {
                    stderr: Some(text.clone()),
                    ..ToolResult::failure(text)
                }
            }
        }
    }

    async fn read_file(&self, args: ReadFileArgs) -> ToolResult {
        let target = match self.workspace.resolve(&args.path) {
            Ok(target) => target,
            Err(err) => return ToolResult::failure(error_text(err)),
        };

        match self.fs.read(&target).await {
            Ok(content) => ToolResult {
                success: true,
                stdout: Some(content),
                ..ToolResult::default()
            },
            Err(err) => {
                let text = error_text(err);
                ToolResult {
                    stderr: Some(text.clone()),
                    ..ToolResult::failure(text)
                }
            }
        }
    }

    async fn run_shell(&self, args: RunShellArgs) -> ToolResult {
        let cwd = match args.cwd.as_deref() {
            Some(raw) => match self.workspace.resolve(raw) {
                Ok(cwd) => cwd,
                Err(err) => return ToolResult::failure(error_text(err)),
            },
            None => self.workspace.root().to_path_buf(),
        };

        let approved = self
            .approver
            .approve(ApprovalRequest {
                prompt: format!("Approve running shell command: {}?", args.cmd),
                preview: None,
                default_yes: false,
            })
            .await;
        if !approved {
            return ToolResult::rejected();
        }

        match self.runner.run(&args.cmd, &cwd).await {
            Ok(output) => ToolResult {
                success: output.succeeded(),
                error: None,
                code: Some(output.code),
                stdout: Some(output.stdout),
                stderr: Some(output.stderr),
            },
            Err(err) => ToolResult {
                success: false,
                stdout: Some(String::new()),
                stderr: Some(error_text(err)),
                error: None,
                code: Some(None),
            },
        }
    }
}

/// Message text for a tool error.
///
/// Validation errors are reported verbatim; other kinds keep their
/// category prefix.
fn error_text(err: AppError) -> String {
    match err {
        AppError::Tool(msg) => msg,
        other => other.to_string(),
    }
}
