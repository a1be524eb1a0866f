//! Typed tool-call arguments.
//!
//! Arguments arrive as free-form JSON. [`ToolInvocation::parse`] checks the
//! shape for each known tool before anything touches the filesystem or spawns
//! a process.

use serde_json::Value;

use crate::tools::fs::WriteMode;
use crate::{AppError, Result};

/// Arguments of `write_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteFileArgs {
    /// Target path, absolute or workspace-relative.
    pub path: String,
    /// Full new file content.
    pub content: String,
    /// Requested write mode.
    pub mode: WriteMode,
}

/// Arguments of `read_file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFileArgs {
    /// Source path, absolute or workspace-relative.
    pub path: String,
}

/// Arguments of `run_shell`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunShellArgs {
    /// Command line handed to the platform shell.
    pub cmd: String,
    /// Working directory; the workspace root when absent.
    pub cwd: Option<String>,
}

/// A validated tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolInvocation {
    /// `write_file`.
    WriteFile(WriteFileArgs),
    /// `read_file`.
    ReadFile(ReadFileArgs),
    /// `run_shell`.
    RunShell(RunShellArgs),
}

impl ToolInvocation {
    /// Validate `args` for `tool`.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Tool`] with a message suitable for the
    /// `tool_result` error field when the tool is unknown or an argument has
    /// the wrong type.
    pub fn parse(tool: &str, args: &Value) -> Result<Self> {
        match tool {
            "write_file" => {
                let (Some(path), Some(content)) = (str_field(args, "path"), str_field(args, "content"))
                else {
                    return Err(AppError::Tool(
                        "Invalid write_file args: path and content must be strings".into(),
                    ));
                };
                let mode = match args.get("mode") {
                    None | Some(Value::Null) => WriteMode::default(),
                    Some(Value::String(raw)) => WriteMode::parse(raw).ok_or_else(invalid_mode)?,
                    Some(_) => return Err(invalid_mode()),
                };
                Ok(Self::WriteFile(WriteFileArgs {
                    path,
                    content,
                    mode,
                }))
            }
            "read_file" => str_field(args, "path")
                .map(|path| Self::ReadFile(ReadFileArgs { path }))
                .ok_or_else(|| AppError::Tool("Invalid read_file args: path must be a string".into())),
            "run_shell" => {
                let Some(cmd) = str_field(args, "cmd") else {
                    return Err(AppError::Tool(
                        "Invalid run_shell args: cmd must be a string".into(),
                    ));
                };
                let cwd = match args.get("cwd") {
                    None | Some(Value::Null) => None,
                    Some(Value::String(cwd)) => Some(cwd.clone()),
                    Some(_) => {
                        return Err(AppError::Tool(
                            "Invalid run_shell args: cwd must be a string".into(),
                        ))
                    }
                };
                Ok(Self::RunShell(RunShellArgs { cmd, cwd }))
            }
            other => Err(AppError::Tool(format!("Unknown tool: {other}"))),
        }
    }
}

fn str_field(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_owned)
}

fn invalid_mode() -> AppError {
    AppError::Tool("Invalid write_file args: mode must be one of create, edit, patch".into())
}
