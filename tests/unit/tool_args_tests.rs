//! Unit tests for tool argument validation.

use serde_json::json;

use acp_session_client::tools::args::{RunShellArgs, ToolInvocation, WriteFileArgs};
use acp_session_client::tools::fs::WriteMode;
use acp_session_client::AppError;

fn tool_error(tool: &str, args: &serde_json::Value) -> String {
    match ToolInvocation::parse(tool, args) {
        Err(AppError::Tool(msg)) => msg,
        other => panic!("expected tool error, got {other:?}"),
    }
}

#[test]
fn write_file_defaults_to_create_mode() {
    let parsed = ToolInvocation::parse("write_file", &json!({"path":"a.txt","content":"x"})).unwrap();
    assert_eq!(
        parsed,
        ToolInvocation::WriteFile(WriteFileArgs {
            path: "a.txt".into(),
            content: "x".into(),
            mode: WriteMode::Create,
        })
    );
}

#[test]
fn write_file_accepts_every_mode() {
    for (raw, mode) in [
        ("create", WriteMode::Create),
        ("edit", WriteMode::Edit),
        ("patch", WriteMode::Patch),
    ] {
        let parsed = ToolInvocation::parse(
            "write_file",
            &json!({"path":"a","content":"","mode":raw}),
        )
        .unwrap();
        let ToolInvocation::WriteFile(args) = parsed else {
            panic!("expected write_file");
        };
        assert_eq!(args.mode, mode);
    }
}

#[test]
fn write_file_without_content_is_rejected() {
    assert_eq!(
        tool_error("write_file", &json!({"path":"a.txt"})),
        "Invalid write_file args: path and content must be strings"
    );
}

#[test]
fn write_file_with_non_string_path_is_rejected() {
    assert_eq!(
        tool_error("write_file", &json!({"path":3,"content":"x"})),
        "Invalid write_file args: path and content must be strings"
    );
}

#[test]
fn write_file_with_unknown_mode_is_rejected() {
    let msg = tool_error("write_file", &json!({"path":"a","content":"x","mode":"append"}));
    assert!(msg.contains("mode"), "{msg}");
}

#[test]
fn read_file_requires_string_path() {
    assert_eq!(
        tool_error("read_file", &json!({})),
        "Invalid read_file args: path must be a string"
    );
}

#[test]
fn run_shell_parses_optional_cwd() {
    let parsed = ToolInvocation::parse("run_shell", &json!({"cmd":"ls","cwd":"sub"})).unwrap();
    assert_eq!(
        parsed,
        ToolInvocation::RunShell(RunShellArgs {
            cmd: "ls".into(),
            cwd: Some("sub".into()),
        })
    );

    let ToolInvocation::RunShell(args) =
        ToolInvocation::parse("run_shell", &json!({"cmd":"ls"})).unwrap()
    else {
        panic!("expected run_shell");
    };
    assert_eq!(args.cwd, None);
}

#[test]
fn run_shell_requires_string_cmd() {
    assert_eq!(
        tool_error("run_shell", &json!({"cmd":["ls"]})),
        "Invalid run_shell args: cmd must be a string"
    );
}

#[test]
fn run_shell_rejects_non_string_cwd() {
    assert_eq!(
        tool_error("run_shell", &json!({"cmd":"ls","cwd":1})),
        "Invalid run_shell args: cwd must be a string"
    );
}

#[test]
fn args_that_are_not_an_object_fail_validation() {
    assert!(ToolInvocation::parse("read_file", &serde_json::Value::Null).is_err());
}

#[test]
fn unknown_tool_names_itself() {
    assert_eq!(tool_error("frobnicate", &json!({})), "Unknown tool: frobnicate");
}
