//! Before/after preview shown with a write approval.

use std::fmt::Write as _;

/// Marker heading a preview for a file that does not exist yet.
pub const NEW_FILE_MARKER: &str = "[NEW FILE]";

/// Render the change from `existing` to `proposed`.
///
/// With no existing content every proposed line is listed with a `+ ` prefix
/// under [`NEW_FILE_MARKER`]. Otherwise the result is a unified diff labelled
/// with `path`.
#[must_use]
pub fn render_write_preview(path: &str, existing: Option<&str>, proposed: &str) -> String {
    match existing {
        None => {
            let mut out = String::from(NEW_FILE_MARKER);
            out.push('\n');
            for line in proposed.lines() {
                let _ = writeln!(out, "+ {line}");
            }
            out
        }
        Some(existing) => {
            let patch = diffy::create_patch(existing, proposed);
            let body = patch.to_string();
            // diffy labels both sides "original"/"modified"; name the file instead.
            body.replacen("--- original", &format!("--- a/{path}"), 1)
                .replacen("+++ modified", &format!("+++ b/{path}"), 1)
        }
    }
}
