//! Timestamp, error-box, and reference-list formatting.

use chrono::{Local, LocalResult, TimeZone};
use serde_json::Value;

/// Formats a millisecond epoch timestamp as local `YYYY-MM-DD HH:MM:SS`.
///
/// Out-of-range or ambiguous values render as "Unknown time".
pub fn format_timestamp(timestamp_ms: i64) -> String {
    match Local.timestamp_millis_opt(timestamp_ms) {
        LocalResult::Single(dt) => dt.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => "Unknown time".to_string(),
    }
}

/// Wraps an error message in a `>`-quoted box, first line prefixed with 🚫.
///
/// Blank lines inside the message are dropped; an empty message produces
/// nothing.
pub fn format_error_box(message: &str) -> String {
    let mut lines: Vec<String> = Vec::new();
    for line in message.trim().lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if lines.is_empty() {
            lines.push(format!("> 🚫 {line}"));
        } else {
            lines.push(format!("> {line}"));
        }
    }
    lines.join("\n")
}

/// Renders attached variables as a collapsible `Used N references` block.
///
/// Prompt references get a ☰ icon, file references 📄. A `promptFile`
/// variable whose origin label carries a `github.copilot.chat.` settings key
/// contributes an extra ⚙️ entry, counted separately.
pub fn format_references(variables: &[Value]) -> String {
    if variables.is_empty() {
        return String::new();
    }

    let mut entries: Vec<String> = Vec::new();
    for var in variables {
        let name = var.get("name").and_then(Value::as_str).unwrap_or("Unknown");
        let kind = var.get("kind").and_then(Value::as_str).unwrap_or("");
        let origin_label = var
            .get("originLabel")
            .and_then(Value::as_str)
            .unwrap_or("");

        match name.strip_prefix("prompt:") {
            Some(display) => entries.push(format!("☰ {display}")),
            None => entries.push(format!("📄 {name}")),
        }

        if kind == "promptFile" {
            if let Some(idx) = origin_label.rfind("github.copilot.chat.") {
                let tail = &origin_label[idx + "github.copilot.chat.".len()..];
                let key = tail.split(' ').next().unwrap_or("");
                entries.push(format!("⚙️ github.copilot.chat.{key}"));
            }
        }
    }

    let summary = format!("Used {} references", entries.len());
    let content = entries.join("<br>");
    format!("<details>\n  <summary>{summary}</summary>\n  <p>{content}</p>\n</details>\n")
}
