//! Tool-invocation rendering.
//!
//! A serialized tool invocation becomes a collapsible block: a readable
//! summary line plus the tool's effective output. The best body comes from
//! correlating the invocation with its recorded tool-call result; failing
//! that, the invocation's declared input/output is shown; failing that,
//! nothing. Nothing in here propagates an error — a malformed record
//! renders as little as possible.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::config::Config;
use crate::extract;
use crate::fences::longest_backtick_run;
use crate::lang;
use crate::pipeline::{self, RenderContext};

/// `[](file://<path>[#fragment])` link embedded in an invocation message.
static FILE_LINK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\]\(file://([^)#]+)(#[^)]+)?\)").expect("valid pattern"));

/// `File: <path>. Lines X to Y (...): ```lang` header some read results carry.
static FILE_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^File:.*?Lines \d+ to \d+.*?:\s*(`+)(\w+)\s*\n").expect("valid pattern")
});

/// First file extension mentioned in an invocation message.
static FILE_EXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\.\w+").expect("valid pattern"));

/// Renders one serialized tool invocation as a collapsible markdown block.
pub fn render_tool_invocation(
    record: &Value,
    ctx: &RenderContext,
    config: &Config,
    depth: usize,
) -> String {
    let (summary, original_message) = summary_line(record);

    let correlated = correlate_result(ctx, &original_message);
    if let Some(body) = correlated {
        if !body.trim().is_empty() {
            return render_result_body(&summary, &original_message, &body, ctx, config, depth);
        }
    }

    render_declared_io(&summary, record)
}

/// Derives the display summary and keeps the original message for
/// correlation (the file path is only present in the original).
fn summary_line(record: &Value) -> (String, String) {
    let past_tense = record
        .pointer("/pastTenseMessage/value")
        .and_then(Value::as_str)
        .unwrap_or("Ran tool");

    let invocation = match record.get("invocationMessage") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Object(map)) => map
            .get("value")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        _ => String::new(),
    };
    let invocation = if invocation.is_empty() {
        past_tense.to_string()
    } else {
        invocation
    };
    let original = invocation.clone();

    let mut summary = invocation;
    if summary.contains("[](file://") {
        if let Some(caps) = FILE_LINK.captures(&summary) {
            let whole = caps.get(0).expect("whole match");
            let path = caps.get(1).map_or("", |m| m.as_str());
            let fragment = caps.get(2).map_or("", |m| m.as_str());
            let file_name = path.rsplit('/').next().unwrap_or(path);
            let remaining = summary[whole.end()..].to_string();
            let display = format!("{file_name}{fragment}");
            summary = if remaining.trim().is_empty() {
                format!("Read **{display}**")
            } else {
                format!("Read **{display}**{remaining}")
            };
        }
    }
    let summary = summary.replace("Reading ", "Read ");

    (summary, original)
}

/// Finds the recorded result of the tool call behind this invocation.
///
/// Matches `read_file` calls whose file-path argument appears inside the
/// original invocation message, then flattens the keyed result content.
fn correlate_result(ctx: &RenderContext, original_message: &str) -> Option<String> {
    let results = ctx.results?;

    for round in ctx.rounds {
        let Some(calls) = round.get("toolCalls").and_then(Value::as_array) else {
            continue;
        };
        for call in calls {
            let name = call.get("name").and_then(Value::as_str).unwrap_or("");
            if name != "read_file" || !original_message.contains("Read") {
                continue;
            }
            let Some(arguments) = call.get("arguments").and_then(Value::as_str) else {
                continue;
            };
            let Ok(parsed) = serde_json::from_str::<Value>(arguments) else {
                continue;
            };
            let file_path = parsed.get("filePath").and_then(Value::as_str).unwrap_or("");
            if file_path.is_empty() || !original_message.contains(file_path) {
                continue;
            }
            let id = call.get("id").and_then(Value::as_str).unwrap_or("");
            if let Some(result) = results.get(id) {
                let flattened = flatten_tool_result(result);
                if !flattened.is_empty() {
                    return Some(flattened);
                }
            }
        }
    }
    None
}

/// Flattens a tool-call result content tree into plain text.
///
/// Content nodes nest arbitrarily as `{text, children, value, node}` shapes;
/// a depth-first walk collects the text in encounter order. A fence wrapping
/// the entire content is stripped.
pub fn flatten_tool_result(result: &Value) -> String {
    let Some(content) = result.get("content").and_then(Value::as_array) else {
        return String::new();
    };
    if content.is_empty() {
        return String::new();
    }

    let mut parts: Vec<String> = Vec::new();
    for item in content {
        collect_text(item, &mut parts);
    }
    if parts.is_empty() {
        return String::new();
    }

    let full = parts.concat();
    let full = full.trim();

    if full.starts_with("```") && full.ends_with("```") {
        let lines: Vec<&str> = full.split('\n').collect();
        if lines.len() >= 2
            && lines[0].trim().starts_with("```")
            && lines[lines.len() - 1].trim() == "```"
        {
            return lines[1..lines.len() - 1].join("\n");
        }
    }
    full.to_string()
}

fn collect_text(node: &Value, out: &mut Vec<String>) {
    match node {
        Value::Object(map) => {
            if let Some(text) = map.get("text").and_then(Value::as_str) {
                if !text.trim().is_empty() {
                    out.push(text.to_string());
                }
            }
            if let Some(children) = map.get("children").and_then(Value::as_array) {
                for child in children {
                    collect_text(child, out);
                }
            }
            if let Some(value) = map.get("value") {
                if value.is_object() {
                    collect_text(value, out);
                }
            }
            if let Some(inner) = map.get("node") {
                collect_text(inner, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_text(item, out);
            }
        }
        _ => {}
    }
}

/// Builds the block body from correlated result content.
fn render_result_body(
    summary: &str,
    original_message: &str,
    body: &str,
    ctx: &RenderContext,
    config: &Config,
    depth: usize,
) -> String {
    // Nested invocations must expand before any backtick counting, so fences
    // are sized against the final content.
    let body = if extract::contains_markers(body) {
        pipeline::render_embedded(body, ctx, config, depth + 1)
    } else {
        body.to_string()
    };

    let mut lines: Vec<String> = Vec::new();
    lines.push("<details>".to_string());
    lines.push(format!("  <summary>{summary}</summary>"));
    lines.push(String::new());

    if let Some(caps) = FILE_HEADER.captures(&body) {
        // Strip the `File: ... Lines X to Y ...:` header and its fencing,
        // then re-wrap the inner content with a safely sized fence.
        let header_end = caps.get(0).expect("header match").end();
        let original_backticks = caps.get(1).map_or("", |m| m.as_str()).to_string();
        let language = caps.get(2).map_or("", |m| m.as_str()).to_string();

        let mut inner = body[header_end..].to_string();
        let trimmed = inner.trim_end();
        if trimmed.ends_with(&original_backticks) {
            inner = trimmed[..trimmed.len() - original_backticks.len()]
                .trim_end()
                .to_string();
        }

        let fence = "`".repeat((longest_backtick_run(&inner) + 1).max(3));
        lines.push(format!("{fence}{language}"));
        lines.push(inner.trim_end().to_string());
        lines.push(fence);
    } else if body.contains("```") {
        // Content already carries fences: wrap the whole body one level up.
        let fence = "`".repeat(longest_backtick_run(&body).max(3) + 1);
        lines.push(format!("{fence}markdown"));
        lines.push(body.trim_end().to_string());
        lines.push(fence);
    } else {
        let language = if original_message.contains("file://") {
            FILE_EXT
                .find(original_message)
                .map_or("", |m| lang::language_for_extension(m.as_str()))
        } else {
            ""
        };
        lines.push(format!("```{language}"));
        lines.push(body.trim_end().to_string());
        lines.push("```".to_string());
    }

    lines.push(String::new());
    lines.push("</details>".to_string());
    let mut block = lines.join("\n");
    block.push_str("\n\n");
    block
}

/// Fallback body from the invocation's declared input/output.
fn render_declared_io(summary: &str, record: &Value) -> String {
    let empty = Map::new();
    let details = record
        .get("resultDetails")
        .and_then(Value::as_object)
        .unwrap_or(&empty);

    let Some(input) = details.get("input") else {
        return String::new();
    };
    if is_blank(input) {
        return String::new();
    }

    let input_value: Value = match input {
        Value::String(raw) => match serde_json::from_str(raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                debug!("unparsable tool input, using fallback line: {e}");
                return completed_fallback(summary, raw);
            }
        },
        other => other.clone(),
    };
    let input_json = serde_json::to_string_pretty(&input_value).unwrap_or_default();

    let mut lines: Vec<String> = Vec::new();
    lines.push("<details>".to_string());
    lines.push(format!("  <summary>{summary}</summary>"));
    lines.push("  <p>Input</p>".to_string());
    lines.push(String::new());
    lines.push("```json".to_string());
    lines.push(input_json);
    lines.push("```".to_string());
    lines.push(String::new());

    if let Some(first) = details
        .get("output")
        .and_then(Value::as_array)
        .and_then(|output| output.first())
    {
        let value = match first {
            Value::Object(map) => map.get("value").map(display_value).unwrap_or_default(),
            other => display_value(other),
        };
        lines.push("  <p>Output</p>".to_string());
        lines.push(String::new());
        lines.push("```json".to_string());
        lines.push(value);
        lines.push("```".to_string());
        lines.push(String::new());
    }

    lines.push("</details>".to_string());
    let mut block = lines.join("\n");
    block.push_str("\n\n");
    block
}

fn completed_fallback(summary: &str, raw: &str) -> String {
    format!(
        "<details>\n  <summary>{summary}</summary>\n  <p>Completed with input: {raw}</p>\n</details>\n\n"
    )
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(m) => m.is_empty(),
        _ => false,
    }
}
