//! Text-edit group rendering.
//!
//! A `textEditGroup` record becomes a collapsible block labeled with the
//! target filename, showing the modified line ranges and their new content.
//! The layout depends on how many non-empty edits survive: one gets a single
//! fenced block, a handful get one sub-block each, and larger batches are
//! merged into a consolidated view so the block stays readable.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use crate::fences::longest_backtick_run;
use crate::lang;

/// Edits starting within this many lines of the previous edit's end merge
/// into one group in the consolidated view.
const MERGE_GAP_LINES: u64 = 2;

/// Above this many edits the per-edit layout gives way to the consolidated one.
const MAX_SEPARATE_EDITS: usize = 5;

/// Runs of blank lines inside merged edit content.
static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n\s*\n+").expect("valid pattern"));

/// Renders one edit-group record, or nothing when the record is malformed
/// or carries no non-empty edits.
pub fn render_edit_group(record: &Value) -> String {
    match build_edit_group(record) {
        Some(block) => block,
        None => {
            debug!("skipping edit group with no renderable edits");
            String::new()
        }
    }
}

fn build_edit_group(record: &Value) -> Option<String> {
    let file_path = record
        .pointer("/uri/fsPath")
        .and_then(Value::as_str)
        .or_else(|| record.pointer("/uri/path").and_then(Value::as_str))
        .unwrap_or("Unknown file");
    let file_name = file_path
        .rsplit(['/', '\\'])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("Unknown file");

    let groups = record.get("edits").and_then(Value::as_array)?;

    // Empty-text edits are discarded before any layout decision.
    let mut edits: Vec<&Map<String, Value>> = Vec::new();
    for group in groups {
        let Some(group) = group.as_array() else {
            continue;
        };
        for edit in group {
            let Some(map) = edit.as_object() else {
                continue;
            };
            match map.get("text") {
                Some(Value::String(text)) => {
                    if !text.trim().is_empty() {
                        edits.push(map);
                    }
                }
                Some(_) => return None,
                None => {}
            }
        }
    }
    if edits.is_empty() {
        return None;
    }

    let language = lang::language_for_path(file_name);

    let mut lines: Vec<String> = Vec::new();
    lines.push("<details>".to_string());
    lines.push(format!("  <summary>🛠️ File Edit: {file_name}</summary>"));

    if edits.len() == 1 {
        render_single_edit(&mut lines, edits[0], language);
    } else if edits.len() <= MAX_SEPARATE_EDITS {
        render_separate_edits(&mut lines, &edits, language);
    } else {
        render_consolidated_edits(&mut lines, &edits, language);
    }

    lines.push(String::new());
    lines.push("</details>".to_string());
    let mut block = lines.join("\n");
    block.push_str("\n\n");
    Some(block)
}

fn edit_text(edit: &Map<String, Value>) -> &str {
    edit.get("text").and_then(Value::as_str).unwrap_or("")
}

fn line_range(edit: &Map<String, Value>) -> Option<(u64, u64)> {
    let range = edit.get("range")?;
    let start = range.get("startLineNumber").and_then(Value::as_u64)?;
    let end = range.get("endLineNumber").and_then(Value::as_u64)?;
    (start != 0 && end != 0).then_some((start, end))
}

fn range_label(start: u64, end: u64, prefix: &str) -> String {
    if start == end {
        format!("  <p><strong>{prefix} line {start}:</strong></p>")
    } else {
        format!("  <p><strong>{prefix} lines {start}-{end}:</strong></p>")
    }
}

/// Fence sized strictly above any backtick run inside the content.
fn fence_for(content: &str, minimum: usize) -> String {
    let run = longest_backtick_run(content);
    let width = if run == 0 { 3 } else { run + 1 };
    "`".repeat(width.max(minimum))
}

fn render_single_edit(lines: &mut Vec<String>, edit: &Map<String, Value>, language: &str) {
    if let Some((start, end)) = line_range(edit) {
        lines.push(range_label(start, end, "Modified"));
        lines.push(String::new());
    }

    let text = edit_text(edit);
    let content = text.strip_suffix('\n').unwrap_or(text);
    let fence = fence_for(content, 3);
    lines.push(format!("{fence}{language}"));
    lines.push(content.to_string());
    lines.push(fence);
}

fn render_separate_edits(lines: &mut Vec<String>, edits: &[&Map<String, Value>], language: &str) {
    for (i, edit) in edits.iter().enumerate() {
        if i > 0 {
            lines.push(String::new());
        }
        if let Some((start, end)) = line_range(edit) {
            if start == end {
                lines.push(format!("  <p><strong>Line {start}:</strong></p>"));
            } else {
                lines.push(format!("  <p><strong>Lines {start}-{end}:</strong></p>"));
            }
            lines.push(String::new());
        }

        let text = edit_text(edit);
        let fence = fence_for(text, 3);
        lines.push(format!("{fence}{language}"));
        lines.push(text.trim_end().to_string());
        lines.push(fence);
    }
}

/// Consolidated view for large batches: edits sorted by start line, nearby
/// edits merged into one labeled group, everything inside a single fence.
fn render_consolidated_edits(
    lines: &mut Vec<String>,
    edits: &[&Map<String, Value>],
    language: &str,
) {
    lines.push(format!(
        "  <p><strong>Multiple file changes ({} edits)</strong></p>",
        edits.len()
    ));
    lines.push(String::new());

    let mut sorted: Vec<(u64, &Map<String, Value>)> = edits
        .iter()
        .map(|edit| (line_range(edit).map_or(0, |(start, _)| start), *edit))
        .collect();
    sorted.sort_by_key(|(start, _)| *start);

    let mut combined: Vec<String> = Vec::new();
    let mut has_fences = false;

    let mut i = 0;
    while i < sorted.len() {
        if edit_text(sorted[i].1).contains("```") {
            has_fences = true;
        }

        // Gather the run of edits close enough to merge.
        let mut group_end = i;
        while group_end + 1 < sorted.len() {
            let (next_start, _) = sorted[group_end + 1];
            let (prev_start, prev_edit) = sorted[group_end];
            let prev_end = line_range(prev_edit).map_or(prev_start, |(_, end)| end);
            if next_start != 0 && prev_end != 0 && next_start <= prev_end + MERGE_GAP_LINES {
                group_end += 1;
            } else {
                break;
            }
        }

        if group_end > i {
            let first_line = sorted[i].0;
            let (last_start, last_edit) = sorted[group_end];
            let last_line = line_range(last_edit).map_or(last_start, |(_, end)| end);
            if first_line != 0 && last_line != 0 {
                combined.push(format!("# Lines {first_line}-{last_line}:"));
            }

            let merged: Vec<&str> = sorted[i..=group_end]
                .iter()
                .map(|(_, edit)| edit_text(edit).trim())
                .collect();
            let merged = merged.join("\n");
            let merged = BLANK_RUN.replace_all(&merged, "\n\n");
            let merged = merged.trim();
            if !merged.is_empty() {
                combined.push(merged.to_string());
            }
        } else {
            let (_, edit) = sorted[i];
            match line_range(edit) {
                Some((start, end)) if start == end => combined.push(format!("# Line {start}:")),
                Some((start, end)) => combined.push(format!("# Lines {start}-{end}:")),
                None => combined.push(format!("# Edit {}:", i + 1)),
            }
            combined.push(edit_text(edit).trim_end().to_string());
        }

        i = group_end + 1;
        if i < sorted.len() {
            combined.push(String::new());
        }
    }

    let content = combined.join("\n");
    if has_fences || content.contains("```") {
        let fence = fence_for(&content, 4);
        lines.push(format!("{fence}{language}"));
        lines.push(content);
        lines.push(fence);
    } else {
        lines.push(format!("```{language}"));
        lines.push(content);
        lines.push("```".to_string());
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn edit(start: u64, end: u64, text: &str) -> Value {
        json!({
            "text": text,
            "range": {"startLineNumber": start, "endLineNumber": end}
        })
    }

    fn group(edits: Vec<Value>) -> Value {
        json!({
            "kind": "textEditGroup",
            "uri": {"fsPath": "/proj/src/main.py"},
            "edits": [edits]
        })
    }

    #[test]
    fn test_no_edits_renders_nothing() {
        let record = group(vec![]);
        assert_eq!(render_edit_group(&record), "");
    }

    #[test]
    fn test_empty_text_edits_discarded() {
        let record = group(vec![edit(1, 1, ""), edit(2, 2, "   \n")]);
        assert_eq!(render_edit_group(&record), "");
    }

    #[test]
    fn test_single_edit_block() {
        let record = group(vec![edit(3, 5, "x = 1\ny = 2\n")]);
        let block = render_edit_group(&record);
        assert!(block.contains("<summary>🛠️ File Edit: main.py</summary>"), "got: {block}");
        assert!(block.contains("<p><strong>Modified lines 3-5:</strong></p>"), "got: {block}");
        assert!(block.contains("```python\nx = 1\ny = 2\n```"), "got: {block}");
    }

    #[test]
    fn test_single_line_label() {
        let record = group(vec![edit(7, 7, "only = True")]);
        let block = render_edit_group(&record);
        assert!(block.contains("<p><strong>Modified line 7:</strong></p>"), "got: {block}");
    }

    #[test]
    fn test_few_edits_get_separate_blocks() {
        let record = group(vec![edit(1, 1, "a"), edit(10, 12, "b"), edit(30, 30, "c")]);
        let block = render_edit_group(&record);
        assert!(block.contains("<p><strong>Line 1:</strong></p>"), "got: {block}");
        assert!(block.contains("<p><strong>Lines 10-12:</strong></p>"), "got: {block}");
        assert!(block.contains("<p><strong>Line 30:</strong></p>"), "got: {block}");
        assert_eq!(block.matches("```python").count(), 3, "got: {block}");
    }

    #[test]
    fn test_many_edits_merge_into_groups() {
        let record = group(vec![
            edit(1, 1, "one"),
            edit(2, 2, "two"),
            edit(10, 10, "ten"),
            edit(11, 11, "eleven"),
            edit(12, 12, "twelve"),
            edit(20, 20, "twenty"),
            edit(21, 21, "twentyone"),
        ]);
        let block = render_edit_group(&record);
        assert!(block.contains("<p><strong>Multiple file changes (7 edits)</strong></p>"));
        assert!(block.contains("# Lines 1-2:"), "got: {block}");
        assert!(block.contains("# Lines 10-12:"), "got: {block}");
        assert!(block.contains("# Lines 20-21:"), "got: {block}");
        // One consolidated fence, not one per edit.
        assert_eq!(block.matches("```python").count(), 1, "got: {block}");
    }

    #[test]
    fn test_fence_exceeds_embedded_runs() {
        let record = group(vec![edit(1, 1, "docs\n````md\ninner\n````")]);
        let block = render_edit_group(&record);
        assert!(block.contains("`````python"), "got: {block}");
    }

    #[test]
    fn test_consolidated_fence_minimum_four() {
        let record = group(vec![
            edit(1, 1, "has ``` fence"),
            edit(10, 10, "b"),
            edit(20, 20, "c"),
            edit(30, 30, "d"),
            edit(40, 40, "e"),
            edit(50, 50, "f"),
        ]);
        let block = render_edit_group(&record);
        assert!(block.contains("````python"), "got: {block}");
        assert!(!block.contains("`````python"), "got: {block}");
    }

    #[test]
    fn test_merged_blank_runs_collapse() {
        let record = group(vec![
            edit(1, 1, "a\n\n\n\nb"),
            edit(2, 2, "c"),
            edit(10, 10, "d"),
            edit(20, 20, "e"),
            edit(30, 30, "f"),
            edit(40, 40, "g"),
        ]);
        let block = render_edit_group(&record);
        assert!(!block.contains("\n\n\n"), "got: {block}");
    }

    #[test]
    fn test_malformed_record_renders_nothing() {
        assert_eq!(render_edit_group(&json!({"kind": "textEditGroup"})), "");
        let bad_text = json!({
            "uri": {"path": "/x.py"},
            "edits": [[{"text": 42}]]
        });
        assert_eq!(render_edit_group(&bad_text), "");
    }

    #[test]
    fn test_uri_path_fallback() {
        let record = json!({
            "uri": {"path": "/repo/notes.md"},
            "edits": [[{"text": "hello", "range": {"startLineNumber": 1, "endLineNumber": 1}}]]
        });
        let block = render_edit_group(&record);
        assert!(block.contains("File Edit: notes.md"), "got: {block}");
        assert!(block.contains("```markdown"), "got: {block}");
    }
}
