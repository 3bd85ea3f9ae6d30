//! Part extraction.
//!
//! Normalizes one raw response-part record into either display text or a
//! typed node carrying the record snapshot for later rendering. Copilot logs
//! mix several record shapes in the `response` array; anything unrecognized
//! or internal degrades to nothing rather than erroring.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;
use tracing::debug;

/// Field name some exporters attach to internal engine objects.
const INTERNAL_ID_MARKER: &str = "$mid";

/// One typed unit of an assistant response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseNode {
    /// Plain display text, emitted verbatim.
    Text(String),
    /// A serialized tool invocation, rendered as a collapsible block.
    ToolInvocation(Value),
    /// A group of file edits, rendered as a collapsible diff-like block.
    EditGroup(Value),
    /// A completed progress task, rendered as a checkmark line.
    Progress(Value),
}

impl ResponseNode {
    /// True for nodes that render as structured blocks rather than prose.
    pub fn is_structured(&self) -> bool {
        !matches!(self, ResponseNode::Text(_))
    }
}

/// Extracts the displayable content of one response part.
///
/// Returns `None` when the part carries nothing worth rendering (internal
/// engine objects, empty artifacts, placeholder stops). Never fails on
/// malformed input.
pub fn extract_part(part: &Value) -> Option<ResponseNode> {
    if let Value::Object(map) = part {
        if let Some(kind) = map.get("kind").and_then(Value::as_str) {
            match kind {
                "textEditGroup" => return Some(ResponseNode::EditGroup(part.clone())),
                "toolInvocationSerialized" => {
                    return Some(ResponseNode::ToolInvocation(part.clone()));
                }
                "progressTaskSerialized" => return Some(ResponseNode::Progress(part.clone())),
                "inlineReference" => {
                    return inline_reference_text(part).map(ResponseNode::Text);
                }
                // Handled elsewhere or purely internal.
                "undoStop" | "codeblockUri" | "prepareToolInvocation" => return None,
                _ => {}
            }
            // Progress-style records without a dedicated kind carry their
            // display string in one of these wrappers.
            for field in ["content", "invocationMessage", "pastTenseMessage"] {
                if let Some(value) = map
                    .get(field)
                    .and_then(|v| v.get("value"))
                    .and_then(Value::as_str)
                {
                    return Some(ResponseNode::Text(format!("*{value}*")));
                }
            }
        }

        // Internal engine objects must not leak into the document.
        let has_kind = map.contains_key("kind");
        if (map.contains_key("id") && (has_kind || map.contains_key(INTERNAL_ID_MARKER)))
            || map.contains_key(INTERNAL_ID_MARKER)
        {
            debug!("dropping internal metadata part");
            return None;
        }

        if let Some(value) = map.get("value") {
            return value_text(value).map(ResponseNode::Text);
        }
        if let Some(content) = map.get("content") {
            if let Value::String(s) = content {
                return Some(ResponseNode::Text(s.clone()));
            }
            if let Some(value) = content.get("value").and_then(Value::as_str) {
                return Some(ResponseNode::Text(value.to_string()));
            }
        }
    }

    if let Value::String(s) = part {
        if s.is_empty() || looks_like_raw_metadata(s) {
            return None;
        }
        return Some(ResponseNode::Text(s.clone()));
    }

    if is_empty_value(part) {
        return None;
    }
    Some(ResponseNode::Text(part.to_string()))
}

/// Resolves an `inlineReference` part to the referenced symbol name, or the
/// base filename of its path.
fn inline_reference_text(part: &Value) -> Option<String> {
    let reference = part.get("inlineReference")?.as_object()?;
    if let Some(name) = reference.get("name").and_then(Value::as_str) {
        return Some(format!("`{name}`"));
    }
    if let Some(path) = reference.get("path").and_then(Value::as_str) {
        let filename = path.rsplit(['/', '\\']).next().unwrap_or(path);
        return Some(format!("`{filename}`"));
    }
    None
}

fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            // A raw object representation or a stray fence artifact from a
            // tool invocation carries no displayable content.
            if s.contains('{') && s.contains(INTERNAL_ID_MARKER) {
                return None;
            }
            if s.trim() == "```" {
                return None;
            }
            Some(s.clone())
        }
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn looks_like_raw_metadata(text: &str) -> bool {
    text.contains('{') && (text.contains(INTERNAL_ID_MARKER) || text.contains("kind"))
}

fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Object(m) => m.is_empty(),
        Value::Number(n) => n.as_f64() == Some(0.0),
    }
}

/// Marker kinds that can occur inside recorded tool-result text.
///
/// The converter itself never fabricates these tokens, but a transcript can
/// embed them (for example when a session read another transcript), so they
/// are parsed back into typed nodes before rendering.
const MARKER_KINDS: &[(&str, fn(Value) -> ResponseNode)] = &[
    ("__TEXT_EDIT_GROUP__", ResponseNode::EditGroup),
    ("__TOOL_INVOCATION__", ResponseNode::ToolInvocation),
    ("__PROGRESS_TASK__", ResponseNode::Progress),
];

static MARKER_SPANS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    MARKER_KINDS
        .iter()
        .map(|(delim, _)| {
            let escaped = regex::escape(delim);
            Regex::new(&format!("(?s){escaped}(.*?){escaped}")).expect("valid marker pattern")
        })
        .collect()
});

/// True when the text contains at least one marker-delimited span.
pub fn contains_markers(text: &str) -> bool {
    MARKER_KINDS.iter().any(|(delim, _)| text.contains(delim))
}

/// Splits text containing `__KIND__<json>__KIND__` spans into typed nodes.
///
/// Text between spans is preserved verbatim. A span whose payload fails to
/// parse contributes nothing.
pub fn parse_markers(text: &str) -> Vec<ResponseNode> {
    let mut nodes = Vec::new();
    let mut rest = text;

    loop {
        // Earliest span of any kind wins, so interleaved kinds keep order.
        let mut earliest: Option<(usize, usize, usize, &str)> = None;
        for (idx, pattern) in MARKER_SPANS.iter().enumerate() {
            if let Some(caps) = pattern.captures(rest) {
                let whole = caps.get(0).expect("span match");
                let payload = caps.get(1).expect("payload group");
                let replace = match earliest {
                    Some((start, _, _, _)) => whole.start() < start,
                    None => true,
                };
                if replace {
                    earliest = Some((whole.start(), whole.end(), idx, payload.as_str()));
                }
            }
        }

        let Some((start, end, kind_idx, payload)) = earliest else {
            if !rest.is_empty() {
                nodes.push(ResponseNode::Text(rest.to_string()));
            }
            return nodes;
        };

        if start > 0 {
            nodes.push(ResponseNode::Text(rest[..start].to_string()));
        }
        match serde_json::from_str::<Value>(payload) {
            Ok(record) => nodes.push((MARKER_KINDS[kind_idx].1)(record)),
            Err(e) => debug!("dropping unparsable marker payload: {e}"),
        }
        rest = &rest[end..];
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn text_of(node: Option<ResponseNode>) -> String {
        match node {
            Some(ResponseNode::Text(t)) => t,
            other => panic!("expected text node, got {other:?}"),
        }
    }

    #[test]
    fn test_inline_reference_by_name() {
        let part = json!({"kind": "inlineReference", "inlineReference": {"name": "foo"}});
        assert_eq!(text_of(extract_part(&part)), "`foo`");
    }

    #[test]
    fn test_inline_reference_by_path() {
        let part = json!({"kind": "inlineReference", "inlineReference": {"path": "/a/b/c.py"}});
        assert_eq!(text_of(extract_part(&part)), "`c.py`");
    }

    #[test]
    fn test_undo_stop_is_nothing() {
        assert_eq!(extract_part(&json!({"kind": "undoStop"})), None);
        assert_eq!(extract_part(&json!({"kind": "codeblockUri"})), None);
        assert_eq!(extract_part(&json!({"kind": "prepareToolInvocation"})), None);
    }

    #[test]
    fn test_tool_invocation_becomes_node() {
        let part = json!({"kind": "toolInvocationSerialized", "invocationMessage": "Running"});
        assert_eq!(
            extract_part(&part),
            Some(ResponseNode::ToolInvocation(part.clone()))
        );
    }

    #[test]
    fn test_edit_group_becomes_node() {
        let part = json!({"kind": "textEditGroup", "uri": {"path": "/x.md"}, "edits": []});
        assert_eq!(extract_part(&part), Some(ResponseNode::EditGroup(part.clone())));
    }

    #[test]
    fn test_unknown_kind_with_message_wrapper() {
        let part = json!({"kind": "progressTask", "content": {"value": "Searching files"}});
        assert_eq!(text_of(extract_part(&part)), "*Searching files*");
    }

    #[test]
    fn test_wrapper_priority_order() {
        let part = json!({
            "kind": "other",
            "invocationMessage": {"value": "second"},
            "content": {"value": "first"}
        });
        assert_eq!(text_of(extract_part(&part)), "*first*");
    }

    #[test]
    fn test_internal_metadata_dropped() {
        assert_eq!(extract_part(&json!({"$mid": 1, "value": "x"})), None);
        assert_eq!(extract_part(&json!({"id": "abc", "kind": "mystery"})), None);
    }

    #[test]
    fn test_plain_value() {
        assert_eq!(text_of(extract_part(&json!({"value": "hello"}))), "hello");
    }

    #[test]
    fn test_value_raw_object_repr_dropped() {
        let part = json!({"value": "{\"$mid\": 1}"});
        assert_eq!(extract_part(&part), None);
    }

    #[test]
    fn test_bare_fence_artifact_dropped() {
        assert_eq!(extract_part(&json!({"value": "```"})), None);
        assert_eq!(extract_part(&json!({"value": " ``` "})), None);
    }

    #[test]
    fn test_content_string_and_wrapper() {
        assert_eq!(text_of(extract_part(&json!({"content": "plain"}))), "plain");
        assert_eq!(
            text_of(extract_part(&json!({"content": {"value": "wrapped"}}))),
            "wrapped"
        );
    }

    #[test]
    fn test_bare_string_metadata_dropped() {
        let part = Value::String("{\"kind\": 1}".to_string());
        assert_eq!(extract_part(&part), None);
        let part = Value::String("just text".to_string());
        assert_eq!(text_of(extract_part(&part)), "just text");
    }

    #[test]
    fn test_empty_values_are_nothing() {
        assert_eq!(extract_part(&json!(null)), None);
        assert_eq!(extract_part(&json!({})), None);
        assert_eq!(extract_part(&json!("")), None);
    }

    #[test]
    fn test_parse_markers_mixed() {
        let record = json!({"kind": "toolInvocationSerialized"});
        let payload = serde_json::to_string(&record).unwrap();
        let text = format!("before __TOOL_INVOCATION__{payload}__TOOL_INVOCATION__ after");
        let nodes = parse_markers(&text);
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], ResponseNode::Text("before ".to_string()));
        assert_eq!(nodes[1], ResponseNode::ToolInvocation(record));
        assert_eq!(nodes[2], ResponseNode::Text(" after".to_string()));
    }

    #[test]
    fn test_parse_markers_bad_payload_dropped() {
        let text = "x __PROGRESS_TASK__not json__PROGRESS_TASK__ y";
        let nodes = parse_markers(text);
        assert_eq!(
            nodes,
            vec![
                ResponseNode::Text("x ".to_string()),
                ResponseNode::Text(" y".to_string()),
            ]
        );
    }

    #[test]
    fn test_parse_markers_no_markers() {
        assert_eq!(
            parse_markers("plain"),
            vec![ResponseNode::Text("plain".to_string())]
        );
        assert!(parse_markers("").is_empty());
    }
}
