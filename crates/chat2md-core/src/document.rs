//! Single-log document assembly.
//!
//! Builds the full markdown document for one chat log: title, participant
//! line, optional table of contents, then per-request sections with anchor
//! tags and up/prev/next navigation. The per-request section renderer is
//! shared with the combined-document path, which only swaps the anchor and
//! heading scheme.

use crate::config::Config;
use crate::format;
use crate::pipeline::{self, RenderContext};
use crate::transcript::{ChatLog, Request};

/// Renders one chat log as a complete markdown document.
pub fn render_chat_log(log: &ChatLog, config: &Config) -> String {
    let mut md: Vec<String> = Vec::new();

    md.push("# GitHub Copilot Chat Log".to_string());
    md.push(String::new());
    md.push(format!("**Participant:** {}", log.requester()));
    md.push(format!("<br>**Assistant:** {}", log.responder()));
    md.push(String::new());

    let total = log.requests.len();
    if total > 1 {
        md.push("<a name=\"table-of-contents\"></a>".to_string());
        md.push("## Table of Contents".to_string());
        md.push(String::new());
        for (i, request) in log.requests.iter().enumerate() {
            let n = i + 1;
            let preview = toc_preview(request, config);
            md.push(format!("- [Request {n}](#request-{n}): {preview}"));
        }
        md.push(String::new());
    }

    md.push("---".to_string());
    md.push(String::new());

    for (i, request) in log.requests.iter().enumerate() {
        let n = i + 1;
        let up = "[^^^](#table-of-contents)".to_string();
        let prev = if n > 1 {
            format!("[<<<](#request-{})", n - 1)
        } else {
            "<<<".to_string()
        };
        let next = if n < total {
            format!("[>>>](#request-{})", n + 1)
        } else {
            ">>>".to_string()
        };
        let heading = format!("## Request {n} {up} {prev} {next}");
        push_request_section(&mut md, request, &format!("request-{n}"), &heading, config);

        if n < total {
            md.push("---".to_string());
            md.push(String::new());
        }
    }

    spacing_after_details(&md.join("\n"))
}

/// Appends one request section: anchor, heading, status, timestamp, quoted
/// user message, assistant response, and metadata lines.
pub(crate) fn push_request_section(
    md: &mut Vec<String>,
    request: &Request,
    anchor: &str,
    heading: &str,
    config: &Config,
) {
    md.push(format!("<a name=\"{anchor}\"></a>"));
    md.push(heading.to_string());
    if let Some(status) = status_marker(request) {
        md.push(status.to_string());
    }
    md.push(String::new());

    if let Some(ts) = request.timestamp {
        md.push(format!("**Timestamp:** {}", format::format_timestamp(ts)));
        md.push(String::new());
    }

    let message_text = request.message_text();
    if !message_text.is_empty() {
        let cleaned = pipeline::clean_text(&message_text, config);
        md.push("**USER MESSAGE:**".to_string());
        md.push(format!("> {}", cleaned.replace('\n', "\n> ")));
        md.push(String::new());
    }

    let has_error = request.error_message().is_some();
    if !request.response.is_empty() || has_error {
        md.push("**ASSISTANT RESPONSE:**".to_string());

        let variables = request.variables();
        if !variables.is_empty() {
            let references = format::format_references(variables);
            if !references.trim().is_empty() {
                md.push(references);
            }
        }

        if !request.response.is_empty() {
            let body = response_body(request, config);
            if !body.trim().is_empty() {
                md.push(body);
                md.push(String::new());
            }
        }

        if let Some(message) = request.error_message() {
            md.push(format::format_error_box(message));
            md.push(String::new());
        }
    }

    let mut metadata: Vec<String> = Vec::new();
    if let Some(elapsed_ms) = request.total_elapsed_ms() {
        metadata.push(format!(
            "> *Response time: {:.2} seconds*",
            elapsed_ms / 1000.0
        ));
    }
    if let Some(model) = model_info(request) {
        metadata.push(format!("> <br>*Model: {model}*"));
    }
    if !metadata.is_empty() {
        md.append(&mut metadata);
        md.push(String::new());
    }
}

/// Renders the assistant response body for one request.
///
/// The consolidated per-round responses are preferred when present, unless
/// the incremental parts carry structured nodes (tool invocations or edit
/// groups) that only the incremental path can render.
fn response_body(request: &Request, config: &Config) -> String {
    let nodes = pipeline::response_nodes(&request.response);
    let consolidated = request.round_responses().join("\n");

    let body = if pipeline::has_structured_nodes(&nodes) || consolidated.trim().is_empty() {
        let ctx = RenderContext::new(request.tool_call_results(), request.tool_call_rounds());
        pipeline::render_nodes_to_text(&nodes, &ctx, config)
    } else {
        consolidated
    };
    pipeline::clean_text(&body, config)
}

fn status_marker(request: &Request) -> Option<&'static str> {
    let message = request.error_message()?;
    if message.to_lowercase().contains("canceled") {
        Some("*(CANCELED)*")
    } else {
        Some("*(ERROR)*")
    }
}

fn model_info(request: &Request) -> Option<String> {
    let model_id = request.model_id.as_deref().unwrap_or("");
    let details = request.details.as_deref().unwrap_or("");
    let display = model_id.strip_prefix("copilot/").unwrap_or(model_id);

    let mut parts: Vec<&str> = Vec::new();
    if !display.is_empty() {
        parts.push(display);
    }
    if !details.is_empty() && details != display {
        parts.push(details);
    }
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" • "))
    }
}

/// First line of the user message, truncated for the table of contents.
pub(crate) fn toc_preview(request: &Request, config: &Config) -> String {
    let preview = request.message_preview().filter(|p| !p.is_empty());
    let Some(preview) = preview else {
        return "[No message content]".to_string();
    };
    let first_line = preview.lines().next().unwrap_or("");
    if first_line.chars().count() > config.toc_preview_chars {
        let cut: String = first_line
            .chars()
            .take(config.toc_preview_chars.saturating_sub(3))
            .collect();
        format!("{cut}...")
    } else {
        first_line.to_string()
    }
}

/// Inserts `<br />` after a `</details>` block that is followed by regular
/// content, so collapsed blocks do not visually glue to the next paragraph.
/// Back-to-back `<details>` blocks are left alone.
pub(crate) fn spacing_after_details(text: &str) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut result: Vec<String> = Vec::with_capacity(lines.len());

    for (i, line) in lines.iter().enumerate() {
        result.push((*line).to_string());
        if line.trim() != "</details>" {
            continue;
        }
        let next = lines[i + 1..]
            .iter()
            .map(|l| l.trim())
            .find(|l| !l.is_empty());
        if let Some(next) = next {
            if !next.starts_with("<details") {
                result.push("<br />".to_string());
            }
        }
    }
    result.join("\n")
}

#[cfg(test)]
mod tests {
    use std::sync::LazyLock;

    use regex::Regex;
    use serde_json::json;

    use super::*;

    fn config() -> Config {
        Config::default()
    }

    fn log_from(value: serde_json::Value) -> ChatLog {
        serde_json::from_value(value).unwrap()
    }

    fn simple_log(messages: &[&str]) -> ChatLog {
        let requests: Vec<serde_json::Value> = messages
            .iter()
            .map(|m| {
                json!({
                    "message": {"text": m},
                    "response": [{"value": format!("reply to {m}")}]
                })
            })
            .collect();
        log_from(json!({
            "requesterUsername": "alice",
            "requests": requests
        }))
    }

    #[test]
    fn test_header_and_participants() {
        let doc = render_chat_log(&simple_log(&["hi"]), &config());
        assert!(doc.starts_with("# GitHub Copilot Chat Log\n"), "got: {doc}");
        assert!(doc.contains("**Participant:** alice"), "got: {doc}");
        assert!(doc.contains("<br>**Assistant:** GitHub Copilot"), "got: {doc}");
    }

    #[test]
    fn test_single_request_has_no_toc() {
        let doc = render_chat_log(&simple_log(&["only one"]), &config());
        assert!(!doc.contains("## Table of Contents"), "got: {doc}");
        assert!(doc.contains("<a name=\"request-1\"></a>"), "got: {doc}");
    }

    #[test]
    fn test_toc_lists_every_request() {
        let doc = render_chat_log(&simple_log(&["first", "second"]), &config());
        assert!(doc.contains("<a name=\"table-of-contents\"></a>"), "got: {doc}");
        assert!(doc.contains("- [Request 1](#request-1): first"), "got: {doc}");
        assert!(doc.contains("- [Request 2](#request-2): second"), "got: {doc}");
    }

    #[test]
    fn test_toc_preview_truncated() {
        let mut config = config();
        config.toc_preview_chars = 10;
        let doc = render_chat_log(&simple_log(&["a very long first message", "x"]), &config);
        assert!(doc.contains("- [Request 1](#request-1): a very ..."), "got: {doc}");
    }

    #[test]
    fn test_navigation_endpoints_are_placeholders() {
        let doc = render_chat_log(&simple_log(&["a", "b", "c"]), &config());
        assert!(
            doc.contains("## Request 1 [^^^](#table-of-contents) <<< [>>>](#request-2)"),
            "got: {doc}"
        );
        assert!(
            doc.contains("## Request 2 [^^^](#table-of-contents) [<<<](#request-1) [>>>](#request-3)"),
            "got: {doc}"
        );
        assert!(
            doc.contains("## Request 3 [^^^](#table-of-contents) [<<<](#request-2) >>>"),
            "got: {doc}"
        );
    }

    static REQUEST_LINK: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"\(#(request-\d+)\)").unwrap());

    #[test]
    fn test_every_request_link_resolves() {
        let doc = render_chat_log(&simple_log(&["a", "b", "c", "d"]), &config());
        for caps in REQUEST_LINK.captures_iter(&doc) {
            let anchor = format!("<a name=\"{}\"></a>", &caps[1]);
            assert!(doc.contains(&anchor), "dangling link to #{}", &caps[1]);
        }
    }

    #[test]
    fn test_user_message_blockquoted() {
        let doc = render_chat_log(&simple_log(&["line one\nline two"]), &config());
        assert!(doc.contains("**USER MESSAGE:**\n> line one\n> line two"), "got: {doc}");
    }

    #[test]
    fn test_error_status_and_box() {
        let log = log_from(json!({
            "requests": [{
                "message": {"text": "do it"},
                "response": [],
                "result": {"errorDetails": {"message": "Something broke"}}
            }]
        }));
        let doc = render_chat_log(&log, &config());
        assert!(doc.contains("*(ERROR)*"), "got: {doc}");
        assert!(doc.contains("> 🚫 Something broke"), "got: {doc}");
    }

    #[test]
    fn test_canceled_status() {
        let log = log_from(json!({
            "requests": [{
                "message": {"text": "stop"},
                "response": [],
                "result": {"errorDetails": {"message": "Request was Canceled by user"}}
            }]
        }));
        let doc = render_chat_log(&log, &config());
        assert!(doc.contains("*(CANCELED)*"), "got: {doc}");
        assert!(!doc.contains("*(ERROR)*"), "got: {doc}");
    }

    #[test]
    fn test_consolidated_response_preferred() {
        let log = log_from(json!({
            "requests": [{
                "message": {"text": "q"},
                "response": [{"value": "partial"}, {"value": " stream"}],
                "result": {"metadata": {"toolCallRounds": [
                    {"response": "The full consolidated answer."}
                ]}}
            }]
        }));
        let doc = render_chat_log(&log, &config());
        assert!(doc.contains("The full consolidated answer."), "got: {doc}");
        assert!(!doc.contains("partial stream"), "got: {doc}");
    }

    #[test]
    fn test_structured_nodes_beat_consolidated() {
        let log = log_from(json!({
            "requests": [{
                "message": {"text": "q"},
                "response": [
                    {"value": "intro "},
                    {
                        "kind": "textEditGroup",
                        "uri": {"path": "/x/notes.md"},
                        "edits": [[{
                            "text": "new text",
                            "range": {"startLineNumber": 1, "endLineNumber": 1}
                        }]]
                    }
                ],
                "result": {"metadata": {"toolCallRounds": [{"response": "flat summary"}]}}
            }]
        }));
        let doc = render_chat_log(&log, &config());
        assert!(doc.contains("File Edit: notes.md"), "got: {doc}");
        assert!(!doc.contains("flat summary"), "got: {doc}");
    }

    #[test]
    fn test_metadata_lines() {
        let log = log_from(json!({
            "requests": [{
                "message": {"text": "q"},
                "response": [{"value": "a"}],
                "result": {"timings": {"totalElapsed": 2500}},
                "modelId": "copilot/gpt-4.1",
                "details": "GPT 4.1"
            }]
        }));
        let doc = render_chat_log(&log, &config());
        assert!(doc.contains("> *Response time: 2.50 seconds*"), "got: {doc}");
        assert!(doc.contains("> <br>*Model: gpt-4.1 • GPT 4.1*"), "got: {doc}");
    }

    #[test]
    fn test_model_details_equal_to_id_not_repeated() {
        let log = log_from(json!({
            "requests": [{
                "message": {"text": "q"},
                "response": [{"value": "a"}],
                "modelId": "copilot/gpt-4.1",
                "details": "gpt-4.1"
            }]
        }));
        let doc = render_chat_log(&log, &config());
        assert!(doc.contains("*Model: gpt-4.1*"), "got: {doc}");
        assert!(!doc.contains("•"), "got: {doc}");
    }

    #[test]
    fn test_separator_between_requests_only() {
        let doc = render_chat_log(&simple_log(&["a", "b"]), &config());
        let after_header = doc.split("<a name=\"request-1\"></a>").nth(1).unwrap();
        assert!(after_header.contains("\n---\n"), "got: {doc}");
        let after_last = doc.split("<a name=\"request-2\"></a>").nth(1).unwrap();
        assert!(!after_last.contains("\n---\n"), "got: {doc}");
    }

    #[test]
    fn test_spacing_after_details_before_content() {
        let text = "<details>\n  <summary>s</summary>\n</details>\n\nnext paragraph";
        let spaced = spacing_after_details(text);
        assert!(spaced.contains("</details>\n<br />\n\nnext paragraph"), "got: {spaced}");
    }

    #[test]
    fn test_no_spacing_between_adjacent_details() {
        let text = "</details>\n\n<details>";
        assert_eq!(spacing_after_details(text), text);
    }

    #[test]
    fn test_no_spacing_at_document_end() {
        let text = "body\n</details>";
        assert_eq!(spacing_after_details(text), text);
    }
}
