//! Combined multi-log document assembly.
//!
//! Merges several chat logs into one document: chronological ordering by
//! each log's first request timestamp, a unified table of contents grouped
//! by chat, per-chat section headers, and `chat-C-request-N` anchors with
//! prev/next navigation that crosses chat boundaries.

use crate::config::Config;
use crate::document;
use crate::transcript::ChatLog;

/// One input log together with the display name of its source file.
#[derive(Debug, Clone)]
pub struct NamedLog {
    /// File stem of the source file, used for chat headings.
    pub name: String,
    pub log: ChatLog,
}

/// Renders several chat logs as one combined markdown document.
pub fn render_combined(mut logs: Vec<NamedLog>, config: &Config) -> String {
    logs.sort_by_key(|entry| entry.log.first_timestamp());

    let requester = logs.first().map_or("User", |e| e.log.requester()).to_string();
    let responder = logs
        .first()
        .map_or("GitHub Copilot", |e| e.log.responder())
        .to_string();

    let mut md: Vec<String> = Vec::new();
    md.push("# GitHub Copilot Chat Log (Combined)".to_string());
    md.push(String::new());
    md.push(format!("**Participant:** {requester}"));
    md.push(format!("<br>**Assistant:** {responder}"));
    md.push(String::new());

    // Flat (chat, request) addresses in document order, for navigation
    // across chat boundaries.
    let mut addresses: Vec<(usize, usize)> = Vec::new();
    for (c, entry) in logs.iter().enumerate() {
        for i in 0..entry.log.requests.len() {
            addresses.push((c + 1, i + 1));
        }
    }
    let total = addresses.len();

    if total > 1 {
        md.push("<a name=\"table-of-contents\"></a>".to_string());
        md.push("## Table of Contents".to_string());
        md.push(String::new());
        for (c, entry) in logs.iter().enumerate() {
            let chat = c + 1;
            md.push(format!("### Chat {chat}: {}", escape_brackets(&entry.name)));
            md.push(String::new());
            for (i, request) in entry.log.requests.iter().enumerate() {
                let local = i + 1;
                let preview = document::toc_preview(request, config);
                md.push(format!(
                    "- [Request {local}](#chat-{chat}-request-{local}): {preview}"
                ));
            }
            md.push(String::new());
        }
    }

    md.push("---".to_string());
    md.push(String::new());

    let mut index: usize = 0;
    for (c, entry) in logs.iter().enumerate() {
        let chat = c + 1;
        for (i, request) in entry.log.requests.iter().enumerate() {
            let local = i + 1;
            if i == 0 {
                md.push(format!("## Chat {chat}: {}", entry.name));
                md.push(String::new());
            }

            let up = "[^](#table-of-contents)".to_string();
            let prev = match index.checked_sub(1).map(|p| addresses[p]) {
                Some((pc, pl)) => format!("[<](#chat-{pc}-request-{pl})"),
                None => "<".to_string(),
            };
            let next = match addresses.get(index + 1) {
                Some((nc, nl)) => format!("[>](#chat-{nc}-request-{nl})"),
                None => ">".to_string(),
            };
            let heading = format!("### Chat {chat}-Request {local} {up} {prev} {next}");
            document::push_request_section(
                &mut md,
                request,
                &format!("chat-{chat}-request-{local}"),
                &heading,
                config,
            );

            index += 1;
            if index < total {
                md.push("---".to_string());
                md.push(String::new());
            }
        }
    }

    document::spacing_after_details(&md.join("\n"))
}

/// Escapes square brackets so bracketed file names do not read as links.
fn escape_brackets(name: &str) -> String {
    name.replace('[', "\\[").replace(']', "\\]")
}
