//! Response rendering pipeline.
//!
//! A response body flows through fixed steps: raw parts become typed nodes
//! ([`crate::extract`]), nodes render to markdown fragments, fragments join
//! paragraph-aware ([`crate::join`]), and the joined text passes through an
//! ordered list of named transformation stages. The stage tables below are
//! the contract: spacing repairs run after node expansion, fence balancing
//! runs after the repairs, whitespace tidying runs last.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::config::Config;
use crate::extract::{self, ResponseNode};
use crate::{fences, join, text_edit, tool_call};

/// Cap on nested tool-result rendering. Recorded results can embed further
/// serialized invocations; past this depth they are left unexpanded so
/// adversarial input terminates.
pub const MAX_RENDER_DEPTH: usize = 4;

/// Ambient per-request context used to resolve tool invocations.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderContext<'a> {
    /// Tool call results keyed by call id.
    pub results: Option<&'a Map<String, Value>>,
    /// Tool call rounds, each listing the calls issued in that round.
    pub rounds: &'a [Value],
}

impl<'a> RenderContext<'a> {
    pub fn new(results: Option<&'a Map<String, Value>>, rounds: &'a [Value]) -> Self {
        Self { results, rounds }
    }
}

/// One named transformation over the whole document text.
pub struct Stage {
    pub name: &'static str,
    pub apply: fn(&str, &Config) -> String,
}

/// Structural-spacing repairs, run right after node expansion.
pub const REPAIR_STAGES: &[Stage] = &[
    Stage {
        name: "sentence-spacing",
        apply: sentence_spacing,
    },
    Stage {
        name: "details-on-own-line",
        apply: details_on_own_line,
    },
];

/// Final normalization, run once the text is fully expanded.
pub const CLEANUP_STAGES: &[Stage] = &[
    Stage {
        name: "unescape-blank-lines",
        apply: unescape_blank_lines,
    },
    Stage {
        name: "drop-metadata-lines",
        apply: drop_metadata_lines,
    },
    Stage {
        name: "checkmark-breaks",
        apply: checkmark_breaks,
    },
    Stage {
        name: "balance-fences",
        apply: |text, _| fences::balance_fences(text),
    },
    Stage {
        name: "tidy-whitespace",
        apply: tidy_whitespace,
    },
    Stage {
        name: "drop-empty-fences",
        apply: drop_empty_fences,
    },
];

fn apply_stages(text: &str, stages: &[Stage], config: &Config) -> String {
    stages
        .iter()
        .fold(text.to_string(), |acc, stage| (stage.apply)(&acc, config))
}

/// Extracts the renderable nodes of a response, dropping blank text parts.
pub fn response_nodes(parts: &[Value]) -> Vec<ResponseNode> {
    parts
        .iter()
        .filter_map(extract::extract_part)
        .filter(|node| match node {
            ResponseNode::Text(t) => !t.trim().is_empty(),
            _ => true,
        })
        .collect()
}

/// True when any node renders as a structured block (tool invocation or
/// edit group) rather than prose.
pub fn has_structured_nodes(nodes: &[ResponseNode]) -> bool {
    nodes.iter().any(ResponseNode::is_structured)
}

/// Renders a node sequence to joined, spacing-repaired markdown.
pub fn render_nodes_to_text(nodes: &[ResponseNode], ctx: &RenderContext, config: &Config) -> String {
    let fragments = render_nodes(nodes, ctx, config, 0);
    let joined = join::join_fragments(&fragments);
    apply_stages(&joined, REPAIR_STAGES, config)
}

fn render_nodes(
    nodes: &[ResponseNode],
    ctx: &RenderContext,
    config: &Config,
    depth: usize,
) -> Vec<String> {
    nodes
        .iter()
        .map(|node| match node {
            ResponseNode::Text(text) => text.clone(),
            ResponseNode::ToolInvocation(record) => {
                tool_call::render_tool_invocation(record, ctx, config, depth)
            }
            ResponseNode::EditGroup(record) => text_edit::render_edit_group(record),
            ResponseNode::Progress(record) => render_progress(record),
        })
        .collect()
}

/// Expands marker spans embedded in recorded tool-result text.
///
/// Unlike the top-level path, surrounding text is preserved verbatim (the
/// spans replace in place, no paragraph joining). Past the depth cap the
/// text is returned unexpanded.
pub fn render_embedded(text: &str, ctx: &RenderContext, config: &Config, depth: usize) -> String {
    if depth >= MAX_RENDER_DEPTH {
        return text.to_string();
    }
    let nodes = extract::parse_markers(text);
    let expanded = render_nodes(&nodes, ctx, config, depth).concat();
    apply_stages(&expanded, REPAIR_STAGES, config)
}

/// Renders a completed progress task as a checkmark line.
fn render_progress(record: &Value) -> String {
    record
        .pointer("/content/value")
        .and_then(Value::as_str)
        .filter(|value| !value.is_empty())
        .map(|value| format!("\n✔️ {value}\n"))
        .unwrap_or_default()
}

/// Final normalization over fully-expanded text.
pub fn clean_text(text: &str, config: &Config) -> String {
    if text.is_empty() {
        return String::new();
    }
    apply_stages(text, CLEANUP_STAGES, config)
}

static SENTENCE_BOLD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([a-z][.!?])\s*(\*\*[A-Z])").expect("valid pattern"));

/// Inserts a blank line between a lowercase sentence end and a following
/// bold-starting clause concatenated without a separator. Heuristic, so it
/// honors `Config::sentence_spacing`.
fn sentence_spacing(text: &str, config: &Config) -> String {
    if !config.sentence_spacing {
        return text.to_string();
    }
    SENTENCE_BOLD.replace_all(text, "$1\n\n$2").to_string()
}

static DETAILS_AFTER_ITEM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\n(?:\d+\.|#+)\s+[^\n]+?)(<details>)").expect("valid pattern"));
static DETAILS_INLINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([^\n])(<details>)").expect("valid pattern"));

/// Ensures every `<details>` opening tag starts on its own line.
fn details_on_own_line(text: &str, _config: &Config) -> String {
    let text = DETAILS_AFTER_ITEM.replace_all(text, "$1\n\n$2");
    DETAILS_INLINE.replace_all(&text, "$1\n\n$2").to_string()
}

/// Collapses literal `\n\n` escape sequences (two characters each) left in
/// some JSON exports into an actual blank line.
fn unescape_blank_lines(text: &str, _config: &Config) -> String {
    text.replace("\\n\\n", "\n\n")
}

/// Drops lines that still look like raw engine objects.
fn drop_metadata_lines(text: &str, _config: &Config) -> String {
    if !(text.contains('{') && (text.contains("$mid") || text.contains("kind"))) {
        return text.to_string();
    }
    let kept: Vec<&str> = text
        .lines()
        .filter(|line| !(line.contains('{') && (line.contains("$mid") || line.contains("kind"))))
        .collect();
    kept.join("\n")
}

/// Forces a line break between consecutive checkmark lines so renderers
/// that merge adjacent emoji lines keep them visually separate. The first
/// checkmark line of a run is untouched.
fn checkmark_breaks(text: &str, _config: &Config) -> String {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut formatted = Vec::with_capacity(lines.len());
    for (i, line) in lines.iter().enumerate() {
        if i > 0 && line.trim_start().starts_with('✅') && lines[i - 1].trim_start().starts_with('✅')
        {
            formatted.push(format!("<br>{line}"));
        } else {
            formatted.push((*line).to_string());
        }
    }
    formatted.join("\n")
}

/// Trims trailing whitespace, collapses blank runs, drops residual metadata
/// artifacts, strips trailing blank lines.
fn tidy_whitespace(text: &str, _config: &Config) -> String {
    let mut result: Vec<String> = Vec::new();
    let mut prev_blank = false;

    for line in text.split('\n') {
        let line = line.trim_end();
        let is_blank = line.is_empty();
        if is_blank && prev_blank {
            continue;
        }
        if !is_blank {
            if !(line.contains('{') && (line.contains("$mid") || line.contains("kind"))) {
                result.push(line.to_string());
            }
        } else {
            result.push(String::new());
        }
        prev_blank = is_blank;
    }

    while result.last().is_some_and(|line| line.trim().is_empty()) {
        result.pop();
    }
    result.join("\n")
}

static EMPTY_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    // Line-anchored so adjacent distinct fences are never partially consumed.
    Regex::new(r"(?m)^```[a-z]*\s*\n```\s*$").expect("valid pattern")
});

/// Removes degenerate empty fenced blocks.
fn drop_empty_fences(text: &str, _config: &Config) -> String {
    EMPTY_FENCE.replace_all(text, "").to_string()
}
