//! Code-fence balancing.
//!
//! Transcript fragments routinely carry broken fence markup: an opener with
//! no close, a close with the wrong backtick count, or stray backtick lines.
//! The balancer scans a whole document line by line with a stack of open
//! fences and repairs what it finds, rewriting closers (never openers) so
//! the result renders as the author intended.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

/// A fence line: three or more backticks, optionally followed by a language
/// tag. With a tag it opens a block; bare, it closes one.
static FENCE_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(`{3,})(\w*)\s*$").expect("valid fence pattern"));

/// A line consisting solely of backticks, any count.
static BARE_BACKTICKS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^`+$").expect("valid backtick pattern"));

/// One open fence on the scan stack.
struct FenceFrame {
    count: usize,
    line: usize,
    raw: String,
    lang: String,
}

/// Length of the longest run of consecutive backticks in `text`.
///
/// Used by the renderers to size wrapping fences strictly above any run
/// embedded in the content.
pub fn longest_backtick_run(text: &str) -> usize {
    let mut longest = 0;
    let mut run = 0;
    for ch in text.chars() {
        if ch == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    longest
}

/// Repairs unbalanced or mismatched code fences across a document.
///
/// Idempotent: running the balancer on its own output changes nothing.
pub fn balance_fences(text: &str) -> String {
    let mut lines: Vec<String> = text.split('\n').map(str::to_string).collect();
    let mut stack: Vec<FenceFrame> = Vec::new();

    // Collapsible blocks manage their own internal fencing.
    let mut in_details = false;

    for i in 0..lines.len() {
        if lines[i].contains("<details>") {
            in_details = true;
            continue;
        }
        if lines[i].contains("</details>") {
            in_details = false;
            continue;
        }
        if in_details {
            continue;
        }

        let stripped = lines[i].trim().to_string();
        if let Some(caps) = FENCE_LINE.captures(&stripped) {
            let raw = caps[1].to_string();
            let lang = caps[2].to_string();
            let count = raw.len();

            if !lang.is_empty() {
                stack.push(FenceFrame {
                    count,
                    line: i,
                    raw,
                    lang,
                });
            } else if let Some(top) = stack.last() {
                if top.count != count {
                    // Wrong backtick count: rewrite the closer to match.
                    lines[i] = "`".repeat(top.count);
                }
                stack.pop();
            } else {
                // Closing fence without an opening: escape it in place.
                lines[i] = lines[i].replacen(&raw, &format!("\\{raw}"), 1);
            }
        } else if !stack.is_empty() && BARE_BACKTICKS.is_match(&stripped) {
            // Short backtick-only line while a fence is open closes it.
            let top = stack.last().expect("non-empty stack");
            lines[i] = "`".repeat(top.count);
            stack.pop();
        }
    }

    // Repair any fences still open at end of scan.
    for frame in stack {
        debug!(
            "repairing unclosed {}-backtick fence (lang '{}') at line {}",
            frame.count, frame.lang, frame.line
        );
        if frame.count >= 4 {
            // Downgrade the opener to 3 backticks and close it at the first
            // plausible section boundary.
            lines[frame.line] = lines[frame.line].replacen(&frame.raw, "```", 1);
            let mut inserted = false;
            for j in frame.line + 1..lines.len() {
                let stripped = lines[j].trim();
                let blank_before_heading = j + 1 < lines.len()
                    && lines[j].is_empty()
                    && lines[j + 1].trim().starts_with('#');
                if stripped == "---" || blank_before_heading || stripped.starts_with("<a name=") {
                    lines.insert(j, "```".to_string());
                    inserted = true;
                    break;
                }
            }
            if !inserted {
                lines.push("```".to_string());
            }
        } else {
            // A 3-backtick opener with no close becomes literal text.
            lines[frame.line] = lines[frame.line].replacen(&frame.raw, &format!("\\{}", frame.raw), 1);
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_balanced_text_unchanged() {
        let text = "before\n```rust\nlet x = 1;\n```\nafter";
        assert_eq!(balance_fences(text), text);
    }

    #[test]
    fn test_mismatched_closer_rewritten() {
        let text = "````python\ncode\n```";
        assert_eq!(balance_fences(text), "````python\ncode\n````");
    }

    #[test]
    fn test_short_backtick_line_closes_open_fence() {
        let text = "````md\ncontent\n``";
        assert_eq!(balance_fences(text), "````md\ncontent\n````");
    }

    #[test]
    fn test_stray_closer_escaped() {
        let text = "no fence open\n```\nstill text";
        assert_eq!(balance_fences(text), "no fence open\n\\```\nstill text");
    }

    #[test]
    fn test_unclosed_triple_escaped_in_place() {
        let text = "```rust\nnever closed";
        assert_eq!(balance_fences(text), "\\```rust\nnever closed");
    }

    #[test]
    fn test_unclosed_quad_downgraded_and_closed_at_rule() {
        let text = "````json\n{\"a\": 1}\n---\nnext section";
        assert_eq!(balance_fences(text), "```json\n{\"a\": 1}\n```\n---\nnext section");
    }

    #[test]
    fn test_unclosed_quad_closed_before_heading() {
        let text = "````txt\nbody\n\n# Title";
        assert_eq!(balance_fences(text), "```txt\nbody\n```\n\n# Title");
    }

    #[test]
    fn test_unclosed_quad_closed_before_anchor() {
        let text = "````txt\nbody\n<a name=\"request-2\"></a>";
        assert_eq!(
            balance_fences(text),
            "```txt\nbody\n```\n<a name=\"request-2\"></a>"
        );
    }

    #[test]
    fn test_unclosed_quad_closed_at_end() {
        let text = "````txt\nbody";
        assert_eq!(balance_fences(text), "```txt\nbody\n```");
    }

    #[test]
    fn test_details_span_excluded() {
        let text = "<details>\n```rust\nunbalanced inside\n</details>";
        assert_eq!(balance_fences(text), text);
    }

    #[test]
    fn test_idempotent_on_repaired_output() {
        let broken = "```rust\nlet x;\n````\nplain\n````md\nnope\n\n# End\n```\nloose";
        let once = balance_fences(broken);
        let twice = balance_fences(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_longest_backtick_run() {
        assert_eq!(longest_backtick_run("no ticks"), 0);
        assert_eq!(longest_backtick_run("a `` b ````` c"), 5);
        assert_eq!(longest_backtick_run("```"), 3);
    }
}
