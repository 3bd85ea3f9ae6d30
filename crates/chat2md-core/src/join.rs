//! Paragraph-aware fragment joining.

/// Joins rendered response fragments, preserving paragraph boundaries.
///
/// Fragments are concatenated verbatim (streamed parts split mid-sentence,
/// so no implicit separator is added). A blank line is inserted between a
/// fragment ending in sentence-terminal punctuation and a following fragment
/// that opens a new block (bold, heading, or collapsible). Whitespace-only
/// fragments are skipped entirely.
pub fn join_fragments<S: AsRef<str>>(parts: &[S]) -> String {
    let mut result = String::new();

    for (i, part) in parts.iter().enumerate() {
        let part = part.as_ref();
        if part.trim().is_empty() {
            continue;
        }
        result.push_str(part);

        let Some(next) = parts[i + 1..]
            .iter()
            .map(AsRef::as_ref)
            .find(|p| !p.trim().is_empty())
        else {
            continue;
        };

        let ends_sentence = part.trim().ends_with(['.', '!', '?']);
        let next = next.trim_start();
        let starts_block =
            next.starts_with("**") || next.starts_with('#') || next.starts_with("<details");

        if ends_sentence && starts_block && !result.ends_with("\n\n") {
            if result.ends_with('\n') {
                result.push('\n');
            } else {
                result.push_str("\n\n");
            }
        }
    }

    result
}
