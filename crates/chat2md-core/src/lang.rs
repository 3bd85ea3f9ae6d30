//! File-extension to fence-language mapping.

/// Language tag for a file extension (including the leading dot).
pub fn language_for_extension(ext: &str) -> &'static str {
    match ext {
        ".md" => "markdown",
        ".py" => "python",
        ".js" => "javascript",
        ".ts" => "typescript",
        ".rs" => "rust",
        ".json" => "json",
        ".toml" => "toml",
        ".yaml" | ".yml" => "yaml",
        ".html" => "html",
        ".css" => "css",
        ".sh" => "bash",
        ".txt" => "text",
        _ => "",
    }
}

/// Language tag for a file name or path.
pub fn language_for_path(name: &str) -> &'static str {
    match name.rfind('.') {
        Some(idx) => language_for_extension(&name[idx..]),
        None => "",
    }
}
