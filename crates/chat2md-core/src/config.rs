//! Configuration management for chat2md.
//!
//! Loads configuration from ${CHAT2MD_HOME}/config.toml with sensible defaults.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Rendering options.
///
/// Every field has a default so a missing or partial config file works.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Insert a blank line between a lowercase sentence end and a following
    /// bold-starting clause that were concatenated without a separator.
    ///
    /// This is a heuristic: abbreviations ending in a period can trigger it
    /// falsely, which is why it can be switched off.
    pub sentence_spacing: bool,

    /// Maximum characters of a message preview shown in the table of contents.
    pub toc_preview_chars: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sentence_spacing: true,
            toc_preview_chars: 80,
        }
    }
}

impl Config {
    /// Loads the config file, falling back to defaults when it does not exist.
    pub fn load() -> Result<Config> {
        let path = config_path();
        if !path.exists() {
            return Ok(Config::default());
        }
        let raw = fs::read_to_string(&path)
            .with_context(|| format!("read config '{}'", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parse config '{}'", path.display()))
    }
}

/// Returns the chat2md home directory.
///
/// `CHAT2MD_HOME` overrides the default of `~/.chat2md`.
pub fn home_dir() -> PathBuf {
    if let Ok(home) = std::env::var("CHAT2MD_HOME") {
        return PathBuf::from(home);
    }
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".chat2md")
}

/// Path to the config file inside the chat2md home directory.
pub fn config_path() -> PathBuf {
    home_dir().join("config.toml")
}
