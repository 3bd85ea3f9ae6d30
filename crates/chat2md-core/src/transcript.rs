//! Chat-log data model.
//!
//! Copilot chat exports are loosely structured JSON. Stable top-level fields
//! are modeled as serde structs; regions whose shape varies between exporter
//! versions (`message`, individual `response` parts, `result`) stay as raw
//! [`serde_json::Value`] behind defensive accessors that default to "nothing"
//! on any missing or oddly-shaped field.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{Map, Value};

/// One exported chat session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatLog {
    pub requester_username: Option<String>,
    pub responder_username: Option<String>,
    pub requests: Vec<Request>,
}

impl ChatLog {
    pub fn requester(&self) -> &str {
        self.requester_username.as_deref().unwrap_or("User")
    }

    pub fn responder(&self) -> &str {
        self.responder_username.as_deref().unwrap_or("GitHub Copilot")
    }

    /// Timestamp of the first request, for chronological ordering of
    /// combined documents.
    pub fn first_timestamp(&self) -> i64 {
        self.requests
            .first()
            .and_then(|r| r.timestamp)
            .unwrap_or(0)
    }
}

/// One request/response exchange within a session.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Request {
    pub message: Value,
    pub response: Vec<Value>,
    pub result: Value,
    pub timestamp: Option<i64>,
    pub model_id: Option<String>,
    pub details: Option<String>,
    pub variable_data: Value,
}

impl Request {
    /// Full user message text: `message.text`, or the concatenation of
    /// `message.parts[].text`.
    pub fn message_text(&self) -> String {
        if let Some(text) = self.message.get("text").and_then(Value::as_str) {
            return text.to_string();
        }
        if let Some(parts) = self.message.get("parts").and_then(Value::as_array) {
            return parts
                .iter()
                .filter_map(|p| p.get("text").and_then(Value::as_str))
                .collect();
        }
        String::new()
    }

    /// First available message text, for table-of-contents previews.
    pub fn message_preview(&self) -> Option<&str> {
        if let Some(text) = self.message.get("text").and_then(Value::as_str) {
            return Some(text);
        }
        self.message
            .get("parts")
            .and_then(Value::as_array)?
            .iter()
            .find_map(|p| p.get("text").and_then(Value::as_str))
    }

    /// Error message from `result.errorDetails`, when present and non-empty.
    pub fn error_message(&self) -> Option<&str> {
        self.result
            .pointer("/errorDetails/message")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
    }

    /// Total elapsed time in milliseconds from `result.timings`.
    pub fn total_elapsed_ms(&self) -> Option<f64> {
        self.result
            .pointer("/timings/totalElapsed")
            .and_then(Value::as_f64)
    }

    /// Tool call results keyed by call id, from `result.metadata`.
    pub fn tool_call_results(&self) -> Option<&Map<String, Value>> {
        self.result
            .pointer("/metadata/toolCallResults")
            .and_then(Value::as_object)
    }

    /// Tool call rounds from `result.metadata`, empty when absent.
    pub fn tool_call_rounds(&self) -> &[Value] {
        self.result
            .pointer("/metadata/toolCallRounds")
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }

    /// Non-empty per-round consolidated response strings, in round order.
    pub fn round_responses(&self) -> Vec<&str> {
        self.tool_call_rounds()
            .iter()
            .filter_map(|round| round.get("response").and_then(Value::as_str))
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .collect()
    }

    /// Attached variables from `variableData.variables`, empty when absent.
    pub fn variables(&self) -> &[Value] {
        self.variable_data
            .get("variables")
            .and_then(Value::as_array)
            .map_or(&[], Vec::as_slice)
    }
}

/// Reads and parses one chat-log JSON file.
///
/// Read and parse failures carry distinct context so the caller can report
/// which step failed.
pub fn load_chat_log(path: &Path) -> Result<ChatLog> {
    let raw = fs::read_to_string(path).with_context(|| format!("read '{}'", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse '{}'", path.display()))
}
