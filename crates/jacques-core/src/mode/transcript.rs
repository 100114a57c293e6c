//! Minimal JSONL transcript reader.
//!
//! Mode detection needs only a narrow slice of each transcript entry: the
//! entry type, tool-use blocks, user text, and agent-progress metadata.
//! The full historical-catalog parser lives outside the engine; this reader
//! deserializes just what detection consumes and skips malformed lines.

use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::Deserialize;
use tracing::debug;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct TranscriptEntry {
    #[serde(rename = "type")]
    pub entry_type: Option<String>,
    pub message: Option<TranscriptMessage>,
    #[serde(rename = "agentType")]
    pub agent_type: Option<String>,
    #[serde(rename = "agentId")]
    pub agent_id: Option<String>,
    pub title: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptMessage {
    pub role: Option<String>,
    #[serde(default)]
    pub content: MessageContent,
}

/// Message content is either a bare string or a block list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub block_type: Option<String>,
    pub text: Option<String>,
    /// Tool name for `tool_use` blocks.
    pub name: Option<String>,
    /// Tool input for `tool_use` blocks.
    pub input: Option<serde_json::Value>,
    /// Error flag for `tool_result` blocks.
    pub is_error: Option<bool>,
}

impl TranscriptEntry {
    /// Tool-use blocks in this entry.
    pub fn tool_uses(&self) -> impl Iterator<Item = &ContentBlock> {
        self.blocks()
            .filter(|block| block.block_type.as_deref() == Some("tool_use"))
    }

    fn blocks(&self) -> impl Iterator<Item = &ContentBlock> {
        let blocks = match self.message.as_ref().map(|m| &m.content) {
            Some(MessageContent::Blocks(blocks)) => blocks.as_slice(),
            _ => &[],
        };
        blocks.iter()
    }

    /// Concatenated text of a user message (bare string or text blocks).
    pub fn user_text(&self) -> Option<String> {
        let message = self.message.as_ref()?;
        let is_user = self.entry_type.as_deref() == Some("user")
            || message.role.as_deref() == Some("user");
        if !is_user {
            return None;
        }
        match &message.content {
            MessageContent::Text(text) => Some(text.clone()),
            MessageContent::Blocks(blocks) => {
                let text: Vec<&str> = blocks
                    .iter()
                    .filter(|b| b.block_type.as_deref() == Some("text"))
                    .filter_map(|b| b.text.as_deref())
                    .collect();
                if text.is_empty() {
                    None
                } else {
                    Some(text.join("\n"))
                }
            }
        }
    }
}

/// Read all parseable entries from a JSONL transcript.
pub fn read_entries(path: &Path) -> std::io::Result<Vec<TranscriptEntry>> {
    let file = std::fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for line in reader.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TranscriptEntry>(&line) {
            Ok(entry) => entries.push(entry),
            Err(_) => skipped += 1,
        }
    }
    if skipped > 0 {
        debug!(
            event = "core.mode.transcript_lines_skipped",
            path = %path.display(),
            skipped = skipped,
        );
    }
    Ok(entries)
}
