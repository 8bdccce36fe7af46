use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::config::DEFAULT_TITLE;
use crate::models::{ChatSession, ChatTurn, Sender};

/// Pretty-printed, keys in declaration order, non-ASCII kept as is.
pub fn to_json(session: &ChatSession) -> Result<String> {
    serde_json::to_string_pretty(session).context("Failed to serialize session")
}

#[derive(Debug, Deserialize)]
struct ImportedSession {
    title: Option<String>,
    url: Option<String>,
    created_time: Option<DateTime<Utc>>,
    #[serde(default)]
    messages: Vec<ImportedTurn>,
}

#[derive(Debug, Deserialize)]
struct ImportedTurn {
    sender: String,
    #[serde(default)]
    content: String,
    timestamp: Option<DateTime<Utc>>,
    thinking: Option<String>,
}

impl ImportedTurn {
    fn into_turn(self) -> Option<ChatTurn> {
        let Some(sender) = Sender::from_label(&self.sender) else {
            tracing::warn!("Skipping imported turn with unknown sender {:?}", self.sender);
            return None;
        };
        if self.content.trim().is_empty() {
            tracing::debug!("Skipping imported {} turn without content", sender.as_str());
            return None;
        }

        Some(ChatTurn {
            sender,
            content: self.content,
            timestamp: self.timestamp,
            thinking: self.thinking.filter(|thinking| !thinking.trim().is_empty()),
        })
    }
}

/// Reads an exported session back. Goes through [`ChatSession::assemble`],
/// so a blank title gets the default and turns without content are dropped.
pub fn from_json(json: &str) -> Result<ChatSession> {
    let imported: ImportedSession =
        serde_json::from_str(json).context("Failed to parse session JSON")?;
    let turns = imported
        .messages
        .into_iter()
        .filter_map(ImportedTurn::into_turn)
        .collect();

    Ok(ChatSession::assemble(
        imported.title,
        DEFAULT_TITLE,
        imported.url,
        imported.created_time,
        turns,
    ))
}
