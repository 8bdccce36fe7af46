use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{ChatTurn, Sender};

const FIRST_PROMPT_MAX_CHARS: usize = 200;

/// A conversation recovered from one archive. Immutable once assembled.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatSession {
    title: String,
    url: Option<String>,
    created_time: Option<DateTime<Utc>>,
    #[serde(rename = "messages")]
    turns: Vec<ChatTurn>,
}

impl ChatSession {
    /// Builds the session, substituting `default_title` when `title` is blank.
    pub fn assemble(
        title: Option<String>,
        default_title: &str,
        url: Option<String>,
        created_time: Option<DateTime<Utc>>,
        turns: Vec<ChatTurn>,
    ) -> Self {
        let title = title
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| default_title.to_string());
        let url = url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        Self {
            title,
            url,
            created_time,
            turns,
        }
    }

    pub fn empty(default_title: &str) -> Self {
        Self::assemble(None, default_title, None, None, Vec::new())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> Option<&str> {
        self.url.as_deref()
    }

    pub fn created_time(&self) -> Option<DateTime<Utc>> {
        self.created_time
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn count_by_sender(&self, sender: Sender) -> usize {
        self.turns.iter().filter(|turn| turn.sender == sender).count()
    }

    /// First non-blank user turn, whitespace-collapsed and truncated.
    pub fn first_prompt(&self) -> Option<String> {
        self.turns
            .iter()
            .filter(|turn| turn.sender == Sender::User)
            .map(|turn| normalize_prompt(&turn.content))
            .find(|prompt| !prompt.is_empty())
    }
}

fn normalize_prompt(content: &str) -> String {
    let normalized = content.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_chars(&normalized, FIRST_PROMPT_MAX_CHARS)
}

fn truncate_chars(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }

    let mut truncated: String = value.chars().take(max_chars).collect();
    truncated.push('\u{2026}');
    truncated
}
