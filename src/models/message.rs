use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One attributed unit of dialogue recovered from a saved page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub sender: Sender,
    pub content: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub thinking: Option<String>,
}

impl ChatTurn {
    pub fn new(sender: Sender, content: impl Into<String>) -> Self {
        Self {
            sender,
            content: content.into(),
            timestamp: None,
            thinking: None,
        }
    }

    pub fn with_thinking(mut self, thinking: impl Into<String>) -> Self {
        self.thinking = Some(thinking.into());
        self
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
}

impl Sender {
    pub fn as_str(self) -> &'static str {
        match self {
            Sender::User => "user",
            Sender::Assistant => "assistant",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Sender::User => "User",
            Sender::Assistant => "Assistant",
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Sender::User => "\u{1f9d1}",
            Sender::Assistant => "\u{1f916}",
        }
    }

    pub fn other(self) -> Self {
        match self {
            Sender::User => Sender::Assistant,
            Sender::Assistant => Sender::User,
        }
    }

    /// Tolerant parse used for labels coming from configuration or imports.
    pub fn from_label(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "user" | "human" => Some(Sender::User),
            "assistant" | "ai" | "bot" | "model" => Some(Sender::Assistant),
            _ => None,
        }
    }
}
