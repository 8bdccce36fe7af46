use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::segmenter::thinking::ThinkingMarker;

pub const DEFAULT_TITLE: &str = "Untitled Conversation";

/// Tuning knobs for a conversion. Every field is optional in the JSON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractConfig {
    /// Title used when neither the page nor the archive headers carry one.
    pub default_title: String,
    pub segmenter: SegmenterConfig,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            default_title: DEFAULT_TITLE.to_string(),
            segmenter: SegmenterConfig::default(),
        }
    }
}

impl ExtractConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?;
        serde_json::from_str(&raw)
            .with_context(|| format!("Failed to parse config {}", path.display()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmenterConfig {
    /// Blocks with fewer characters than this are never dialogue.
    pub min_block_chars: usize,
    /// Shortest text that may be collapsed into a longer one it prefixes.
    pub dedup_min_prefix_chars: usize,
    /// Page furniture, compared case-insensitively against whole blocks.
    pub boilerplate: Vec<String>,
    /// Substrings that mark leaked markup or script, matched case-insensitively.
    pub markup_leaks: Vec<String>,
    pub site_profile: SiteProfile,
    pub thinking_markers: Vec<ThinkingMarker>,
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self {
            min_block_chars: 2,
            dedup_min_prefix_chars: 8,
            boilerplate: strings(DEFAULT_BOILERPLATE),
            markup_leaks: strings(&[
                "stylesheet",
                "javascript:",
                "class=",
                "href=",
                "<svg",
                "<?xml",
            ]),
            site_profile: SiteProfile::default(),
            thinking_markers: ThinkingMarker::defaults(),
        }
    }
}

/// Attribute tokens (`class`, `id`, `role`, `data-*`) that mark the
/// container of a turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteProfile {
    pub user_hints: Vec<String>,
    pub assistant_hints: Vec<String>,
    pub thinking_hints: Vec<String>,
}

impl Default for SiteProfile {
    fn default() -> Self {
        Self {
            user_hints: strings(&[
                "user",
                "human",
                "query",
                "question",
                "prompt",
                "request",
            ]),
            assistant_hints: strings(&[
                "assistant",
                "bot",
                "answer",
                "response",
                "reply",
                "model",
                "markdown",
                "md",
            ]),
            thinking_hints: strings(&["think", "thinking", "thought", "reasoning", "reasoner"]),
        }
    }
}

const DEFAULT_BOILERPLATE: &[&str] = &[
    "copy",
    "copied",
    "copy code",
    "share",
    "edit",
    "retry",
    "regenerate",
    "like",
    "dislike",
    "new chat",
    "sign in",
    "log in",
    "login",
    "sign up",
    "menu",
    "settings",
    "home",
    "download",
    "send",
    "stop generating",
    "复制",
    "已复制",
    "分享",
    "编辑",
    "重新生成",
    "新建对话",
    "新对话",
    "登录",
    "下载",
    "发送",
    "停止生成",
    "内容由AI生成，仅供参考",
    "内容由ai生成，仅供参考",
];

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|value| value.to_string()).collect()
}
