use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::markup::collapse_whitespace;

/// Leftovers after a label: separators and a bracketed note such as
/// "（用时 12 秒）", captured so the note survives.
static LABEL_TAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[\s:：]*([(（\[【][^)）\]】\n]{0,40}[)）\]】])?[\s:：]*").unwrap()
});

/// Recognizes a thinking span. With `close`, the span runs from `open` to
/// `close` anywhere in a block. Without it, `open` is a label that must start
/// the block, and the rest of the block is thinking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThinkingMarker {
    pub open: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub close: Option<String>,
}

impl ThinkingMarker {
    pub fn delimited(open: impl Into<String>, close: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: Some(close.into()),
        }
    }

    pub fn label(open: impl Into<String>) -> Self {
        Self {
            open: open.into(),
            close: None,
        }
    }

    pub fn defaults() -> Vec<Self> {
        vec![
            Self::delimited("<think>", "</think>"),
            Self::delimited("<thinking>", "</thinking>"),
            Self::label("已深度思考"),
            Self::label("思考过程"),
            Self::label("Thinking"),
        ]
    }
}

/// Cuts every delimited span out of `text`. Returns the remaining content and
/// the spans in order. An unclosed span runs to the end of the text.
pub fn split_delimited(text: &str, markers: &[ThinkingMarker]) -> (String, Vec<String>) {
    let mut content = text.to_string();
    let mut spans = Vec::new();

    for marker in markers {
        let Some(close) = marker.close.as_deref() else {
            continue;
        };
        if marker.open.is_empty() {
            continue;
        }

        let mut rest = content.as_str();
        let mut kept = String::new();
        while let Some(start) = rest.find(&marker.open) {
            kept.push_str(&rest[..start]);
            let inner = &rest[start + marker.open.len()..];
            let (span, after) = match inner.find(close) {
                Some(end) => (&inner[..end], &inner[end + close.len()..]),
                None => (inner, ""),
            };
            let span = collapse_whitespace(span);
            if !span.is_empty() {
                spans.push(span);
            }
            kept.push('\n');
            rest = after;
        }
        kept.push_str(rest);
        content = kept;
    }

    (collapse_whitespace(&content), spans)
}

/// If `text` starts with a label marker, returns what follows the label.
/// A bracketed note right after the label (the thinking duration) becomes
/// the first line. The result is empty for a block holding only the label.
pub fn strip_label(text: &str, markers: &[ThinkingMarker]) -> Option<String> {
    let text = text.trim_start();
    markers
        .iter()
        .filter(|marker| marker.close.is_none() && !marker.open.is_empty())
        .find_map(|marker| {
            let rest = text.strip_prefix(marker.open.as_str())?;
            let ends_label = rest
                .chars()
                .next()
                .is_none_or(|c| matches!(c, ':' | '：' | '(' | '（' | '[' | '【' | '\n'));
            if !ends_label {
                return None;
            }
            let (note, body) = match LABEL_TAIL_RE.captures(rest) {
                Some(caps) => (
                    caps.get(1).map_or("", |m| m.as_str()),
                    caps.get(0).map_or(rest, |m| &rest[m.end()..]),
                ),
                None => ("", rest),
            };
            Some(collapse_whitespace(&format!("{note}\n{body}")))
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delimited_span_is_cut_out_of_content() {
        let text = "<think>The user greets me.\nReply politely.</think>\nHello! How can I help?";
        let (content, spans) = split_delimited(text, &ThinkingMarker::defaults());

        assert_eq!(content, "Hello! How can I help?");
        assert_eq!(spans, vec!["The user greets me.\nReply politely."]);
    }

    #[test]
    fn several_spans_keep_their_order() {
        let markers = vec![ThinkingMarker::delimited("[[", "]]")];
        let (content, spans) = split_delimited("a [[one]] b [[two]] c", &markers);

        assert_eq!(content, "a\nb\nc");
        assert_eq!(spans, vec!["one", "two"]);
    }

    #[test]
    fn unclosed_span_runs_to_end() {
        let (content, spans) =
            split_delimited("Answer first <think>still going", &ThinkingMarker::defaults());
        assert_eq!(content, "Answer first");
        assert_eq!(spans, vec!["still going"]);
    }

    #[test]
    fn text_without_markers_is_untouched() {
        let (content, spans) = split_delimited("Just an answer.", &ThinkingMarker::defaults());
        assert_eq!(content, "Just an answer.");
        assert!(spans.is_empty());
    }

    #[test]
    fn duration_note_leads_the_thinking() {
        let markers = ThinkingMarker::defaults();
        assert_eq!(
            strip_label("已深度思考（用时12秒）\n用户想知道天气。", &markers).as_deref(),
            Some("（用时12秒）\n用户想知道天气。")
        );
        assert_eq!(
            strip_label("Thinking: weigh both options", &markers).as_deref(),
            Some("weigh both options")
        );
    }

    #[test]
    fn label_only_block_keeps_just_the_note() {
        assert_eq!(
            strip_label("已深度思考（用时 8 秒）", &ThinkingMarker::defaults()).as_deref(),
            Some("（用时 8 秒）")
        );
        assert_eq!(strip_label("已深度思考：", &ThinkingMarker::defaults()).as_deref(), Some(""));
        assert_eq!(strip_label("Thinking", &ThinkingMarker::defaults()).as_deref(), Some(""));
    }

    #[test]
    fn label_must_stand_alone() {
        let markers = ThinkingMarker::defaults();
        assert_eq!(strip_label("Thinking about it, yes.", &markers), None);
        assert_eq!(strip_label("I was 思考过程", &markers), None);
    }

    #[test]
    fn marker_serializes_without_missing_close() {
        let json = serde_json::to_string(&ThinkingMarker::label("Reasoning")).unwrap();
        assert_eq!(json, r#"{"open":"Reasoning"}"#);
    }
}
