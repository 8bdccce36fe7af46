use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

use super::transfer;
use crate::observer::ExtractObserver;

static ENCODED_WORD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"=\?([^?\s]+)\?([QqBb])\?([^?]*)\?=").unwrap());
static BETWEEN_WORDS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\?=)\s+(=\?)").unwrap());

/// MIME header block with case-insensitive lookup. The first occurrence of a
/// repeated header wins.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    entries: HashMap<String, String>,
}

impl Headers {
    pub fn parse(block: &str) -> Self {
        let mut entries = HashMap::new();

        for line in unfold(block) {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            let key = key.trim().to_ascii_lowercase();
            if key.is_empty() {
                continue;
            }
            entries
                .entry(key)
                .or_insert_with(|| value.trim().to_string());
        }

        Self { entries }
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn content_type(&self) -> Option<ContentType> {
        self.get("content-type").map(ContentType::parse)
    }
}

/// Joins folded continuation lines (leading space or tab) onto the previous line.
fn unfold(block: &str) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();

    for raw in block.lines() {
        let line = raw.trim_end_matches('\r');
        if line.starts_with([' ', '\t']) {
            if let Some(last) = lines.last_mut() {
                last.push(' ');
                last.push_str(line.trim());
                continue;
            }
        }
        lines.push(line.to_string());
    }

    lines
}

/// Parsed `Content-Type` value: lower-cased media type plus parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentType {
    pub mime: String,
    params: HashMap<String, String>,
}

impl ContentType {
    pub fn parse(value: &str) -> Self {
        let mut segments = split_params(value).into_iter();
        let mime = segments
            .next()
            .map(|s| s.trim().to_ascii_lowercase())
            .unwrap_or_default();

        let params = segments
            .filter_map(|segment| {
                let (key, value) = segment.split_once('=')?;
                let value = value.trim().trim_matches('"').to_string();
                Some((key.trim().to_ascii_lowercase(), value))
            })
            .collect();

        Self { mime, params }
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn is_multipart(&self) -> bool {
        self.mime.starts_with("multipart/")
    }

    pub fn is_html(&self) -> bool {
        matches!(self.mime.as_str(), "text/html" | "application/xhtml+xml")
    }
}

/// Splits on `;` outside double quotes.
fn split_params(value: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for ch in value.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                current.push(ch);
            }
            ';' if !quoted => segments.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    segments.push(current);

    segments
}

/// Decodes RFC 2047 encoded-words (`=?utf-8?Q?...?=`, `=?utf-8?B?...?=`).
/// Malformed words are left as they are.
pub fn decode_encoded_words(value: &str, observer: &dyn ExtractObserver) -> String {
    if !value.contains("=?") {
        return value.to_string();
    }

    // Whitespace between adjacent encoded-words is not part of the text.
    let joined = BETWEEN_WORDS_RE.replace_all(value, "$1$2");

    ENCODED_WORD_RE
        .replace_all(&joined, |caps: &regex::Captures| {
            let charset = &caps[1];
            let text = &caps[3];
            let bytes = if caps[2].eq_ignore_ascii_case("q") {
                Some(transfer::decode_quoted_printable(
                    text.replace('_', " ").as_bytes(),
                ))
            } else {
                transfer::decode_base64(text)
            };

            match bytes {
                Some(bytes) => transfer::decode_charset(bytes, Some(charset), observer),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}
