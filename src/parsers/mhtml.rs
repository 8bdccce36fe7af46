use anyhow::Result;
use chrono::{DateTime, Utc};
use scraper::Html;
use std::fs;
use std::path::{Path, PathBuf};

use crate::archive::headers::decode_encoded_words;
use crate::archive::{
    Archive, ArchiveError, DecodedPart, SourceEncoding, TransferEncoding, transfer,
};
use crate::config::ExtractConfig;
use crate::markup::{self, MarkupBlock, extract_metadata};
use crate::models::ChatSession;
use crate::observer::{ExtractEvent, ExtractObserver, TracingObserver};
use crate::segmenter::TurnSegmenter;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("Failed to read {}", path.display())]
    UnreadableInput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Extracts a [`ChatSession`] from a saved chat page.
pub struct MhtmlParser {
    config: ExtractConfig,
    segmenter: TurnSegmenter,
    observer: Box<dyn ExtractObserver>,
}

impl Default for MhtmlParser {
    fn default() -> Self {
        Self::new()
    }
}

impl MhtmlParser {
    pub fn new() -> Self {
        Self::with_config(ExtractConfig::default())
    }

    pub fn with_config(config: ExtractConfig) -> Self {
        Self {
            segmenter: TurnSegmenter::new(config.segmenter.clone()),
            config,
            observer: Box::new(TracingObserver),
        }
    }

    /// Replaces the segmenter, e.g. one with a custom validity filter.
    pub fn with_segmenter(mut self, segmenter: TurnSegmenter) -> Self {
        self.segmenter = segmenter;
        self
    }

    pub fn with_observer(mut self, observer: impl ExtractObserver + 'static) -> Self {
        self.observer = Box::new(observer);
        self
    }

    /// Reading the file is the only step that can fail.
    pub fn parse_file(&self, path: &Path) -> Result<ChatSession> {
        let bytes = fs::read(path).map_err(|source| ParseError::UnreadableInput {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(self.parse_bytes(&bytes))
    }

    /// Input that is not valid UTF-8 is read as Latin-1 so 8-bit bodies can
    /// be restored byte for byte.
    pub fn parse_bytes(&self, bytes: &[u8]) -> ChatSession {
        match std::str::from_utf8(bytes) {
            Ok(text) => self.parse_text(text, SourceEncoding::Utf8),
            Err(_) => self.parse_text(&transfer::latin1(bytes), SourceEncoding::Latin1),
        }
    }

    pub fn parse_str(&self, text: &str) -> ChatSession {
        self.parse_text(text, SourceEncoding::Utf8)
    }

    fn parse_text(&self, text: &str, source: SourceEncoding) -> ChatSession {
        let observer = &*self.observer;
        let archive = Archive::parse(text, source);

        let document = match archive.document(observer) {
            Ok(document) => document,
            Err(ArchiveError::MalformedArchive) if markup::contains_markup(text) => {
                observer.on_event(&ExtractEvent::ArchiveFallback);
                let bytes =
                    transfer::decode_body(text, TransferEncoding::Identity, source, observer);
                DecodedPart {
                    content_type: "text/html".to_string(),
                    charset: None,
                    location: None,
                    text: transfer::decode_charset(bytes, None, observer),
                }
            }
            Err(_) => {
                observer.on_event(&ExtractEvent::DocumentMissing);
                return ChatSession::empty(&self.config.default_title);
            }
        };

        let headers = archive.headers();
        let page = Html::parse_document(&document.text);
        let metadata = extract_metadata(&page);
        let title = metadata.title.or_else(|| {
            headers
                .get("subject")
                .map(|subject| decode_encoded_words(subject, observer))
        });
        let url = metadata
            .url
            .or_else(|| headers.get("snapshot-content-location").map(str::to_string))
            .or(document.location);
        let created_time = headers.get("date").and_then(|raw| parse_date(raw, observer));

        let blocks = if markup::contains_markup(&document.text) {
            markup::document_blocks(&page)
        } else {
            MarkupBlock::from_plain_text(&markup::to_plain_text(&document.text))
        };
        let turns = self.segmenter.segment(&blocks, observer);
        tracing::debug!(blocks = blocks.len(), turns = turns.len(), "Segmented document");

        ChatSession::assemble(title, &self.config.default_title, url, created_time, turns)
    }
}

fn parse_date(raw: &str, observer: &dyn ExtractObserver) -> Option<DateTime<Utc>> {
    match DateTime::parse_from_rfc2822(raw.trim()) {
        Ok(date) => Some(date.with_timezone(&Utc)),
        Err(_) => {
            observer.on_event(&ExtractEvent::InvalidDate(raw.to_string()));
            None
        }
    }
}
