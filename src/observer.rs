use crate::models::Sender;

/// Internal decisions made while extracting a conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractEvent {
    /// A part body could not be decoded with its declared charset.
    DecodeFallback {
        charset: String,
        fallback: DecodeFallback,
    },
    /// The archive had no usable part structure; the raw input was used instead.
    ArchiveFallback,
    /// No text/html part was found.
    DocumentMissing,
    /// The `Date` header could not be parsed.
    InvalidDate(String),
    BlockRejected {
        text: String,
        reason: RejectReason,
    },
    DuplicateCollapsed {
        kept: String,
        dropped: String,
    },
    TurnAccepted {
        index: usize,
        sender: Sender,
    },
    TurnRejected {
        sender: Sender,
        reason: RejectReason,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeFallback {
    /// Invalid UTF-8 sequences replaced with U+FFFD.
    LossyUtf8,
    /// Bytes mapped one-to-one onto Latin-1 code points.
    Latin1,
    /// Base64 body could not be decoded; raw bytes kept.
    RawBase64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Failed the validity filter (too short or boilerplate).
    NotDialogue,
    /// Other blocks carried role signals and this one did not.
    NoRoleSignal,
    /// Only thinking text remained once markers were removed.
    EmptyContent,
    /// Thinking text with no assistant turn to attach to.
    OrphanThinking,
}

/// Receives [`ExtractEvent`]s from the extraction pipeline.
pub trait ExtractObserver {
    fn on_event(&self, event: &ExtractEvent);
}

impl<F> ExtractObserver for F
where
    F: Fn(&ExtractEvent),
{
    fn on_event(&self, event: &ExtractEvent) {
        self(event)
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl ExtractObserver for TracingObserver {
    fn on_event(&self, event: &ExtractEvent) {
        match event {
            ExtractEvent::DecodeFallback { charset, fallback } => {
                tracing::warn!("Charset {} failed to decode, using {:?}", charset, fallback);
            }
            ExtractEvent::ArchiveFallback => {
                tracing::warn!("No multipart boundary found, treating input as the document");
            }
            ExtractEvent::DocumentMissing => {
                tracing::warn!("No HTML document found in archive");
            }
            ExtractEvent::InvalidDate(raw) => {
                tracing::warn!("Failed to parse archive date {}", raw);
            }
            ExtractEvent::BlockRejected { text, reason } => {
                tracing::debug!(?reason, "Rejected block {:?}", text);
            }
            ExtractEvent::DuplicateCollapsed { kept, dropped } => {
                tracing::debug!("Collapsed duplicate {:?} into {:?}", dropped, kept);
            }
            ExtractEvent::TurnAccepted { index, sender } => {
                tracing::debug!(index, sender = sender.as_str(), "Accepted turn");
            }
            ExtractEvent::TurnRejected { sender, reason } => {
                tracing::debug!(?reason, sender = sender.as_str(), "Rejected turn");
            }
        }
    }
}

/// Discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ExtractObserver for NoopObserver {
    fn on_event(&self, _event: &ExtractEvent) {}
}
