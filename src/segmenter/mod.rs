pub mod roles;
pub mod thinking;

use crate::config::SegmenterConfig;
use crate::markup::MarkupBlock;
use crate::models::{ChatTurn, Sender};
use crate::observer::{ExtractEvent, ExtractObserver, RejectReason};
pub use roles::{MarkupHintClassifier, RoleClassifier, RoleSignal};
pub use thinking::ThinkingMarker;

/// Decides whether a piece of text is dialogue rather than page furniture.
pub type ValidityFilter = Box<dyn Fn(&str) -> bool + Send + Sync>;

/// Trailing characters a streaming render leaves behind.
const STREAMING_TAILS: &[char] = &['…', '▍', '|', '.'];

/// Default validity filter: long enough, not a known boilerplate label, no
/// leaked markup or script, not a copyright line.
pub fn is_dialogue(text: &str, config: &SegmenterConfig) -> bool {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.chars().count() < config.min_block_chars {
        return false;
    }

    let lowered = trimmed.to_lowercase();
    if config
        .boilerplate
        .iter()
        .any(|label| label.trim().to_lowercase() == lowered)
    {
        return false;
    }
    if config
        .markup_leaks
        .iter()
        .any(|leak| !leak.is_empty() && lowered.contains(&leak.to_lowercase()))
    {
        return false;
    }

    !(lowered.starts_with('©') || lowered.starts_with("copyright"))
}

/// Partitions normalized blocks into attributed turns.
pub struct TurnSegmenter {
    config: SegmenterConfig,
    filter: ValidityFilter,
    classifier: Box<dyn RoleClassifier + Send + Sync>,
}

impl std::fmt::Debug for TurnSegmenter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnSegmenter")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for TurnSegmenter {
    fn default() -> Self {
        Self::new(SegmenterConfig::default())
    }
}

#[derive(Debug)]
enum CandidateKind {
    Dialogue(Option<RoleSignal>),
    Thinking,
}

#[derive(Debug)]
struct Candidate {
    text: String,
    kind: CandidateKind,
}

impl Candidate {
    fn sender(&self) -> Option<Sender> {
        match &self.kind {
            CandidateKind::Dialogue(signal) => signal.map(|signal| signal.sender),
            CandidateKind::Thinking => None,
        }
    }

    fn same_kind(&self, other: &Candidate) -> bool {
        match (&self.kind, &other.kind) {
            (CandidateKind::Thinking, CandidateKind::Thinking) => true,
            (CandidateKind::Dialogue(_), CandidateKind::Dialogue(_)) => {
                self.sender() == other.sender()
            }
            _ => false,
        }
    }
}

#[derive(Debug)]
struct Draft {
    sender: Sender,
    container: Option<usize>,
    paragraphs: Vec<String>,
    thinking: Vec<String>,
}

impl TurnSegmenter {
    pub fn new(config: SegmenterConfig) -> Self {
        let rules = config.clone();
        let classifier = MarkupHintClassifier::new(&config.site_profile);

        Self {
            config,
            filter: Box::new(move |text| is_dialogue(text, &rules)),
            classifier: Box::new(classifier),
        }
    }

    /// Replaces the validity filter.
    pub fn with_filter<F>(mut self, filter: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.filter = Box::new(filter);
        self
    }

    pub fn with_classifier<C>(mut self, classifier: C) -> Self
    where
        C: RoleClassifier + Send + Sync + 'static,
    {
        self.classifier = Box::new(classifier);
        self
    }

    pub fn is_valid(&self, text: &str) -> bool {
        (self.filter)(text)
    }

    /// Turns in document order. Role signals from markup are used when any
    /// block has one; otherwise senders alternate starting with the user.
    pub fn segment(&self, blocks: &[MarkupBlock], observer: &dyn ExtractObserver) -> Vec<ChatTurn> {
        let candidates = self.candidates(blocks, observer);
        let candidates = self.collapse_candidates(candidates, observer);
        let drafts = self.group(candidates, observer);

        let mut turns: Vec<ChatTurn> = Vec::new();
        for draft in drafts {
            let Some(turn) = self.finish(draft, observer) else {
                continue;
            };

            if let Some(last) = turns.last_mut()
                && last.sender == turn.sender
                && self.near_duplicate(&last.content, &turn.content)
            {
                let (kept, dropped) = keep_longer(last.clone(), turn);
                observer.on_event(&ExtractEvent::DuplicateCollapsed {
                    kept: kept.content.clone(),
                    dropped: dropped.content,
                });
                let thinking = kept.thinking.clone().or(dropped.thinking);
                *last = ChatTurn { thinking, ..kept };
                continue;
            }
            turns.push(turn);
        }

        for (index, turn) in turns.iter().enumerate() {
            observer.on_event(&ExtractEvent::TurnAccepted {
                index,
                sender: turn.sender,
            });
        }
        turns
    }

    fn candidates(&self, blocks: &[MarkupBlock], observer: &dyn ExtractObserver) -> Vec<Candidate> {
        let thinking_hints = &self.config.site_profile.thinking_hints;
        let markers = &self.config.thinking_markers;
        let mut candidates = Vec::new();

        for block in blocks {
            let text = block.text.trim();
            if text.is_empty() {
                continue;
            }

            let hinted = thinking_hints.iter().any(|hint| block.has_hint(hint));
            let (text, kind) = match thinking::strip_label(text, markers) {
                Some(rest) => (rest, CandidateKind::Thinking),
                None if hinted => (text.to_string(), CandidateKind::Thinking),
                None => (
                    text.to_string(),
                    CandidateKind::Dialogue(self.classifier.classify(block)),
                ),
            };

            if text.is_empty() {
                observer.on_event(&ExtractEvent::BlockRejected {
                    text: block.text.clone(),
                    reason: RejectReason::EmptyContent,
                });
                continue;
            }
            if !self.is_valid(&text) {
                observer.on_event(&ExtractEvent::BlockRejected {
                    text,
                    reason: RejectReason::NotDialogue,
                });
                continue;
            }

            candidates.push(Candidate { text, kind });
        }

        candidates
    }

    /// Collapses adjacent near-duplicates, keeping the longer (or later) one.
    fn collapse_candidates(
        &self,
        candidates: Vec<Candidate>,
        observer: &dyn ExtractObserver,
    ) -> Vec<Candidate> {
        let mut collapsed: Vec<Candidate> = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            if let Some(last) = collapsed.last_mut()
                && last.same_kind(&candidate)
                && self.near_duplicate(&last.text, &candidate.text)
            {
                let dropped = if candidate.text.chars().count() >= last.text.chars().count() {
                    std::mem::replace(last, candidate)
                } else {
                    candidate
                };
                observer.on_event(&ExtractEvent::DuplicateCollapsed {
                    kept: last.text.clone(),
                    dropped: dropped.text,
                });
                continue;
            }
            collapsed.push(candidate);
        }

        collapsed
    }

    fn group(&self, candidates: Vec<Candidate>, observer: &dyn ExtractObserver) -> Vec<Draft> {
        let signalled = candidates
            .iter()
            .any(|candidate| matches!(candidate.kind, CandidateKind::Dialogue(Some(_))));
        let mut drafts: Vec<Draft> = Vec::new();
        let mut pending_thinking: Vec<String> = Vec::new();
        let mut next_sender = Sender::User;

        for candidate in candidates {
            let (sender, container) = match candidate.kind {
                CandidateKind::Thinking => {
                    pending_thinking.push(candidate.text);
                    continue;
                }
                CandidateKind::Dialogue(Some(signal)) if signalled => {
                    (signal.sender, signal.container)
                }
                CandidateKind::Dialogue(_) if signalled => {
                    observer.on_event(&ExtractEvent::BlockRejected {
                        text: candidate.text,
                        reason: RejectReason::NoRoleSignal,
                    });
                    continue;
                }
                CandidateKind::Dialogue(_) => {
                    let sender = next_sender;
                    next_sender = sender.other();
                    (sender, None)
                }
            };

            if sender == Sender::User {
                attach_to_last_assistant(&mut drafts, &mut pending_thinking, observer);
            }

            match drafts.last_mut() {
                Some(last)
                    if container.is_some()
                        && last.sender == sender
                        && last.container == container =>
                {
                    last.paragraphs.push(candidate.text);
                    if sender == Sender::Assistant {
                        last.thinking.append(&mut pending_thinking);
                    }
                }
                _ => {
                    let thinking = if sender == Sender::Assistant {
                        std::mem::take(&mut pending_thinking)
                    } else {
                        Vec::new()
                    };
                    drafts.push(Draft {
                        sender,
                        container,
                        paragraphs: vec![candidate.text],
                        thinking,
                    });
                }
            }
        }

        attach_to_last_assistant(&mut drafts, &mut pending_thinking, observer);
        drafts
    }

    fn finish(&self, draft: Draft, observer: &dyn ExtractObserver) -> Option<ChatTurn> {
        let mut content = draft.paragraphs.join("\n\n");
        let mut thinking = draft.thinking;

        if draft.sender == Sender::Assistant {
            let (remaining, spans) =
                thinking::split_delimited(&content, &self.config.thinking_markers);
            content = remaining;
            thinking.extend(spans);
        }

        if !self.is_valid(&content) {
            let reason = if content.trim().is_empty() {
                RejectReason::EmptyContent
            } else {
                RejectReason::NotDialogue
            };
            observer.on_event(&ExtractEvent::TurnRejected {
                sender: draft.sender,
                reason,
            });
            return None;
        }

        let turn = ChatTurn::new(draft.sender, content);
        Some(if thinking.is_empty() {
            turn
        } else {
            turn.with_thinking(thinking.join("\n\n"))
        })
    }

    /// Equal after whitespace normalization, or one a prefix of the other and
    /// long enough for the match to mean something.
    fn near_duplicate(&self, a: &str, b: &str) -> bool {
        let a = comparable(a);
        let b = comparable(b);
        if a == b {
            return !a.is_empty();
        }

        let (shorter, longer) = if a.chars().count() <= b.chars().count() {
            (&a, &b)
        } else {
            (&b, &a)
        };
        shorter.chars().count() >= self.config.dedup_min_prefix_chars
            && longer.starts_with(shorter.as_str())
    }
}

fn comparable(text: &str) -> String {
    let joined = text.split_whitespace().collect::<Vec<_>>().join(" ");
    joined.trim_end_matches(STREAMING_TAILS).trim_end().to_string()
}

fn keep_longer(earlier: ChatTurn, later: ChatTurn) -> (ChatTurn, ChatTurn) {
    if later.content.chars().count() >= earlier.content.chars().count() {
        (later, earlier)
    } else {
        (earlier, later)
    }
}

fn attach_to_last_assistant(
    drafts: &mut [Draft],
    pending_thinking: &mut Vec<String>,
    observer: &dyn ExtractObserver,
) {
    if pending_thinking.is_empty() {
        return;
    }

    match drafts.last_mut() {
        Some(last) if last.sender == Sender::Assistant => last.thinking.append(pending_thinking),
        _ => {
            for text in pending_thinking.drain(..) {
                observer.on_event(&ExtractEvent::BlockRejected {
                    text,
                    reason: RejectReason::OrphanThinking,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::to_blocks;
    use crate::observer::NoopObserver;
    use std::cell::RefCell;

    fn plain(texts: &[&str]) -> Vec<MarkupBlock> {
        texts.iter().map(|text| MarkupBlock::plain(*text)).collect()
    }

    fn contents(turns: &[ChatTurn]) -> Vec<(Sender, &str)> {
        turns.iter().map(|turn| (turn.sender, turn.content.as_str())).collect()
    }

    #[test]
    fn streaming_partial_collapses_into_final_render() {
        let blocks = plain(&["Hello wor", "Hello world, this is the full answer."]);
        let turns = TurnSegmenter::default().segment(&blocks, &NoopObserver);

        assert_eq!(turns.len(), 1);
        assert_eq!(turns[0].content, "Hello world, this is the full answer.");
    }

    #[test]
    fn exact_duplicates_collapse_after_whitespace_normalization() {
        let seen = RefCell::new(Vec::new());
        let observer = |event: &ExtractEvent| seen.borrow_mut().push(event.clone());
        let blocks = plain(&["How do I sort a list?", "How do I  sort\na list?", "Use sorted()."]);
        let turns = TurnSegmenter::default().segment(&blocks, &observer);

        assert_eq!(
            contents(&turns),
            vec![(Sender::User, "How do I  sort\na list?"), (Sender::Assistant, "Use sorted().")]
        );
        assert!(
            seen.borrow()
                .iter()
                .any(|event| matches!(event, ExtractEvent::DuplicateCollapsed { .. }))
        );
    }

    #[test]
    fn short_prefixes_are_not_duplicates() {
        let blocks = plain(&["Yes", "Yes, go ahead and merge it."]);
        let turns = TurnSegmenter::default().segment(&blocks, &NoopObserver);
        assert_eq!(turns.len(), 2);
    }

    #[test]
    fn roles_alternate_without_markup_signals() {
        let blocks = plain(&["Hi", "Hello there", "Tell me a joke", "Why did the chicken..."]);
        let turns = TurnSegmenter::default().segment(&blocks, &NoopObserver);

        assert_eq!(
            turns.iter().map(|turn| turn.sender).collect::<Vec<_>>(),
            vec![Sender::User, Sender::Assistant, Sender::User, Sender::Assistant]
        );
    }

    #[test]
    fn markup_signals_beat_alternation() {
        let html = r#"<nav><a>New chat</a><p>Recent: pricing</p></nav>
            <div class="user">Hi</div>
            <div class="user">Are you there?</div>
            <div class="assistant"><p>Hello there</p><p>Yes, I am.</p></div>"#;
        let turns = TurnSegmenter::default().segment(&to_blocks(html), &NoopObserver);

        assert_eq!(
            contents(&turns),
            vec![
                (Sender::User, "Hi"),
                (Sender::User, "Are you there?"),
                (Sender::Assistant, "Hello there\n\nYes, I am."),
            ]
        );
    }

    #[test]
    fn blocks_below_threshold_never_become_turns() {
        let segmenter = TurnSegmenter::new(SegmenterConfig {
            min_block_chars: 6,
            ..SegmenterConfig::default()
        });
        let blocks = plain(&["ok", "Hello", "What is Rust?", "A systems language.", "x"]);
        let turns = segmenter.segment(&blocks, &NoopObserver);

        assert!(!turns.is_empty());
        assert!(turns.iter().all(|turn| turn.content.chars().count() >= 6));
    }

    #[test]
    fn boilerplate_is_filtered_before_role_assignment() {
        let blocks = plain(&[
            "Copy",
            "What time is it?",
            "Regenerate",
            "It is noon.",
            "© 2025 Example",
        ]);
        let turns = TurnSegmenter::default().segment(&blocks, &NoopObserver);

        assert_eq!(
            contents(&turns),
            vec![(Sender::User, "What time is it?"), (Sender::Assistant, "It is noon.")]
        );
    }

    #[test]
    fn leaked_markup_and_script_are_not_dialogue() {
        let blocks = plain(&[
            "Why is my build slow?",
            "<link rel=stylesheet href=/app.css>",
            "javascript:void(0)",
            "Try caching dependencies.",
        ]);
        let turns = TurnSegmenter::default().segment(&blocks, &NoopObserver);

        assert_eq!(
            contents(&turns),
            vec![
                (Sender::User, "Why is my build slow?"),
                (Sender::Assistant, "Try caching dependencies."),
            ]
        );

        let permissive = SegmenterConfig {
            markup_leaks: Vec::new(),
            ..SegmenterConfig::default()
        };
        assert!(is_dialogue("javascript:void(0)", &permissive));
    }

    #[test]
    fn injected_filter_replaces_the_default() {
        let segmenter = TurnSegmenter::default().with_filter(|text| !text.contains("ad:"));
        let blocks = plain(&["ad: buy now", "a", "b"]);
        let turns = segmenter.segment(&blocks, &NoopObserver);

        assert_eq!(contents(&turns), vec![(Sender::User, "a"), (Sender::Assistant, "b")]);
    }

    #[test]
    fn delimited_thinking_is_peeled_from_assistant_content() {
        let blocks = plain(&[
            "What is 2 + 2?",
            "<think>Simple arithmetic.</think> 2 + 2 = 4.",
        ]);
        let turns = TurnSegmenter::default().segment(&blocks, &NoopObserver);

        assert_eq!(turns.len(), 2);
        assert_eq!(turns[1].content, "2 + 2 = 4.");
        assert_eq!(turns[1].thinking.as_deref(), Some("Simple arithmetic."));
        assert_eq!(turns[0].thinking, None);
    }

    #[test]
    fn thinking_only_turn_is_dropped() {
        let seen = RefCell::new(Vec::new());
        let observer = |event: &ExtractEvent| seen.borrow_mut().push(event.clone());
        let blocks = plain(&["Question here", "<think>Only musing</think>"]);
        let turns = TurnSegmenter::default().segment(&blocks, &observer);

        assert_eq!(contents(&turns), vec![(Sender::User, "Question here")]);
        assert!(seen.borrow().contains(&ExtractEvent::TurnRejected {
            sender: Sender::Assistant,
            reason: RejectReason::EmptyContent,
        }));
    }

    #[test]
    fn hinted_thinking_blocks_attach_to_the_next_answer() {
        let html = r#"<div class="user-bubble"><p>天气怎么样？</p></div>
            <div class="answer-item">
              <div class="reasoner-think"><p>已深度思考（用时3秒）</p><p>用户在问天气。</p></div>
              <div class="hyc-content-md"><p>今天晴。</p></div>
            </div>"#;
        let turns = TurnSegmenter::default().segment(&to_blocks(html), &NoopObserver);

        assert_eq!(
            contents(&turns),
            vec![(Sender::User, "天气怎么样？"), (Sender::Assistant, "今天晴。")]
        );
        assert_eq!(turns[1].thinking.as_deref(), Some("（用时3秒）\n\n用户在问天气。"));
    }

    #[test]
    fn thinking_before_any_answer_is_orphaned() {
        let seen = RefCell::new(Vec::new());
        let observer = |event: &ExtractEvent| seen.borrow_mut().push(event.clone());
        let blocks = plain(&["思考过程: hmm, nothing to answer"]);
        let turns = TurnSegmenter::default().segment(&blocks, &observer);

        assert!(turns.is_empty());
        assert!(seen.borrow().iter().any(|event| matches!(
            event,
            ExtractEvent::BlockRejected {
                reason: RejectReason::OrphanThinking,
                ..
            }
        )));
    }

    #[test]
    fn accepted_turns_are_reported_in_order() {
        let seen = RefCell::new(Vec::new());
        let observer = |event: &ExtractEvent| {
            if let ExtractEvent::TurnAccepted { index, sender } = event {
                seen.borrow_mut().push((*index, *sender));
            }
        };
        TurnSegmenter::default().segment(&plain(&["Hi", "Hello there"]), &observer);

        assert_eq!(seen.into_inner(), vec![(0, Sender::User), (1, Sender::Assistant)]);
    }

    #[test]
    fn empty_input_yields_no_turns() {
        assert!(TurnSegmenter::default().segment(&[], &NoopObserver).is_empty());
        assert!(
            TurnSegmenter::default()
                .segment(&plain(&["   ", "\n"]), &NoopObserver)
                .is_empty()
        );
    }
}
