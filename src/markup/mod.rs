pub mod entities;
pub mod metadata;

use std::sync::LazyLock;

use regex::Regex;
use scraper::node::{Element, Node};
use scraper::{ElementRef, Html};

pub use entities::decode_entities;
pub use metadata::{PageMetadata, extract_metadata};

/// Elements whose content is never dialogue.
const NON_CONTENT_ELEMENTS: &[&str] = &["script", "style", "noscript", "template", "svg", "title"];

/// Elements that start a new text block.
const BLOCK_ELEMENTS: &[&str] = &[
    "p", "div", "li", "h1", "h2", "h3", "h4", "h5", "h6", "tr", "td", "th", "section", "article",
    "blockquote", "pre", "ul", "ol", "dl", "dt", "dd", "table", "header", "footer", "main",
    "aside", "nav", "form", "button", "figure", "figcaption", "details", "summary", "body",
];

static NON_CONTENT_RES: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    NON_CONTENT_ELEMENTS
        .iter()
        .map(|name| Regex::new(&format!(r"(?is)<{name}\b[^>]*>.*?</{name}\s*>")).unwrap())
        .collect()
});
static COMMENT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static BREAK_TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?i)</?(?:br|hr|p|div|li|h[1-6]|tr|section|article|blockquote|pre|ul|ol|table",
        r"|header|footer|main|aside|nav)\b[^>]*>",
    ))
    .unwrap()
});
static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[a-zA-Z/!?][^>]*>").unwrap());
static ELEMENT_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?[a-zA-Z][a-zA-Z0-9:-]*(?:[\s/][^>]*)?>").unwrap());
static HSPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").unwrap());
static BLANK_RUN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").unwrap());
static PARAGRAPH_SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

/// One text run from a structural element, with the annotated elements that
/// enclosed it (outermost first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarkupBlock {
    pub text: String,
    pub ancestors: Vec<Ancestor>,
}

/// An enclosing element that carried `class`, `id`, `role` or `data-*`
/// attributes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ancestor {
    /// Position of the element in document order.
    pub serial: usize,
    pub tag: String,
    /// Lower-cased attribute values and their alphanumeric tokens.
    pub hints: Vec<String>,
}

impl Ancestor {
    pub fn has_hint(&self, token: &str) -> bool {
        self.hints.iter().any(|hint| hint.eq_ignore_ascii_case(token))
    }
}

impl MarkupBlock {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ancestors: Vec::new(),
        }
    }

    /// Reflows plain text into blocks, one per blank-line separated paragraph.
    pub fn from_plain_text(text: &str) -> Vec<Self> {
        PARAGRAPH_SPLIT_RE
            .split(text)
            .map(str::trim)
            .filter(|paragraph| !paragraph.is_empty())
            .map(Self::plain)
            .collect()
    }

    pub fn has_hint(&self, token: &str) -> bool {
        self.ancestors.iter().any(|ancestor| ancestor.has_hint(token))
    }
}

/// Whether `text` holds at least one element tag.
pub fn contains_markup(text: &str) -> bool {
    ELEMENT_TAG_RE.is_match(text)
}

fn strip_non_content(markup: &str) -> String {
    let mut cleaned = markup.to_string();
    for re in NON_CONTENT_RES.iter() {
        cleaned = re.replace_all(&cleaned, "").into_owned();
    }
    COMMENT_RE.replace_all(&cleaned, "").into_owned()
}

/// Markup to plain text. Block boundaries become line breaks before the
/// remaining tags are stripped.
pub fn to_plain_text(markup: &str) -> String {
    let cleaned = strip_non_content(markup);
    let marked = BREAK_TAG_RE.replace_all(&cleaned, "\n");
    let stripped = TAG_RE.replace_all(&marked, "");
    let decoded = decode_entities(&stripped);
    collapse_whitespace(&decoded)
}

/// Collapses horizontal whitespace per line, trims lines, and limits blank
/// line runs to one.
pub fn collapse_whitespace(text: &str) -> String {
    let unified = text.replace("\r\n", "\n").replace('\r', "\n");
    let lines: Vec<String> = unified
        .split('\n')
        .map(|line| HSPACE_RE.replace_all(line, " ").trim().to_string())
        .collect();
    let joined = lines.join("\n");
    BLANK_RUN_RE.replace_all(&joined, "\n\n").trim().to_string()
}

/// Parses `markup` and emits one block per structural run of text.
pub fn to_blocks(markup: &str) -> Vec<MarkupBlock> {
    document_blocks(&Html::parse_document(markup))
}

pub fn document_blocks(document: &Html) -> Vec<MarkupBlock> {
    let mut walker = BlockWalker::default();
    walker.visit(document.root_element());
    walker.flush();
    walker.blocks
}

#[derive(Default)]
struct BlockWalker {
    blocks: Vec<MarkupBlock>,
    /// Annotated elements enclosing the current position, outermost first.
    stack: Vec<Ancestor>,
    run: String,
    serial: usize,
    pre_depth: usize,
}

impl BlockWalker {
    fn visit(&mut self, element: ElementRef<'_>) {
        let name = element.value().name();
        let serial = self.serial;
        self.serial += 1;

        if name == "br" || name == "hr" {
            self.run.push('\n');
            return;
        }
        if NON_CONTENT_ELEMENTS.contains(&name) {
            return;
        }

        let block = BLOCK_ELEMENTS.contains(&name);
        if block {
            self.flush();
        }

        let hints = hint_tokens(element.value());
        let annotated = !hints.is_empty();
        if annotated {
            self.stack.push(Ancestor {
                serial,
                tag: name.to_string(),
                hints,
            });
        }
        let preformatted = name == "pre";
        if preformatted {
            self.pre_depth += 1;
        }

        for child in element.children() {
            match child.value() {
                Node::Text(text) => self.append(text),
                Node::Element(_) => {
                    if let Some(child) = ElementRef::wrap(child) {
                        self.visit(child);
                    }
                }
                _ => {}
            }
        }

        if block {
            self.flush();
        }
        if preformatted {
            self.pre_depth -= 1;
        }
        if annotated {
            self.stack.pop();
        }
    }

    fn append(&mut self, text: &str) {
        if self.pre_depth > 0 {
            self.run.push_str(text);
        } else {
            self.run
                .extend(text.chars().map(|c| if c == '\n' || c == '\r' { ' ' } else { c }));
        }
    }

    fn flush(&mut self) {
        let run = std::mem::take(&mut self.run);
        let text = run
            .replace("\r\n", "\n")
            .split('\n')
            .map(|line| HSPACE_RE.replace_all(line, " ").trim().to_string())
            .filter(|line| !line.is_empty())
            .collect::<Vec<_>>()
            .join("\n");
        if text.is_empty() {
            return;
        }

        self.blocks.push(MarkupBlock {
            text,
            ancestors: self.stack.clone(),
        });
    }
}

fn hint_tokens(element: &Element) -> Vec<String> {
    let mut hints: Vec<String> = Vec::new();

    for (name, value) in element.attrs() {
        let relevant = matches!(name, "class" | "id" | "role") || name.starts_with("data-");
        if !relevant || value.trim().is_empty() {
            continue;
        }

        let value = value.to_lowercase();
        for word in value.split_whitespace() {
            push_unique(&mut hints, word);
            for token in word.split(|c: char| !c.is_alphanumeric()) {
                if !token.is_empty() {
                    push_unique(&mut hints, token);
                }
            }
        }
    }

    hints
}

fn push_unique(hints: &mut Vec<String>, value: &str) {
    if !hints.iter().any(|existing| existing == value) {
        hints.push(value.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_removes_scripts_styles_and_comments() {
        let html = "<head><title>T</title><style>p { color: red }</style></head>\
                    <body><!-- note --><p>Content</p><script>evil();</script><p>More</p></body>";
        assert_eq!(to_plain_text(html), "Content\n\nMore");
    }

    #[test]
    fn block_boundaries_survive_tag_stripping() {
        let html = "<div>one</div><div>two<br>three</div><span>four</span><span>five</span>";
        assert_eq!(to_plain_text(html), "one\n\ntwo\nthree\nfourfive");
    }

    #[test]
    fn entities_are_decoded_after_tags_are_stripped() {
        assert_eq!(to_plain_text("<p>A &amp; B &#8217; C</p>"), "A & B \u{2019} C");
        assert_eq!(to_plain_text("<p>&lt;think&gt;</p>"), "<think>");
    }

    #[test]
    fn whitespace_is_collapsed() {
        let text = "  a \t  b  \n\n\n\n\n   c\u{a0}\u{a0}d ";
        assert_eq!(collapse_whitespace(text), "a b\n\nc d");
    }

    #[test]
    fn normalization_is_idempotent_on_plain_text() {
        let once = to_plain_text("<h1>Title</h1>\n<p>First   paragraph</p>\n\n\n<p>Second</p>");
        assert_eq!(to_plain_text(&once), once);
        assert_eq!(to_plain_text("already plain\n\ntext"), "already plain\n\ntext");
    }

    #[test]
    fn blocks_carry_annotated_ancestors() {
        let html = concat!(
            r#"<body class="app"><div class="msg user-turn" data-id="7">"#,
            r#"<p>Hi <b>there</b></p></div><div id="answer">Hello</div></body>"#,
        );
        let blocks = to_blocks(html);

        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "Hi there");
        assert!(blocks[0].has_hint("user-turn"));
        assert!(blocks[0].has_hint("user"));
        assert!(blocks[0].has_hint("7"));
        assert!(blocks[0].has_hint("app"));
        assert_eq!(blocks[0].ancestors.len(), 2);
        assert_eq!(blocks[0].ancestors[1].tag, "div");

        assert_eq!(blocks[1].text, "Hello");
        assert!(blocks[1].has_hint("answer"));
        assert!(!blocks[1].has_hint("user"));
    }

    #[test]
    fn sibling_containers_have_distinct_serials() {
        let blocks = to_blocks(r#"<div class="a">x1</div><div class="a">x2</div>"#);
        assert_eq!(blocks.len(), 2);
        assert_ne!(blocks[0].ancestors[0].serial, blocks[1].ancestors[0].serial);
    }

    #[test]
    fn line_breaks_stay_inside_one_block() {
        let blocks = to_blocks("<p>line one<br/>line   two\n continues</p>");
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "line one\nline two continues");
    }

    #[test]
    fn preformatted_text_keeps_line_breaks() {
        let blocks = to_blocks("<pre>fn main() {\n    run();\n}</pre>");
        assert_eq!(blocks[0].text, "fn main() {\nrun();\n}");
    }

    #[test]
    fn attributes_with_angle_brackets_do_not_break_tags() {
        let blocks = to_blocks(r#"<div title="a > b" class="x">text</div>"#);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].text, "text");
        assert!(blocks[0].has_hint("x"));
    }

    #[test]
    fn unclosed_paragraphs_and_entities_are_handled_by_the_parser() {
        let blocks = to_blocks("<div class=\"msg\"><p>Tom &amp; Jerry<p>second &lt;b&gt;</div>");
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();

        assert_eq!(texts, vec!["Tom & Jerry", "second <b>"]);
        assert!(blocks.iter().all(|block| block.has_hint("msg")));
    }

    #[test]
    fn plain_text_reflows_into_paragraph_blocks() {
        let blocks =
            MarkupBlock::from_plain_text("first\n\n  second line\nstill second \n \nthird");
        let texts: Vec<&str> = blocks.iter().map(|b| b.text.as_str()).collect();
        assert_eq!(texts, vec!["first", "second line\nstill second", "third"]);
    }

    #[test]
    fn markup_detection_needs_an_element() {
        assert!(contains_markup("<html><body>x</body></html>"));
        assert!(contains_markup("text <br> more"));
        assert!(!contains_markup("just some text\nwithout structure"));
        assert!(!contains_markup("a < b and c > d"));
        assert!(!contains_markup("<!-- only a comment -->"));
    }
}
