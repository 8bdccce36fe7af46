pub mod headers;
pub mod transfer;

use std::sync::LazyLock;

use regex::Regex;

use crate::observer::ExtractObserver;
pub use headers::{ContentType, Headers};
pub use transfer::{SourceEncoding, TransferEncoding};

static HEADER_LINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9-]*:").unwrap());

#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("Archive has no multipart boundary")]
    MalformedArchive,
    #[error("Archive contains no HTML document")]
    NoDocumentFound,
}

/// A single-file web archive: top-level headers plus the multipart body.
#[derive(Debug)]
pub struct Archive<'a> {
    headers: Headers,
    body: &'a str,
    source: SourceEncoding,
}

impl<'a> Archive<'a> {
    pub fn parse(text: &'a str, source: SourceEncoding) -> Self {
        let starts_with_header = text
            .lines()
            .next()
            .is_some_and(|line| HEADER_LINE_RE.is_match(line));

        if !starts_with_header {
            return Self {
                headers: Headers::default(),
                body: text,
                source,
            };
        }

        let (head, body) = split_at_blank_line(text);
        Self {
            headers: Headers::parse(head),
            body,
            source,
        }
    }

    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Raw parts in document order. A non-multipart archive is a single part.
    pub fn parts(&self) -> Result<Parts<'a>, ArchiveError> {
        match self.headers.content_type() {
            Some(content_type) if content_type.is_multipart() => content_type
                .param("boundary")
                .map(|boundary| Parts::multipart(self.body, boundary))
                .ok_or(ArchiveError::MalformedArchive),
            Some(_) => Ok(Parts::single(RawPart {
                headers: self.headers.clone(),
                body: self.body,
            })),
            None => Err(ArchiveError::MalformedArchive),
        }
    }

    pub fn document(&self, observer: &dyn ExtractObserver) -> Result<DecodedPart, ArchiveError> {
        locate_document(self.parts()?, self.source, observer)
    }
}

/// Splits at the first blank line. Without one, everything is head.
fn split_at_blank_line(text: &str) -> (&str, &str) {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']).is_empty() {
            return (&text[..offset], &text[offset + line.len()..]);
        }
        offset += line.len();
    }
    (text, "")
}

/// Undecoded part: headers and the transfer-encoded body.
#[derive(Debug, Clone)]
pub struct RawPart<'a> {
    pub headers: Headers,
    pub body: &'a str,
}

impl<'a> RawPart<'a> {
    pub fn parse(text: &'a str) -> Self {
        let (head, body) = split_at_blank_line(text);
        Self {
            headers: Headers::parse(head),
            body,
        }
    }

    pub fn content_type(&self) -> ContentType {
        self.headers
            .content_type()
            .unwrap_or_else(|| ContentType::parse("text/plain"))
    }

    pub fn decode(&self, source: SourceEncoding, observer: &dyn ExtractObserver) -> DecodedPart {
        let content_type = self.content_type();
        let charset = content_type.param("charset").map(str::to_string);
        let encoding = TransferEncoding::from_header(self.headers.get("content-transfer-encoding"));

        let bytes = transfer::decode_body(self.body, encoding, source, observer);
        let text = transfer::decode_charset(bytes, charset.as_deref(), observer);

        DecodedPart {
            content_type: content_type.mime,
            charset,
            location: self.headers.get("content-location").map(str::to_string),
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedPart {
    pub content_type: String,
    pub charset: Option<String>,
    pub location: Option<String>,
    pub text: String,
}

/// Lazy iterator over the parts of an archive body.
#[derive(Debug)]
pub struct Parts<'a> {
    rest: &'a str,
    delimiter: String,
    closing: String,
    pending: Option<RawPart<'a>>,
    done: bool,
}

impl<'a> Parts<'a> {
    pub fn multipart(body: &'a str, boundary: &str) -> Self {
        let mut parts = Self {
            rest: body,
            delimiter: format!("--{boundary}"),
            closing: format!("--{boundary}--"),
            pending: None,
            done: false,
        };

        // Skip the preamble.
        match parts.next_delimiter() {
            Some((_, after, closing)) => {
                parts.rest = after;
                parts.done = closing;
            }
            None => parts.done = true,
        }

        parts
    }

    fn single(part: RawPart<'a>) -> Self {
        Self {
            rest: "",
            delimiter: String::new(),
            closing: String::new(),
            pending: Some(part),
            done: true,
        }
    }

    /// Next delimiter line: (text before it, text after it, is closing).
    fn next_delimiter(&self) -> Option<(&'a str, &'a str, bool)> {
        let rest: &'a str = self.rest;
        let mut offset = 0;

        for line in rest.split_inclusive('\n') {
            let trimmed = line.trim_end_matches(['\r', '\n', ' ', '\t']);
            if trimmed == self.closing || trimmed == self.delimiter {
                let after = &rest[offset + line.len()..];
                return Some((&rest[..offset], after, trimmed == self.closing));
            }
            offset += line.len();
        }

        None
    }
}

impl<'a> Iterator for Parts<'a> {
    type Item = RawPart<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(part) = self.pending.take() {
            return Some(part);
        }

        while !self.done {
            let (content, after, closing) = match self.next_delimiter() {
                Some(found) => found,
                None => (self.rest, "", true),
            };
            self.rest = after;
            self.done = closing;

            // The line break before a delimiter belongs to the delimiter.
            let content = content
                .strip_suffix("\r\n")
                .or_else(|| content.strip_suffix('\n'))
                .unwrap_or(content);
            if content.trim().is_empty() {
                continue;
            }
            return Some(RawPart::parse(content));
        }

        None
    }
}

/// Decodes the first text/html part; other parts are skipped undecoded.
pub fn locate_document<'a>(
    parts: impl IntoIterator<Item = RawPart<'a>>,
    source: SourceEncoding,
    observer: &dyn ExtractObserver,
) -> Result<DecodedPart, ArchiveError> {
    parts
        .into_iter()
        .find(|part| part.content_type().is_html())
        .map(|part| part.decode(source, observer))
        .ok_or(ArchiveError::NoDocumentFound)
}
