use std::sync::LazyLock;

use regex::Regex;
use scraper::node::Node;
use scraper::{Html, Selector};

use super::collapse_whitespace;

static SAVED_FROM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^saved from url=\(\d+\)(\S+)").unwrap());

/// Head-level facts about the page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub url: Option<String>,
}

pub fn extract_metadata(document: &Html) -> PageMetadata {
    PageMetadata {
        title: extract_title(document),
        url: extract_source_url(document),
    }
}

/// Text of the first `<title>`, whitespace-collapsed onto one line.
pub fn extract_title(document: &Html) -> Option<String> {
    let sel = Selector::parse("title").ok()?;
    let el = document.select(&sel).next()?;
    let title = collapse_whitespace(&el.text().collect::<String>()).replace('\n', " ");
    (!title.is_empty()).then_some(title)
}

/// Canonical link, then `og:url`, then the browser's "saved from" comment.
pub fn extract_source_url(document: &Html) -> Option<String> {
    canonical_link(document)
        .or_else(|| og_url(document))
        .or_else(|| saved_from(document))
        .filter(|url| !url.is_empty())
}

fn canonical_link(document: &Html) -> Option<String> {
    let sel = Selector::parse("link[rel][href]").ok()?;
    document.select(&sel).find_map(|el| {
        let rel = el.value().attr("rel")?;
        rel.split_whitespace()
            .any(|token| token.eq_ignore_ascii_case("canonical"))
            .then(|| el.value().attr("href"))
            .flatten()
            .map(|href| href.trim().to_string())
    })
}

fn og_url(document: &Html) -> Option<String> {
    let sel = Selector::parse("meta[content]").ok()?;
    document.select(&sel).find_map(|el| {
        let meta = el.value();
        meta.attr("property")
            .or_else(|| meta.attr("name"))
            .is_some_and(|p| p.eq_ignore_ascii_case("og:url"))
            .then(|| meta.attr("content"))
            .flatten()
            .map(|content| content.trim().to_string())
    })
}

fn saved_from(document: &Html) -> Option<String> {
    document.tree.nodes().find_map(|node| match node.value() {
        Node::Comment(comment) => SAVED_FROM_RE
            .captures(comment.trim())
            .map(|caps| caps[1].to_string()),
        _ => None,
    })
}
