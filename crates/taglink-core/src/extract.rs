//! Tag extraction: which tags a document introduces, and where.
//!
//! Three constructs introduce tags:
//! - heading titles (`# Hello World`),
//! - bold emphasis (`**Ship Wreck**`),
//! - wiki references (`[[target]]` or `[[target|alias]]`, the alias dropped).
//!
//! Nothing inside code, link definitions or the directive line counts.

use crate::rewrite::TagMatcher;
use crate::scan::{scan, Span, SpanKind};
use crate::tag::{normalize_tag, tag_key, Anchor};
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::OnceLock;

fn emphasis_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*([^*\n\x01]+?)\*\*").expect("valid emphasis pattern"))
}

pub(crate) fn wiki_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\[\[([^\[\]\n]+?)\]\]").expect("valid wiki pattern"))
}

fn accept(raw: &str, into: &mut BTreeSet<String>) {
    if let Some(tag) = normalize_tag(raw) {
        into.insert(tag_key(&tag));
    }
}

/// Heading titles, lowercased.
pub fn get_tags_from_headers(text: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for span in scan(text) {
        if let SpanKind::Heading { title, .. } = span.kind {
            accept(&title, &mut tags);
        }
    }
    tags
}

/// Prose as a reader sees it: `[tag][tag]` links collapse to their label,
/// other bracket groups and code become an opaque marker, line constructs
/// become a line break. Linking a document leaves its view unchanged up to
/// case, so emphasis found here is stable across passes.
fn prose_view(spans: &[Span]) -> String {
    let mut view = String::new();
    for span in spans {
        match &span.kind {
            SpanKind::Text => view.push_str(&span.text),
            SpanKind::Link { label } => view.push_str(label),
            SpanKind::Code | SpanKind::Bracket => view.push(OPAQUE),
            _ => view.push('\n'),
        }
    }
    view
}

const OPAQUE: char = '\u{1}';

/// `**bold**` runs in prose, lowercased.
pub fn get_tags_from_emphasis(text: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    let view = prose_view(&scan(text));
    for caps in emphasis_re().captures_iter(&view) {
        accept(&caps[1], &mut tags);
    }
    tags
}

/// `[[wiki]]` targets, lowercased; `[[target|alias]]` yields `target`.
pub fn get_tags_from_wiki(text: &str) -> BTreeSet<String> {
    let mut tags = BTreeSet::new();
    for span in scan(text).iter().filter(|s| s.kind == SpanKind::Bracket) {
        for caps in wiki_re().captures_iter(&span.text) {
            let inner = &caps[1];
            let target = inner.split_once('|').map_or(inner, |(target, _)| target);
            accept(target, &mut tags);
        }
    }
    tags
}

/// Every tag the document introduces.
pub fn extract_tags(text: &str) -> BTreeSet<String> {
    let mut tags = get_tags_from_headers(text);
    tags.extend(get_tags_from_emphasis(text));
    tags.extend(get_tags_from_wiki(text));
    tags
}

fn mentions(span: &Span) -> bool {
    matches!(span.kind, SpanKind::Text | SpanKind::Link { .. } | SpanKind::Bracket)
}

/// Anchor each of `tags` inside `document`.
///
/// A tag with its own heading anchors to that heading. Otherwise it anchors
/// to the nearest heading above its first mention, and failing that to the
/// document itself. Keys of the returned map are lowercase.
pub fn get_tag_headers<'a, I>(document: &str, text: &str, tags: I) -> BTreeMap<String, Anchor>
where
    I: IntoIterator<Item = &'a str>,
{
    let spans = scan(text);

    let mut own_heading: BTreeMap<String, &str> = BTreeMap::new();
    for span in &spans {
        if let SpanKind::Heading { title, .. } = &span.kind {
            own_heading.entry(tag_key(title)).or_insert(title.as_str());
        }
    }

    let mut anchors = BTreeMap::new();
    for tag in tags {
        let key = tag_key(tag);
        if key.is_empty() || anchors.contains_key(&key) {
            continue;
        }
        if let Some(title) = own_heading.get(&key) {
            anchors.insert(key, Anchor::heading(document, title));
            continue;
        }

        let mut anchor = Anchor::document(document);
        if let Some(matcher) = TagMatcher::new(&key) {
            let mut current: Option<&str> = None;
            for span in &spans {
                if let SpanKind::Heading { title, .. } = &span.kind {
                    current = Some(title);
                } else if mentions(span) && matcher.is_match(&span.text) {
                    if let Some(title) = current {
                        anchor = Anchor::heading(document, title);
                    }
                    break;
                }
            }
        }
        anchors.insert(key, anchor);
    }
    anchors
}
