//! Link rewriter: turns every in-text mention of a known tag into a
//! `[tag][tag]` reference link and keeps the matching `[tag]: target`
//! definitions present.
//!
//! Disambiguation is longest-match-first. Tags are tried in order of
//! descending length, and each claimed occurrence becomes an opaque
//! [`Piece::Claimed`] that shorter tags cannot see. With both "hello world" and
//! "world" known, "hello world" is claimed whole before "world" is tried.
//!
//! Existing `[tag][tag]` links are recognized by the scanner and never
//! re-linked, so running the rewriter on its own output is a no-op.

use crate::error::{Result, TagError};
use crate::origin::Origins;
use crate::scan::{line_content, parse_definition, scan, Span, SpanKind};
use crate::tag::tag_key;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::ops::Range;

/// Case-insensitive finder for one tag, with word-boundary and file-name
/// exclusions.
#[derive(Debug, Clone)]
pub struct TagMatcher {
    key: String,
    regex: Regex,
    starts_word: bool,
    ends_word: bool,
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

impl TagMatcher {
    pub fn new(tag: &str) -> Option<Self> {
        let key = tag_key(tag);
        if key.is_empty() {
            return None;
        }
        let regex = Regex::new(&format!("(?i){}", regex::escape(&key))).ok()?;
        Some(Self {
            starts_word: key.chars().next().is_some_and(is_word_char),
            ends_word: key.chars().next_back().is_some_and(is_word_char),
            key,
            regex,
        })
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// First acceptable occurrence at or after byte offset `from`.
    pub fn find_at(&self, text: &str, from: usize) -> Option<Range<usize>> {
        let mut pos = from;
        while pos <= text.len() {
            let m = self.regex.find_at(text, pos)?;
            if self.accepts(text, m.start(), m.end()) {
                return Some(m.range());
            }
            pos = m.start() + text[m.start()..].chars().next().map_or(1, char::len_utf8);
        }
        None
    }

    pub fn is_match(&self, text: &str) -> bool {
        self.find_at(text, 0).is_some()
    }

    fn accepts(&self, text: &str, start: usize, end: usize) -> bool {
        let before = text[..start].chars().next_back();
        let mut after = text[end..].chars();
        let next = after.next();

        if self.starts_word && before.is_some_and(is_word_char) {
            return false;
        }
        // A link rendered here would not scan back as a link.
        if matches!(before, Some(']' | '\\')) {
            return false;
        }
        if self.ends_word && next.is_some_and(is_word_char) {
            return false;
        }
        // `tag.md`: a file name, not a mention.
        if next == Some('.') && after.next().is_some_and(|c| c.is_ascii_alphanumeric()) {
            return false;
        }
        true
    }
}

/// Matchers for `tags`, longest first, ties broken by key.
pub fn matchers_longest_first<'a, I>(tags: I) -> Vec<TagMatcher>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut matchers: Vec<TagMatcher> = tags.into_iter().filter_map(TagMatcher::new).collect();
    matchers.sort_by(|a, b| {
        b.key
            .chars()
            .count()
            .cmp(&a.key.chars().count())
            .then_with(|| a.key.cmp(&b.key))
    });
    matchers.dedup_by(|a, b| a.key == b.key);
    matchers
}

/// A run of prose after claiming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Piece {
    Plain(String),
    /// An occurrence owned by the tag `key`; `text` is the matched source.
    Claimed { key: String, text: String },
}

/// Split prose into plain runs and claimed occurrences, trying `matchers` in
/// order. Claimed text is never revisited.
pub fn claim(text: &str, matchers: &[TagMatcher]) -> Vec<Piece> {
    let mut pieces = vec![Piece::Plain(text.to_string())];
    for matcher in matchers {
        let mut next = Vec::with_capacity(pieces.len());
        for piece in pieces {
            match piece {
                Piece::Plain(s) => split_plain(&s, matcher, &mut next),
                claimed => next.push(claimed),
            }
        }
        pieces = next;
    }
    pieces
}

fn split_plain(s: &str, matcher: &TagMatcher, out: &mut Vec<Piece>) {
    let mut last = 0;
    let mut pos = 0;
    while let Some(range) = matcher.find_at(s, pos) {
        if range.start > last {
            out.push(Piece::Plain(s[last..range.start].to_string()));
        }
        out.push(Piece::Claimed {
            key: matcher.key.clone(),
            text: s[range.clone()].to_string(),
        });
        last = range.end;
        pos = range.end;
    }
    if last < s.len() || (last == 0 && s.is_empty()) {
        out.push(Piece::Plain(s[last..].to_string()));
    }
}

/// Result of rewriting one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rewrite {
    pub text: String,
    /// Keys of every tag that ends up linked in the document.
    pub linked: BTreeSet<String>,
    /// Occurrences turned into links by this call.
    pub links_added: usize,
    /// Definition lines appended to the trailing block.
    pub definitions_appended: usize,
    /// Definition lines whose target was corrected in place.
    pub definitions_updated: usize,
}

enum Item {
    Keep(Span),
    Plain(String),
    Link(String),
}

/// Rewrite `text` (the content of `document`) so every mention of a tag in
/// `origins` is a reference link with a local definition.
///
/// Fails with [`TagError::PreconditionViolation`] when the document carries
/// no declaration directive: the caller is expected to run the declaration
/// synchronizer first.
pub fn add_links_from_list(document: &str, text: &str, origins: &Origins) -> Result<Rewrite> {
    let spans = scan(text);
    if !spans.iter().any(|s| s.kind == SpanKind::Directive) {
        return Err(TagError::PreconditionViolation {
            document: document.to_string(),
            reason: "no tag declaration directive; declare tags before linking".to_string(),
        });
    }

    let matchers = matchers_longest_first(origins.keys());
    let mut items = Vec::with_capacity(spans.len());
    let mut links_added = 0usize;

    for span in spans {
        let known_link = match &span.kind {
            SpanKind::Link { label } if origins.get(label).is_some() => Some(tag_key(label)),
            _ => None,
        };
        if span.is_text() {
            for piece in claim(&span.text, &matchers) {
                match piece {
                    Piece::Plain(s) => items.push(Item::Plain(s)),
                    Piece::Claimed { key, .. } => {
                        links_added += 1;
                        items.push(Item::Link(key));
                    }
                }
            }
        } else if let Some(key) = known_link {
            items.push(Item::Link(key));
        } else {
            items.push(Item::Keep(span));
        }
    }

    let linked: BTreeSet<String> = items
        .iter()
        .filter_map(|item| match item {
            Item::Link(key) => Some(key.clone()),
            _ => None,
        })
        .collect();

    // Expected definition target per linked tag, seen from this document.
    let expected: BTreeMap<&str, (String, String)> = linked
        .iter()
        .filter_map(|key| {
            origins
                .get(key)
                .map(|o| (key.as_str(), (o.display.clone(), o.anchor.target_from(document))))
        })
        .collect();

    // Which linked tags already have a definition, and which need fixing.
    let mut satisfied: BTreeSet<String> = BTreeSet::new();
    let mut defined: BTreeSet<String> = BTreeSet::new();
    for item in &items {
        if let Item::Keep(span) = item {
            if let SpanKind::Definition { label, target } = &span.kind {
                let key = tag_key(label);
                if let Some((_, want)) = expected.get(key.as_str()) {
                    defined.insert(key.clone());
                    if want == target {
                        satisfied.insert(key);
                    }
                }
            }
        }
    }

    let mut out = String::with_capacity(text.len() + 64);
    let mut fixed: BTreeSet<String> = BTreeSet::new();
    for item in &items {
        match item {
            Item::Plain(s) => out.push_str(s),
            Item::Link(key) => {
                let display = origins.get(key).map_or(key.as_str(), |o| o.display.as_str());
                out.push_str(&format!("[{display}][{display}]"));
            }
            Item::Keep(span) => match &span.kind {
                SpanKind::Definition { label, .. } => {
                    let key = tag_key(label);
                    match expected.get(key.as_str()) {
                        Some((display, want))
                            if !satisfied.contains(&key) && !fixed.contains(&key) =>
                        {
                            let ending = &span.text[line_content(&span.text).len()..];
                            out.push_str(&format!("[{display}]: {want}{ending}"));
                            fixed.insert(key);
                        }
                        _ => out.push_str(&span.text),
                    }
                }
                _ => out.push_str(&span.text),
            },
        }
    }

    let missing: Vec<String> = expected
        .iter()
        .filter(|(key, _)| !defined.contains(**key))
        .map(|(_, (display, want))| format!("[{display}]: {want}"))
        .collect();
    let definitions_appended = missing.len();
    let text = append_definitions(out, &missing);

    Ok(Rewrite {
        text,
        linked,
        links_added,
        definitions_appended,
        definitions_updated: fixed.len(),
    })
}

/// Append definition lines as a trailing block, separated from prose by a
/// blank line (or directly after an existing trailing definition block).
fn append_definitions(mut text: String, lines: &[String]) -> String {
    if lines.is_empty() {
        return text;
    }
    if !text.is_empty() && !text.ends_with('\n') {
        text.push('\n');
    }
    let last_line = text.lines().next_back().unwrap_or("");
    let in_definition_block = parse_definition(last_line).is_some();
    if !text.is_empty() && !in_definition_block && !text.ends_with("\n\n") {
        text.push('\n');
    }
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    text
}

/// Keys of tags linked as `[tag][tag]` in `text`.
pub fn linked_tags(text: &str) -> BTreeSet<String> {
    scan(text)
        .into_iter()
        .filter_map(|s| match s.kind {
            SpanKind::Link { label } => Some(tag_key(&label)),
            _ => None,
        })
        .collect()
}

/// Keys of tags with a `[tag]: target` definition line in `text`.
pub fn defined_labels(text: &str) -> BTreeSet<String> {
    scan(text)
        .into_iter()
        .filter_map(|s| match s.kind {
            SpanKind::Definition { label, .. } => Some(tag_key(&label)),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::Anchor;

    fn origins(entries: &[(&str, &str, Option<&str>)]) -> Origins {
        let mut o = Origins::default();
        for (tag, doc, heading) in entries {
            let anchor = match heading {
                Some(h) => Anchor::heading(*doc, h),
                None => Anchor::document(*doc),
            };
            o.insert(tag, anchor);
        }
        o
    }

    fn hello_world() -> Origins {
        origins(&[
            ("hello world", "defs.md", Some("hello world")),
            ("world", "defs.md", Some("world")),
        ])
    }

    #[test]
    fn longest_match_wins() {
        let text = "[tags]:# (doc, )\nhello world is not just world";
        let out = add_links_from_list("doc.md", text, &hello_world()).unwrap();
        assert!(out
            .text
            .contains("[hello world][hello world] is not just [world][world]"));
        assert!(!out.text.contains("[hello ]"));
        assert!(out.text.contains("[hello world]: defs.md#hello-world\n"));
        assert!(out.text.contains("[world]: defs.md#world\n"));
        assert_eq!(out.links_added, 2);
        assert_eq!(out.definitions_appended, 2);
    }

    #[test]
    fn rewriting_is_idempotent() {
        let text = "[tags]:# (doc, )\n\nHello World and world, again world.\n";
        let once = add_links_from_list("doc.md", text, &hello_world()).unwrap();
        let twice = add_links_from_list("doc.md", &once.text, &hello_world()).unwrap();
        assert_eq!(once.text, twice.text);
        assert_eq!(twice.links_added, 0);
        assert_eq!(twice.definitions_appended, 0);
        assert_eq!(once.linked, twice.linked);
    }

    #[test]
    fn requires_a_directive() {
        let err = add_links_from_list("doc.md", "no directive here", &hello_world()).unwrap_err();
        assert!(matches!(err, TagError::PreconditionViolation { .. }));
    }

    #[test]
    fn headings_brackets_and_file_names_are_left_alone() {
        let o = origins(&[("alpha", "a.md", Some("alpha"))]);
        let text = "[tags]:# ()\n# alpha\nsee alpha.md and [alpha](x.md) and [[alpha]] and `alpha`\n";
        let out = add_links_from_list("b.md", text, &o).unwrap();
        assert!(out.text.contains("# alpha\n"));
        assert!(out.text.contains("see alpha.md and [alpha](x.md) and [[alpha]] and `alpha`"));
        assert!(out.linked.is_empty());
        assert_eq!(out.text, text);
    }

    #[test]
    fn word_boundaries_and_sentence_punctuation() {
        let o = origins(&[("alpha", "a.md", None)]);
        let text = "[tags]:# ()\nalphabet, alpha. Alpha!\n";
        let out = add_links_from_list("b.md", text, &o).unwrap();
        assert!(out.text.contains("alphabet, [alpha][alpha]. [alpha][alpha]!"));
        assert!(out.text.ends_with("\n\n[alpha]: a.md\n"));
    }

    #[test]
    fn punctuation_tags_match() {
        let o = origins(&[("c++", "c++.md", Some("c++"))]);
        let text = "[tags]:# (doc, )\n# Doc\nC++ is mentioned here";
        let out = add_links_from_list("doc.md", text, &o).unwrap();
        assert!(out.text.contains("[c++][c++] is mentioned here"));
        assert!(out.text.contains("\n[c++]: c++.md#c++\n"));
    }

    #[test]
    fn stale_definition_is_corrected_in_place() {
        let o = origins(&[("alpha", "a.md", Some("alpha"))]);
        let text = "[tags]:# ()\nsee [alpha][alpha]\n\n[alpha]: old.md#alpha\n";
        let out = add_links_from_list("b.md", text, &o).unwrap();
        assert_eq!(out.text, "[tags]:# ()\nsee [alpha][alpha]\n\n[alpha]: a.md#alpha\n");
        assert_eq!(out.definitions_updated, 1);
        assert_eq!(out.definitions_appended, 0);
    }

    #[test]
    fn existing_links_are_normalized_to_display_form() {
        let mut o = Origins::default();
        o.insert("Hello World", Anchor::heading("a.md", "Hello World"));
        let text = "[tags]:# ()\nsee [hello world][HELLO WORLD]\n";
        let out = add_links_from_list("b.md", text, &o).unwrap();
        assert!(out.text.contains("see [Hello World][Hello World]\n"));
        assert!(out.text.contains("[Hello World]: a.md#hello-world"));
    }

    #[test]
    fn directive_line_is_never_linked() {
        let o = origins(&[("alpha", "a.md", None)]);
        let text = "[tags]:# (alpha, )\n\nalpha\n";
        let out = add_links_from_list("a.md", text, &o).unwrap();
        assert!(out.text.starts_with("[tags]:# (alpha, )\n\n[alpha][alpha]\n"));
    }

    #[test]
    fn nested_documents_get_relative_targets() {
        let o = origins(&[("alpha", "notes/a.md", Some("alpha"))]);
        let text = "[tags]:# ()\nalpha\n";
        let out = add_links_from_list("journal/2024/b.md", text, &o).unwrap();
        assert!(out.text.contains("[alpha]: ../../notes/a.md#alpha"));
    }

    #[test]
    fn occurrences_glued_to_brackets_are_skipped() {
        let o = origins(&[("alpha", "a.md", None)]);
        let text = "[tags]:# ()\n[[wiki]]alpha and \\alpha\n";
        let out = add_links_from_list("b.md", text, &o).unwrap();
        assert_eq!(out.text, text);
    }

    #[test]
    fn claim_respects_order() {
        let matchers = matchers_longest_first(["world", "hello world"]);
        assert_eq!(matchers[0].key(), "hello world");
        let pieces = claim("hello world world", &matchers);
        let claimed: Vec<_> = pieces
            .iter()
            .filter_map(|p| match p {
                Piece::Claimed { key, .. } => Some(key.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(claimed, vec!["hello world", "world"]);
    }
}
