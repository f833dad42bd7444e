//! The `[tags]:# (a, b, )` declaration directive and the synchronizer that
//! keeps it in step with the tags found in a document.
//!
//! The directive only ever grows here: [`add_tags`] merges, it never drops a
//! declared tag. Removal is explicit and lives with the rename transaction.

use crate::scan::{line_content, scan, SpanKind};
use crate::tag::tag_key;
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

const DIRECTIVE_PREFIX: &str = "[tags]:#";

fn directive_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^\[tags\]:#[ \t]*\((.*)\)$").expect("valid directive pattern"))
}

/// Parsed declaration directive: a set of tags, unique by lowercase key, each
/// remembering the display form it was first declared with.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Directive {
    tags: BTreeMap<String, String>,
}

/// What a single line holds, directive-wise.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DirectiveLine {
    Declared(Directive),
    /// Starts with `[tags]:#` but does not parse.
    Malformed,
    Absent,
}

pub fn classify_directive_line(content: &str) -> DirectiveLine {
    let line = content.trim_end();
    if !line.starts_with(DIRECTIVE_PREFIX) {
        return DirectiveLine::Absent;
    }
    match directive_re().captures(line).and_then(|c| c.get(1)) {
        Some(list) => DirectiveLine::Declared(Directive::parse_list(list.as_str())),
        None => DirectiveLine::Malformed,
    }
}

impl Directive {
    pub fn new() -> Self {
        Self::default()
    }

    fn parse_list(list: &str) -> Self {
        let mut directive = Self::new();
        for tag in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            directive.insert(tag);
        }
        directive
    }

    pub fn from_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut directive = Self::new();
        for tag in tags {
            directive.insert(tag.as_ref());
        }
        directive
    }

    /// Adds a tag; returns false when its key was already declared (the
    /// existing display form is kept).
    pub fn insert(&mut self, tag: &str) -> bool {
        let display = tag.trim();
        if display.is_empty() {
            return false;
        }
        let key = tag_key(display);
        if self.tags.contains_key(&key) {
            return false;
        }
        self.tags.insert(key, display.to_string());
        true
    }

    pub fn merge(&mut self, other: &Directive) {
        for display in other.tags.values() {
            self.insert(display);
        }
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains_key(&tag_key(tag))
    }

    pub fn remove(&mut self, tag: &str) -> Option<String> {
        self.tags.remove(&tag_key(tag))
    }

    /// Replace `old` by `new`; no-op when `old` is not declared.
    pub fn rename(&mut self, old: &str, new: &str) -> bool {
        if self.remove(old).is_some() {
            self.insert(new);
            true
        } else {
            false
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    /// Lowercase keys, sorted.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    /// Display forms, sorted by key.
    pub fn displays(&self) -> impl Iterator<Item = &str> {
        self.tags.values().map(String::as_str)
    }

    /// `(key, display)` pairs sorted by key.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.tags.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Canonical single-line form: sorted, comma-space separated, trailing
    /// comma, `[tags]:# ()` when empty.
    pub fn render(&self) -> String {
        let mut line = String::from("[tags]:# (");
        for display in self.displays() {
            line.push_str(display);
            line.push_str(", ");
        }
        line.push(')');
        line
    }
}

/// Parse a single directive line; `None` when it is absent or malformed.
pub fn parse_directive(line: &str) -> Option<Directive> {
    match classify_directive_line(line_content(line)) {
        DirectiveLine::Declared(d) => Some(d),
        _ => None,
    }
}

/// Union of every well-formed directive in `text`, or `None` when the
/// document has none.
pub fn read_directive(text: &str) -> Option<Directive> {
    let mut found: Option<Directive> = None;
    for span in scan(text) {
        if span.kind != SpanKind::Directive {
            continue;
        }
        if let DirectiveLine::Declared(d) = classify_directive_line(line_content(&span.text)) {
            found.get_or_insert_with(Directive::new).merge(&d);
        }
    }
    found
}

/// Tags declared in `text`; a missing or malformed directive reads as empty.
pub fn declared_tags(text: &str) -> Directive {
    read_directive(text).unwrap_or_default()
}

/// Lines that look like a directive but fail to parse.
pub fn malformed_directives(text: &str) -> Vec<String> {
    scan(text)
        .into_iter()
        .filter(|s| s.kind == SpanKind::MalformedDirective)
        .map(|s| line_content(&s.text).to_string())
        .collect()
}

/// Declared tags of `text` merged with `tags`, without touching the text.
pub fn combine_tags<I, S>(tags: I, text: &str) -> Directive
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut directive = declared_tags(text);
    for tag in tags {
        directive.insert(tag.as_ref());
    }
    directive
}

/// Whether the declared tag set of `text` equals `tags` (case-insensitive).
pub fn check_tags<I, S>(tags: I, text: &str) -> bool
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let expected = Directive::from_tags(tags);
    let declared = declared_tags(text);
    expected.keys().eq(declared.keys())
}

/// Merge `tags` into the document's directive.
///
/// An existing directive is replaced in place; further directives are folded
/// into the first and removed. Without one, a fresh directive and a blank line
/// are inserted at the top.
pub fn add_tags<I, S>(tags: I, text: &str) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    write_directive(text, |directive| {
        for tag in tags {
            directive.insert(tag.as_ref());
        }
    })
}

/// Rewrite the document's directive through `edit`, applying the same
/// placement rules as [`add_tags`].
pub fn write_directive(text: &str, edit: impl FnOnce(&mut Directive)) -> String {
    let spans = scan(text);
    let mut merged = Directive::new();
    let mut present = false;
    for span in &spans {
        if span.kind != SpanKind::Directive {
            continue;
        }
        if let DirectiveLine::Declared(d) = classify_directive_line(line_content(&span.text)) {
            merged.merge(&d);
            present = true;
        }
    }
    edit(&mut merged);
    let line = merged.render();

    if !present {
        return format!("{line}\n\n{text}");
    }

    let mut out = String::with_capacity(text.len() + line.len());
    let mut placed = false;
    for span in &spans {
        if span.kind != SpanKind::Directive {
            out.push_str(&span.text);
            continue;
        }
        if !placed {
            let ending = &span.text[line_content(&span.text).len()..];
            out.push_str(&line);
            out.push_str(ending);
            placed = true;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_spaced_and_compact_lists() {
        let text = "body\n[tags]:# (alpha, beta, gamma)";
        assert_eq!(
            declared_tags(text).keys().collect::<Vec<_>>(),
            vec!["alpha", "beta", "gamma"]
        );
        assert!(declared_tags("body\n[tags]:# ()").is_empty());
        assert_eq!(declared_tags("body\n[tags]:# (alpha,beta,gamma)").len(), 3);
        assert_eq!(declared_tags("x\n[tags]:# (car, ship wreck, )").len(), 2);
    }

    #[test]
    fn combine_is_a_union() {
        let text = "body\n[tags]:# (alpha)";
        let combined = combine_tags(["beta", "gamma"], text);
        assert_eq!(combined.keys().collect::<Vec<_>>(), vec!["alpha", "beta", "gamma"]);

        let combined = combine_tags(["beta", "alpha 2"], "body\n[tags]:# (alpha)");
        assert_eq!(combined.len(), 3);
        let combined = combine_tags(["beta", "alpha"], "body\n[tags]:# (alpha 2)");
        assert_eq!(combined.len(), 3);
    }

    #[test]
    fn add_tags_inserts_then_updates_in_place() {
        let text = add_tags(["alpha", "beta"], "body\n");
        assert_eq!(text, "[tags]:# (alpha, beta, )\n\nbody\n");

        let text = add_tags(["alpha", "gamma"], &text);
        assert_eq!(text, "[tags]:# (alpha, beta, gamma, )\n\nbody\n");
    }

    #[test]
    fn add_tags_keeps_directive_position() {
        let text = add_tags(["butter"], "body\n[tags]:# (brot)\nmore");
        assert_eq!(text, "body\n[tags]:# (brot, butter, )\nmore");
    }

    #[test]
    fn multiple_directives_collapse_without_losing_tags() {
        let text = "Hello World\nabcd\n[tags]:# (bernd,brot,)\n[tags]:# (hello, world, test, )";
        let out = add_tags(["butter"], text);
        assert_eq!(out.matches("[tags]:#").count(), 1);
        assert!(check_tags(
            ["bernd", "brot", "butter", "hello", "world", "test"],
            &out
        ));
    }

    #[test]
    fn malformed_directive_gets_a_fresh_one() {
        let text = "[tags]:# alpha, beta\nbody";
        assert_eq!(malformed_directives(text), vec!["[tags]:# alpha, beta".to_string()]);
        assert!(read_directive(text).is_none());
        let out = add_tags(["gamma"], text);
        assert!(out.starts_with("[tags]:# (gamma, )\n\n[tags]:# alpha, beta\n"));
    }

    #[test]
    fn display_form_of_first_declaration_wins() {
        let text = add_tags(["hello world"], "[tags]:# (Hello World, )\n");
        assert_eq!(text, "[tags]:# (Hello World, )\n");
    }

    #[test]
    fn check_tags_compares_sets() {
        let text = "body\n[tags]:# (alpha, beta)";
        assert!(check_tags(["alpha", "beta"], text));
        assert!(!check_tags(["alpha"], text));
        assert!(!check_tags(["gamma"], text));
    }

    #[test]
    fn parse_single_lines() {
        assert_eq!(parse_directive("[tags]:#(a,b)\n").map(|d| d.len()), Some(2));
        assert!(parse_directive("[tags]:# a, b").is_none());
        assert!(parse_directive("plain text").is_none());
    }

    #[test]
    fn directive_in_code_fence_is_ignored() {
        let text = "```\n[tags]:# (hidden)\n```\n";
        assert!(read_directive(text).is_none());
    }
}
