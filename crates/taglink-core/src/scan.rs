//! Lossless span scanner.
//!
//! Splits a document into typed spans so that tag matching only ever looks at
//! ordinary prose. Concatenating the `text` of every span reproduces the input
//! exactly; everything that is not [`SpanKind::Text`] is opaque to the link
//! rewriter.
//!
//! Recognized line-level constructs:
//! - the `[tags]:# (...)` declaration directive (well-formed or not),
//! - ATX headings (`#` .. `######` followed by a space),
//! - link definitions (`[label]: target`),
//! - fenced code blocks.
//!
//! Inside other lines: backtick code spans, bracket groups (`[x]`, `[[x]]`,
//! `[x][y]`, `[x](dest)`), with `[x][x]` singled out as an existing reference
//! link.

use crate::directive::{classify_directive_line, DirectiveLine};
use regex::Regex;
use std::sync::OnceLock;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanKind {
    /// Ordinary prose, eligible for linking.
    Text,
    /// A well-formed declaration directive line.
    Directive,
    /// A line that starts like a directive but does not parse.
    MalformedDirective,
    Heading {
        level: usize,
        title: String,
    },
    Definition {
        label: String,
        target: String,
    },
    Code,
    /// `[label][label]`, a reference link whose label equals its target.
    Link {
        label: String,
    },
    /// Any other bracket group, including wiki references and inline links.
    Bracket,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Span {
    pub kind: SpanKind,
    pub text: String,
}

impl Span {
    pub fn is_text(&self) -> bool {
        self.kind == SpanKind::Text
    }
}

fn heading_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^(#{1,6})[ \t]+(.*?)[ \t]*$").expect("valid heading pattern"))
}

fn definition_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^ {0,3}\[([^\[\]]+)\]:[ \t]*(\S+)[ \t]*$").expect("valid definition pattern")
    })
}

/// Parse an ATX heading line (without its line ending) into level and title.
/// A closing run of `#` is dropped when separated from the title by a space.
pub fn parse_heading(line: &str) -> Option<(usize, String)> {
    let caps = heading_re().captures(line)?;
    let level = caps.get(1)?.as_str().len();
    let mut title = caps.get(2)?.as_str();
    let stripped = title.trim_end_matches('#');
    if stripped.len() < title.len() && (stripped.is_empty() || stripped.ends_with([' ', '\t'])) {
        title = stripped.trim_end();
    }
    if title.is_empty() {
        return None;
    }
    Some((level, title.to_string()))
}

/// Parse a link definition line (without its line ending) into label and
/// target.
pub fn parse_definition(line: &str) -> Option<(String, String)> {
    let caps = definition_re().captures(line)?;
    Some((caps.get(1)?.as_str().to_string(), caps.get(2)?.as_str().to_string()))
}

fn fence_marker(line: &str) -> Option<&'static str> {
    let trimmed = line.trim_start();
    if line.len() - trimmed.len() > 3 {
        return None;
    }
    if trimmed.starts_with("```") {
        Some("```")
    } else if trimmed.starts_with("~~~") {
        Some("~~~")
    } else {
        None
    }
}

fn classify_line(content: &str) -> Option<SpanKind> {
    match classify_directive_line(content) {
        DirectiveLine::Declared(_) => return Some(SpanKind::Directive),
        DirectiveLine::Malformed => return Some(SpanKind::MalformedDirective),
        DirectiveLine::Absent => {}
    }
    if let Some((level, title)) = parse_heading(content) {
        return Some(SpanKind::Heading { level, title });
    }
    if let Some((label, target)) = parse_definition(content) {
        return Some(SpanKind::Definition { label, target });
    }
    None
}

/// Strip the line ending from a line produced by `split_inclusive('\n')`.
pub fn line_content(line: &str) -> &str {
    line.trim_end_matches(['\n', '\r'])
}

pub fn scan(text: &str) -> Vec<Span> {
    let mut out = SpanBuf::default();
    let mut fence: Option<&'static str> = None;

    for line in text.split_inclusive('\n') {
        let content = line_content(line);

        if let Some(marker) = fence {
            out.push(SpanKind::Code, line);
            if content.trim_start().starts_with(marker) {
                fence = None;
            }
            continue;
        }
        if let Some(marker) = fence_marker(content) {
            fence = Some(marker);
            out.push(SpanKind::Code, line);
            continue;
        }

        match classify_line(content) {
            Some(kind) => out.push(kind, line),
            None => scan_inline(line, &mut out),
        }
    }

    out.spans
}

/// Reassemble a document from spans.
pub fn render(spans: &[Span]) -> String {
    spans.iter().map(|s| s.text.as_str()).collect()
}

#[derive(Default)]
struct SpanBuf {
    spans: Vec<Span>,
}

impl SpanBuf {
    fn push(&mut self, kind: SpanKind, text: &str) {
        if text.is_empty() {
            return;
        }
        if kind == SpanKind::Text {
            if let Some(last) = self.spans.last_mut() {
                if last.kind == SpanKind::Text {
                    last.text.push_str(text);
                    return;
                }
            }
        }
        self.spans.push(Span {
            kind,
            text: text.to_string(),
        });
    }
}

fn scan_inline(line: &str, out: &mut SpanBuf) {
    let bytes = line.as_bytes();
    let mut text_start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                // Escaped punctuation stays prose.
                i += 2;
            }
            b'`' => {
                let run = count_run(bytes, i, b'`');
                match find_backtick_close(bytes, i + run, run) {
                    Some(end) => {
                        out.push(SpanKind::Text, &line[text_start..i]);
                        out.push(SpanKind::Code, &line[i..end]);
                        i = end;
                        text_start = end;
                    }
                    None => i += run,
                }
            }
            b'[' => match bracket_group(bytes, i) {
                Some((end, kind)) => {
                    out.push(SpanKind::Text, &line[text_start..i]);
                    let kind = match kind {
                        GroupKind::Reference { first, second } => {
                            let label = &line[first.0..first.1];
                            let target = &line[second.0..second.1];
                            if !label.trim().is_empty() && label.to_lowercase() == target.to_lowercase() {
                                SpanKind::Link {
                                    label: label.to_string(),
                                }
                            } else {
                                SpanKind::Bracket
                            }
                        }
                        GroupKind::Other => SpanKind::Bracket,
                    };
                    out.push(kind, &line[i..end]);
                    i = end;
                    text_start = end;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }

    let tail_start = text_start.min(line.len());
    out.push(SpanKind::Text, &line[tail_start..]);
}

fn count_run(bytes: &[u8], start: usize, b: u8) -> usize {
    bytes[start..].iter().take_while(|&&c| c == b).count()
}

fn find_backtick_close(bytes: &[u8], from: usize, run: usize) -> Option<usize> {
    let mut i = from;
    while i < bytes.len() {
        if bytes[i] == b'`' {
            let n = count_run(bytes, i, b'`');
            if n == run {
                return Some(i + n);
            }
            i += n;
        } else if bytes[i] == b'\n' {
            return None;
        } else {
            i += 1;
        }
    }
    None
}

/// Index one past the bracket matching the `open` at `start`, if the line
/// closes it.
fn matching_close(bytes: &[u8], start: usize, open: u8, close: u8) -> Option<usize> {
    let mut depth = 0usize;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        if b == b'\\' {
            i += 2;
            continue;
        }
        if b == b'\n' {
            return None;
        }
        if b == open {
            depth += 1;
        } else if b == close {
            depth = depth.checked_sub(1)?;
            if depth == 0 {
                return Some(i + 1);
            }
        }
        i += 1;
    }
    None
}

enum GroupKind {
    /// `[first][second]`, with byte ranges of the two inner labels.
    Reference {
        first: (usize, usize),
        second: (usize, usize),
    },
    Other,
}

fn bracket_group(bytes: &[u8], start: usize) -> Option<(usize, GroupKind)> {
    let first_end = matching_close(bytes, start, b'[', b']')?;
    match bytes.get(first_end) {
        Some(b'[') => match matching_close(bytes, first_end, b'[', b']') {
            Some(second_end) => Some((
                second_end,
                GroupKind::Reference {
                    first: (start + 1, first_end - 1),
                    second: (first_end + 1, second_end - 1),
                },
            )),
            None => Some((first_end, GroupKind::Other)),
        },
        Some(b'(') => match matching_close(bytes, first_end, b'(', b')') {
            Some(dest_end) => Some((dest_end, GroupKind::Other)),
            None => Some((first_end, GroupKind::Other)),
        },
        _ => Some((first_end, GroupKind::Other)),
    }
}
