//! Rename transaction.
//!
//! Preconditions are checked against the index before anything is touched.
//! Every document is then rewritten in memory; the caller commits the
//! outcome only once all of it has succeeded.

use crate::config::BacklinkStyle;
use crate::corpus::{Corpus, PassWarning};
use crate::directive::{classify_directive_line, DirectiveLine};
use crate::error::Result;
use crate::extract::wiki_re;
use crate::index::TagIndex;
use crate::linklist::render_linklist;
use crate::origin::OriginResolver;
use crate::rewrite::{claim, matchers_longest_first, Piece, TagMatcher};
use crate::scan::{line_content, scan, SpanKind};
use crate::tag::{resolve_relative, slugify, tag_key, DocId};
use std::collections::BTreeSet;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenameReport {
    pub old: String,
    pub new: String,
    pub documents_changed: Vec<DocId>,
    pub warnings: Vec<PassWarning>,
}

#[derive(Debug, Clone)]
pub struct RenameOutcome {
    pub corpus: Corpus,
    pub index: TagIndex,
    pub linklist: String,
    pub report: RenameReport,
}

struct Renaming<'a> {
    old_key: String,
    new: &'a str,
    old_slug: String,
    new_slug: String,
    /// Documents holding a heading titled with the old name.
    retitled: BTreeSet<DocId>,
    matchers: Vec<TagMatcher>,
}

impl Renaming<'_> {
    fn is_old(&self, label: &str) -> bool {
        tag_key(label) == self.old_key
    }

    /// `path#old-slug` becomes `path#new-slug` when `path` names a document
    /// whose heading was renamed.
    fn reslug_target(&self, document: &str, target: &str) -> Option<String> {
        let (path, slug) = target.split_once('#')?;
        if slug != self.old_slug {
            return None;
        }
        let resolved = if path.is_empty() {
            document.to_string()
        } else {
            resolve_relative(document, path)
        };
        self.retitled
            .contains(&resolved)
            .then(|| format!("{path}#{}", self.new_slug))
    }

    /// `[[old]]` and `[[old|alias]]` become `[[new]]` and `[[new|alias]]`.
    fn retarget_wiki(&self, bracket: &str) -> String {
        wiki_re()
            .replace_all(bracket, |caps: &regex::Captures| {
                let inner = &caps[1];
                let (target, alias) = match inner.split_once('|') {
                    Some((target, alias)) => (target, Some(alias)),
                    None => (inner, None),
                };
                if !self.is_old(target) {
                    return caps[0].to_string();
                }
                match alias {
                    Some(alias) => format!("[[{}|{alias}]]", self.new),
                    None => format!("[[{}]]", self.new),
                }
            })
            .into_owned()
    }

    fn rewrite(&self, document: &str, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for span in scan(text) {
            let ending = &span.text[line_content(&span.text).len()..];
            match &span.kind {
                SpanKind::Directive => {
                    let renamed = match classify_directive_line(line_content(&span.text)) {
                        DirectiveLine::Declared(mut d) => {
                            d.rename(&self.old_key, self.new).then(|| d.render())
                        }
                        _ => None,
                    };
                    match renamed {
                        Some(line) => {
                            out.push_str(&line);
                            out.push_str(ending);
                        }
                        None => out.push_str(&span.text),
                    }
                }
                SpanKind::Heading { level, title } if self.is_old(title) => {
                    out.push_str(&"#".repeat(*level));
                    out.push(' ');
                    out.push_str(self.new);
                    out.push_str(ending);
                }
                SpanKind::Definition { label, target } => {
                    let relabel = self.is_old(label);
                    let retarget = self.reslug_target(document, target);
                    if relabel || retarget.is_some() {
                        let label = if relabel { self.new } else { label.as_str() };
                        let target = retarget.as_deref().unwrap_or(target);
                        out.push_str(&format!("[{label}]: {target}"));
                        out.push_str(ending);
                    } else {
                        out.push_str(&span.text);
                    }
                }
                SpanKind::Link { label } if self.is_old(label) => {
                    out.push_str(&format!("[{0}][{0}]", self.new));
                }
                SpanKind::Bracket => out.push_str(&self.retarget_wiki(&span.text)),
                SpanKind::Text => {
                    for piece in claim(&span.text, &self.matchers) {
                        match piece {
                            Piece::Plain(s) => out.push_str(&s),
                            Piece::Claimed { key, .. } if key == self.old_key => {
                                out.push_str(self.new)
                            }
                            Piece::Claimed { text, .. } => out.push_str(&text),
                        }
                    }
                }
                _ => out.push_str(&span.text),
            }
        }
        out
    }
}

/// Rename `old` to `new` across the corpus, the index and the link-list.
///
/// Fails with `NotFound` when `old` is not indexed and `AlreadyExists` when
/// `new` is; in both cases nothing has been modified.
pub fn rename_tag(
    mut corpus: Corpus,
    mut index: TagIndex,
    old: &str,
    new: &str,
    style: BacklinkStyle,
) -> Result<RenameOutcome> {
    let new = index.check_rename(old, new)?;
    let old_key = tag_key(old);
    let old_display = index
        .get(old)
        .map_or_else(|| old.trim().to_string(), |e| e.display.clone());

    let retitled: BTreeSet<DocId> = corpus
        .documents()
        .filter(|(_, text)| {
            scan(text).iter().any(
                |s| matches!(&s.kind, SpanKind::Heading { title, .. } if tag_key(title) == old_key),
            )
        })
        .map(|(id, _)| id.clone())
        .collect();

    let renaming = Renaming {
        old_slug: slugify(&old_display),
        new_slug: slugify(&new),
        new: &new,
        retitled,
        matchers: matchers_longest_first(index.keys()),
        old_key,
    };

    let mut documents_changed = Vec::new();
    for id in corpus.ids() {
        let Some(text) = corpus.get(&id) else {
            continue;
        };
        let rewritten = renaming.rewrite(&id, text);
        if rewritten != text {
            corpus.set(&id, rewritten);
            documents_changed.push(id);
        }
    }

    index.rename(old, &new)?;
    index.reslug(&renaming.retitled, &renaming.old_slug, &renaming.new_slug);

    let (origins, warnings) = OriginResolver::new(&corpus).resolve_all(&index);
    let linklist = render_linklist(&index, &origins, corpus.linklist(), style);

    tracing::info!(
        old = %old_display,
        new = %new,
        documents = documents_changed.len(),
        "renamed tag"
    );

    Ok(RenameOutcome {
        corpus,
        index,
        linklist,
        report: RenameReport {
            old: old_display,
            new,
            documents_changed,
            warnings,
        },
    })
}
