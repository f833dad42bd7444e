//! In-memory corpus and the two-phase synchronization pass.
//!
//! Phase one (collect) declares every extracted tag in each document's
//! directive and records definitions in the index. Phase two (link) resolves
//! an origin per tag, rewrites every document and regenerates the link-list.
//! Both phases run over the corpus held in memory; nothing is written until
//! the store commits the outcome.

use crate::config::BacklinkStyle;
use crate::directive::{add_tags, declared_tags, malformed_directives};
use crate::error::{Result, TagError};
use crate::extract::{extract_tags, get_tag_headers};
use crate::index::TagIndex;
use crate::linklist::render_linklist;
use crate::origin::{OriginResolver, Origins};
use crate::rewrite::add_links_from_list;
use crate::tag::DocId;
use std::collections::BTreeMap;

#[derive(Debug, Clone)]
struct Document {
    text: String,
    original: String,
}

/// Documents keyed by id, iterated in sorted order.
#[derive(Debug, Clone)]
pub struct Corpus {
    root: String,
    linklist: DocId,
    documents: BTreeMap<DocId, Document>,
}

impl Corpus {
    pub fn new(root: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            linklist: "linklist.md".to_string(),
            documents: BTreeMap::new(),
        }
    }

    pub fn with_linklist(mut self, linklist: impl Into<DocId>) -> Self {
        self.linklist = linklist.into();
        self
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn linklist(&self) -> &str {
        &self.linklist
    }

    /// Add a document as loaded; later edits are measured against this text.
    pub fn insert(&mut self, id: impl Into<DocId>, text: impl Into<String>) {
        let text = text.into();
        self.documents.insert(
            id.into(),
            Document {
                original: text.clone(),
                text,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&str> {
        self.documents.get(id).map(|d| d.text.as_str())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.documents.contains_key(id)
    }

    /// Replace the current text of a document already in the corpus.
    pub fn set(&mut self, id: &str, text: String) {
        if let Some(doc) = self.documents.get_mut(id) {
            doc.text = text;
        }
    }

    /// Documents other than the link-list, sorted by id.
    pub fn documents(&self) -> impl Iterator<Item = (&DocId, &str)> {
        self.documents
            .iter()
            .filter(|(id, _)| **id != self.linklist)
            .map(|(id, d)| (id, d.text.as_str()))
    }

    pub fn ids(&self) -> Vec<DocId> {
        self.documents().map(|(id, _)| id.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.documents().count()
    }

    pub fn is_empty(&self) -> bool {
        self.documents().next().is_none()
    }

    /// Documents whose text differs from what was loaded.
    pub fn changed(&self) -> impl Iterator<Item = (&DocId, &str)> {
        self.documents
            .iter()
            .filter(|(id, d)| **id != self.linklist && d.text != d.original)
            .map(|(id, d)| (id, d.text.as_str()))
    }
}

/// Non-fatal conditions met during a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PassWarning {
    MalformedDirective { document: DocId, line: String },
    /// Indexed tag that no document declares; it is not linked.
    UnresolvedOrigin { tag: String },
    /// Tag declared by several documents; the first one is the origin.
    MultipleDefinitions { tag: String, documents: Vec<DocId> },
}

impl std::fmt::Display for PassWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PassWarning::MalformedDirective { document, line } => {
                write!(f, "malformed tag directive in {document}: {line}")
            }
            PassWarning::UnresolvedOrigin { tag } => {
                write!(f, "tag '{tag}' is not declared by any document")
            }
            PassWarning::MultipleDefinitions { tag, documents } => write!(
                f,
                "tag '{tag}' is declared in {}; linking to {}",
                documents.join(", "),
                documents.first().map_or("", String::as_str)
            ),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    pub documents: usize,
    pub tags: usize,
    pub links_added: usize,
    pub definitions_appended: usize,
    pub definitions_updated: usize,
    pub warnings: Vec<PassWarning>,
}

/// Everything a pass produced, ready to be committed.
#[derive(Debug, Clone)]
pub struct PassOutcome {
    pub corpus: Corpus,
    pub index: TagIndex,
    /// New link-list text; `None` when the corpus was empty.
    pub linklist: Option<String>,
    pub report: PassReport,
}

/// Declare and index the tags of one document.
fn collect_document(id: &str, text: &str, index: &mut TagIndex, report: &mut PassReport) -> String {
    for line in malformed_directives(text) {
        tracing::warn!(document = %id, line = %line, "ignoring malformed tag directive");
        report.warnings.push(PassWarning::MalformedDirective {
            document: id.to_string(),
            line,
        });
    }

    let text = add_tags(extract_tags(text), text);
    let declared = declared_tags(&text);
    let anchors = get_tag_headers(id, &text, declared.keys());
    for (key, display) in declared.entries() {
        if let Some(anchor) = anchors.get(key) {
            index.record_definition(display, id, anchor.clone());
        }
    }
    text
}

/// Phase one over every document: recompute definitions from scratch.
pub fn collect(corpus: &mut Corpus, index: &mut TagIndex, report: &mut PassReport) {
    index.clear_occurrences();
    for id in corpus.ids() {
        let Some(text) = corpus.get(&id) else {
            continue;
        };
        let text = collect_document(&id, text, index, report);
        corpus.set(&id, text);
    }
}

fn resolve(corpus: &Corpus, index: &TagIndex, report: &mut PassReport) -> Origins {
    let (origins, warnings) = OriginResolver::new(corpus).resolve_all(index);
    report.warnings.extend(warnings);
    origins
}

fn link_document(
    id: &str,
    corpus: &mut Corpus,
    index: &mut TagIndex,
    origins: &Origins,
    report: &mut PassReport,
) -> Result<()> {
    let Some(text) = corpus.get(id) else {
        return Ok(());
    };
    let rewrite = add_links_from_list(id, text, origins)?;
    for key in &rewrite.linked {
        index.record_reference(key, id);
    }
    report.links_added += rewrite.links_added;
    report.definitions_appended += rewrite.definitions_appended;
    report.definitions_updated += rewrite.definitions_updated;
    corpus.set(id, rewrite.text);
    Ok(())
}

/// Phase two over every document. Returns the new link-list text.
pub fn link(
    corpus: &mut Corpus,
    index: &mut TagIndex,
    style: BacklinkStyle,
    report: &mut PassReport,
) -> Result<String> {
    let origins = resolve(corpus, index, report);
    for id in corpus.ids() {
        link_document(&id, corpus, index, &origins, report)?;
    }
    Ok(render_linklist(index, &origins, corpus.linklist(), style))
}

/// Run both phases over the whole corpus.
pub fn full_pass(mut corpus: Corpus, mut index: TagIndex, style: BacklinkStyle) -> Result<PassOutcome> {
    let mut report = PassReport::default();
    if corpus.is_empty() {
        tracing::debug!(root = %corpus.root(), "empty corpus; nothing to do");
        return Ok(PassOutcome {
            corpus,
            index,
            linklist: None,
            report,
        });
    }

    collect(&mut corpus, &mut index, &mut report);
    let linklist = link(&mut corpus, &mut index, style, &mut report)?;

    report.documents = corpus.len();
    report.tags = index.len();
    tracing::info!(
        documents = report.documents,
        tags = report.tags,
        links_added = report.links_added,
        "synchronized corpus"
    );
    Ok(PassOutcome {
        corpus,
        index,
        linklist: Some(linklist),
        report,
    })
}

/// Re-synchronize a single document against an existing index.
///
/// Only `document` is rewritten; the link-list is regenerated from the
/// updated index. Other documents keep whatever links they already have.
pub fn update_document(
    mut corpus: Corpus,
    mut index: TagIndex,
    document: &str,
    style: BacklinkStyle,
) -> Result<PassOutcome> {
    let mut report = PassReport::default();
    if !corpus.documents().any(|(id, _)| id == document) {
        return Err(TagError::UnknownDocument {
            document: document.to_string(),
        });
    }

    index.forget_document(document);
    if let Some(text) = corpus.get(document) {
        let text = collect_document(document, text, &mut index, &mut report);
        corpus.set(document, text);
    }

    let origins = resolve(&corpus, &index, &mut report);
    link_document(document, &mut corpus, &mut index, &origins, &mut report)?;
    let linklist = render_linklist(&index, &origins, corpus.linklist(), style);

    report.documents = 1;
    report.tags = index.len();
    Ok(PassOutcome {
        corpus,
        index,
        linklist: Some(linklist),
        report,
    })
}
