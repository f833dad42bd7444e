//! Origin resolution: which document a tag's links should point at.

use crate::corpus::{Corpus, PassWarning};
use crate::directive::declared_tags;
use crate::error::{Result, TagError};
use crate::index::TagIndex;
use crate::tag::{tag_key, Anchor, DocId};
use std::collections::BTreeMap;

/// Resolved link target of one tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginEntry {
    pub display: String,
    pub anchor: Anchor,
}

/// Tag key -> origin, for every tag the link rewriter may link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Origins {
    entries: BTreeMap<String, OriginEntry>,
}

impl Origins {
    pub fn insert(&mut self, display: &str, anchor: Anchor) {
        self.entries.insert(
            tag_key(display),
            OriginEntry {
                display: display.trim().to_string(),
                anchor,
            },
        );
    }

    pub fn get(&self, tag: &str) -> Option<&OriginEntry> {
        self.entries.get(&tag_key(tag))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &OriginEntry)> {
        self.entries.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Declarations of every document in a corpus, in document order, without the
/// link-list.
pub struct OriginResolver {
    root: String,
    declarations: Vec<(DocId, Vec<String>)>,
}

impl OriginResolver {
    pub fn new(corpus: &Corpus) -> Self {
        let declarations = corpus
            .documents()
            .map(|(id, text)| {
                let keys = declared_tags(text).keys().map(str::to_string).collect();
                (id.clone(), keys)
            })
            .collect();
        Self {
            root: corpus.root().to_string(),
            declarations,
        }
    }

    /// Every document declaring `tag`, sorted.
    pub fn declaring_documents(&self, tag: &str) -> Vec<&str> {
        let key = tag_key(tag);
        self.declarations
            .iter()
            .filter(|(_, keys)| keys.binary_search(&key).is_ok())
            .map(|(id, _)| id.as_str())
            .collect()
    }

    /// First document (in sorted order) whose directive declares `tag`.
    pub fn get_origin(&self, tag: &str) -> Result<&str> {
        self.declaring_documents(tag)
            .into_iter()
            .next()
            .ok_or_else(|| TagError::NotFound {
                tag: tag.to_string(),
                within: self.root.clone(),
            })
    }

    /// Origins for every indexed tag. The anchor comes from the index entry's
    /// definition in the origin document, or the bare document when it has
    /// none. Tags without any declaring document are reported and skipped.
    pub fn resolve_all(&self, index: &TagIndex) -> (Origins, Vec<PassWarning>) {
        let mut origins = Origins::default();
        let mut warnings = Vec::new();

        for (key, entry) in index.iter() {
            let declaring = self.declaring_documents(key);
            let Some(&origin) = declaring.first() else {
                tracing::warn!(tag = %entry.display, "no document declares tag; skipping its links");
                warnings.push(PassWarning::UnresolvedOrigin {
                    tag: entry.display.clone(),
                });
                continue;
            };
            if declaring.len() > 1 {
                tracing::warn!(
                    tag = %entry.display,
                    origin = %origin,
                    documents = declaring.len(),
                    "tag declared in several documents; linking to the first"
                );
                warnings.push(PassWarning::MultipleDefinitions {
                    tag: entry.display.clone(),
                    documents: declaring.iter().map(|d| d.to_string()).collect(),
                });
            }
            let anchor = entry
                .definitions
                .get(origin)
                .cloned()
                .unwrap_or_else(|| Anchor::document(origin));
            origins.insert(&entry.display, anchor);
        }

        (origins, warnings)
    }
}

/// Document whose directive declares `tag`, searching `corpus` in sorted
/// order.
pub fn get_origin(tag: &str, corpus: &Corpus) -> Result<DocId> {
    OriginResolver::new(corpus).get_origin(tag).map(str::to_string)
}
