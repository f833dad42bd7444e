//! Persistent tag index.
//!
//! On disk the index is a JSON object keyed by display form:
//!
//! ```json
//! {"tags": {"new tag": {"defines": {"file1.md": "file1.md#new-tag"},
//!                        "references": ["file1.md", "file2.md"]}}}
//! ```
//!
//! In memory entries are keyed by lowercase tag key so lookups are
//! case-insensitive.

use crate::error::{Result, TagError};
use crate::tag::{slugify, tag_key, validate_tag, Anchor, DocId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagEntry {
    pub display: String,
    /// Declaring document -> anchor of the tag within it.
    pub definitions: BTreeMap<DocId, Anchor>,
    /// Documents that link to the tag.
    pub references: BTreeSet<DocId>,
}

impl TagEntry {
    fn new(display: &str) -> Self {
        Self {
            display: display.trim().to_string(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TagIndex {
    tags: BTreeMap<String, TagEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedIndex {
    #[serde(default)]
    tags: BTreeMap<String, PersistedEntry>,
}

#[derive(Serialize, Deserialize)]
struct PersistedEntry {
    #[serde(default)]
    defines: BTreeMap<DocId, Anchor>,
    #[serde(default)]
    references: BTreeSet<DocId>,
}

impl TagIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.tags.contains_key(&tag_key(tag))
    }

    pub fn get(&self, tag: &str) -> Option<&TagEntry> {
        self.tags.get(&tag_key(tag))
    }

    /// `(key, entry)` pairs sorted by key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TagEntry)> {
        self.tags.iter().map(|(k, e)| (k.as_str(), e))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.tags.keys().map(String::as_str)
    }

    /// Entry for `display`, created on first sight. An existing entry keeps
    /// its display form.
    pub fn entry(&mut self, display: &str) -> &mut TagEntry {
        self.tags
            .entry(tag_key(display))
            .or_insert_with(|| TagEntry::new(display))
    }

    pub fn record_definition(&mut self, display: &str, document: &str, anchor: Anchor) {
        self.entry(display)
            .definitions
            .insert(document.to_string(), anchor);
    }

    /// Record that `document` links to `tag`; ignored for unknown tags.
    pub fn record_reference(&mut self, tag: &str, document: &str) {
        if let Some(entry) = self.tags.get_mut(&tag_key(tag)) {
            entry.references.insert(document.to_string());
        }
    }

    /// Empty every definition and reference set, keeping the entries.
    pub fn clear_occurrences(&mut self) {
        for entry in self.tags.values_mut() {
            entry.definitions.clear();
            entry.references.clear();
        }
    }

    /// Drop everything `document` contributed.
    pub fn forget_document(&mut self, document: &str) {
        for entry in self.tags.values_mut() {
            entry.definitions.remove(document);
            entry.references.remove(document);
        }
    }

    /// Check that `old` can be renamed to `new`; returns the validated new
    /// display form.
    pub fn check_rename(&self, old: &str, new: &str) -> Result<String> {
        let new = validate_tag(new)?;
        if !self.contains(old) {
            return Err(TagError::NotFound {
                tag: old.to_string(),
                within: "the index".to_string(),
            });
        }
        if self.contains(&new) {
            return Err(TagError::AlreadyExists { tag: new });
        }
        Ok(new)
    }

    /// Move the entry of `old` to `new`, re-slugging definition anchors whose
    /// slug was derived from the old name.
    pub fn rename(&mut self, old: &str, new: &str) -> Result<()> {
        let new = self.check_rename(old, new)?;
        let Some(mut entry) = self.tags.remove(&tag_key(old)) else {
            return Ok(());
        };
        let old_slug = slugify(&entry.display);
        let new_slug = slugify(&new);
        for anchor in entry.definitions.values_mut() {
            if anchor.slug.as_deref() == Some(old_slug.as_str()) {
                anchor.slug = Some(new_slug.clone());
            }
        }
        entry.display = new.clone();
        self.tags.insert(tag_key(&new), entry);
        Ok(())
    }

    /// Re-point anchors at `#old_slug` in any of `documents` to `#new_slug`.
    pub fn reslug(&mut self, documents: &BTreeSet<DocId>, old_slug: &str, new_slug: &str) {
        for entry in self.tags.values_mut() {
            for (doc, anchor) in entry.definitions.iter_mut() {
                if documents.contains(doc) && anchor.slug.as_deref() == Some(old_slug) {
                    anchor.slug = Some(new_slug.to_string());
                }
            }
        }
    }

    pub fn to_json(&self) -> Result<String> {
        let persisted = PersistedIndex {
            tags: self
                .tags
                .values()
                .map(|e| {
                    (
                        e.display.clone(),
                        PersistedEntry {
                            defines: e.definitions.clone(),
                            references: e.references.clone(),
                        },
                    )
                })
                .collect(),
        };
        let mut json = serde_json::to_string_pretty(&persisted)?;
        json.push('\n');
        Ok(json)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let persisted: PersistedIndex = serde_json::from_str(json)?;
        let mut index = Self::new();
        for (display, p) in persisted.tags {
            let entry = index.entry(&display);
            entry.definitions.extend(p.defines);
            entry.references.extend(p.references);
        }
        Ok(index)
    }

    /// Load from `path`; a missing file is an empty index.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(json) => Self::from_json(&json),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::new()),
            Err(err) => Err(TagError::io(path, err)),
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        crate::store::write_atomic(path, &self.to_json()?)
    }
}
