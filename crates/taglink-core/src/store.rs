//! Filesystem side: loading a corpus from a directory tree and committing a
//! pass outcome back to it.

use crate::config::SyncConfig;
use crate::corpus::{full_pass, update_document, Corpus, PassOutcome, PassReport};
use crate::error::{Result, TagError};
use crate::index::TagIndex;
use crate::linklist::check_list_for_tags;
use crate::origin::OriginResolver;
use crate::rename::{rename_tag, RenameReport};
use crate::tag::DocId;
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;
use walkdir::WalkDir;

/// Replace `path` with `contents` via a temp file in the same directory, so
/// a crash never leaves a half-written document. Existing permissions are
/// kept.
pub(crate) fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| TagError::io(dir, e))?;
    tmp.write_all(contents.as_bytes())
        .map_err(|e| TagError::io(tmp.path(), e))?;
    if let Ok(meta) = std::fs::metadata(path) {
        tmp.as_file()
            .set_permissions(meta.permissions())
            .map_err(|e| TagError::io(path, e))?;
    }
    tmp.persist(path).map_err(|e| TagError::io(path, e.error))?;
    Ok(())
}

/// Write `contents` unless the file already holds exactly that.
fn write_if_changed(path: &Path, contents: &str) -> Result<bool> {
    if std::fs::read_to_string(path).is_ok_and(|existing| existing == contents) {
        return Ok(false);
    }
    write_atomic(path, contents)?;
    Ok(true)
}

/// Files written by a commit, relative to the root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitSummary {
    pub written: Vec<DocId>,
}

/// A corpus directory plus its configuration.
#[derive(Debug, Clone)]
pub struct CorpusStore {
    config: SyncConfig,
}

impl CorpusStore {
    pub fn new(config: SyncConfig) -> Self {
        Self { config }
    }

    /// Store for `root`, honouring its `taglink.json`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::new(SyncConfig::load(root.as_ref())?))
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn doc_id(&self, path: &Path) -> DocId {
        let rel = path.strip_prefix(&self.config.root).unwrap_or(path);
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    /// Read every document under the root. The link-list and non-UTF-8 files
    /// are skipped.
    pub fn load_corpus(&self) -> Result<Corpus> {
        let root = &self.config.root;
        if !root.is_dir() {
            return Err(TagError::io(
                root,
                std::io::Error::new(std::io::ErrorKind::NotFound, "corpus root is not a directory"),
            ));
        }

        let exclude: BTreeSet<&str> = self
            .config
            .exclude_dir_names
            .iter()
            .map(String::as_str)
            .collect();
        let mut walker = WalkDir::new(root).follow_links(false).sort_by_file_name();
        if !self.config.recursive {
            walker = walker.max_depth(1);
        }

        let mut corpus = Corpus::new(root.to_string_lossy()).with_linklist(self.config.linklist_name.clone());
        for entry in walker.into_iter().filter_entry(|e| {
            e.depth() == 0
                || !e.file_type().is_dir()
                || !exclude.contains(e.file_name().to_string_lossy().as_ref())
        }) {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping unreadable entry");
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.config.is_document(entry.path()) {
                continue;
            }
            let id = self.doc_id(entry.path());
            if id == self.config.linklist_name {
                continue;
            }
            match std::fs::read_to_string(entry.path()) {
                Ok(text) => corpus.insert(id, text),
                Err(err) if err.kind() == std::io::ErrorKind::InvalidData => {
                    tracing::warn!(path = %entry.path().display(), "skipping non UTF-8 document");
                }
                Err(err) => return Err(TagError::io(entry.path(), err)),
            }
        }

        tracing::debug!(root = %root.display(), documents = corpus.len(), "loaded corpus");
        Ok(corpus)
    }

    pub fn load_index(&self) -> Result<TagIndex> {
        TagIndex::load(&self.config.index_path())
    }

    /// Write changed documents, then the link-list and the index. Files whose
    /// content is unchanged are left alone.
    pub fn commit(&self, corpus: &Corpus, index: &TagIndex, linklist: Option<&str>) -> Result<CommitSummary> {
        let mut summary = CommitSummary::default();
        for (id, text) in corpus.changed() {
            write_atomic(&self.config.root.join(id), text)?;
            summary.written.push(id.clone());
        }
        let Some(linklist) = linklist else {
            return Ok(summary);
        };
        if write_if_changed(&self.config.linklist_path(), linklist)? {
            summary.written.push(self.config.linklist_name.clone());
        }
        if write_if_changed(&self.config.index_path(), &index.to_json()?)? {
            summary.written.push(self.config.index_name.clone());
        }
        Ok(summary)
    }

    fn commit_outcome(&self, outcome: &PassOutcome) -> Result<CommitSummary> {
        self.commit(&outcome.corpus, &outcome.index, outcome.linklist.as_deref())
    }

    /// Full two-phase pass over the directory.
    pub fn sync(&self) -> Result<PassReport> {
        let corpus = self.load_corpus()?;
        let index = self.load_index()?;
        let outcome = full_pass(corpus, index, self.config.backlinks)?;
        let summary = self.commit_outcome(&outcome)?;
        tracing::debug!(written = summary.written.len(), "committed pass");
        Ok(outcome.report)
    }

    /// Re-synchronize one document given by path: absolute, under the root,
    /// or relative to it.
    pub fn update(&self, document: &Path) -> Result<PassReport> {
        let path = if document.is_absolute() || document.starts_with(&self.config.root) {
            document.to_path_buf()
        } else {
            self.config.root.join(document)
        };
        let id = self.doc_id(&path);
        let corpus = self.load_corpus()?;
        let index = self.load_index()?;
        let outcome = update_document(corpus, index, &id, self.config.backlinks)?;
        self.commit_outcome(&outcome)?;
        Ok(outcome.report)
    }

    /// Rename a tag everywhere. Nothing is written unless the whole rename
    /// succeeds in memory.
    pub fn rename(&self, old: &str, new: &str) -> Result<RenameReport> {
        let corpus = self.load_corpus()?;
        let index = self.load_index()?;
        let outcome = rename_tag(corpus, index, old, new, self.config.backlinks)?;
        self.commit(&outcome.corpus, &outcome.index, Some(&outcome.linklist))?;
        Ok(outcome.report)
    }

    /// Document declaring `tag`.
    pub fn origin(&self, tag: &str) -> Result<DocId> {
        let corpus = self.load_corpus()?;
        OriginResolver::new(&corpus).get_origin(tag).map(str::to_string)
    }

    /// Which of `tags` appear in the link-list on disk.
    pub fn check_list<I, S>(&self, tags: I) -> Result<BTreeSet<String>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let path = self.config.linklist_path();
        let text = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(err) => return Err(TagError::io(path, err)),
        };
        Ok(check_list_for_tags(tags, &text))
    }
}
