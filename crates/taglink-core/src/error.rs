//! Error type shared by every stage of the synchronizer.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, TagError>;

#[derive(Debug, thiserror::Error)]
pub enum TagError {
    /// A tag is absent from the index (rename) or from every declaration
    /// directive under a search root (origin resolution).
    #[error("Tag '{tag}' not found in {within}.")]
    NotFound { tag: String, within: String },

    /// Rename target already names an indexed tag.
    #[error("Tag '{tag}' already exists. Cannot rename.")]
    AlreadyExists { tag: String },

    /// A `[tags]:#` line that does not parse. Callers treat the document as
    /// having no directive; this variant only surfaces in reports.
    #[error("malformed tag directive in {document}: {line}")]
    MalformedDirective { document: String, line: String },

    /// The link rewriter was handed a document without a declaration
    /// directive. The orchestrator always declares first, so this is a bug in
    /// the caller rather than bad user input.
    #[error("precondition violated for {document}: {reason}")]
    PreconditionViolation { document: String, reason: String },

    #[error("Document '{document}' is not part of the corpus.")]
    UnknownDocument { document: String },

    #[error("invalid tag '{tag}': {reason}")]
    InvalidTag { tag: String, reason: String },

    #[error("IO error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl TagError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        TagError::Io {
            path: path.into(),
            source,
        }
    }

    /// True for failures a user caused (unknown tag, name clash, bad name),
    /// as opposed to I/O problems or contract violations.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            TagError::NotFound { .. }
                | TagError::AlreadyExists { .. }
                | TagError::InvalidTag { .. }
                | TagError::UnknownDocument { .. }
        )
    }
}
