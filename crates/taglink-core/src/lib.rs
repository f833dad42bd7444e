//! Taglink: keep a folder of Markdown notes cross-linked by tag.
//!
//! ```text
//!   documents ──► collect ──► directives + index definitions
//!                    │
//!                    ▼
//!                 resolve ──► one origin per tag
//!                    │
//!                    ▼
//!                  link ────► [tag][tag] links, definitions, linklist.md
//! ```
//!
//! A tag is introduced by a heading, a `**bold**` run or a `[[wiki]]`
//! reference and declared in the document's `[tags]:# (...)` directive. Every
//! plain mention of a declared tag anywhere in the corpus becomes a reference
//! link to the tag's origin. Passes are idempotent: a second run over its own
//! output writes nothing.
//!
//! All transformations operate on an in-memory [`Corpus`]; [`CorpusStore`]
//! loads one from disk and commits the result.

pub mod config;
pub mod corpus;
pub mod directive;
pub mod error;
pub mod extract;
pub mod index;
pub mod linklist;
pub mod origin;
pub mod rename;
pub mod rewrite;
pub mod scan;
pub mod store;
pub mod tag;


pub use config::{BacklinkStyle, SyncConfig};
pub use corpus::{full_pass, update_document, Corpus, PassOutcome, PassReport, PassWarning};
pub use directive::{add_tags, check_tags, combine_tags, declared_tags, Directive};
pub use error::{Result, TagError};
pub use extract::{extract_tags, get_tag_headers};
pub use index::{TagEntry, TagIndex};
pub use linklist::{check_list_for_tags, find_links_to_tag, render_linklist};
pub use origin::{get_origin, OriginResolver, Origins};
pub use rename::{rename_tag, RenameOutcome, RenameReport};
pub use rewrite::{add_links_from_list, Rewrite};
pub use store::{CommitSummary, CorpusStore};
pub use tag::{Anchor, DocId};
