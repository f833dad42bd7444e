//! Tag keys, anchors and the small path helpers used to build link targets.

use crate::error::{Result, TagError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a document: its path relative to the corpus root,
/// always with `/` separators.
pub type DocId = String;

/// Characters that would break the `[tags]:# (a, b, )` directive or the
/// `[tag][tag]` link syntax.
const RESERVED: &[char] = &[',', '(', ')', '[', ']', '\n', '\r'];

/// Case-insensitive identity of a tag.
pub fn tag_key(tag: &str) -> String {
    tag.trim().to_lowercase()
}

/// Heading slug: lowercase, spaces become hyphens.
pub fn slugify(heading: &str) -> String {
    heading.trim().to_lowercase().replace(' ', "-")
}

/// Trim a candidate tag and reject anything that cannot round-trip through a
/// directive.
pub fn normalize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim();
    if tag.is_empty() || tag.contains(RESERVED) {
        return None;
    }
    Some(tag.to_string())
}

/// Like [`normalize_tag`], but with a reason for the rejection. Used for tag
/// names typed by a user.
pub fn validate_tag(raw: &str) -> Result<String> {
    let tag = raw.trim();
    if tag.is_empty() {
        return Err(TagError::InvalidTag {
            tag: raw.to_string(),
            reason: "tag is empty".to_string(),
        });
    }
    if let Some(c) = tag.chars().find(|c| RESERVED.contains(c)) {
        return Err(TagError::InvalidTag {
            tag: raw.to_string(),
            reason: format!("character {c:?} is not allowed in a tag"),
        });
    }
    Ok(tag.to_string())
}

/// Where a tag is defined: a document, optionally narrowed to a heading.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Anchor {
    pub document: DocId,
    pub slug: Option<String>,
}

impl Anchor {
    pub fn document(document: impl Into<DocId>) -> Self {
        Self {
            document: document.into(),
            slug: None,
        }
    }

    pub fn heading(document: impl Into<DocId>, heading: &str) -> Self {
        Self {
            document: document.into(),
            slug: Some(slugify(heading)),
        }
    }

    /// Link target for this anchor as seen from `from`.
    pub fn target_from(&self, from: &str) -> String {
        let path = relative_path(from, &self.document);
        match &self.slug {
            Some(slug) => format!("{path}#{slug}"),
            None => path,
        }
    }
}

impl fmt::Display for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.slug {
            Some(slug) => write!(f, "{}#{}", self.document, slug),
            None => f.write_str(&self.document),
        }
    }
}

impl From<String> for Anchor {
    fn from(s: String) -> Self {
        match s.split_once('#') {
            Some((document, slug)) if !slug.is_empty() => Anchor {
                document: document.to_string(),
                slug: Some(slug.to_string()),
            },
            Some((document, _)) => Anchor::document(document),
            None => Anchor::document(s),
        }
    }
}

impl From<Anchor> for String {
    fn from(anchor: Anchor) -> Self {
        anchor.to_string()
    }
}

/// Path of `to` relative to the directory containing `from`. Both are
/// corpus-relative document ids.
pub fn relative_path(from: &str, to: &str) -> String {
    let from_dir: Vec<&str> = match from.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };
    let to_parts: Vec<&str> = to.split('/').filter(|s| !s.is_empty()).collect();

    let common = from_dir
        .iter()
        .zip(to_parts.iter())
        .take_while(|(a, b)| a == b)
        .count();
    // Never let the file name itself count as a shared directory.
    let common = common.min(to_parts.len().saturating_sub(1));

    let mut parts: Vec<&str> = vec![".."; from_dir.len() - common];
    parts.extend(&to_parts[common..]);
    parts.join("/")
}

/// Resolve a link target path (as written in `from`) back to a document id.
pub fn resolve_relative(from: &str, target: &str) -> DocId {
    let mut segments: Vec<&str> = match from.rsplit_once('/') {
        Some((dir, _)) => dir.split('/').filter(|s| !s.is_empty()).collect(),
        None => Vec::new(),
    };
    for part in target.split('/') {
        match part {
            ".." => {
                segments.pop();
            }
            "." | "" => {}
            other => segments.push(other),
        }
    }
    segments.join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_lowercases_and_hyphenates() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("  new tag "), "new-tag");
        assert_eq!(slugify("C++"), "c++");
    }

    #[test]
    fn normalize_rejects_directive_breakers() {
        assert_eq!(normalize_tag("  alpha "), Some("alpha".to_string()));
        assert_eq!(normalize_tag("a, b"), None);
        assert_eq!(normalize_tag("f(x)"), None);
        assert_eq!(normalize_tag("   "), None);
        assert!(validate_tag("[x]").is_err());
        assert_eq!(validate_tag(" new tag ").unwrap(), "new tag");
    }

    #[test]
    fn anchor_round_trips_through_string() {
        let a = Anchor::heading("file1.md", "New Tag");
        assert_eq!(a.to_string(), "file1.md#new-tag");
        assert_eq!(Anchor::from("file1.md#new-tag".to_string()), a);
        assert_eq!(
            Anchor::from("notes/a.md".to_string()),
            Anchor::document("notes/a.md")
        );
    }

    #[test]
    fn relative_paths_between_documents() {
        assert_eq!(relative_path("file2.md", "file1.md"), "file1.md");
        assert_eq!(relative_path("a/b.md", "a/c.md"), "c.md");
        assert_eq!(relative_path("a/b.md", "c.md"), "../c.md");
        assert_eq!(relative_path("x.md", "a/c.md"), "a/c.md");
        assert_eq!(relative_path("a/b/x.md", "a/c/y.md"), "../c/y.md");
        assert_eq!(resolve_relative("a/b/x.md", "../c/y.md"), "a/c/y.md");
        assert_eq!(resolve_relative("x.md", "a/c.md"), "a/c.md");
    }

    #[test]
    fn target_includes_slug_when_anchored_to_heading() {
        let a = Anchor::heading("docs/alpha.md", "alpha");
        assert_eq!(a.target_from("docs/beta.md"), "alpha.md#alpha");
        assert_eq!(Anchor::document("alpha.md").target_from("beta.md"), "alpha.md");
    }
}
