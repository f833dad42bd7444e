//! The generated link-list document: one line per tag with its origin link
//! followed by back-links to every referencing document.

use crate::config::BacklinkStyle;
use crate::corpus::Corpus;
use crate::directive::Directive;
use crate::index::TagIndex;
use crate::origin::Origins;
use crate::rewrite::linked_tags;
use crate::tag::{relative_path, tag_key, DocId};
use chrono::Local;
use std::collections::BTreeSet;

const TIMESTAMP_FORMAT: &str = "%d/%m/%Y, %H:%M:%S";

/// Render the link-list stored at `linklist` (a document id, usually
/// `linklist.md` at the root).
///
/// The directive declares every indexed tag. Tags without a resolved origin
/// get no line.
pub fn render_linklist(
    index: &TagIndex,
    origins: &Origins,
    linklist: &str,
    style: BacklinkStyle,
) -> String {
    let directive = Directive::from_tags(index.iter().map(|(_, e)| e.display.as_str()));
    let mut out = directive.render();
    out.push_str("\n\n");

    let stamp = match style {
        BacklinkStyle::Timestamped => Some(Local::now().format(TIMESTAMP_FORMAT).to_string()),
        _ => None,
    };

    for (key, entry) in index.iter() {
        let Some(origin) = origins.get(key) else {
            continue;
        };
        out.push_str(&format!(
            "[{}]({});",
            origin.display,
            origin.anchor.target_from(linklist)
        ));
        if style != BacklinkStyle::None {
            for doc in &entry.references {
                let label = stamp.as_deref().unwrap_or(doc);
                out.push_str(&format!("[{}]({});", label, relative_path(linklist, doc)));
            }
        }
        out.push('\n');
    }
    out
}

/// The subset of `tags` that appear as `[tag]` somewhere in `text`
/// (case-insensitive).
pub fn check_list_for_tags<I, S>(tags: I, text: &str) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let haystack = text.to_lowercase();
    tags.into_iter()
        .map(|t| t.as_ref().to_string())
        .filter(|t| haystack.contains(&format!("[{}]", tag_key(t))))
        .collect()
}

/// Documents of `corpus` holding a `[tag][tag]` link, sorted.
pub fn find_links_to_tag(tag: &str, corpus: &Corpus) -> Vec<DocId> {
    let key = tag_key(tag);
    corpus
        .documents()
        .filter(|(_, text)| linked_tags(text).contains(&key))
        .map(|(id, _)| id.clone())
        .collect()
}
