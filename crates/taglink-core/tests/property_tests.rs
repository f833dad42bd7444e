//! Property-based tests for the synchronizer
//!
//! 1. Scanning is lossless
//! 2. A second pass changes nothing
//! 3. Declarations never shrink
//! 4. Every link has a definition in its document
//! 5. Longer tags are never split by shorter ones

use proptest::prelude::*;
use taglink_core::rewrite::{defined_labels, linked_tags};
use taglink_core::scan::{render, scan};
use taglink_core::{declared_tags, full_pass, BacklinkStyle, Corpus, TagIndex};

// ============================================================================
// Strategies
// ============================================================================

/// Prose fragments, including tags in various cases.
fn word_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("the".to_string()),
        Just("and".to_string()),
        Just("world".to_string()),
        Just("World.".to_string()),
        Just("hello world".to_string()),
        Just("Hello World,".to_string()),
        Just("alpha".to_string()),
        Just("alphabet".to_string()),
        Just("beta.md".to_string()),
        Just("(beta)".to_string()),
        Just("c++".to_string()),
    ]
}

/// Constructs that introduce tags.
fn marker_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("# Hello World".to_string()),
        Just("## world".to_string()),
        Just("# Alpha".to_string()),
        Just("**beta**".to_string()),
        Just("**C++**".to_string()),
        Just("[[gamma|the g]]".to_string()),
        Just("`alpha in code`".to_string()),
    ]
}

fn line_strategy() -> impl Strategy<Value = String> {
    prop_oneof![
        3 => prop::collection::vec(word_strategy(), 1..6).prop_map(|w| w.join(" ")),
        1 => marker_strategy(),
        1 => (marker_strategy(), word_strategy()).prop_map(|(m, w)| {
            if m.starts_with('#') { format!("{w} {}", m.trim_start_matches('#').trim()) } else { format!("{m} {w}") }
        }),
    ]
}

fn document_strategy() -> impl Strategy<Value = String> {
    (prop::collection::vec(line_strategy(), 0..8), any::<bool>()).prop_map(|(lines, trailing)| {
        let mut text = lines.join("\n");
        if trailing {
            text.push('\n');
        }
        text
    })
}

fn corpus_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(document_strategy(), 1..4)
}

fn build_corpus(docs: &[String]) -> Corpus {
    let mut corpus = Corpus::new("root");
    for (i, text) in docs.iter().enumerate() {
        let id = if i % 2 == 0 {
            format!("doc{i}.md")
        } else {
            format!("sub/doc{i}.md")
        };
        corpus.insert(id, text.as_str());
    }
    corpus
}

fn reloaded(corpus: &Corpus) -> Corpus {
    let mut fresh = Corpus::new(corpus.root());
    for (id, text) in corpus.documents() {
        fresh.insert(id.clone(), text);
    }
    fresh
}

// ============================================================================
// Scanner
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn scan_is_lossless(text in "[a-z #*`\\[\\]()|\\\\\n.]{0,120}") {
        prop_assert_eq!(render(&scan(&text)), text);
    }
}

// ============================================================================
// Full pass
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn second_pass_is_a_no_op(docs in corpus_strategy()) {
        let first = full_pass(build_corpus(&docs), TagIndex::new(), BacklinkStyle::Plain).unwrap();
        let second = full_pass(reloaded(&first.corpus), first.index.clone(), BacklinkStyle::Plain).unwrap();

        for (id, text) in first.corpus.documents() {
            prop_assert_eq!(second.corpus.get(id).unwrap(), text);
        }
        prop_assert_eq!(&second.linklist, &first.linklist);
        prop_assert_eq!(&second.index, &first.index);
    }

    #[test]
    fn declarations_never_shrink(docs in corpus_strategy()) {
        let before = build_corpus(&docs);
        let first = full_pass(before.clone(), TagIndex::new(), BacklinkStyle::Plain).unwrap();
        for (id, text) in before.documents() {
            let after = declared_tags(first.corpus.get(id).unwrap());
            for key in declared_tags(text).keys() {
                prop_assert!(after.contains(key));
            }
        }
    }

    #[test]
    fn links_always_have_definitions(docs in corpus_strategy()) {
        let outcome = full_pass(build_corpus(&docs), TagIndex::new(), BacklinkStyle::Plain).unwrap();
        for (_, text) in outcome.corpus.documents() {
            let linked = linked_tags(text);
            let defined = defined_labels(text);
            prop_assert!(linked.is_subset(&defined));
        }
    }

    #[test]
    fn longer_tags_are_never_split(words in prop::collection::vec(word_strategy(), 1..12)) {
        let body = words.join(" ");
        let mut corpus = Corpus::new("root");
        corpus.insert("a.md", "# Hello World\n");
        corpus.insert("b.md", "# world\n");
        corpus.insert("c.md", body.as_str());
        let outcome = full_pass(corpus, TagIndex::new(), BacklinkStyle::Plain).unwrap();
        let c = outcome.corpus.get("c.md").unwrap();
        prop_assert!(!c.contains("hello [world][world]"));
        prop_assert!(!c.contains("Hello [world][world]"));
        prop_assert_eq!(
            c.matches("[hello world][hello world]").count(),
            body.to_lowercase().matches("hello world").count()
        );
    }
}
