//! Prose reconstruction from the markup tree.

use std::collections::HashSet;

use super::node::{ATTRIBUTE_PREFIX, Node};

/// Structural tags whose content is never prose: headings, enumerators, tables of contents,
/// page breaks, footnote references, cross-reference targets, graphics, and table column
/// specifications.
pub const DEFAULT_IGNORED_TAGS: &[&str] = &[
    "header",
    "enum",
    "toc",
    "toc-entry",
    "multi-column-toc-entry",
    "toc-quoted-entry",
    "pagebreak",
    "page-break",
    "footnote-ref",
    "xref-target",
    "graphic",
    "colspec",
];

/// Nesting depth past which subtrees are dropped.
pub const DEFAULT_MAX_DEPTH: usize = 256;

/// Depth-first prose extractor with an injectable set of ignored tags.
#[derive(Debug, Clone)]
pub struct TextExtractor {
    ignored: HashSet<String>,
    max_depth: usize,
}

impl Default for TextExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED_TAGS.iter().copied())
    }
}

impl TextExtractor {
    /// Build an extractor that skips the given tag names.
    pub fn new<I, S>(ignored: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ignored: ignored.into_iter().map(Into::into).collect(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Additionally skip `tag`.
    pub fn ignore(mut self, tag: impl Into<String>) -> Self {
        self.ignored.insert(tag.into());
        self
    }

    /// Override the recursion cap.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Concatenate the prose beneath `node` into one whitespace-normalized string.
    pub fn extract(&self, node: &Node) -> String {
        let mut raw = String::new();
        self.walk(node, 0, &mut raw);
        raw.split_whitespace().collect::<Vec<_>>().join(" ")
    }

    fn walk(&self, node: &Node, depth: usize, out: &mut String) {
        if depth > self.max_depth {
            tracing::warn!(depth, "Markup nesting exceeds cap; dropping subtree");
            return;
        }
        match node {
            Node::Scalar(value) => {
                let trimmed = value.trim();
                if !is_noise(trimmed) {
                    out.push_str(trimmed);
                    out.push(' ');
                }
            }
            Node::Array(items) => {
                for item in items {
                    self.walk(item, depth + 1, out);
                }
            }
            Node::Object(entries) => {
                for (key, child) in entries {
                    if key.starts_with(ATTRIBUTE_PREFIX) || self.ignored.contains(key) {
                        continue;
                    }
                    self.walk(child, depth + 1, out);
                }
            }
        }
    }
}

/// Leaves without a single letter or digit carry no prose. Symbols count as punctuation here.
fn is_noise(value: &str) -> bool {
    !value.chars().any(char::is_alphanumeric)
}

/// Extract prose with the default ignored-tag set.
pub fn extract_text(node: &Node) -> String {
    TextExtractor::default().extract(node)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn section_text_survives_and_header_is_dropped() {
        let tree = Node::object([(
            "section",
            Node::Array(vec![Node::object([
                ("header", Node::scalar("Short title")),
                ("text", Node::scalar("This Act may be cited as the Example Act.")),
            ])]),
        )]);

        let text = extract_text(&tree);
        assert!(text.contains("This Act may be cited"));
        assert!(!text.contains("Short title"));
    }

    #[test]
    fn attributes_and_punctuation_leaves_are_skipped() {
        let tree = Node::object([
            ("@_id", Node::scalar("H1234")),
            ("marker", Node::scalar(" -- ")),
            ("text", Node::scalar("  The Secretary   shall report. ")),
            ("tail", Node::scalar("Annually.")),
        ]);
        assert_eq!(extract_text(&tree), "The Secretary shall report. Annually.");
    }

    #[test]
    fn unicode_punctuation_leaves_are_noise() {
        let tree = Node::object([
            ("dash", Node::scalar("\u{2014}")),
            ("section-sign", Node::scalar(" \u{a7} ")),
            ("quotes", Node::scalar("\u{201c}\u{201d}")),
            ("cite", Node::scalar("\u{a7} 101")),
            ("text", Node::scalar("Na\u{ef}ve caf\u{e9} rules.")),
        ]);
        assert_eq!(extract_text(&tree), "\u{a7} 101 Na\u{ef}ve caf\u{e9} rules.");
    }

    #[test]
    fn cross_reference_targets_are_skipped() {
        let tree = Node::object([
            ("text", Node::scalar("See section 2.")),
            ("xref-target", Node::scalar("H1A2B3")),
        ]);
        assert_eq!(extract_text(&tree), "See section 2.");
    }

    #[test]
    fn key_order_is_preserved() {
        let tree = Node::object([
            ("subsection", Node::scalar("First")),
            ("paragraph", Node::scalar("Second")),
            ("subsection", Node::scalar("Third")),
        ]);
        assert_eq!(extract_text(&tree), "First Second Third");
    }

    #[test]
    fn injected_tags_are_ignored() {
        let tree = Node::object([
            ("quote", Node::scalar("quoted")),
            ("text", Node::scalar("kept")),
        ]);
        let extractor = TextExtractor::new(Vec::<String>::new()).ignore("quote");
        assert_eq!(extractor.extract(&tree), "kept");
    }

    #[test]
    fn nesting_beyond_cap_is_dropped() {
        let mut node = Node::scalar("deep");
        for _ in 0..10 {
            node = Node::object([("level", node)]);
        }
        let shallow = TextExtractor::default().with_max_depth(3);
        assert_eq!(shallow.extract(&node), "");
        assert_eq!(TextExtractor::default().extract(&node), "deep");
    }

    #[test]
    fn parsed_xml_extracts_body_prose() {
        let xml = br#"<legis-body><section id="S1"><enum>1.</enum><header>Short title</header>
            <text>This Act may be cited as the <quote>Example Act</quote>.</text></section></legis-body>"#;
        let tree = super::super::node::parse_xml(xml).expect("parse");
        // The closing period is its own punctuation-only leaf.
        assert_eq!(
            extract_text(&tree),
            "This Act may be cited as the Example Act"
        );
    }
}
