//! Hierarchical in-memory representation of a configuration.
//!
//! A [`ConfigTree`] is an ordered forest of [`ConfigLine`] values keyed by
//! their parent-section path. Trees are built fresh per operation from
//! device text or a caller-supplied candidate, and are never mutated after
//! construction: the diff engine derives new command lists from them.

use std::path::Path;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::Result;
use crate::sections::{IgnoreRules, LineKind, SectionRules};

/// One configuration command line together with its nesting path.
///
/// Two lines are the same entry iff their `parents` paths are equal
/// element-wise and their text is equal. Strict matching additionally
/// compares the position among siblings (`order`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConfigLine {
    text: String,
    parents: Vec<String>,
    order: usize,
}

impl ConfigLine {
    /// Create a line under the given parent path at the given sibling index.
    pub fn new(text: impl Into<String>, parents: Vec<String>, order: usize) -> Self {
        Self {
            text: text.into(),
            parents,
            order,
        }
    }

    /// The exact command text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Ordered section headers this line is nested under; empty for a
    /// top-level line.
    pub fn parents(&self) -> &[String] {
        &self.parents
    }

    /// Position among siblings under the same parent path, preserved from
    /// source order.
    pub fn order(&self) -> usize {
        self.order
    }
}

/// An ordered forest of configuration lines, keyed by parent path.
///
/// Section order follows first appearance in the source; sibling order is
/// source order. Top-level lines live under the empty path. Section opener
/// and terminator lines are consumed structurally and are not stored as
/// entries; the diff engine re-emits them around child commands.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigTree {
    sections: IndexMap<Vec<String>, Vec<ConfigLine>>,
}

impl ConfigTree {
    /// Parse flat device text into a tree using the given section grammar.
    ///
    /// Malformed nesting (terminator without opener, opener without
    /// terminator, opener inside an open section) surfaces as a structural
    /// error; no partial tree is returned.
    pub fn parse(text: &str, rules: &SectionRules) -> Result<Self> {
        Self::parse_filtered(text, rules, &IgnoreRules::default())
    }

    /// Parse device text, dropping lines matched by `ignore` before the
    /// tree is built. Used when comparing configurations that contain
    /// device-managed lines (timestamps, serial numbers).
    pub fn parse_filtered(text: &str, rules: &SectionRules, ignore: &IgnoreRules) -> Result<Self> {
        let mut tree = Self::default();
        for line in rules.classify(text)? {
            match line.kind {
                LineKind::Opener => {
                    let mut path = line.parents;
                    path.push(line.text);
                    tree.sections.entry(path).or_default();
                }
                LineKind::Plain => {
                    if !ignore.matches(&line.text) {
                        tree.push(line.text, line.parents);
                    }
                }
                LineKind::Terminator => {}
            }
        }
        tracing::debug!(sections = tree.sections.len(), "parsed configuration tree");
        Ok(tree)
    }

    /// Build a candidate tree directly from a flat command list under an
    /// explicit parent path, bypassing pattern detection.
    pub fn from_lines<S: AsRef<str>>(lines: &[S], parents: &[String]) -> Self {
        let mut tree = Self::default();
        for line in lines {
            let text = line.as_ref().trim();
            if text.is_empty() {
                continue;
            }
            tree.push(text.to_string(), parents.to_vec());
        }
        tree
    }

    /// Load a full configuration (or config template output) from a file,
    /// classifying sections with the given grammar.
    pub fn from_file(path: impl AsRef<Path>, rules: &SectionRules) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents, rules)
    }

    fn push(&mut self, text: String, parents: Vec<String>) {
        let group = self.sections.entry(parents.clone()).or_default();
        let order = group.len();
        group.push(ConfigLine::new(text, parents, order));
    }

    /// Whether the tree has no entries and no (possibly empty) sections.
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    /// Whether a section with this exact parent path exists, even if it has
    /// no child lines.
    pub fn has_section(&self, path: &[String]) -> bool {
        self.sections.contains_key(path)
    }

    /// Child lines under the given parent path, in source order.
    pub fn children(&self, path: &[String]) -> Option<&[ConfigLine]> {
        self.sections.get(path).map(|v| v.as_slice())
    }

    /// Iterate sections in first-seen order as `(path, children)` pairs.
    pub fn sections(&self) -> impl Iterator<Item = (&[String], &[ConfigLine])> {
        self.sections
            .iter()
            .map(|(path, lines)| (path.as_slice(), lines.as_slice()))
    }

    /// Total number of command lines across all sections.
    pub fn len(&self) -> usize {
        self.sections.values().map(Vec::len).sum()
    }
}
