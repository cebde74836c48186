//! Document parsers.
//!
//! Exactly two document grammars exist, so the source type is a closed enum
//! rather than a trait object. Both variants turn a document into a
//! [`LinkTree`] and can collect a flat set of links by prefix.

mod link_set;
mod outline;
mod plain;

use std::fmt;
use std::path::Path;

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::grammar::Grammar;
use crate::tree::{Link, LinkTree};

pub use link_set::{link_set_alternation, LinkSetPattern};

/// Predicate deciding which links are kept while extracting.
pub type LinkFilter<'f> = &'f dyn Fn(&Link) -> bool;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceKind {
    #[serde(rename = "txt")]
    PlainText,
    #[serde(rename = "org")]
    Outline,
}

impl SourceKind {
    /// Outline files are recognized by their `.org` suffix; anything else is
    /// scanned as plain text.
    pub fn for_path(path: &str) -> Self {
        match Path::new(path).extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("org") => Self::Outline,
            _ => Self::PlainText,
        }
    }

    pub fn flag(self) -> &'static str {
        match self {
            Self::PlainText => "txt",
            Self::Outline => "org",
        }
    }

    /// Parse `content` into an untagged tree of the links accepted by
    /// `filter` (all links when `filter` is `None`).
    pub fn extract(
        self,
        grammar: &Grammar,
        content: &str,
        filter: Option<LinkFilter<'_>>,
    ) -> LinkTree {
        let root = match self {
            Self::PlainText => plain::extract(grammar, content, filter),
            Self::Outline => outline::extract(grammar, content, filter),
        };
        LinkTree::Children(root)
    }

    /// Add every literal link matching `pattern` to `out`.
    pub fn collect_link_set(
        self,
        grammar: &Grammar,
        pattern: &LinkSetPattern,
        content: &str,
        out: &mut AHashSet<String>,
    ) {
        match self {
            Self::PlainText => pattern.collect_bare(content, out),
            Self::Outline => pattern.collect_outline(grammar, content, out),
        }
    }

    /// Collect the set of links in `content` starting with one of `prefixes`.
    pub fn extract_link_set<S: AsRef<str>>(
        self,
        grammar: &Grammar,
        content: &str,
        prefixes: &[S],
    ) -> Result<AHashSet<String>> {
        let pattern = LinkSetPattern::new(prefixes)?;
        let mut out = AHashSet::new();
        self.collect_link_set(grammar, &pattern, content, &mut out);
        Ok(out)
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.flag())
    }
}
