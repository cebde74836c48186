//! linkscout - find where links are mentioned in local notes.
//!
//! Documents (plain text, or outlines with `*` headings) are scanned once
//! into a link tree. Queries then look up mentions of a URL, rank URLs by a
//! fuzzy query, or collect links by prefix.

pub mod config;
pub mod corpus;
pub mod engine;
pub mod error;
pub mod fuzzy;
pub mod grammar;
pub mod parse;
pub mod prune;
pub mod tree;
pub mod variants;

pub use config::{EngineConfig, DEFAULT_CONFIG_FILE};
pub use corpus::{Corpus, CorpusStats, SourceSpec, STDIN_PATH};
pub use engine::{
    Engine, LinkSetRequest, LinkSetResponse, MentionsOptions, MentionsRequest, SearchHit,
    SearchRequest,
};
pub use error::{Error, ErrorKind, Result};
pub use grammar::Grammar;
pub use parse::SourceKind;
pub use tree::{Children, CountAttrs, Heading, Link, LinkTree, NodeTag};
