use std::io;
use std::sync::Arc;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors reported by the engine.
///
/// The enum is `Clone` so that a failed corpus build can be stored once and
/// handed to every later query unchanged.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("no files specified for backend")]
    NoSources,

    #[error("no URLs in the query")]
    NoUrls,

    #[error("limit is out of range: {0}")]
    LimitOutOfRange(i64),

    #[error("negative tolerance: {0}")]
    NegativeTolerance(i64),

    #[error("too many prefix variants: {count} (at most {max})")]
    TooManyPrefixes { count: usize, max: usize },

    #[error("empty prefix list")]
    EmptyPrefixList,

    #[error("invalid prefix: {0:?}")]
    InvalidPrefix(String),

    #[error("invalid scheme: {0:?}")]
    InvalidScheme(String),

    #[error("method is disabled: {0}")]
    MethodDisabled(&'static str),

    #[error("unknown method: {0}")]
    UnknownMethod(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("failed to encode reply: {0}")]
    Encode(String),

    #[error("invalid config {path}: {message}")]
    Config { path: String, message: String },

    #[error(transparent)]
    Pattern(#[from] regex::Error),

    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: Arc<io::Error>,
    },

    #[error("no links in source files")]
    NoLinks,

    #[error("corpus build aborted")]
    BuildAborted,
}

/// Coarse classification of [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad request or configuration; local to one call, never cached.
    Config,
    /// Corpus build failure; latched for the rest of the process.
    Build,
}

impl Error {
    pub fn io(path: impl Into<String>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source: Arc::new(source),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Io { .. } | Self::NoLinks | Self::BuildAborted => ErrorKind::Build,
            _ => ErrorKind::Config,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::NoSources => "NO_SOURCES",
            Self::NoUrls => "NO_URLS",
            Self::LimitOutOfRange(_) => "LIMIT_OUT_OF_RANGE",
            Self::NegativeTolerance(_) => "NEGATIVE_TOLERANCE",
            Self::TooManyPrefixes { .. } => "TOO_MANY_PREFIXES",
            Self::EmptyPrefixList => "EMPTY_PREFIX_LIST",
            Self::InvalidPrefix(_) => "INVALID_PREFIX",
            Self::InvalidScheme(_) => "INVALID_SCHEME",
            Self::MethodDisabled(_) => "METHOD_DISABLED",
            Self::UnknownMethod(_) => "UNKNOWN_METHOD",
            Self::InvalidRequest(_) => "INVALID_REQUEST",
            Self::Encode(_) => "ENCODE_ERROR",
            Self::Config { .. } => "CONFIG_ERROR",
            Self::Pattern(_) => "PATTERN_ERROR",
            Self::Io { .. } => "IO_ERROR",
            Self::NoLinks => "NO_LINKS",
            Self::BuildAborted => "BUILD_ABORTED",
        }
    }
}
