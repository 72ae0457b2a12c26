use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// A 0-based position in the source text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Position {
    /// 0-based line number
    pub line: usize,
    /// 0-based column (character offset within the line)
    pub column: usize,
    /// 0-based absolute byte offset from the start of input
    pub offset: usize,
}

/// A begin..end region of the source (end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Span {
    pub begin: Position,
    pub end: Position,
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.begin == self.end {
            write!(f, "{}:{}", self.begin.line, self.begin.column)
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.begin.line, self.begin.column, self.end.line, self.end.column
            )
        }
    }
}

/// A structural syntax error in a build file.
///
/// Only problems that make the rest of the file unreadable end up here
/// (unclosed blocks, unterminated strings). Expressions the parser does not
/// understand are kept verbatim instead.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{span}: {message} ({code})")]
pub struct DslError {
    pub code: &'static str,
    pub message: String,
    pub span: Span,
}

impl DslError {
    pub fn syntax_error(message: String, begin: Position, end: Position) -> Self {
        DslError {
            code: "dsl-syntax-error",
            message,
            span: Span { begin, end },
        }
    }
}

/// Misuse of a property handle. These are programmer errors and are
/// reported at the call site; the tree is never modified when one is
/// returned.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PropertyError {
    #[error("index {index} out of range for list `{property}` of length {len}")]
    IndexOutOfRange {
        property: String,
        index: usize,
        len: usize,
    },

    #[error("stale handle for `{property}`: the build file changed since it was obtained")]
    StaleHandle { property: String },

    #[error("`{property}` is not a list")]
    NotAList { property: String },

    #[error("`{property}` is a read-only alias of `{target}`")]
    ReadOnlyAlias { property: String, target: String },

    /// The value has no text that would read back as itself.
    #[error("`{text}` cannot be written as the value of `{property}`")]
    InvalidLiteral { property: String, text: String },

    #[error("invalid reference `{reference}`")]
    InvalidReference { reference: String },

    #[error("property `{description}` is not bound to a build file")]
    NotBound { description: String },
}

/// Failure to load a [`crate::config::DslConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config: {0}")]
    Toml(#[from] toml::de::Error),
}
