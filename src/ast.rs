//! Intermediate representation produced by the parser, consumed by the
//! interpreter that builds the property tree.
use crate::tree::Scalar;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static REFERENCE_PATH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(?:\.[A-Za-z_][A-Za-z0-9_]*|\[[0-9]+\])*$")
        .expect("reference path pattern is valid")
});

/// A segment in a reference path: either a named property or a list index.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RefPathSegment {
    Name(String),
    Index(usize),
}

/// A reference such as `propB`, `ext.propB` or `propList[1]`.
/// The first segment is always a name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReferencePath(pub Vec<RefPathSegment>);

impl ReferencePath {
    /// Parse the textual form of a reference. Returns `None` when the text
    /// is not a plain identifier path.
    pub fn parse(text: &str) -> Option<ReferencePath> {
        if !REFERENCE_PATH.is_match(text) {
            return None;
        }
        let mut segments = Vec::new();
        for part in text.split('.') {
            let (name, mut rest) = match part.find('[') {
                Some(i) => (&part[..i], &part[i..]),
                None => (part, ""),
            };
            segments.push(RefPathSegment::Name(name.to_string()));
            while let Some(close) = rest.find(']') {
                let index = rest[1..close].parse().ok()?;
                segments.push(RefPathSegment::Index(index));
                rest = &rest[close + 1..];
            }
        }
        Some(ReferencePath(segments))
    }
}

impl fmt::Display for ReferencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, seg) in self.0.iter().enumerate() {
            match seg {
                RefPathSegment::Name(name) => {
                    if i > 0 {
                        f.write_str(".")?;
                    }
                    f.write_str(name)?;
                }
                RefPathSegment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

/// One run of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum StringPart {
    Text(String),
    Reference(ReferencePath),
}

/// How a list literal was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListStyle {
    /// `[a, b]`
    Brackets,
    /// `listOf(a, b)`
    ListOf,
    /// The argument list of a call-style assignment: `name(a, b)`
    Args,
}

/// How a property assignment was written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignStyle {
    /// `name = value`
    Assign,
    /// `name(value)`
    Call,
}

/// A value expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(Scalar),
    Reference(ReferencePath),
    /// A double-quoted string with at least one embedded reference.
    Interpolated(Vec<StringPart>),
    List { items: Vec<SourceExpr>, style: ListStyle },
    /// An expression outside the property subset, kept as written.
    Unknown(String),
}

/// A value expression together with the text it was parsed from.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceExpr {
    pub expr: Expr,
    pub source: String,
}

/// A parsed statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// `a.b = value` or `a.b(value)`
    Assign {
        path: Vec<String>,
        value: SourceExpr,
        style: AssignStyle,
    },
    /// `a.b { statements }`
    Block {
        path: Vec<String>,
        statements: Vec<Statement>,
    },
    /// A statement that is not a property assignment (`apply plugin: 'x'`).
    Verbatim(String),
}
