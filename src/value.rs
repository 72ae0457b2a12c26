use crate::ast::StringPart;
use crate::config::DslConfig;
use crate::printer::element_text;
use crate::tree::{Element, ElementValue, Scalar};
use serde::Serialize;

/// How one property node reads, before any reference is followed.
///
/// Equality is structural: a literal `"2"` is not equal to a reference
/// that happens to resolve to `"2"`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ParsedValue<T> {
    /// No node, or a list slot that has not been assigned.
    NotSet,
    /// A value of the bound type, with the text it was written as.
    Literal(T, String),
    /// Path of another property (`propB`, `ext.propB`, `propList[1]`).
    Reference(String),
    InterpolatedString(Vec<Segment>),
    /// Text that is present but does not read as the bound type.
    Unknown(String),
}

impl<T> ParsedValue<T> {
    pub fn is_set(&self) -> bool {
        !matches!(self, ParsedValue::NotSet)
    }

    pub fn literal(&self) -> Option<&T> {
        match self {
            ParsedValue::Literal(value, _) => Some(value),
            _ => None,
        }
    }
}

/// One piece of an interpolated string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Segment {
    Text(String),
    Reference(String),
}

impl Segment {
    pub fn text(text: impl Into<String>) -> Self {
        Segment::Text(text.into())
    }

    pub fn reference(name: impl Into<String>) -> Self {
        Segment::Reference(name.into())
    }
}

impl From<&StringPart> for Segment {
    fn from(part: &StringPart) -> Self {
        match part {
            StringPart::Text(text) => Segment::Text(text.clone()),
            StringPart::Reference(path) => Segment::Reference(path.to_string()),
        }
    }
}

// ── Codecs ──────────────────────────────────────────────────────────

/// The parse/format pair a binding reads and writes its scalar type with.
pub struct Codec<T> {
    /// `None` means the scalar does not read as `T`.
    pub parse: fn(&Scalar) -> Option<T>,
    pub format: fn(&T) -> Scalar,
}

impl<T> Clone for Codec<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Codec<T> {}

impl Codec<String> {
    /// String literals only.
    pub const STRING: Codec<String> = Codec {
        parse: parse_string,
        format: format_string,
    };

    /// Any scalar, in its interpolation form. Used for display.
    pub const TEXT: Codec<String> = Codec {
        parse: parse_text,
        format: format_string,
    };
}

impl Codec<i64> {
    /// Integer literals, and strings holding one.
    pub const INTEGER: Codec<i64> = Codec {
        parse: parse_integer,
        format: format_integer,
    };
}

impl Codec<f64> {
    pub const DECIMAL: Codec<f64> = Codec {
        parse: parse_decimal,
        format: format_decimal,
    };
}

impl Codec<bool> {
    pub const BOOLEAN: Codec<bool> = Codec {
        parse: parse_boolean,
        format: format_boolean,
    };
}

fn parse_string(scalar: &Scalar) -> Option<String> {
    match scalar {
        Scalar::String(s) => Some(s.clone()),
        _ => None,
    }
}

fn parse_text(scalar: &Scalar) -> Option<String> {
    Some(scalar.to_string())
}

fn format_string(value: &String) -> Scalar {
    Scalar::String(value.clone())
}

fn parse_integer(scalar: &Scalar) -> Option<i64> {
    match scalar {
        Scalar::Integer(i) => Some(*i),
        Scalar::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn format_integer(value: &i64) -> Scalar {
    Scalar::Integer(*value)
}

fn parse_decimal(scalar: &Scalar) -> Option<f64> {
    match scalar {
        Scalar::Decimal(d) => Some(*d),
        Scalar::Integer(i) => Some(*i as f64),
        _ => None,
    }
}

fn format_decimal(value: &f64) -> Scalar {
    Scalar::Decimal(*value)
}

fn parse_boolean(scalar: &Scalar) -> Option<bool> {
    match scalar {
        Scalar::Boolean(b) => Some(*b),
        Scalar::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn format_boolean(value: &bool) -> Scalar {
    Scalar::Boolean(*value)
}

// ── Classification ──────────────────────────────────────────────────

/// Read one node (or its absence) as a [`ParsedValue`].
pub(crate) fn classify<T>(
    element: Option<&Element>,
    codec: &Codec<T>,
    config: &DslConfig,
) -> ParsedValue<T> {
    let Some(element) = element else {
        return ParsedValue::NotSet;
    };
    match &element.value {
        ElementValue::Unset => ParsedValue::NotSet,
        ElementValue::Reference(path) => ParsedValue::Reference(path.to_string()),
        ElementValue::Interpolated(parts) => {
            ParsedValue::InterpolatedString(parts.iter().map(Segment::from).collect())
        }
        ElementValue::Literal(scalar) => match (codec.parse)(scalar) {
            Some(value) => ParsedValue::Literal(value, element_text(element, config)),
            None => ParsedValue::Unknown(element_text(element, config)),
        },
        ElementValue::List { .. } | ElementValue::Unknown(_) => {
            ParsedValue::Unknown(element_text(element, config))
        }
    }
}

/// Everything known about one property at once.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertyValue<T> {
    pub parsed: ParsedValue<T>,
    /// Following references and interpolations within the file.
    pub resolved: Option<T>,
    /// From the model's own resolution, when one is attached.
    pub external: Option<T>,
}
