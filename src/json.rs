use crate::error::{DslError, Position, PropertyError};
use crate::model::BuildModel;
use crate::resolve::ReferenceError;
use crate::value::{Codec, ParsedValue};
use serde::Serialize;

/// JSON formatting style.
#[derive(Clone, Copy)]
pub enum JsonStyle {
    /// Compact: no whitespace between tokens.
    Compact,
    /// Pretty: 2-space indented, one entry per line.
    Pretty,
}

/// One property as seen by tooling: how it is written and what it means.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PropertySnapshot {
    pub path: String,
    pub parsed: ParsedValue<String>,
    pub resolved: Option<String>,
    /// Present for list properties, including list aliases.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ItemSnapshot>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ItemSnapshot {
    pub parsed: ParsedValue<String>,
    pub resolved: Option<String>,
}

/// Read every property of the model, in file order. Scalars are shown in
/// their string form.
pub fn snapshot(model: &BuildModel) -> Result<Vec<PropertySnapshot>, PropertyError> {
    let mut out = Vec::new();
    for path in model.property_paths() {
        let property = model.find_property(&path);
        let scalar = property.scalar(Codec::TEXT);
        let items = match property.list(Codec::TEXT).editable_values() {
            Ok(items) => Some(
                items
                    .iter()
                    .map(|item| {
                        Ok(ItemSnapshot {
                            parsed: item.parsed_value()?,
                            resolved: item.resolved_value()?,
                        })
                    })
                    .collect::<Result<Vec<_>, PropertyError>>()?,
            ),
            Err(PropertyError::NotAList { .. }) => None,
            Err(err) => return Err(err),
        };
        out.push(PropertySnapshot {
            path,
            parsed: scalar.parsed_value()?,
            resolved: scalar.resolved_value()?,
            items,
        });
    }
    Ok(out)
}

pub fn to_json<T: Serialize>(value: &T, style: JsonStyle) -> serde_json::Result<String> {
    match style {
        JsonStyle::Compact => serde_json::to_string(value),
        JsonStyle::Pretty => serde_json::to_string_pretty(value),
    }
}

#[derive(Serialize)]
struct ErrorRecord<'a> {
    code: &'a str,
    message: &'a str,
    begin: &'a Position,
    end: &'a Position,
}

/// Serialize syntax errors to a compact JSON array.
pub fn errors_to_json(errors: &[DslError]) -> serde_json::Result<String> {
    let records: Vec<_> = errors
        .iter()
        .map(|err| ErrorRecord {
            code: err.code,
            message: &err.message,
            begin: &err.span.begin,
            end: &err.span.end,
        })
        .collect();
    serde_json::to_string(&records)
}

/// Serialize reference diagnostics to a compact JSON array.
pub fn validation_errors_to_json(errors: &[ReferenceError]) -> serde_json::Result<String> {
    serde_json::to_string(errors)
}
