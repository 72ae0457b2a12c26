pub mod ast;
pub mod config;
pub mod descriptor;
pub mod error;
pub mod interpreter;
pub mod json;
pub mod list;
pub mod model;
pub mod parser;
pub mod printer;
pub mod property;
pub mod resolve;
pub mod tree;
pub mod value;

use error::DslError;
use tree::DslFile;

pub use config::{Dialect, DslConfig};
pub use descriptor::{ModelDescriptor, ModelListProperty, ModelProperty};
pub use error::PropertyError;
pub use list::ListPropertyCore;
pub use model::{BlockRef, BuildModel, PropertyRef};
pub use property::PropertyCore;
pub use resolve::{validate_references, ReferenceError};
pub use value::{Codec, ParsedValue, PropertyValue, Segment};

// ── Core API ───────────────────────────────────────────────────────

/// Parse build-file source into a property tree.
pub fn parse_build_file(input: &str) -> Result<DslFile, DslError> {
    let statements = parser::parse(input)?;
    let mut file = DslFile::new();
    interpreter::execute(&statements, &mut file);
    Ok(file)
}

#[cfg(test)]
mod tests;
