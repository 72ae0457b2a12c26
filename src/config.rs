//! Printing configuration.

use crate::ast::ListStyle;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Which flavour of the build DSL new text is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    /// `build.gradle`: `'plain'` strings, `[a, b]` lists
    #[default]
    Groovy,
    /// `build.gradle.kts`: `"plain"` strings, `listOf(a, b)` lists
    Kotlin,
}

impl Dialect {
    /// Guess the dialect from a build file name.
    pub fn from_path(path: &Path) -> Dialect {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("kts") => Dialect::Kotlin,
            _ => Dialect::Groovy,
        }
    }

    /// Syntax used for lists created by the model.
    pub fn list_style(self) -> ListStyle {
        match self {
            Dialect::Groovy => ListStyle::Brackets,
            Dialect::Kotlin => ListStyle::ListOf,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DslConfig {
    pub dialect: Dialect,
    /// Spaces per block nesting level.
    pub indent_width: usize,
}

impl Default for DslConfig {
    fn default() -> Self {
        DslConfig {
            dialect: Dialect::Groovy,
            indent_width: 2,
        }
    }
}

impl DslConfig {
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}
