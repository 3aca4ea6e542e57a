//! Compiler settings.
//!
//! Settings come from an optional TOML file; the CLI overrides individual
//! fields. Missing keys take their defaults.
//!
//! ```toml
//! error_limit = 10
//! log_warnings = true
//! primitive_package = "builtin"
//! default_package = "webapi"
//! ```

use std::fs;
use std::path::Path;

use anyhow::{Context as _, Result};
use serde::{Deserialize, Serialize};

use crate::diagnostic::DEFAULT_ERROR_LIMIT;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Stages stop once more errors than this were reported
    pub error_limit: usize,
    /// Whether warnings are printed
    pub log_warnings: bool,
    /// Package of Promise instantiations over primitive element types
    pub primitive_package: String,
    /// Package for every entity, instead of one package per IDL file
    pub default_package: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            error_limit: DEFAULT_ERROR_LIMIT,
            log_warnings: true,
            primitive_package: "builtin".to_string(),
            default_package: None,
        }
    }
}

impl Config {
    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&text).with_context(|| format!("Invalid config file: {:?}", path))
    }
}
