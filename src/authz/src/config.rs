//! Configuration loading

use crate::error::{PolarError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Binding layer configuration
///
/// ```toml
/// source_extension = "polar"
/// enable_roles = true
/// inline_queries = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct WardenConfig {
    /// Extension `enqueue_file` accepts, without the dot
    pub source_extension: String,
    /// Load the role-hierarchy prelude at startup and after every `clear`
    pub enable_roles: bool,
    /// Run `?=` self-checks when sources load
    pub inline_queries: bool,
}

impl Default for WardenConfig {
    fn default() -> Self {
        Self {
            source_extension: default_extension(),
            enable_roles: false,
            inline_queries: true,
        }
    }
}

fn default_extension() -> String {
    "polar".to_string()
}

impl WardenConfig {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| PolarError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| PolarError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        let ext = &self.source_extension;
        if ext.is_empty() || ext.starts_with('.') || ext.contains(std::path::is_separator) {
            return Err(PolarError::Config(format!(
                "source_extension must be a bare extension like \"polar\", got {:?}",
                ext
            )));
        }
        Ok(())
    }
}
