//! Load queue for policy files
//!
//! Files are read when they are enqueued, not when they are loaded: edits
//! made on disk afterwards are not observed. The queue holds at most one
//! entry per source name and is drained in the order names were first
//! enqueued.

use crate::error::{PolarError, Result};
use std::path::Path;
use tracing::debug;

/// Policy source captured for loading
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub name: String,
    pub text: String,
}

impl Source {
    pub fn new(name: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            text: text.into(),
        }
    }

    /// Read a policy file, checking its extension first
    pub fn from_file(path: &Path, extension: &str) -> Result<Self> {
        let display = path.display().to_string();
        if path.extension().and_then(|ext| ext.to_str()) != Some(extension) {
            return Err(PolarError::InvalidSourceExtension {
                path: display,
                expected: extension.to_string(),
            });
        }
        let text = std::fs::read_to_string(path).map_err(|source| PolarError::Io {
            path: display.clone(),
            source,
        })?;
        Ok(Self::new(display, text))
    }
}

#[derive(Debug, Default)]
pub struct LoadQueue {
    entries: Vec<Source>,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a source; an entry with the same name is replaced in place
    ///
    /// Returns whether an existing entry was replaced.
    pub fn push(&mut self, source: Source) -> bool {
        match self.entries.iter_mut().find(|e| e.name == source.name) {
            Some(existing) => {
                debug!(source = %source.name, "Replacing queued source");
                *existing = source;
                true
            }
            None => {
                self.entries.push(source);
                false
            }
        }
    }

    /// Remove and return every queued source
    pub fn take(&mut self) -> Vec<Source> {
        std::mem::take(&mut self.entries)
    }

    pub fn get(&self, name: &str) -> Option<&Source> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
