//! Model selector -> checkpoint load path table.
//!
//! The table is fixed for the lifetime of the daemon. It is either the
//! built-in one or a JSON object loaded once at startup:
//!
//! ```json
//! { "techno": "checkpoints/techno", "misc": "checkpoints/misc" }
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::domain::{OrchestrationError, RegistryError};

/// One selectable model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelEntry {
    pub selector: String,
    pub load_path: String,
}

/// Immutable selector lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelRegistry {
    entries: BTreeMap<String, String>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl ModelRegistry {
    /// The checkpoints shipped in the Musika image.
    pub fn builtin() -> Self {
        Self::from_entries([
            ModelEntry {
                selector: "techno".to_string(),
                load_path: "checkpoints/techno".to_string(),
            },
            ModelEntry {
                selector: "misc".to_string(),
                load_path: "checkpoints/misc".to_string(),
            },
        ])
    }

    pub fn from_entries(entries: impl IntoIterator<Item = ModelEntry>) -> Self {
        ModelRegistry {
            entries: entries
                .into_iter()
                .map(|e| (e.selector, e.load_path))
                .collect(),
        }
    }

    /// Parse a JSON object of `selector: load_path` pairs.
    pub fn from_json_str(json: &str) -> Result<Self, RegistryError> {
        let table: BTreeMap<String, String> = serde_json::from_str(json)?;
        if table.is_empty() {
            return Err(RegistryError::Empty);
        }
        if table
            .iter()
            .any(|(k, v)| k.trim().is_empty() || v.trim().is_empty())
        {
            return Err(RegistryError::EmptyEntry);
        }
        Ok(ModelRegistry { entries: table })
    }

    /// Load a JSON model table from disk.
    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }

    /// Load path for `selector`, or [`OrchestrationError::UnknownModel`].
    pub fn resolve(&self, selector: &str) -> Result<&str, OrchestrationError> {
        self.entries
            .get(selector)
            .map(String::as_str)
            .ok_or_else(|| OrchestrationError::UnknownModel(selector.to_string()))
    }

    pub fn entries(&self) -> impl Iterator<Item = ModelEntry> + '_ {
        self.entries.iter().map(|(selector, load_path)| ModelEntry {
            selector: selector.clone(),
            load_path: load_path.clone(),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
