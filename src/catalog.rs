//! Static model catalog used to parameterize deployments.
//!
//! The catalog is an explicit value constructed once at process start
//! and passed by reference to whatever needs lookups; there is no
//! package-level cached state.

use crate::error::{BenchError, Result};
use serde::{Deserialize, Serialize};

/// Embedded default catalog. A deployment-manager integration may build
/// its own [`Catalog`] from an external source instead.
const BUILTIN_CATALOG: &str = r#"[
  {"id": "small-8b",  "size_class": "8B",  "resource_profile": "gpu-small",  "context_window": 8192,   "default_gpus": 1},
  {"id": "medium-32b","size_class": "32B", "resource_profile": "gpu-medium", "context_window": 32768,  "default_gpus": 2},
  {"id": "large-70b", "size_class": "70B", "resource_profile": "gpu-large",  "context_window": 131072, "default_gpus": 4}
]"#;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,
    pub size_class: String,
    pub resource_profile: String,
    pub context_window: u64,
    pub default_gpus: u64,
}

#[derive(Debug, Clone)]
pub struct Catalog {
    entries: Vec<CatalogEntry>,
}

impl Catalog {
    /// Parse the embedded default catalog.
    pub fn builtin() -> Result<Self> {
        let entries = serde_json::from_str(BUILTIN_CATALOG)?;
        Ok(Self { entries })
    }

    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }

    pub fn entry(&self, id: &str) -> Result<&CatalogEntry> {
        self.entries
            .iter()
            .find(|e| e.id == id)
            .ok_or_else(|| BenchError::Config(format!("unknown catalog entry: {id}")))
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.id.as_str())
    }
}
