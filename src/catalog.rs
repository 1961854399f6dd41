//! Static catalog of selectable lock models.

use crate::error::{LockVizError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

/// One selectable smart-lock model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockModel {
    /// Unique identifier (e.g. `L-02`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Reference image: `http(s)://`, `file://`, `data:` or a filesystem path.
    pub image_url: String,
}

impl LockModel {
    /// Creates a lock model.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        image_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            image_url: image_url.into(),
        }
    }
}

/// Immutable list of lock models, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Catalog {
    locks: Vec<LockModel>,
}

impl Catalog {
    /// Builds a catalog, rejecting empty lists and duplicate ids.
    pub fn new(locks: Vec<LockModel>) -> Result<Self> {
        if locks.is_empty() {
            return Err(LockVizError::InvalidRequest(
                "lock catalog is empty".into(),
            ));
        }
        let mut seen = HashSet::new();
        for lock in &locks {
            if lock.id.trim().is_empty() {
                return Err(LockVizError::InvalidRequest(
                    "lock catalog entry has an empty id".into(),
                ));
            }
            if !seen.insert(lock.id.as_str()) {
                return Err(LockVizError::InvalidRequest(format!(
                    "duplicate lock id in catalog: {}",
                    lock.id
                )));
            }
        }
        Ok(Self { locks })
    }

    /// Parses a JSON array of `{id, name, imageUrl}` records.
    pub fn from_json(json: &str) -> Result<Self> {
        let locks: Vec<LockModel> = serde_json::from_str(json)?;
        Self::new(locks)
    }

    /// Loads a catalog from a JSON file.
    ///
    /// Relative filesystem image paths are resolved against the file's directory.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let mut catalog = Self::from_json(&text)?;
        if let Some(base) = path.parent() {
            for lock in &mut catalog.locks {
                if is_relative_path(&lock.image_url) {
                    lock.image_url = base.join(&lock.image_url).display().to_string();
                }
            }
        }
        tracing::debug!(path = %path.display(), count = catalog.len(), "loaded lock catalog");
        Ok(catalog)
    }

    /// Looks up a lock by id.
    pub fn get(&self, id: &str) -> Option<&LockModel> {
        self.locks.iter().find(|lock| lock.id == id)
    }

    /// Returns the first entry, the default selection.
    pub fn first(&self) -> &LockModel {
        // `new` guarantees at least one entry.
        &self.locks[0]
    }

    /// Iterates over all entries in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = &LockModel> {
        self.locks.iter()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Always false; an empty catalog cannot be constructed.
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

fn is_relative_path(url: &str) -> bool {
    !url.contains("://") && !url.starts_with("data:") && Path::new(url).is_relative()
}
