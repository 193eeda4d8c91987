//! Saved scene layouts.
//!
//! A layout is the placement of every entity, keyed by entity id. Storage is
//! an opaque side channel: the world logs store failures and carries on with
//! whatever placement it already has.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::components::EntityId;
use crate::error::{SimError, SimResult};

/// Where one entity stands.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    pub id: EntityId,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub direction: f32,
}

/// Placements of a whole scene.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SavedLayout {
    pub placements: Vec<Placement>,
}

impl SavedLayout {
    pub fn to_json(&self) -> SimResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(data: &str) -> SimResult<Self> {
        Ok(serde_json::from_str(data)?)
    }
}

/// Key-value store for serialized layouts.
pub trait LayoutStore {
    /// Stored value for `key`, or `None` if nothing was saved under it.
    fn load(&self, key: &str) -> SimResult<Option<String>>;

    fn save(&mut self, key: &str, value: &str) -> SimResult<()>;
}

/// In-process store, mainly for tests and tools.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: HashMap<String, String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl LayoutStore for MemoryStore {
    fn load(&self, key: &str) -> SimResult<Option<String>> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &str) -> SimResult<()> {
        if key.is_empty() {
            return Err(SimError::Store("empty layout key".to_string()));
        }
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_store_roundtrip() {
        let layout = SavedLayout {
            placements: vec![Placement {
                id: EntityId(3),
                x: 1.0,
                y: 0.0,
                z: -2.0,
                direction: 0.5,
            }],
        };
        let mut store = MemoryStore::new();
        store.save("village", &layout.to_json().unwrap()).unwrap();

        let loaded = store.load("village").unwrap().unwrap();
        assert_eq!(SavedLayout::from_json(&loaded).unwrap(), layout);
        assert!(store.load("elsewhere").unwrap().is_none());
    }

    #[test]
    fn test_empty_key_rejected() {
        let mut store = MemoryStore::new();
        assert!(matches!(store.save("", "{}"), Err(SimError::Store(_))));
        assert!(store.is_empty());
    }

    #[test]
    fn test_garbage_json_is_an_error() {
        assert!(matches!(SavedLayout::from_json("not json"), Err(SimError::Json(_))));
    }
}
