use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{Error, Result};

/// Rejects the empty key. Every keyed operation goes through this check,
/// including writes a follower forwards without touching its own map.
pub fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::InvalidKey);
    }
    Ok(())
}

/// In-memory key-value map shared by every request task of a node.
///
/// A single reader/writer lock guards the map: lookups run concurrently,
/// mutations are exclusive. Clones share the same underlying map.
pub struct StorageEngine {
    data: Arc<RwLock<HashMap<String, String>>>,
}

impl StorageEngine {
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Inserts or overwrites `key`.
    pub fn put(&self, key: impl Into<String>, value: impl Into<String>) -> Result<()> {
        let key = key.into();
        validate_key(&key)?;
        self.data.write().insert(key, value.into());
        Ok(())
    }

    /// Returns `Ok(None)` for a missing key; a stored empty string comes back
    /// as `Ok(Some(""))`.
    pub fn get(&self, key: &str) -> Result<Option<String>> {
        validate_key(key)?;
        Ok(self.data.read().get(key).cloned())
    }

    /// Returns `true` only if an entry was actually removed.
    pub fn delete(&self, key: &str) -> Result<bool> {
        validate_key(key)?;
        Ok(self.data.write().remove(key).is_some())
    }

    pub fn has(&self, key: &str) -> bool {
        self.data.read().contains_key(key)
    }

    pub fn size(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Snapshot of the current keys, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }

    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl Clone for StorageEngine {
    fn clone(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
        }
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("size", &self.size())
            .finish()
    }
}
