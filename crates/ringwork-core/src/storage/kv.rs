//! Durable key-value seam.
//!
//! The alarm store only ever reads and overwrites whole values under a
//! couple of fixed keys, so this is all it needs from the backing store.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::PersistenceError;

pub trait KeyValueStore: Send + Sync {
    /// Value stored under `key`, or `None` if the key was never written.
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError>;

    /// Overwrite the value under `key`.
    fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError>;
}

/// Process-local store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryKv {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKv {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKv {
    fn get(&self, key: &str) -> Result<Option<String>, PersistenceError> {
        let entries = self.entries.lock().map_err(|_| PersistenceError::Locked)?;
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &str) -> Result<(), PersistenceError> {
        let mut entries = self.entries.lock().map_err(|_| PersistenceError::Locked)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_then_overwritten() {
        let kv = MemoryKv::new();
        assert!(kv.get("alarms").unwrap().is_none());
        kv.put("alarms", "[]").unwrap();
        kv.put("alarms", "[1]").unwrap();
        assert_eq!(kv.get("alarms").unwrap().as_deref(), Some("[1]"));
    }
}
