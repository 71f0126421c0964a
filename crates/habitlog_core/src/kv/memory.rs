//! In-process key-value store.

use super::{KeyValueStore, KvResult};
use std::cell::RefCell;
use std::collections::HashMap;

/// Map-backed store with no durability.
///
/// Used by tests and as a fallback when no device database can be opened.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    values: RefCell<HashMap<String, String>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.values.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryKvStore {
    fn get(&self, key: &str) -> KvResult<Option<String>> {
        Ok(self.values.borrow().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> KvResult<()> {
        self.values
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> KvResult<()> {
        self.values.borrow_mut().remove(key);
        Ok(())
    }
}
