//! In-process key/value namespaces used as the completion handshake for
//! deferred tasks.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde_json::Value;

use crate::error::{Error, Result};

struct KeySpace {
    capacity: usize,
    values: HashMap<String, Value>,
}

#[derive(Clone, Default)]
pub struct KeySpaces {
    inner: Arc<RwLock<HashMap<String, KeySpace>>>,
}

impl KeySpaces {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a namespace holding at most `capacity` keys. False if it exists.
    pub fn create(&self, ns: &str, capacity: usize) -> bool {
        let mut spaces = self.write();
        if spaces.contains_key(ns) {
            return false;
        }
        spaces.insert(
            ns.to_string(),
            KeySpace {
                capacity,
                values: HashMap::new(),
            },
        );
        true
    }

    pub fn destroy(&self, ns: &str) -> bool {
        self.write().remove(ns).is_some()
    }

    pub fn exists(&self, ns: &str) -> bool {
        self.read().contains_key(ns)
    }

    pub fn set(&self, ns: &str, key: &str, value: impl Into<Value>) -> Result<()> {
        let mut spaces = self.write();
        let space = spaces
            .get_mut(ns)
            .ok_or_else(|| Error::NotFound(format!("keyspace '{}'", ns)))?;
        if !space.values.contains_key(key) && space.values.len() >= space.capacity {
            return Err(Error::Conflict(format!("keyspace '{}' is full", ns)));
        }
        space.values.insert(key.to_string(), value.into());
        Ok(())
    }

    pub fn get(&self, ns: &str, key: &str) -> Option<Value> {
        self.read().get(ns).and_then(|s| s.values.get(key).cloned())
    }

    /// True only for a stored JSON `true`
    pub fn flag(&self, ns: &str, key: &str) -> bool {
        matches!(self.get(ns, key), Some(Value::Bool(true)))
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, KeySpace>> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, KeySpace>> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }
}
