use std::{
    collections::HashMap,
    sync::atomic::{AtomicU64, Ordering},
};

use anyhow::anyhow;
use parking_lot::RwLock;
use tracing::trace;

use super::{PersistencePort, Reference};
use crate::context::Value;

/// Process-local persistence port.
#[derive(Default)]
pub struct MemoryStore {
    values: RwLock<HashMap<Reference, Value>>,
    next: AtomicU64,
}

impl MemoryStore {
    pub fn len(&self) -> usize {
        self.values.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.read().is_empty()
    }
}

impl PersistencePort for MemoryStore {
    fn store(&self, value: &Value) -> anyhow::Result<Reference> {
        let reference = Reference(format!("mem:{}", self.next.fetch_add(1, Ordering::Relaxed) + 1));
        self.values.write().insert(reference.clone(), value.clone());
        trace!(reference = %reference, "stored value");
        Ok(reference)
    }

    fn load(&self, reference: &Reference) -> anyhow::Result<Value> {
        self.values
            .read()
            .get(reference)
            .cloned()
            .ok_or_else(|| anyhow!("no value stored under '{reference}'"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_reference_is_an_error() {
        let store = MemoryStore::default();
        let error = store.load(&Reference("mem:9".into())).unwrap_err();
        assert!(error.to_string().contains("mem:9"));
    }

    #[test]
    fn each_store_gets_a_fresh_reference() {
        let store = MemoryStore::default();
        let first = store.store(&Value::from(1)).unwrap();
        let second = store.store(&Value::from(2)).unwrap();
        assert_ne!(first, second);
        assert_eq!(store.load(&second).unwrap().as_i64(), Some(2));
    }
}
