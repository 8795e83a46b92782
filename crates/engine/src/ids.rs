//! Injectable identifier generation for contexts and exertions.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

/// Produces identifiers for newly created contexts and exertions.
pub trait IdGenerator: Send + Sync {
    fn next_id(&self, prefix: &str) -> String;
}

/// Shared handle to an identifier generator.
pub type SharedIds = Arc<dyn IdGenerator>;

/// Monotonic `prefix-N` identifiers, scoped to one generator instance.
#[derive(Debug, Default)]
pub struct SequentialIds {
    counter: AtomicU64,
}

impl IdGenerator for SequentialIds {
    fn next_id(&self, prefix: &str) -> String {
        let next = self.counter.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{prefix}-{next}")
    }
}

/// Fresh sequential generator behind a shared handle.
pub fn sequential_ids() -> SharedIds {
    Arc::new(SequentialIds::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generators_do_not_share_counters() {
        let first = sequential_ids();
        let second = sequential_ids();
        assert_eq!(first.next_id("ctx"), "ctx-1");
        assert_eq!(first.next_id("task"), "task-2");
        assert_eq!(second.next_id("ctx"), "ctx-1");
    }
}
