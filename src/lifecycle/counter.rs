//! Request accounting counter.

use std::sync::atomic::{AtomicI64, Ordering};

/// Integer accumulator shared across tasks.
#[derive(Debug, Default)]
pub struct Counter {
    value: AtomicI64,
}

impl Counter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `by` and return the new value.
    pub fn increment(&self, by: i64) -> i64 {
        self.value.fetch_add(by, Ordering::SeqCst) + by
    }

    /// Subtract `by` and return the new value.
    pub fn decrement(&self, by: i64) -> i64 {
        self.value.fetch_sub(by, Ordering::SeqCst) - by
    }

    pub fn incr(&self) -> i64 {
        self.increment(1)
    }

    pub fn decr(&self) -> i64 {
        self.decrement(1)
    }

    pub fn get(&self) -> i64 {
        self.value.load(Ordering::SeqCst)
    }

    pub fn reset(&self) {
        self.value.store(0, Ordering::SeqCst);
    }
}
