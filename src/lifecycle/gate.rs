//! Bounded-concurrency admission gate.
//!
//! # Responsibilities
//! - Cap how many lifecycles run at once against one connection
//! - Queue excess callers and admit them in arrival order
//! - Release the slot on every exit path of the admitted task
//!
//! # Design Decisions
//! - Built on tokio's `Semaphore`, which is fair: a released permit goes
//!   straight to the oldest waiter
//! - Slots are held by a guard, so a failing, panicking or cancelled task
//!   still frees its slot
//! - A limit of zero is rejected at construction

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::error::SessionError;

/// Limit used when none is configured.
pub const DEFAULT_CONCURRENCY: usize = 10;

/// FIFO gate admitting at most `limit` tasks at a time.
#[derive(Debug, Clone)]
pub struct ConcurrencyGate {
    /// Available slots.
    slots: Arc<Semaphore>,
    /// Configured maximum concurrency.
    limit: usize,
    /// Callers currently queued for a slot.
    waiting: Arc<AtomicUsize>,
}

impl ConcurrencyGate {
    pub fn new(limit: usize) -> Result<Self, SessionError> {
        if limit == 0 {
            return Err(SessionError::Config(
                "concurrency limit must be at least 1".into(),
            ));
        }
        Ok(Self {
            slots: Arc::new(Semaphore::new(limit)),
            limit,
            waiting: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Slots currently held.
    pub fn active(&self) -> usize {
        self.limit - self.slots.available_permits()
    }

    /// Callers queued behind the active ones.
    pub fn waiting(&self) -> usize {
        self.waiting.load(Ordering::SeqCst)
    }

    /// Wait for a slot. The slot is released when the permit is dropped.
    pub async fn acquire(&self) -> GatePermit {
        let queued = QueuedGuard::enter(&self.waiting);
        let permit = self
            .slots
            .clone()
            .acquire_owned()
            .await
            .expect("Semaphore closed unexpectedly");
        drop(queued);

        tracing::trace!(
            active = self.active(),
            waiting = self.waiting(),
            limit = self.limit,
            "Gate slot acquired"
        );

        GatePermit { _permit: permit }
    }

    /// Run `task` once a slot is free, releasing the slot when it finishes.
    pub async fn run<F, T>(&self, task: F) -> T
    where
        F: Future<Output = T>,
    {
        let _permit = self.acquire().await;
        task.await
    }
}

impl Default for ConcurrencyGate {
    fn default() -> Self {
        Self {
            slots: Arc::new(Semaphore::new(DEFAULT_CONCURRENCY)),
            limit: DEFAULT_CONCURRENCY,
            waiting: Arc::new(AtomicUsize::new(0)),
        }
    }
}

/// A held gate slot.
///
/// Dropping it hands the slot to the oldest waiter, if any.
#[derive(Debug)]
pub struct GatePermit {
    _permit: OwnedSemaphorePermit,
}

/// Counts a caller as waiting until it is admitted or cancelled.
struct QueuedGuard<'a>(&'a AtomicUsize);

impl<'a> QueuedGuard<'a> {
    fn enter(waiting: &'a AtomicUsize) -> Self {
        waiting.fetch_add(1, Ordering::SeqCst);
        Self(waiting)
    }
}

impl Drop for QueuedGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
