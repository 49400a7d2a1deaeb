//! Engine-wide mutation lock.
//!
//! One async mutex serializes every public engine operation end to end: the
//! store I/O phase and the simulation-thread phase run under the same guard.
//! The protected value is the engine's session state, so nothing can read or
//! change the current map without holding the lock. Waiters are served FIFO.
//! No timeout.

use std::ops::{Deref, DerefMut};
use std::time::Instant;

use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

pub struct MutationLock<T> {
    inner: Mutex<T>,
}

impl<T> MutationLock<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
        }
    }

    /// Wait for exclusive access. `op` names the operation in logs.
    pub async fn acquire(&self, op: &'static str) -> MutationGuard<'_, T> {
        debug!(op, "waiting for mutation lock");
        let guard = self.inner.lock().await;
        debug!(op, "mutation lock acquired");
        MutationGuard {
            guard,
            op,
            acquired_at: Instant::now(),
        }
    }

    /// `true` while some operation holds the lock.
    pub fn is_held(&self) -> bool {
        self.inner.try_lock().is_err()
    }
}

pub struct MutationGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    op: &'static str,
    acquired_at: Instant,
}

impl<T> MutationGuard<'_, T> {
    pub fn op(&self) -> &'static str {
        self.op
    }
}

impl<T> Deref for MutationGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for MutationGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for MutationGuard<'_, T> {
    fn drop(&mut self) {
        debug!(
            op = self.op,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "mutation lock released"
        );
    }
}
