//! The concurrency gate.
//!
//! One mutual-exclusion primitive owning the execution context. The only
//! way to reach the context is through [`ConcurrencyGate::enter`], and the
//! returned guard releases the gate when dropped, on every exit path.
//!
//! The interpreter's own lock is taken only while the gate is held, always
//! in that order. Callbacks from the implementation run on the thread that
//! already holds the gate and never enter it again.

use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::{Mutex, MutexGuard};

/// Serializes all access to a value of type `T`.
pub struct ConcurrencyGate<T> {
    inner: Mutex<T>,
    acquired: AtomicU64,
    released: AtomicU64,
}

/// Counters of gate traffic since creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GateStats {
    pub acquired: u64,
    pub released: u64,
}

impl<T> ConcurrencyGate<T> {
    pub fn new(value: T) -> Self {
        Self {
            inner: Mutex::new(value),
            acquired: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    /// Block until the gate is free and take it.
    pub fn enter(&self) -> GateGuard<'_, T> {
        let guard = self.inner.lock();
        self.acquired.fetch_add(1, Ordering::SeqCst);
        GateGuard {
            guard,
            released: &self.released,
        }
    }

    pub fn stats(&self) -> GateStats {
        GateStats {
            acquired: self.acquired.load(Ordering::SeqCst),
            released: self.released.load(Ordering::SeqCst),
        }
    }

    pub fn is_held(&self) -> bool {
        self.inner.is_locked()
    }
}

/// Scoped ownership of the gate.
pub struct GateGuard<'a, T> {
    guard: MutexGuard<'a, T>,
    released: &'a AtomicU64,
}

impl<T> Deref for GateGuard<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.guard
    }
}

impl<T> DerefMut for GateGuard<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.guard
    }
}

impl<T> Drop for GateGuard<'_, T> {
    fn drop(&mut self) {
        // The mutex guard field is dropped right after this.
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
