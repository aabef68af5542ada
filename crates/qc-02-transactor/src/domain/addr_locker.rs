//! # Address Locker
//!
//! Per-address mutual exclusion for nonce-affecting work.
//!
//! Each address owns one async lock, created on first use and kept for the
//! life of the locker. The lock guards a value of type `S`, so state that
//! must only change while the address is locked (the local nonce cache)
//! lives inside the lock itself.

use parking_lot::Mutex;
use shared_types::Address;
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

/// Lazily populated map of per-address locks.
pub struct AddrLocker<S = ()> {
    locks: Mutex<HashMap<Address, Arc<AsyncMutex<S>>>>,
}

impl<S: Default> AddrLocker<S> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Wait until the calling task exclusively owns `address`.
    ///
    /// The lock is released when the returned guard is dropped, on every
    /// exit path including unwinding.
    pub async fn lock_addr(&self, address: Address) -> AddrGuard<S> {
        let lock = Arc::clone(self.locks.lock().entry(address).or_default());
        let guard = lock.lock_owned().await;
        trace!(address = %address, "Address locked");
        AddrGuard { address, guard }
    }

    /// Number of addresses that have ever been locked.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.lock().is_empty()
    }
}

impl<S: Default> Default for AddrLocker<S> {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive ownership of one address and its state.
pub struct AddrGuard<S> {
    address: Address,
    guard: OwnedMutexGuard<S>,
}

impl<S> AddrGuard<S> {
    /// The locked address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Release the lock explicitly.
    pub fn unlock(self) {
        trace!(address = %self.address, "Address unlocked");
    }
}

impl<S> Deref for AddrGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.guard
    }
}

impl<S> DerefMut for AddrGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.guard
    }
}
