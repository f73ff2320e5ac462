//! Single-resolution gates bridging device callbacks to waiting callers.
//!
//! A gate is a [`Resolver`] / [`Waiter`] pair built on a
//! [`tokio::sync::oneshot`] channel.  The resolver is consumed by the first
//! resolution, so a gate can never fire twice; dropping the resolver without
//! resolving wakes the waiter with [`GateError::Cancelled`].
//!
//! Two containers hold resolvers for callback code to find:
//!
//! * [`GateRegistry`] – many outstanding gates keyed by a unique id
//!   (speech requests).  A [`Registration`] removes its own entry when it is
//!   dropped, so a timed-out or abandoned wait never leaves a stale gate.
//! * [`GateSlot`] – exactly one outstanding gate; arming it again replaces
//!   (and cancels) the previous one (permission requests).

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Mutex;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::oneshot;

use crate::lock;

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum GateError {
    #[error("gate wait timed out")]
    TimedOut,
    #[error("gate cancelled before it was resolved")]
    Cancelled,
    #[error("a gate is already registered under this key")]
    Duplicate,
}

/// Create a fresh, unresolved gate.
pub fn gate<T>() -> (Resolver<T>, Waiter<T>) {
    let (tx, rx) = oneshot::channel();
    (Resolver { tx }, Waiter { rx })
}

/// Resolving half of a gate.
#[derive(Debug)]
pub struct Resolver<T> {
    tx: oneshot::Sender<T>,
}

impl<T> Resolver<T> {
    /// Wake the waiter with `value`.
    ///
    /// Returns `false` when the waiter has already gone away (timed out or
    /// dropped); the value is discarded in that case.
    pub fn resolve(self, value: T) -> bool {
        self.tx.send(value).is_ok()
    }

    /// `true` once the waiting half has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Waiting half of a gate.
#[derive(Debug)]
pub struct Waiter<T> {
    rx: oneshot::Receiver<T>,
}

impl<T> Waiter<T> {
    /// Wait without a bound.
    pub async fn wait(self) -> Result<T, GateError> {
        self.rx.await.map_err(|_| GateError::Cancelled)
    }

    /// Wait at most `timeout` for the gate to resolve.
    pub async fn wait_for(self, timeout: Duration) -> Result<T, GateError> {
        match tokio::time::timeout(timeout, self.rx).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(_)) => Err(GateError::Cancelled),
            Err(_) => Err(GateError::TimedOut),
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GateRegistry
// ────────────────────────────────────────────────────────────────────────────

/// Outstanding gates keyed by request id.
pub struct GateRegistry<K, T> {
    pending: Mutex<HashMap<K, Resolver<T>>>,
}

impl<K, T> GateRegistry<K, T>
where
    K: Eq + Hash + Clone + Debug,
{
    pub fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register a gate under `key`.
    ///
    /// Keys must be freshly generated per request: an occupied key is never
    /// overwritten and yields [`GateError::Duplicate`].
    pub fn register(&self, key: K) -> Result<Registration<'_, K, T>, GateError> {
        let (resolver, waiter) = gate();
        let mut pending = lock(&self.pending);
        if pending.contains_key(&key) {
            return Err(GateError::Duplicate);
        }
        pending.insert(key.clone(), resolver);
        Ok(Registration {
            registry: self,
            key,
            waiter: Some(waiter),
        })
    }

    /// Resolve and remove the gate under `key`.
    ///
    /// Returns `true` if a live waiter was woken.  An absent key (already
    /// resolved, timed out, or never registered) is a silent `false`.
    pub fn resolve(&self, key: &K, value: T) -> bool {
        let resolver = lock(&self.pending).remove(key);
        resolver.is_some_and(|r| r.resolve(value))
    }

    /// Remove the gate under `key`, waking its waiter with
    /// [`GateError::Cancelled`].
    pub fn cancel(&self, key: &K) -> bool {
        lock(&self.pending).remove(key).is_some()
    }

    /// Cancel every outstanding gate.
    pub fn clear(&self) {
        let drained: Vec<_> = lock(&self.pending).drain().collect();
        drop(drained);
    }

    pub fn contains(&self, key: &K) -> bool {
        lock(&self.pending).contains_key(key)
    }

    pub fn len(&self) -> usize {
        lock(&self.pending).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, T> Default for GateRegistry<K, T>
where
    K: Eq + Hash + Clone + Debug,
{
    fn default() -> Self {
        Self::new()
    }
}

/// A registered gate.  Removes its registry entry on drop.
pub struct Registration<'a, K, T>
where
    K: Eq + Hash + Clone + Debug,
{
    registry: &'a GateRegistry<K, T>,
    key: K,
    waiter: Option<Waiter<T>>,
}

impl<K, T> Registration<'_, K, T>
where
    K: Eq + Hash + Clone + Debug,
{
    /// Wait at most `timeout`; the entry is removed whatever the outcome.
    pub async fn wait_for(mut self, timeout: Duration) -> Result<T, GateError> {
        match self.waiter.take() {
            Some(waiter) => waiter.wait_for(timeout).await,
            None => Err(GateError::Cancelled),
        }
    }
}

impl<K, T> Drop for Registration<'_, K, T>
where
    K: Eq + Hash + Clone + Debug,
{
    fn drop(&mut self) {
        self.registry.cancel(&self.key);
    }
}

// ────────────────────────────────────────────────────────────────────────────
// GateSlot
// ────────────────────────────────────────────────────────────────────────────

/// Holder for a single outstanding gate.
pub struct GateSlot<T> {
    slot: Mutex<Option<Resolver<T>>>,
}

impl<T> GateSlot<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Arm a new gate, cancelling any gate that was still outstanding.
    pub fn arm(&self) -> Waiter<T> {
        let (resolver, waiter) = gate();
        let previous = lock(&self.slot).replace(resolver);
        drop(previous);
        waiter
    }

    /// Resolve the outstanding gate, if any.  Returns `true` if a live
    /// waiter was woken.
    pub fn resolve(&self, value: T) -> bool {
        let resolver = lock(&self.slot).take();
        resolver.is_some_and(|r| r.resolve(value))
    }

    /// Cancel the outstanding gate.  Returns `true` if one was armed.
    pub fn cancel(&self) -> bool {
        lock(&self.slot).take().is_some()
    }

    /// Drop the stored resolver only if its waiter is gone.  A waiter calls
    /// this after finishing so it never clears a newer gate armed meanwhile.
    pub fn clear_if_closed(&self) {
        let mut slot = lock(&self.slot);
        if slot.as_ref().is_some_and(Resolver::is_closed) {
            *slot = None;
        }
    }

    pub fn is_armed(&self) -> bool {
        lock(&self.slot).is_some()
    }
}

impl<T> Default for GateSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}
