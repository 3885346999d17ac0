// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Collapses concurrent lookups of the same key into a single execution.
//!
//! [`Flight`] tracks one in-flight call per key. The first caller for a key runs its work; callers
//! that arrive while that work is running wait for it and receive a clone of its output instead
//! of running their own. As soon as the work completes the key is released, so the next call
//! starts a fresh execution. Nothing is remembered between windows: a failed execution
//! (`T = Result<_, _>` carrying an error) is delivered to every waiter of that window and then
//! forgotten.
//!
//! # Example
//!
//! ```
//! use meshcache_flight::Flight;
//!
//! # futures::executor::block_on(async {
//! let flight: Flight<String, Result<String, String>> = Flight::new();
//!
//! let value = flight
//!     .work("user:123".to_string(), || async { Ok("loaded".to_string()) })
//!     .await;
//! assert_eq!(value.as_deref(), Ok("loaded"));
//! assert_eq!(flight.in_flight(), 0);
//! # });
//! ```
//!
//! # Cancellation and Panics
//!
//! Every caller brings its own work closure. If the caller running the work is dropped or
//! panics before producing a value, one of the waiting callers takes over and runs its own
//! closure, so waiters never hang on an abandoned execution.

use std::{
    collections::HashMap,
    fmt::Debug,
    hash::Hash,
    sync::{Arc, Weak},
};

use futures::lock::Mutex as AsyncMutex;
use parking_lot::Mutex;

type Calls<K, T> = Arc<Mutex<HashMap<K, Weak<Call<T>>>>>;

/// Tracks in-flight executions keyed by `K` and shares their output of type `T`.
pub struct Flight<K, T> {
    calls: Calls<K, T>,
}

impl<K, T> Default for Flight<K, T> {
    fn default() -> Self {
        Self { calls: Arc::default() }
    }
}

impl<K, T> Debug for Flight<K, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flight")
            .field("in_flight", &live_calls(&self.calls.lock()))
            .finish()
    }
}

/// One deduplication window for a key.
///
/// Whoever holds `slot` is executing; the output is left in the slot for the callers queued
/// behind it.
struct Call<T> {
    slot: AsyncMutex<Option<T>>,
}

/// A caller attached to a [`Call`].
struct Participant<K, T>
where
    K: Hash + Eq,
{
    call: Arc<Call<T>>,
    key: K,
    calls: Calls<K, T>,
}

impl<K, T> Participant<K, T>
where
    K: Hash + Eq,
{
    async fn run<F, Fut>(self, func: F) -> T
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        T: Clone,
    {
        let mut slot = self.call.slot.lock().await;
        if let Some(value) = slot.as_ref() {
            return value.clone();
        }

        let value = func().await;
        *slot = Some(value.clone());

        // Close the window before releasing the slot: callers arriving from now on start a
        // new execution, callers already attached read the stored value.
        self.release();
        drop(slot);

        value
    }

    /// Removes the map entry if it still refers to this participant's call.
    fn release(&self) {
        let mut calls = self.calls.lock();
        if calls.get(&self.key).is_some_and(|entry| refers_to(entry, &self.call)) {
            calls.remove(&self.key);
        }
    }
}

impl<K, T> Drop for Participant<K, T>
where
    K: Hash + Eq,
{
    fn drop(&mut self) {
        let mut calls = self.calls.lock();

        // New participants only attach while this lock is held, so a count of one means
        // nobody else can still complete this call.
        if Arc::strong_count(&self.call) == 1 && calls.get(&self.key).is_some_and(|entry| refers_to(entry, &self.call)) {
            calls.remove(&self.key);
        }
    }
}

fn refers_to<T>(entry: &Weak<Call<T>>, call: &Arc<Call<T>>) -> bool {
    std::ptr::eq(entry.as_ptr(), Arc::as_ptr(call))
}

fn live_calls<K, T>(calls: &HashMap<K, Weak<Call<T>>>) -> usize {
    calls.values().filter(|entry| entry.strong_count() > 0).count()
}

impl<K, T> Flight<K, T>
where
    K: Hash + Eq + Clone,
{
    /// Creates an empty `Flight`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `func` for `key` unless an execution for `key` is already in flight, in which
    /// case the returned future resolves to a clone of that execution's output.
    ///
    /// The caller is attached to the key's window when `work` is called, not when the returned
    /// future is first polled.
    pub fn work<F, Fut>(&self, key: K, func: F) -> impl Future<Output = T> + use<K, T, F, Fut>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        T: Clone,
    {
        let participant = self.attach(key);
        participant.run(func)
    }

    /// Number of keys with an execution currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        live_calls(&self.calls.lock())
    }

    fn attach(&self, key: K) -> Participant<K, T> {
        let mut calls = self.calls.lock();

        let call = if let Some(call) = calls.get(&key).and_then(Weak::upgrade) {
            call
        } else {
            // No window, or every participant of the previous one is gone.
            let call = Arc::new(Call {
                slot: AsyncMutex::new(None),
            });
            calls.insert(key.clone(), Arc::downgrade(&call));
            call
        };

        Participant {
            call,
            key,
            calls: Arc::clone(&self.calls),
        }
    }
}
