// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The cache group: local store, peer routing and origin fallback behind one `get`.

use std::{
    fmt::Debug,
    sync::{Arc, OnceLock},
};

use meshcache_flight::Flight;
use meshcache_lru::LruStore;
use parking_lot::Mutex;

use crate::{
    ByteView, Error, Getter, GroupBuilder, PeerPicker, Result,
    getter::DynGetter,
    stats::{CacheStats, GroupActivity, GroupStats, GroupStatsSnapshot},
};

/// A named cache namespace with its own origin, byte budget and peers.
///
/// [`get`](Self::get) resolves a key in this order:
///
/// 1. the local store;
/// 2. the peer that owns the key, if peers are registered and the owner is another node (the
///    value is returned but not cached locally, since the owner caches it);
/// 3. the origin [`Getter`](crate::Getter), whose value is cached locally.
///
/// Concurrent misses for one key are coalesced, so only one of them reaches a peer or the
/// origin and all of them observe the same outcome. Failures are not cached.
///
/// # Examples
///
/// ```
/// use meshcache::{Error, Group, getter_fn};
///
/// # futures::executor::block_on(async {
/// let group = Group::builder("scores")
///     .capacity_bytes(2 << 10)
///     .getter(getter_fn(|key: String| async move {
///         match key.as_str() {
///             "Tom" => Ok(b"630".to_vec()),
///             _ => Err(Error::not_found(format!("{key} not exist"))),
///         }
///     }))
///     .build()?;
///
/// assert_eq!(group.get("Tom").await?, "630");
/// assert!(group.get("unknown").await.is_err());
/// # Ok::<(), Error>(())
/// # }).unwrap();
/// ```
pub struct Group {
    name: String,
    getter: Arc<DynGetter<'static>>,
    store: Mutex<LruStore<ByteView>>,
    peers: OnceLock<Arc<dyn PeerPicker>>,
    flight: Flight<String, Result<ByteView>>,
    stats: GroupStats,
}

impl Debug for Group {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Group")
            .field("name", &self.name)
            .field("store", &*self.store.lock())
            .field("peers", &self.peers.get().is_some())
            .field("flight", &self.flight)
            .finish_non_exhaustive()
    }
}

impl Group {
    /// Starts configuring a standalone group named `name`.
    ///
    /// Use [`Registry::builder`](crate::Registry::builder) instead to make the group reachable by
    /// name, which transports need to serve it.
    #[must_use]
    pub fn builder(name: impl Into<String>) -> GroupBuilder<'static> {
        GroupBuilder::new(name)
    }

    pub(crate) fn new(name: String, capacity_bytes: u64, getter: Arc<DynGetter<'static>>, stats: GroupStats) -> Self {
        Self {
            name,
            getter,
            store: Mutex::new(LruStore::new(capacity_bytes)),
            peers: OnceLock::new(),
            flight: Flight::new(),
            stats,
        }
    }

    /// The name of this group.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value for `key`, loading it through a peer or the origin on a miss.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::InvalidArgument`](crate::ErrorKind::InvalidArgument) error for an
    /// empty key, and otherwise the origin's error when the key is neither cached nor obtainable
    /// from a peer. Peer failures are never returned; they fall back to the origin.
    pub async fn get(&self, key: &str) -> Result<ByteView> {
        self.stats.record(GroupActivity::Get);

        if key.is_empty() {
            return Err(Error::invalid_argument("key is required"));
        }

        if let Some(value) = self.lookup_local(key) {
            self.stats.record(GroupActivity::CacheHit);
            tracing::debug!(group.name = %self.name, key, "cache.hit");
            return Ok(value);
        }

        tracing::debug!(group.name = %self.name, key, "cache.miss");
        self.load(key).await
    }

    /// Registers the picker used to route keys to their owning peers.
    ///
    /// A single picker can be shared between groups.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::InvalidArgument`](crate::ErrorKind::InvalidArgument) error if a
    /// picker is already registered.
    pub fn register_peers(&self, picker: Arc<dyn PeerPicker>) -> Result<()> {
        self.peers
            .set(picker)
            .map_err(|_| Error::invalid_argument(format!("peers already registered for group {}", self.name)))
    }

    /// Returns a snapshot of this group's counters.
    #[must_use]
    pub fn stats(&self) -> GroupStatsSnapshot {
        self.stats.snapshot()
    }

    /// Returns the current accounting of the local store.
    #[must_use]
    pub fn cache_stats(&self) -> CacheStats {
        self.store.lock().stats().into()
    }

    /// The local store's byte budget, `0` meaning unbounded.
    #[must_use]
    pub fn capacity_bytes(&self) -> u64 {
        self.store.lock().capacity_bytes()
    }

    /// Counts a request received from another node.
    ///
    /// Transports call this before serving a remote lookup through [`get`](Self::get).
    pub fn record_server_request(&self) {
        self.stats.record(GroupActivity::ServerRequest);
    }

    async fn load(&self, key: &str) -> Result<ByteView> {
        self.stats.record(GroupActivity::Load);
        self.flight.work(key.to_owned(), || self.load_once(key)).await
    }

    /// Runs once per coalesced window.
    async fn load_once(&self, key: &str) -> Result<ByteView> {
        // A window that closed just before this one may already have filled the store.
        if let Some(value) = self.lookup_local(key) {
            self.stats.record(GroupActivity::CacheHit);
            return Ok(value);
        }
        self.stats.record(GroupActivity::LoadDeduplicated);

        if let Some(peer) = self.peers.get().and_then(|picker| picker.pick_peer(key)) {
            match peer.fetch(&self.name, key).await {
                Ok(bytes) => {
                    self.stats.record(GroupActivity::PeerLoad);
                    tracing::debug!(group.name = %self.name, key, peer = peer.id(), "cache.peer_load");
                    return Ok(ByteView::from(bytes));
                }
                Err(error) => {
                    self.stats.record(GroupActivity::PeerError);
                    tracing::warn!(
                        group.name = %self.name,
                        key,
                        peer = peer.id(),
                        error = %error,
                        "cache.peer_error"
                    );
                }
            }
        }

        match self.getter.get(key).await {
            Ok(bytes) => {
                self.stats.record(GroupActivity::LocalLoad);
                let value = ByteView::from(bytes);
                self.populate(key, value.clone());
                tracing::debug!(group.name = %self.name, key, bytes = value.len(), "cache.local_load");
                Ok(value)
            }
            Err(error) => {
                self.stats.record(GroupActivity::LocalLoadError);
                tracing::debug!(group.name = %self.name, key, error = %error, "cache.local_load_error");
                Err(error)
            }
        }
    }

    fn lookup_local(&self, key: &str) -> Option<ByteView> {
        self.store.lock().get(key).cloned()
    }

    fn populate(&self, key: &str, value: ByteView) {
        self.store.lock().add(key, value);
    }
}
