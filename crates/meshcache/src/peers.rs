// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Capabilities for routing keys to other cache nodes and fetching from them.
//!
//! Routing and access are separate seams: a [`PeerPicker`] decides which node owns a key, and
//! the [`Peer`] it returns knows how to ask that node for the value. The HTTP pool in
//! `meshcache_http` provides both; tests use in-process fakes.

use std::{fmt::Debug, sync::Arc};

use bytes::Bytes;

use crate::Result;

/// Fetches a value from the node that owns it.
#[dynosaur::dynosaur(pub(crate) DynPeerFetcher = dyn(box) PeerFetcher, bridge(none))]
pub trait PeerFetcher: Send + Sync {
    /// Asks the remote node for `key` in the group named `group`.
    fn fetch(&self, group: &str, key: &str) -> impl Future<Output = Result<Bytes>> + Send;
}

/// Picks the node owning a key.
pub trait PeerPicker: Send + Sync {
    /// Returns the remote peer owning `key`, or `None` when the local node owns it or no peers
    /// are known.
    fn pick_peer(&self, key: &str) -> Option<Peer>;
}

/// A clonable handle to a remote node.
///
/// # Examples
///
/// ```
/// use bytes::Bytes;
/// use meshcache::{Peer, PeerFetcher, Result};
///
/// struct Echo;
///
/// impl PeerFetcher for Echo {
///     async fn fetch(&self, group: &str, key: &str) -> Result<Bytes> {
///         Ok(Bytes::from(format!("{group}/{key}")))
///     }
/// }
///
/// # futures::executor::block_on(async {
/// let peer = Peer::new("echo", Echo);
/// assert_eq!(peer.fetch("scores", "Tom").await.unwrap(), "scores/Tom");
/// # });
/// ```
#[derive(Clone)]
pub struct Peer {
    id: Arc<str>,
    fetcher: Arc<DynPeerFetcher<'static>>,
}

impl Peer {
    /// Creates a peer handle named `id` that fetches through `fetcher`.
    pub fn new(id: impl Into<Arc<str>>, fetcher: impl PeerFetcher + 'static) -> Self {
        Self {
            id: id.into(),
            fetcher: DynPeerFetcher::new_arc(fetcher),
        }
    }

    /// The identifier of the remote node, typically its base URL.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Asks the remote node for `key` in the group named `group`.
    ///
    /// # Errors
    ///
    /// Returns whatever error the underlying fetcher reports.
    pub async fn fetch(&self, group: &str, key: &str) -> Result<Bytes> {
        self.fetcher.fetch(group, key).await
    }
}

impl Debug for Peer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Peer").field("id", &self.id).finish_non_exhaustive()
    }
}
