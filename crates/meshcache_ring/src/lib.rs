// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A consistent-hashing ring that maps keys to owning nodes.
//!
//! Each node is placed on a 32-bit circular hash space at several positions ("virtual
//! replicas"). A key belongs to the node owning the first position at or after the key's own
//! hash, wrapping around at the end of the space. Adding or removing one node out of `M`
//! therefore moves roughly `1/M` of the keys, and every process that builds a ring from the
//! same membership list and hash function computes the same owners.
//!
//! # Examples
//!
//! ```
//! use meshcache_ring::HashRing;
//!
//! let mut ring = HashRing::new(50);
//! ring.add(["http://10.0.0.1:8001", "http://10.0.0.2:8001", "http://10.0.0.3:8001"]);
//!
//! let owner = ring.get("user:42").expect("ring has nodes");
//! assert_eq!(ring.get("user:42"), Some(owner));
//! ```
//!
//! # Custom Hash Functions
//!
//! The hash function is pluggable, which makes ring positions predictable in tests:
//!
//! ```
//! use meshcache_ring::HashRing;
//!
//! // Interpret keys as decimal numbers.
//! let mut ring = HashRing::with_hasher(3, |data: &[u8]| {
//!     std::str::from_utf8(data).ok().and_then(|s| s.parse().ok()).unwrap_or(0)
//! });
//!
//! // Nodes 6, 4 and 2 occupy positions 2, 4, 6, 12, 14, 16, 22, 24, 26.
//! ring.add(["6", "4", "2"]);
//!
//! assert_eq!(ring.get("11"), Some("2"));
//! assert_eq!(ring.get("23"), Some("4"));
//! assert_eq!(ring.get("27"), Some("2"));
//! ```

use std::{collections::BTreeSet, fmt::Debug, sync::Arc};

/// Number of virtual replicas per node used when no other value is configured.
pub const DEFAULT_REPLICAS: usize = 50;

/// Hash function used to place nodes and keys on the ring.
pub type HashFn = Arc<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// A consistent-hashing ring of string node identifiers.
///
/// The ring is a plain data structure with no internal locking. Membership changes take
/// `&mut self`; share the ring behind a lock if it is mutated while being read.
#[derive(Clone)]
pub struct HashRing {
    hasher: HashFn,
    replicas: usize,

    /// Virtual points sorted by hash, ties broken by node id.
    points: Vec<(u32, Arc<str>)>,
    nodes: BTreeSet<Arc<str>>,
}

impl Debug for HashRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("nodes", &self.nodes)
            .field("points", &self.points.len())
            .finish_non_exhaustive()
    }
}

impl Default for HashRing {
    fn default() -> Self {
        Self::new(DEFAULT_REPLICAS)
    }
}

impl HashRing {
    /// Creates an empty ring placing `replicas` virtual points per node, hashed with xxHash32.
    ///
    /// With `replicas == 0` nodes can be registered but own no positions, so lookups find
    /// no owner.
    #[must_use]
    pub fn new(replicas: usize) -> Self {
        Self::with_hasher(replicas, default_hash)
    }

    /// Creates an empty ring using a caller-supplied hash function.
    #[must_use]
    pub fn with_hasher(replicas: usize, hasher: impl Fn(&[u8]) -> u32 + Send + Sync + 'static) -> Self {
        Self::with_shared_hasher(replicas, Arc::new(hasher))
    }

    /// Creates an empty ring using an already shared hash function.
    #[must_use]
    pub fn with_shared_hasher(replicas: usize, hasher: HashFn) -> Self {
        Self {
            hasher,
            replicas,
            points: Vec::new(),
            nodes: BTreeSet::new(),
        }
    }

    /// Registers nodes, placing `replicas` virtual points for each one.
    ///
    /// Point `i` of a node is the hash of the decimal replica index followed by the node id.
    /// Nodes that are already registered are skipped.
    pub fn add<I, S>(&mut self, nodes: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for node in nodes {
            let node = node.as_ref();
            if self.nodes.contains(node) {
                continue;
            }

            let node: Arc<str> = Arc::from(node);
            for replica in 0..self.replicas {
                let point = self.hash(format!("{replica}{node}").as_bytes());
                self.points.push((point, Arc::clone(&node)));
            }
            self.nodes.insert(node);
        }

        self.points.sort_unstable();
    }

    /// Returns the node owning `key`, or `None` if the ring has no points.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }

        let hash = self.hash(key.as_bytes());
        let idx = self.points.partition_point(|(point, _)| *point < hash);

        // Past the last point the ring wraps around to the first one.
        let (_, node) = self.points.get(idx).or_else(|| self.points.first())?;
        Some(&**node)
    }

    /// Removes a node and all of its virtual points.
    ///
    /// Returns `false` if the node was not registered.
    pub fn remove(&mut self, node: &str) -> bool {
        if !self.nodes.remove(node) {
            return false;
        }

        self.points.retain(|(_, owner)| &**owner != node);
        true
    }

    /// Returns `true` if no nodes are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of registered nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Iterates registered nodes in lexicographic order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.nodes.iter().map(|node| &**node)
    }

    /// Returns `true` if `node` is registered.
    #[must_use]
    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }

    /// Number of virtual points placed per node.
    #[must_use]
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    fn hash(&self, data: &[u8]) -> u32 {
        (self.hasher)(data)
    }
}

/// The default ring hash: xxHash32 with a zero seed.
#[must_use]
pub fn default_hash(data: &[u8]) -> u32 {
    xxhash_rust::xxh32::xxh32(data, 0)
}
