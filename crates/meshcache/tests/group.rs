// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Integration tests for `Group::get()` across local, peer and origin paths.

use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use bytes::Bytes;
use meshcache::{ByteView, Error, ErrorKind, Getter, Group, Peer, PeerFetcher, PeerPicker, Registry, Result, getter_fn};
use meshcache_ring::HashRing;

/// An origin over a fixed map that counts lookups per key.
#[derive(Default)]
struct CountingDb {
    rows: HashMap<&'static str, &'static str>,
    loads: parking_lot::Mutex<HashMap<String, usize>>,
    delay: Duration,

    /// When set, keys missing from `rows` load as `"{prefix}:{key}"`.
    echo_prefix: Option<&'static str>,
}

impl CountingDb {
    fn scores() -> Arc<Self> {
        Arc::new(Self::score_rows())
    }

    fn slow_scores(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::score_rows()
        })
    }

    fn echo(prefix: &'static str) -> Arc<Self> {
        Arc::new(Self {
            echo_prefix: Some(prefix),
            ..Self::default()
        })
    }

    fn score_rows() -> Self {
        Self {
            rows: HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]),
            ..Self::default()
        }
    }

    fn loads(&self, key: &str) -> usize {
        self.loads.lock().get(key).copied().unwrap_or(0)
    }

    fn total_loads(&self) -> usize {
        self.loads.lock().values().sum()
    }
}

struct SharedDb(Arc<CountingDb>);

impl Getter for SharedDb {
    async fn get(&self, key: &str) -> Result<Vec<u8>> {
        *self.0.loads.lock().entry(key.to_owned()).or_default() += 1;
        if !self.0.delay.is_zero() {
            tokio::time::sleep(self.0.delay).await;
        }

        if let Some(value) = self.0.rows.get(key) {
            return Ok(value.as_bytes().to_vec());
        }
        match self.0.echo_prefix {
            Some(prefix) => Ok(format!("{prefix}:{key}").into_bytes()),
            None => Err(Error::not_found(format!("{key} not exist"))),
        }
    }
}

#[tokio::test]
async fn scores_are_loaded_once_then_served_from_cache() {
    let db = CountingDb::scores();
    let registry = Registry::new();
    let scores = registry.new_group("scores", 2 << 10, SharedDb(Arc::clone(&db))).unwrap();

    for (name, score) in [("Tom", "630"), ("Jack", "589"), ("Sam", "567")] {
        assert_eq!(scores.get(name).await.unwrap(), score);
        assert_eq!(db.loads(name), 1);

        assert_eq!(scores.get(name).await.unwrap(), score);
        assert_eq!(db.loads(name), 1, "second lookup of {name} must be a cache hit");
    }

    let stats = scores.stats();
    assert_eq!(stats.gets, 6);
    assert_eq!(stats.cache_hits, 3);
    assert_eq!(stats.local_loads, 3);
    assert_eq!(scores.cache_stats().items, 3);
}

#[tokio::test]
async fn missing_key_is_not_cached() {
    let db = CountingDb::scores();
    let scores = Group::builder("scores").getter(SharedDb(Arc::clone(&db))).build().unwrap();

    for attempt in 1..=2 {
        let err = scores.get("unknown").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(db.loads("unknown"), attempt);
    }

    assert_eq!(scores.cache_stats().items, 0);
    assert_eq!(scores.stats().local_load_errors, 2);
}

#[tokio::test]
async fn failures_are_not_remembered() {
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&attempts);
    let group = Group::builder("flaky")
        .getter(getter_fn(move |_key: String| {
            let attempt = counter.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 0 {
                    Err(Error::origin("timeout"))
                } else {
                    Ok(b"ok".to_vec())
                }
            }
        }))
        .build()
        .unwrap();

    assert_eq!(group.get("k").await.unwrap_err().kind(), ErrorKind::OriginFailure);
    assert_eq!(group.get("k").await.unwrap(), "ok");
    assert_eq!(group.get("k").await.unwrap(), "ok");
    assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_misses_reach_origin_once() {
    let db = CountingDb::slow_scores(Duration::from_millis(100));
    let group = Group::builder("scores").getter(SharedDb(Arc::clone(&db))).build().unwrap();

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let group = Arc::clone(&group);
            tokio::spawn(async move { group.get("Tom").await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap(), "630");
    }

    assert_eq!(db.loads("Tom"), 1);
    let stats = group.stats();
    assert_eq!(stats.gets, 16);
    assert_eq!(stats.local_loads, 1);
    assert_eq!(stats.loads_deduplicated, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_failures_are_shared_by_the_window() {
    let db = CountingDb::slow_scores(Duration::from_millis(100));
    let group = Group::builder("scores").getter(SharedDb(Arc::clone(&db))).build().unwrap();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let group = Arc::clone(&group);
            tokio::spawn(async move { group.get("Bob").await })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap_err().kind(), ErrorKind::NotFound);
    }
    assert_eq!(db.loads("Bob"), 1);
}

/// Reaches another in-process node through its registry, as a transport would.
struct InProcess(Arc<Registry>);

impl PeerFetcher for InProcess {
    async fn fetch(&self, group: &str, key: &str) -> Result<Bytes> {
        let group = self
            .0
            .group(group)
            .ok_or_else(|| Error::not_found(format!("no such group: {group}")))?;
        group.record_server_request();
        group.get(key).await.map(ByteView::into_bytes)
    }
}

/// Routes keys over a hash ring of in-process nodes.
struct RingPicker {
    self_id: String,
    ring: HashRing,
    peers: HashMap<String, Peer>,
}

impl PeerPicker for RingPicker {
    fn pick_peer(&self, key: &str) -> Option<Peer> {
        let owner = self.ring.get(key)?;
        if owner == self.self_id {
            return None;
        }
        self.peers.get(owner).cloned()
    }
}

struct Node {
    id: &'static str,
    registry: Arc<Registry>,
    db: Arc<CountingDb>,
}

impl Node {
    fn new(id: &'static str) -> Self {
        let db = CountingDb::echo(id);
        let registry = Arc::new(Registry::new());
        registry.new_group("scores", 0, SharedDb(Arc::clone(&db))).unwrap();
        Self { id, registry, db }
    }

    fn group(&self) -> Arc<Group> {
        self.registry.group("scores").unwrap()
    }
}

fn connect(nodes: &[Node]) -> HashRing {
    let mut ring = HashRing::new(50);
    ring.add(nodes.iter().map(|node| node.id));

    for node in nodes {
        let peers = nodes
            .iter()
            .filter(|other| other.id != node.id)
            .map(|other| (other.id.to_string(), Peer::new(other.id, InProcess(Arc::clone(&other.registry)))))
            .collect();
        let picker = RingPicker {
            self_id: node.id.to_string(),
            ring: ring.clone(),
            peers,
        };
        node.group().register_peers(Arc::new(picker)).unwrap();
    }

    ring
}

fn key_owned_by(ring: &HashRing, node: &str) -> String {
    (0..)
        .map(|i| format!("key-{i}"))
        .find(|key| ring.get(key) == Some(node))
        .unwrap()
}

#[tokio::test]
async fn relaying_node_does_not_cache() {
    let nodes = [Node::new("node-a"), Node::new("node-b")];
    let ring = connect(&nodes);
    let [a, b] = &nodes;
    let key = key_owned_by(&ring, b.id);

    for _ in 0..2 {
        assert_eq!(a.group().get(&key).await.unwrap().to_string(), format!("node-b:{key}"));
    }

    // Node a relayed both lookups to the owner and kept nothing locally.
    assert_eq!(a.group().cache_stats().items, 0);
    assert_eq!(a.group().stats().peer_loads, 2);
    assert_eq!(a.db.total_loads(), 0);

    // The owner loaded once and answered the second relay from its cache.
    assert_eq!(b.group().stats().server_requests, 2);
    assert_eq!(b.group().cache_stats().items, 1);
    assert_eq!(b.db.loads(&key), 1);
}

#[tokio::test]
async fn owner_serves_its_own_keys_locally() {
    let nodes = [Node::new("node-a"), Node::new("node-b")];
    let ring = connect(&nodes);
    let [a, b] = &nodes;
    let key = key_owned_by(&ring, a.id);

    assert_eq!(a.group().get(&key).await.unwrap().to_string(), format!("node-a:{key}"));
    assert_eq!(a.db.loads(&key), 1);
    assert_eq!(a.group().cache_stats().items, 1);
    assert_eq!(b.group().stats().server_requests, 0);
}

#[tokio::test]
async fn every_node_agrees_on_values() {
    let nodes = [Node::new("node-a"), Node::new("node-b"), Node::new("node-c")];
    let ring = connect(&nodes);

    for i in 0..30 {
        let key = format!("user-{i}");
        let owner = ring.get(&key).unwrap();
        for node in &nodes {
            assert_eq!(node.group().get(&key).await.unwrap().to_string(), format!("{owner}:{key}"));
        }
    }

    let origin_loads: usize = nodes.iter().map(|node| node.db.total_loads()).sum();
    assert_eq!(origin_loads, 30);
}

#[tokio::test]
async fn unreachable_owner_falls_back_to_origin() {
    let db = CountingDb::scores();
    let group = Group::builder("scores").getter(SharedDb(Arc::clone(&db))).build().unwrap();

    // The remote registry has no "scores" group, so every fetch fails.
    let remote = Peer::new("node-gone", InProcess(Arc::new(Registry::new())));
    let mut ring = HashRing::new(10);
    ring.add(["node-gone"]);
    let picker = RingPicker {
        self_id: "node-self".to_string(),
        ring,
        peers: HashMap::from([("node-gone".to_string(), remote)]),
    };
    group.register_peers(Arc::new(picker)).unwrap();

    assert_eq!(group.get("Tom").await.unwrap(), "630");
    assert_eq!(db.loads("Tom"), 1);

    let stats = group.stats();
    assert_eq!(stats.peer_errors, 1);
    assert_eq!(stats.peer_loads, 0);
    assert_eq!(stats.local_loads, 1);

    // The origin's value is cached like any other local load.
    assert_eq!(group.get("Tom").await.unwrap(), "630");
    assert_eq!(group.stats().peer_errors, 1);
}
