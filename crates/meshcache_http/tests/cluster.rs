// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! End-to-end tests of nodes talking to each other over loopback HTTP.

use std::sync::{
    Arc,
    atomic::{AtomicUsize, Ordering},
};

use meshcache::{Error, Group, Registry, getter_fn};
use meshcache_http::HttpPool;
use meshcache_ring::HashRing;
use tokio::net::TcpListener;

struct Node {
    url: String,
    group: Arc<Group>,
    loads: Arc<AtomicUsize>,
}

/// Builds a node whose origin answers `"{url}:{key}"`, so every value names the node that loaded it.
fn node(url: &str) -> (Node, Arc<Registry>) {
    let loads = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&loads);
    let prefix = url.to_owned();

    let registry = Arc::new(Registry::new());
    let group = registry
        .new_group(
            "scores",
            1 << 20,
            getter_fn(move |key: String| {
                counter.fetch_add(1, Ordering::SeqCst);
                let value = format!("{prefix}:{key}");
                async move {
                    if key == "missing" {
                        Err(Error::not_found("missing not exist"))
                    } else {
                        Ok(value.into_bytes())
                    }
                }
            }),
        )
        .unwrap();

    let node = Node {
        url: url.to_owned(),
        group,
        loads,
    };
    (node, registry)
}

async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());
    (listener, url)
}

/// Starts `count` nodes that all know each other.
async fn cluster(count: usize) -> Vec<Node> {
    let mut listeners = Vec::new();
    let mut urls = Vec::new();
    for _ in 0..count {
        let (listener, url) = bind().await;
        listeners.push(listener);
        urls.push(url);
    }

    let mut nodes = Vec::new();
    for (listener, url) in listeners.into_iter().zip(&urls) {
        let (node, registry) = node(url);
        let pool = Arc::new(HttpPool::new(url.as_str()));
        pool.set_peers(&urls);
        tokio::spawn(Arc::clone(&pool).serve(listener, registry));
        node.group.register_peers(pool).unwrap();
        nodes.push(node);
    }
    nodes
}

fn ring_of(nodes: &[Node]) -> HashRing {
    let mut ring = HashRing::default();
    ring.add(nodes.iter().map(|node| node.url.as_str()));
    ring
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn owner_loads_every_key_once() {
    let nodes = cluster(3).await;
    let ring = ring_of(&nodes);

    for i in 0..20 {
        let key = format!("user-{i}");
        let owner = ring.get(&key).unwrap();
        for node in &nodes {
            let value = node.group.get(&key).await.unwrap();
            assert_eq!(value.to_string(), format!("{owner}:{key}"));
        }
    }

    let loads: usize = nodes.iter().map(|node| node.loads.load(Ordering::SeqCst)).sum();
    assert_eq!(loads, 20);

    let served: u64 = nodes.iter().map(|node| node.group.stats().server_requests).sum();
    let relayed: u64 = nodes.iter().map(|node| node.group.stats().peer_loads).sum();
    assert_eq!(served, relayed);
    assert_eq!(relayed, 40);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn keys_with_reserved_characters_travel_intact() {
    let nodes = cluster(2).await;
    let ring = ring_of(&nodes);

    for key in ["Tom & Jerry", "a/b?c=d#e", "100%", "名前"] {
        let owner = ring.get(key).unwrap();
        for node in &nodes {
            assert_eq!(node.group.get(key).await.unwrap().to_string(), format!("{owner}:{key}"));
        }
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn remote_error_falls_back_to_local_origin() {
    let nodes = cluster(2).await;
    let ring = ring_of(&nodes);
    let [a, b] = &nodes[..] else { unreachable!() };

    // Whichever node owns the key, the other one relays and gets a 500 back.
    let (relay, owner) = if ring.get("missing") == Some(a.url.as_str()) { (b, a) } else { (a, b) };

    let err = relay.group.get("missing").await.unwrap_err();
    assert_eq!(err.kind(), meshcache::ErrorKind::NotFound);

    assert_eq!(owner.loads.load(Ordering::SeqCst), 1);
    assert_eq!(relay.loads.load(Ordering::SeqCst), 1);
    assert_eq!(relay.group.stats().peer_errors, 1);
}

#[tokio::test]
async fn unreachable_peer_falls_back_to_local_origin() {
    let (listener, self_url) = bind().await;
    let (dead_listener, dead_url) = bind().await;
    drop(dead_listener);

    let (node, registry) = node(&self_url);
    let pool = Arc::new(HttpPool::new(self_url.as_str()));
    pool.set_peers([self_url.as_str(), dead_url.as_str()]);
    tokio::spawn(Arc::clone(&pool).serve(listener, registry));
    node.group.register_peers(pool).unwrap();

    let mut ring = HashRing::default();
    ring.add([self_url.as_str(), dead_url.as_str()]);
    let key = (0..)
        .map(|i| format!("key-{i}"))
        .find(|key| ring.get(key) == Some(dead_url.as_str()))
        .unwrap();

    let value = node.group.get(&key).await.unwrap();
    assert_eq!(value.to_string(), format!("{self_url}:{key}"));
    assert_eq!(node.group.stats().peer_errors, 1);
    assert_eq!(node.loads.load(Ordering::SeqCst), 1);

    // Values loaded after a peer failure are cached locally.
    node.group.get(&key).await.unwrap();
    assert_eq!(node.loads.load(Ordering::SeqCst), 1);
}
