// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! HTTP transport for `meshcache` clusters.
//!
//! [`HttpPool`] tracks the cluster membership on a consistent-hash ring and acts as the
//! [`PeerPicker`](meshcache::PeerPicker) for a process's groups. Keys owned by another node are
//! fetched from it with [`HttpPeer`]. On the serving side, [`HttpPool::serve`] answers the
//! lookups other nodes send, resolving groups through a [`Registry`](meshcache::Registry).
//!
//! A lookup is a `GET {base_path}{group}/{key}` with percent-encoded segments, answered by a
//! bincode-encoded [`FetchResponse`]. The default base path is [`DEFAULT_BASE_PATH`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use meshcache::{Registry, getter_fn};
//! use meshcache_http::HttpPool;
//!
//! # async fn run() -> std::io::Result<()> {
//! let self_url = "http://127.0.0.1:8001";
//! let registry = Arc::new(Registry::new());
//! let group = registry
//!     .new_group("scores", 64 << 20, getter_fn(|key: String| async move { Ok(key.into_bytes()) }))
//!     .unwrap();
//!
//! let pool = Arc::new(HttpPool::new(self_url));
//! pool.set_peers([self_url, "http://127.0.0.1:8002", "http://127.0.0.1:8003"]);
//!
//! let listener = tokio::net::TcpListener::bind("127.0.0.1:8001").await?;
//! tokio::spawn(Arc::clone(&pool).serve(listener, Arc::clone(&registry)));
//! group.register_peers(pool).unwrap();
//!
//! let value = group.get("Tom").await.unwrap();
//! # Ok(())
//! # }
//! ```

mod peer;
mod pool;
mod wire;

#[doc(inline)]
pub use peer::HttpPeer;
#[doc(inline)]
pub use pool::{DEFAULT_BASE_PATH, HttpPool, HttpPoolBuilder, PoolOptions};
#[doc(inline)]
pub use wire::{FetchRequest, FetchResponse};
