// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Peer-to-peer read-through cache groups.
//!
//! A [`Group`] answers lookups from a byte-budgeted in-memory store and, on a miss, loads the
//! value either from the peer that owns the key or from the group's origin [`Getter`]. Concurrent
//! misses for the same key are collapsed into a single load, so a burst of requests for a cold
//! key reaches the origin once.
//!
//! Every node of a cluster builds the same groups with the same origins and the same membership
//! list. A consistent-hash [`PeerPicker`] then routes each key to one owning node, so every value
//! is cached on its owner and fetched from there by the others.
//!
//! # Quick Start
//!
//! ```
//! use meshcache::{Error, Registry, getter_fn};
//!
//! # futures::executor::block_on(async {
//! let registry = Registry::new();
//! let scores = registry.new_group(
//!     "scores",
//!     2 << 10,
//!     getter_fn(|key: String| async move {
//!         match key.as_str() {
//!             "Tom" => Ok(b"630".to_vec()),
//!             "Jack" => Ok(b"589".to_vec()),
//!             _ => Err(Error::not_found(format!("{key} not exist"))),
//!         }
//!     }),
//! )?;
//!
//! assert_eq!(scores.get("Tom").await?.to_string(), "630");
//! assert_eq!(scores.stats().cache_hits, 0);
//! assert_eq!(scores.get("Tom").await?.to_string(), "630");
//! assert_eq!(scores.stats().cache_hits, 1);
//! # Ok::<(), Error>(())
//! # }).unwrap();
//! ```
//!
//! # Peers
//!
//! Peers are reached through two capabilities: [`PeerPicker`] maps a key to its owning [`Peer`]
//! (or to nobody when the local node owns it) and [`PeerFetcher`] performs the remote lookup.
//! Register a picker once per group with [`Group::register_peers`]. A failed remote lookup is
//! logged and the group falls back to its own origin. Values obtained from a peer are not
//! cached locally.
//!
//! The `meshcache_http` crate implements both capabilities over HTTP.
//!
//! # Features
//!
//! - `metrics`: reports group activity to an OpenTelemetry meter, configured with
//!   `GroupBuilder::meter_provider`.

mod builder;
mod byteview;
mod error;
mod getter;
mod group;
#[cfg(any(feature = "metrics", test))]
mod metrics;
mod peers;
mod registry;
mod stats;
#[cfg(test)]
mod testing;

#[doc(inline)]
pub use builder::GroupBuilder;
#[doc(inline)]
pub use byteview::ByteView;
#[doc(inline)]
pub use error::{Error, ErrorKind, Result};
#[doc(inline)]
pub use getter::{Getter, GetterFn, getter_fn};
#[doc(inline)]
pub use group::Group;
#[doc(inline)]
pub use peers::{Peer, PeerFetcher, PeerPicker};
#[doc(inline)]
pub use registry::Registry;
#[doc(inline)]
pub use stats::{CacheStats, GroupStatsSnapshot};
