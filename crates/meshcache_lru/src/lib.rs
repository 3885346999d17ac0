// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! A byte-budgeted least-recently-used store.
//!
//! [`LruStore`] keeps string-keyed values in recency order and evicts the least recently used
//! entries once the total size of keys and values exceeds a configured byte budget. An optional
//! eviction callback observes every evicted entry.
//!
//! Value sizes come from the [`ByteLen`] trait, which is implemented for the common byte and
//! string containers.
//!
//! # Quick Start
//!
//! ```
//! use meshcache_lru::LruStore;
//!
//! let mut store = LruStore::new(1024);
//! store.add("greeting", b"hello".to_vec());
//!
//! assert_eq!(store.get("greeting").map(Vec::as_slice), Some(&b"hello"[..]));
//! assert_eq!(store.used_bytes(), 13);
//! ```
//!
//! # Concurrency
//!
//! The store performs no locking of its own. Callers that share a store wrap it in a mutex and
//! hold the lock for the duration of a single call.

mod list;
mod store;

#[doc(inline)]
pub use store::{EvictionCallback, LruStore, StoreStats};

/// Reports how many bytes a value occupies for budget accounting.
pub trait ByteLen {
    /// Number of bytes charged for this value.
    fn byte_len(&self) -> usize;
}

impl ByteLen for Vec<u8> {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteLen for [u8] {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteLen for String {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteLen for str {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl ByteLen for bytes::Bytes {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl<T: ByteLen + ?Sized> ByteLen for &T {
    fn byte_len(&self) -> usize {
        (**self).byte_len()
    }
}

impl<T: ByteLen + ?Sized> ByteLen for std::sync::Arc<T> {
    fn byte_len(&self) -> usize {
        (**self).byte_len()
    }
}
