// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Wire schema exchanged between nodes.
//!
//! A lookup is a `GET {base_path}{group}/{key}` with both segments percent-encoded; the answer is
//! a bincode-encoded [`FetchResponse`].

use meshcache::{Error, Result};
use pct_str::{PctStr, PctString, UriReserved};
use serde::{Deserialize, Serialize};

/// A remote lookup of `key` in the group named `group`.
///
/// Requests travel entirely in the URL path, see [`FetchRequest::to_path`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    /// Name of the group to query.
    pub group: String,
    /// The key to look up.
    pub key: String,
}

/// The value returned for a successful [`FetchRequest`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    /// The cached value.
    pub value: Vec<u8>,
}

impl FetchRequest {
    /// Creates a request for `key` in `group`.
    pub fn new(group: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            key: key.into(),
        }
    }

    /// Renders the request path below `base_path`, which must end with `/`.
    ///
    /// ```
    /// use meshcache_http::FetchRequest;
    ///
    /// let request = FetchRequest::new("scores", "Tom & Jerry");
    /// assert_eq!(request.to_path("/_meshcache/"), "/_meshcache/scores/Tom%20%26%20Jerry");
    /// ```
    #[must_use]
    pub fn to_path(&self, base_path: &str) -> String {
        format!("{base_path}{}/{}", encode_segment(&self.group), encode_segment(&self.key))
    }

    /// Parses a request path produced by [`to_path`](Self::to_path).
    ///
    /// Returns `None` if `path` is outside `base_path`, lacks a group or key, or is not valid
    /// percent-encoding.
    #[must_use]
    pub fn from_path(base_path: &str, path: &str) -> Option<Self> {
        let (group, key) = path.strip_prefix(base_path)?.split_once('/')?;
        if group.is_empty() || key.is_empty() {
            return None;
        }

        Some(Self {
            group: decode_segment(group)?,
            key: decode_segment(key)?,
        })
    }
}

fn encode_segment(segment: &str) -> String {
    PctString::encode(segment.chars(), UriReserved::Any).into_string()
}

fn decode_segment(segment: &str) -> Option<String> {
    PctStr::new(segment).ok().map(PctStr::decode)
}

/// Serializes a wire message with bincode.
pub(crate) fn encode<T: Serialize>(message: &T) -> bincode::Result<Vec<u8>> {
    bincode::serialize(message)
}

/// Deserializes a wire message received from a peer.
pub(crate) fn decode<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(Error::peer_unavailable)
}
