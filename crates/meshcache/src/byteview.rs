// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Immutable views over cached bytes.

use std::fmt::{Debug, Display};

use bytes::Bytes;
use meshcache_lru::ByteLen;

/// An immutable view over a cached value.
///
/// `ByteView` is the only value type a [`Group`](crate::Group) stores or returns. Cloning is
/// cheap and never copies the bytes, while no method hands out a mutable alias of cached state:
/// [`as_bytes`](Self::as_bytes) borrows read-only and [`to_vec`](Self::to_vec) returns an
/// independent copy.
///
/// # Examples
///
/// ```
/// use meshcache::ByteView;
///
/// let view = ByteView::from("630");
/// let mut copy = view.to_vec();
/// copy[0] = b'9';
///
/// assert_eq!(view.as_bytes(), b"630");
/// assert_eq!(view.to_string(), "630");
/// ```
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView(Bytes);

impl ByteView {
    /// Number of bytes in the view.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the view holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrows the bytes read-only.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Returns an independent copy of the bytes.
    #[must_use]
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }

    /// Returns an independent copy of the bytes. Same as [`to_vec`](Self::to_vec).
    #[must_use]
    pub fn byte_slice(&self) -> Vec<u8> {
        self.to_vec()
    }

    /// Decodes the bytes as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn to_string_lossy(&self) -> String {
        String::from_utf8_lossy(&self.0).into_owned()
    }

    /// Returns the shared buffer backing this view.
    ///
    /// `Bytes` is itself immutable, so this cannot be used to modify cached state.
    #[must_use]
    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

impl From<Bytes> for ByteView {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<Vec<u8>> for ByteView {
    fn from(bytes: Vec<u8>) -> Self {
        Self(Bytes::from(bytes))
    }
}

impl From<String> for ByteView {
    fn from(value: String) -> Self {
        Self(Bytes::from(value))
    }
}

impl From<&str> for ByteView {
    fn from(value: &str) -> Self {
        Self(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<&[u8]> for ByteView {
    fn from(value: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(value))
    }
}

impl AsRef<[u8]> for ByteView {
    fn as_ref(&self) -> &[u8] {
        self.as_bytes()
    }
}

impl PartialEq<[u8]> for ByteView {
    fn eq(&self, other: &[u8]) -> bool {
        self.as_bytes() == other
    }
}

impl PartialEq<str> for ByteView {
    fn eq(&self, other: &str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl PartialEq<&str> for ByteView {
    fn eq(&self, other: &&str) -> bool {
        self.as_bytes() == other.as_bytes()
    }
}

impl ByteLen for ByteView {
    fn byte_len(&self) -> usize {
        self.len()
    }
}

impl Display for ByteView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&String::from_utf8_lossy(&self.0))
    }
}

impl Debug for ByteView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ByteView").field(&self.0).finish()
    }
}
