// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! The origin data source consulted when no cache holds a key.

use std::fmt::Debug;

use crate::Result;

/// Loads the authoritative value for a key.
///
/// A [`Group`](crate::Group) calls its getter only when neither its local store nor the owning
/// peer can supply a key, and at most once per key at a time. The returned bytes become owned by
/// the cache; the getter keeps no alias to them.
///
/// Implement this trait for stateful sources, or wrap an async closure with [`getter_fn`].
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
///
/// use meshcache::{Error, Getter, Result};
///
/// struct Scores(HashMap<&'static str, &'static str>);
///
/// impl Getter for Scores {
///     async fn get(&self, key: &str) -> Result<Vec<u8>> {
///         self.0
///             .get(key)
///             .map(|score| score.as_bytes().to_vec())
///             .ok_or_else(|| Error::not_found(format!("{key} not exist")))
///     }
/// }
/// ```
#[dynosaur::dynosaur(pub(crate) DynGetter = dyn(box) Getter, bridge(none))]
pub trait Getter: Send + Sync {
    /// Loads the value for `key`.
    fn get(&self, key: &str) -> impl Future<Output = Result<Vec<u8>>> + Send;
}

/// A [`Getter`] backed by an async closure. Created by [`getter_fn`].
#[derive(Clone)]
pub struct GetterFn<F> {
    func: F,
}

impl<F> Debug for GetterFn<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GetterFn").finish_non_exhaustive()
    }
}

/// Adapts an async closure taking the key into a [`Getter`].
///
/// # Examples
///
/// ```
/// use meshcache::{Error, getter_fn};
///
/// let getter = getter_fn(|key: String| async move {
///     if key == "Tom" {
///         Ok(b"630".to_vec())
///     } else {
///         Err(Error::not_found(format!("{key} not exist")))
///     }
/// });
/// ```
pub fn getter_fn<F, Fut>(func: F) -> GetterFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>>> + Send,
{
    GetterFn { func }
}

impl<F, Fut> Getter for GetterFn<F>
where
    F: Fn(String) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<u8>>> + Send,
{
    fn get(&self, key: &str) -> impl Future<Output = Result<Vec<u8>>> + Send {
        (self.func)(key.to_owned())
    }
}
