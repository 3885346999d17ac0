// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Name-to-group lookup for transports.

use std::{collections::HashMap, fmt::Debug, sync::Arc};

use parking_lot::RwLock;

use crate::{Error, Getter, Group, GroupBuilder, Result};

/// Holds the groups of a process by name.
///
/// Transports serving remote lookups resolve the requested group here. Groups are added once and
/// never removed; lookups only take a read lock.
///
/// # Examples
///
/// ```
/// use meshcache::{Registry, getter_fn};
///
/// let registry = Registry::new();
/// registry
///     .new_group("scores", 2 << 10, getter_fn(|key: String| async move { Ok(key.into_bytes()) }))
///     .unwrap();
///
/// assert_eq!(registry.group("scores").unwrap().name(), "scores");
/// assert!(registry.group("missing").is_none());
/// ```
#[derive(Default)]
pub struct Registry {
    groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("groups", &self.names()).finish()
    }
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates and registers a group with the given byte budget and origin.
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::InvalidArgument`](crate::ErrorKind::InvalidArgument) error if the
    /// name is empty or already taken.
    pub fn new_group(&self, name: impl Into<String>, capacity_bytes: u64, getter: impl Getter + 'static) -> Result<Arc<Group>> {
        self.builder(name).capacity_bytes(capacity_bytes).getter(getter).build()
    }

    /// Starts configuring a group that is registered here when built.
    #[must_use]
    pub fn builder(&self, name: impl Into<String>) -> GroupBuilder<'_> {
        GroupBuilder::registered(self, name)
    }

    /// Returns the group named `name`, if any.
    #[must_use]
    pub fn group(&self, name: &str) -> Option<Arc<Group>> {
        self.groups.read().get(name).cloned()
    }

    /// Names of all registered groups in lexicographic order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.groups.read().keys().cloned().collect();
        names.sort_unstable();
        names
    }

    pub(crate) fn insert(&self, group: Group) -> Result<Arc<Group>> {
        let mut groups = self.groups.write();
        if groups.contains_key(group.name()) {
            return Err(Error::invalid_argument(format!("duplicate registration of group {}", group.name())));
        }

        let group = Arc::new(group);
        groups.insert(group.name().to_owned(), Arc::clone(&group));
        tracing::debug!(group.name = group.name(), "group registered");
        Ok(group)
    }
}
