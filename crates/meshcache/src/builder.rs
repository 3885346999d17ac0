// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Builder for configuring cache groups.

use std::{fmt::Debug, sync::Arc};

#[cfg(feature = "metrics")]
use opentelemetry::metrics::{Meter, MeterProvider};

use crate::{Error, Getter, Group, Registry, Result, getter::DynGetter, stats::GroupStats};

/// Builder for configuring a [`Group`].
///
/// Obtained from [`Group::builder`] for a standalone group or from [`Registry::builder`] for a
/// group that is registered by name when built.
///
/// # Examples
///
/// ```
/// use meshcache::{Registry, getter_fn};
///
/// let registry = Registry::new();
/// let group = registry
///     .builder("scores")
///     .capacity_bytes(64 << 20)
///     .getter(getter_fn(|key: String| async move { Ok(key.into_bytes()) }))
///     .build()
///     .unwrap();
///
/// assert!(registry.group("scores").is_some());
/// assert_eq!(group.capacity_bytes(), 64 << 20);
/// ```
pub struct GroupBuilder<'r> {
    registry: Option<&'r Registry>,
    name: String,
    capacity_bytes: u64,
    getter: Option<Arc<DynGetter<'static>>>,
    #[cfg(feature = "metrics")]
    meter: Option<Meter>,
}

impl Debug for GroupBuilder<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GroupBuilder")
            .field("name", &self.name)
            .field("capacity_bytes", &self.capacity_bytes)
            .field("getter", &self.getter.is_some())
            .field("registered", &self.registry.is_some())
            .finish_non_exhaustive()
    }
}

impl GroupBuilder<'static> {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self {
            registry: None,
            name: name.into(),
            capacity_bytes: 0,
            getter: None,
            #[cfg(feature = "metrics")]
            meter: None,
        }
    }
}

impl<'r> GroupBuilder<'r> {
    pub(crate) fn registered(registry: &'r Registry, name: impl Into<String>) -> Self {
        Self {
            registry: Some(registry),
            name: name.into(),
            capacity_bytes: 0,
            getter: None,
            #[cfg(feature = "metrics")]
            meter: None,
        }
    }

    /// Sets the byte budget of the group's local store.
    ///
    /// Entries are charged their key length plus value length. The default of `0` leaves the
    /// store unbounded.
    #[must_use]
    pub fn capacity_bytes(mut self, capacity_bytes: u64) -> Self {
        self.capacity_bytes = capacity_bytes;
        self
    }

    /// Sets the origin consulted when neither the local store nor a peer has a key. Required.
    #[must_use]
    pub fn getter(mut self, getter: impl Getter + 'static) -> Self {
        self.getter = Some(DynGetter::new_arc(getter));
        self
    }

    /// Reports the group's activity to `meter_provider`.
    ///
    /// Every counter of [`Group::stats`] is also added to the `meshcache.group.event.count`
    /// counter, tagged with `group.name` and `cache.activity`.
    #[cfg(feature = "metrics")]
    #[cfg_attr(docsrs, doc(cfg(feature = "metrics")))]
    #[must_use]
    pub fn meter_provider(mut self, meter_provider: &dyn MeterProvider) -> Self {
        self.meter = Some(crate::metrics::create_meter(meter_provider));
        self
    }

    /// Builds the group, registering it if the builder came from a [`Registry`].
    ///
    /// # Errors
    ///
    /// Returns an [`ErrorKind::InvalidArgument`](crate::ErrorKind::InvalidArgument) error if
    /// the name is empty, no getter was set, or the registry already holds a group with this
    /// name.
    pub fn build(self) -> Result<Arc<Group>> {
        if self.name.is_empty() {
            return Err(Error::invalid_argument("group name is required"));
        }
        let Some(getter) = self.getter else {
            return Err(Error::invalid_argument(format!("group {} has no getter", self.name)));
        };

        #[cfg(feature = "metrics")]
        let stats = match &self.meter {
            Some(meter) => GroupStats::with_meter(&self.name, meter),
            None => GroupStats::default(),
        };
        #[cfg(not(feature = "metrics"))]
        let stats = GroupStats::default();

        let group = Group::new(self.name, self.capacity_bytes, getter, stats);
        match self.registry {
            Some(registry) => registry.insert(group),
            None => Ok(Arc::new(group)),
        }
    }
}
