// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Per-group counters.

use std::sync::atomic::{AtomicU64, Ordering};

use meshcache_lru::StoreStats;
#[cfg(any(feature = "metrics", test))]
use opentelemetry::{
    KeyValue,
    metrics::{Counter, Meter},
};

#[cfg(any(feature = "metrics", test))]
use crate::metrics::{CACHE_ACTIVITY_NAME, GROUP_NAME, create_event_counter};

/// Something a group did, counted once per occurrence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum GroupActivity {
    Get,
    CacheHit,
    PeerLoad,
    PeerError,
    Load,
    LoadDeduplicated,
    LocalLoad,
    LocalLoadError,
    ServerRequest,
}

impl GroupActivity {
    const COUNT: usize = 9;

    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn as_str(self) -> &'static str {
        match self {
            Self::Get => "cache.get",
            Self::CacheHit => "cache.hit",
            Self::PeerLoad => "cache.peer_load",
            Self::PeerError => "cache.peer_error",
            Self::Load => "cache.load",
            Self::LoadDeduplicated => "cache.load_deduplicated",
            Self::LocalLoad => "cache.local_load",
            Self::LocalLoadError => "cache.local_load_error",
            Self::ServerRequest => "cache.server_request",
        }
    }

    const fn index(self) -> usize {
        self as usize
    }
}

/// Exports group activity to an OpenTelemetry meter.
#[cfg(any(feature = "metrics", test))]
#[derive(Debug)]
struct GroupMetrics {
    group_name: KeyValue,
    event_counter: Counter<u64>,
}

#[derive(Debug, Default)]
pub(crate) struct GroupStats {
    counters: [AtomicU64; GroupActivity::COUNT],
    #[cfg(any(feature = "metrics", test))]
    metrics: Option<GroupMetrics>,
}

impl GroupStats {
    /// Counters that also report to `meter`, tagged with the group's name.
    #[cfg(any(feature = "metrics", test))]
    pub(crate) fn with_meter(group_name: &str, meter: &Meter) -> Self {
        Self {
            counters: Default::default(),
            metrics: Some(GroupMetrics {
                group_name: KeyValue::new(GROUP_NAME, group_name.to_owned()),
                event_counter: create_event_counter(meter),
            }),
        }
    }

    pub(crate) fn record(&self, activity: GroupActivity) {
        self.counters[activity.index()].fetch_add(1, Ordering::Relaxed);

        #[cfg(any(feature = "metrics", test))]
        if let Some(metrics) = &self.metrics {
            let attrs = [
                metrics.group_name.clone(),
                KeyValue::new(CACHE_ACTIVITY_NAME, activity.as_str()),
            ];
            metrics.event_counter.add(1, &attrs);
        }
    }

    fn get(&self, activity: GroupActivity) -> u64 {
        self.counters[activity.index()].load(Ordering::Relaxed)
    }

    pub(crate) fn snapshot(&self) -> GroupStatsSnapshot {
        GroupStatsSnapshot {
            gets: self.get(GroupActivity::Get),
            cache_hits: self.get(GroupActivity::CacheHit),
            peer_loads: self.get(GroupActivity::PeerLoad),
            peer_errors: self.get(GroupActivity::PeerError),
            loads: self.get(GroupActivity::Load),
            loads_deduplicated: self.get(GroupActivity::LoadDeduplicated),
            local_loads: self.get(GroupActivity::LocalLoad),
            local_load_errors: self.get(GroupActivity::LocalLoadError),
            server_requests: self.get(GroupActivity::ServerRequest),
        }
    }
}

/// Point-in-time copy of a group's counters.
///
/// Counters only grow. They are updated without synchronization between each other, so a
/// snapshot taken during concurrent traffic may be slightly inconsistent across fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct GroupStatsSnapshot {
    /// Calls to `get`, including rejected ones.
    pub gets: u64,
    /// Lookups answered from the local store.
    pub cache_hits: u64,
    /// Values successfully fetched from a remote peer.
    pub peer_loads: u64,
    /// Failed remote fetches that fell back to the origin.
    pub peer_errors: u64,
    /// Misses that entered the coalescing stage (`cache_hits` excluded).
    pub loads: u64,
    /// Loads that actually ran after coalescing.
    pub loads_deduplicated: u64,
    /// Values successfully loaded from the origin.
    pub local_loads: u64,
    /// Origin failures.
    pub local_load_errors: u64,
    /// Requests received from other nodes through a transport.
    pub server_requests: u64,
}

/// Point-in-time accounting of a group's local store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct CacheStats {
    /// Bytes charged against the store's budget.
    pub bytes: u64,
    /// Number of cached entries.
    pub items: usize,
    /// Entries evicted to stay within budget.
    pub evictions: u64,
}

impl From<StoreStats> for CacheStats {
    fn from(stats: StoreStats) -> Self {
        Self {
            bytes: stats.bytes,
            items: stats.items,
            evictions: stats.evictions,
        }
    }
}
