// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! OpenTelemetry instruments for group activity.

use opentelemetry::{
    InstrumentationScope,
    metrics::{Counter, Meter, MeterProvider},
};

const METER_NAME: &str = "meshcache";
const VERSION: &str = "v0.1.0";
const SCHEMA_URL: &str = "https://opentelemetry.io/schemas/1.47.0";
const GROUP_EVENT_COUNT_NAME: &str = "meshcache.group.event.count";

pub(crate) const GROUP_NAME: &str = "group.name";
pub(crate) const CACHE_ACTIVITY_NAME: &str = "cache.activity";

#[cfg_attr(all(test, not(feature = "metrics")), expect(dead_code, reason = "meters are created by the builder"))]
pub(crate) fn create_meter(meter_provider: &dyn MeterProvider) -> Meter {
    meter_provider.meter_with_scope(
        InstrumentationScope::builder(METER_NAME)
            .with_version(VERSION)
            .with_schema_url(SCHEMA_URL)
            .build(),
    )
}

pub(crate) fn create_event_counter(meter: &Meter) -> Counter<u64> {
    meter
        .u64_counter(GROUP_EVENT_COUNT_NAME)
        .with_description("Cache group events")
        .with_unit("{event}")
        .build()
}
