// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Log and metric capture for asserting on emitted telemetry.

use std::{
    io::Write,
    sync::{Arc, Mutex},
};

use opentelemetry_sdk::metrics::{
    InMemoryMetricExporter, SdkMeterProvider,
    data::{AggregatedMetrics, MetricData, ResourceMetrics, ScopeMetrics, SumDataPoint},
};
use tracing_subscriber::fmt::MakeWriter;

use crate::metrics::CACHE_ACTIVITY_NAME;

/// Collects metrics in memory.
#[derive(Debug)]
pub(crate) struct MetricTester {
    exporter: InMemoryMetricExporter,
    provider: SdkMeterProvider,
}

impl MetricTester {
    pub fn new() -> Self {
        let in_memory = InMemoryMetricExporter::default();

        Self {
            exporter: in_memory.clone(),
            provider: SdkMeterProvider::builder().with_periodic_exporter(in_memory).build(),
        }
    }

    pub fn meter_provider(&self) -> &SdkMeterProvider {
        &self.provider
    }

    /// Asserts that some exported data point carries each of the `(key, value)` attributes.
    pub fn assert_attributes_contain(&self, expected: &[opentelemetry::KeyValue]) {
        let attributes: Vec<(String, String)> = self
            .u64_sums()
            .iter()
            .flat_map(|point| point.attributes().map(|kv| (kv.key.as_str().to_owned(), kv.value.as_str().into_owned())))
            .collect();

        for kv in expected {
            let pair = (kv.key.as_str().to_owned(), kv.value.as_str().into_owned());
            assert!(
                attributes.contains(&pair),
                "attribute {pair:?} not found in collected attributes: {attributes:?}"
            );
        }
    }

    /// Current cumulative count for points tagged with `activity`, or 0.
    pub fn sum_for(&self, activity: &str) -> u64 {
        self.u64_sums()
            .iter()
            .filter(|point| {
                point
                    .attributes()
                    .any(|kv| kv.key.as_str() == CACHE_ACTIVITY_NAME && kv.value.as_str() == activity)
            })
            .map(|point| point.value())
            .max()
            .unwrap_or(0)
    }

    fn u64_sums(&self) -> Vec<SumDataPoint<u64>> {
        self.provider.force_flush().unwrap();
        self.exporter
            .get_finished_metrics()
            .unwrap()
            .iter()
            .flat_map(ResourceMetrics::scope_metrics)
            .flat_map(ScopeMetrics::metrics)
            .flat_map(|metric| match metric.data() {
                AggregatedMetrics::U64(MetricData::Sum(sum)) => sum.data_points().cloned().collect(),
                _ => Vec::new(),
            })
            .collect()
    }
}

/// Collects formatted log output in memory.
#[derive(Debug, Clone, Default)]
pub(crate) struct LogCapture {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl LogCapture {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.buffer.lock().unwrap()).to_string()
    }

    pub fn assert_contains(&self, expected: &str) {
        let output = self.output();
        assert!(
            output.contains(expected),
            "log output does not contain '{expected}', got:\n{output}"
        );
    }

    /// Use with `tracing::subscriber::set_default()` for thread-local capture.
    pub fn subscriber(&self) -> impl tracing::Subscriber {
        use tracing_subscriber::layer::SubscriberExt;
        tracing_subscriber::registry().with(tracing_subscriber::fmt::layer().with_writer(self.clone()).with_ansi(false))
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCaptureWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogCaptureWriter {
            buffer: Arc::clone(&self.buffer),
        }
    }
}

pub(crate) struct LogCaptureWriter {
    buffer: Arc<Mutex<Vec<u8>>>,
}

impl Write for LogCaptureWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.buffer.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}
