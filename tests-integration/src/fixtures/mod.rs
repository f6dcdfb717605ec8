//! Test fixtures for integration testing
//!
//! Metadata caches, label and sample builders, and JSON scrape captures
//! shared by the scenario tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use assembler::{
    Label, MetadataStore, MetricMetadata, MetricType, Sample, SampleExemplar, ScrapeTarget,
};
use serde::Deserialize;

/// One entry per metric type, keyed by the type's own name.
pub fn metadata_cache() -> HashMap<String, MetricMetadata> {
    [
        ("counter", MetricType::Counter, "By"),
        ("gauge", MetricType::Gauge, "1"),
        ("gaugehistogram", MetricType::GaugeHistogram, "?"),
        ("histogram", MetricType::Histogram, "ms"),
        ("summary", MetricType::Summary, "?"),
        ("unknown", MetricType::Unknown, "?"),
    ]
    .into_iter()
    .map(|(name, metric_type, unit)| {
        (
            name.to_string(),
            MetricMetadata::new(metric_type, "This is some help", unit),
        )
    })
    .collect()
}

pub fn metadata_store() -> Arc<dyn MetadataStore> {
    Arc::new(metadata_cache())
}

pub fn test_target() -> ScrapeTarget {
    ScrapeTarget::new("test-job", "localhost:8080")
}

pub fn labels(pairs: &[(&str, &str)]) -> Vec<Label> {
    pairs.iter().map(|(k, v)| Label::new(*k, *v)).collect()
}

pub fn sample(name: &str, pairs: &[(&str, &str)], timestamp_ms: i64, value: f64) -> Sample {
    Sample::new(name, labels(pairs), timestamp_ms, value)
}

pub fn exemplar(value: f64, timestamp_ms: i64, pairs: &[(&str, &str)]) -> SampleExemplar {
    SampleExemplar {
        value,
        timestamp_ms,
        labels: labels(pairs),
    }
}

/// A captured scrape: metadata plus the samples in exposition order.
#[derive(Debug, Deserialize)]
pub struct ScrapeCapture {
    pub target: ScrapeTarget,
    pub metadata: HashMap<String, MetricMetadata>,
    pub samples: Vec<Sample>,
}

impl ScrapeCapture {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to decode scrape capture")
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        Self::from_json(&json)
    }

    pub fn metadata_store(&self) -> Arc<dyn MetadataStore> {
        Arc::new(self.metadata.clone())
    }
}
