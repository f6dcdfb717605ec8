//! Sample-level types handed to the assembler by the scrape collaborator.
//!
//! A scrape produces a flat stream of [`Sample`]s. One logical histogram or
//! summary arrives as several samples sharing a base name, told apart by a
//! suffix (`_count`, `_sum`, `_bucket`) and a discriminator label (`le` or
//! `quantile`).

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

/// Prometheus stale marker - special NaN value indicating a stale sample
/// Bit pattern: 0x7ff0000000000002
pub const STALE_NAN_BITS: u64 = 0x7ff0000000000002;

/// Check if a sample value is a Prometheus stale marker
pub fn is_stale_marker(value: f64) -> bool {
    value.to_bits() == STALE_NAN_BITS
}

/// The stale marker as a float, for callers that need to emit one.
pub fn stale_marker() -> f64 {
    f64::from_bits(STALE_NAN_BITS)
}

/// Label carrying a histogram bucket's upper bound.
pub const BUCKET_LABEL: &str = "le";

/// Label carrying a summary quantile.
pub const QUANTILE_LABEL: &str = "quantile";

/// Default label holding the metric name.
pub const METRIC_NAME_LABEL: &str = "__name__";

/// A label key-value pair
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Label {
    pub name: String,
    pub value: String,
}

impl Label {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Exemplar metadata attached to a scraped sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleExemplar {
    pub value: f64,
    pub timestamp_ms: i64,
    #[serde(default)]
    pub labels: Vec<Label>,
}

/// One scraped sample: `(metricName, labelSet, timestampMillis, value)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub name: String,
    pub labels: Vec<Label>,
    pub timestamp_ms: i64,
    pub value: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exemplar: Option<SampleExemplar>,
}

impl Sample {
    pub fn new(name: impl Into<String>, labels: Vec<Label>, timestamp_ms: i64, value: f64) -> Self {
        Self {
            name: name.into(),
            labels,
            timestamp_ms,
            value,
            exemplar: None,
        }
    }

    pub fn with_exemplar(mut self, exemplar: SampleExemplar) -> Self {
        self.exemplar = Some(exemplar);
        self
    }
}

/// Metric family types as declared in exposition metadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum MetricType {
    Counter,
    Gauge,
    Histogram,
    GaugeHistogram,
    Summary,
    #[default]
    Unknown,
}

/// How a family's samples are laid out, which decides the accumulator variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Shape {
    Scalar,
    Histogram,
    Summary,
}

impl MetricType {
    /// Parse the exposition spelling of a type. Spellings this crate does not
    /// assemble (`info`, `stateset`, ...) classify as [`MetricType::Unknown`].
    pub fn from_exposition(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "counter" => Self::Counter,
            "gauge" => Self::Gauge,
            "histogram" => Self::Histogram,
            "gaugehistogram" => Self::GaugeHistogram,
            "summary" => Self::Summary,
            _ => Self::Unknown,
        }
    }

    /// Whether values of this type accumulate since a start time.
    ///
    /// Fixed table: only counters and histograms are cumulative.
    pub const fn is_cumulative(self) -> bool {
        matches!(self, Self::Counter | Self::Histogram)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Counter => "counter",
            Self::Gauge => "gauge",
            Self::Histogram => "histogram",
            Self::GaugeHistogram => "gaugehistogram",
            Self::Summary => "summary",
            Self::Unknown => "unknown",
        }
    }

    pub(crate) fn shape(self) -> Shape {
        match self {
            Self::Histogram | Self::GaugeHistogram => Shape::Histogram,
            Self::Summary => Shape::Summary,
            Self::Counter | Self::Gauge | Self::Unknown => Shape::Scalar,
        }
    }

    /// Labels that identify a fragment's role rather than its series.
    pub fn discriminators(self) -> &'static [&'static str] {
        match self.shape() {
            Shape::Histogram => &[BUCKET_LABEL],
            Shape::Summary => &[QUANTILE_LABEL],
            Shape::Scalar => &[],
        }
    }
}

impl From<String> for MetricType {
    fn from(value: String) -> Self {
        Self::from_exposition(&value)
    }
}

impl std::fmt::Display for MetricType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Metric metadata from the scrape (type, help, unit)
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricMetadata {
    #[serde(rename = "type", default)]
    pub metric_type: MetricType,
    #[serde(default)]
    pub help: String,
    #[serde(default)]
    pub unit: String,
}

impl MetricMetadata {
    pub fn new(metric_type: MetricType, help: impl Into<String>, unit: impl Into<String>) -> Self {
        Self {
            metric_type,
            help: help.into(),
            unit: unit.into(),
        }
    }
}

// ============================================================================
// Helper functions
// ============================================================================

/// Get a label value by name from a slice of labels
pub fn get_label<'a>(labels: &'a [Label], name: &str) -> Option<&'a str> {
    labels
        .iter()
        .find(|l| l.name == name)
        .map(|l| l.value.as_str())
}

/// Parse a bucket bound or quantile. The literal `+Inf` is the infinite bound.
/// Returns `None` for anything that is not a number, and for NaN.
/// `-0` is the same bound as `0`.
pub(crate) fn parse_boundary(raw: &str) -> Option<f64> {
    let bound = if raw == "+Inf" {
        f64::INFINITY
    } else {
        raw.trim().parse::<f64>().ok()?
    };
    if bound.is_nan() {
        return None;
    }
    Some(if bound == 0.0 { 0.0 } else { bound })
}

/// Convert a millisecond timestamp to Unix nanoseconds.
/// Timestamps before the epoch clamp to zero.
pub fn millis_to_nanos(timestamp_ms: i64) -> u64 {
    u64::try_from(timestamp_ms)
        .unwrap_or(0)
        .saturating_mul(1_000_000)
}

/// Wrapper for f64 that implements Ord for use as a map key.
/// Uses IEEE total ordering, so `+Inf` sorts after every finite bound.
#[derive(Debug, Clone, Copy)]
pub struct OrderedFloat(pub f64);

impl PartialEq for OrderedFloat {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OrderedFloat {}

impl Ord for OrderedFloat {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl PartialOrd for OrderedFloat {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}
