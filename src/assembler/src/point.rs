//! Finished points and the pure functions that reconcile bucket and quantile
//! fragments into them.

use std::collections::BTreeMap;

use crate::error::AssemblyError;
use crate::types::{Label, MetricType, OrderedFloat};

/// An exemplar recorded against a series, with labels the series already
/// carries filtered out.
#[derive(Debug, Clone, PartialEq)]
pub struct Exemplar {
    pub value: f64,
    pub timestamp_ms: i64,
    pub filtered_labels: Vec<Label>,
    pub trace_id: Option<[u8; 16]>,
    pub span_id: Option<[u8; 8]>,
}

/// An exemplar together with the index of the bucket it was placed in.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketExemplar {
    pub bucket: usize,
    pub exemplar: Exemplar,
}

/// Counter, gauge or unknown-typed observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ScalarPoint {
    pub labels: Vec<Label>,
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
    pub value: f64,
    pub exemplars: Vec<Exemplar>,
    pub no_recorded_value: bool,
}

/// Assembled histogram observation.
///
/// `explicit_bounds.len() == bucket_counts.len() - 1`: the last bucket is
/// unbounded above.
#[derive(Debug, Clone, PartialEq)]
pub struct DistributionPoint {
    pub labels: Vec<Label>,
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
    pub count: u64,
    /// `None` when the group had no `_sum` sample.
    pub sum: Option<f64>,
    pub bucket_counts: Vec<u64>,
    pub explicit_bounds: Vec<f64>,
    pub exemplars: Vec<BucketExemplar>,
    pub no_recorded_value: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QuantileValue {
    pub quantile: f64,
    pub value: f64,
}

/// Assembled summary observation, quantiles ascending.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryPoint {
    pub labels: Vec<Label>,
    pub start_time_unix_nano: u64,
    pub time_unix_nano: u64,
    pub count: u64,
    pub sum: f64,
    pub quantiles: Vec<QuantileValue>,
    pub no_recorded_value: bool,
}

/// The points of one family, one per group that assembled cleanly.
#[derive(Debug, Clone, PartialEq)]
pub enum Points {
    Scalar(Vec<ScalarPoint>),
    Histogram(Vec<DistributionPoint>),
    Summary(Vec<SummaryPoint>),
}

impl Points {
    pub fn len(&self) -> usize {
        match self {
            Self::Scalar(points) => points.len(),
            Self::Histogram(points) => points.len(),
            Self::Summary(points) => points.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A finished family, ready for an exporter.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricRecord {
    pub name: String,
    pub metric_type: MetricType,
    pub help: String,
    pub unit: String,
    pub points: Points,
}

/// Reconciled bucket layout of one histogram group.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketLayout {
    /// Every bound in ascending order, including the last one.
    pub bounds: Vec<f64>,
    pub counts: Vec<u64>,
    /// Cumulative value of the highest bucket.
    pub total: f64,
}

impl BucketLayout {
    /// Bounds of all buckets but the last, which is unbounded above.
    pub fn explicit_bounds(&self) -> Vec<f64> {
        let keep = self.bounds.len().saturating_sub(1);
        self.bounds[..keep].to_vec()
    }
}

/// Turn cumulative bucket values into per-bucket counts.
///
/// Each bucket's count is its cumulative value minus the one below it,
/// truncated toward zero. A bucket holding less than the one below it, or a
/// non-finite value, is an error, never clamped.
pub(crate) fn reconcile_buckets(
    buckets: &BTreeMap<OrderedFloat, f64>,
) -> Result<BucketLayout, AssemblyError> {
    if buckets.is_empty() {
        return Err(AssemblyError::MissingBuckets);
    }

    let mut bounds = Vec::with_capacity(buckets.len());
    let mut counts = Vec::with_capacity(buckets.len());
    let mut previous = 0.0;
    for (bound, &cumulative) in buckets {
        if !cumulative.is_finite() {
            return Err(AssemblyError::NonFiniteBucket {
                bound: bound.0,
                value: cumulative,
            });
        }
        let adjusted = cumulative - previous;
        if adjusted < 0.0 {
            return Err(AssemblyError::NonMonotonicBuckets {
                bound: bound.0,
                cumulative,
                previous,
            });
        }
        bounds.push(bound.0);
        counts.push(adjusted.trunc() as u64);
        previous = cumulative;
    }

    Ok(BucketLayout {
        bounds,
        counts,
        total: previous,
    })
}

/// Index of the bucket `value` falls into: the smallest bound at or above
/// it, or the last bucket when every bound is below it.
pub(crate) fn bucket_index(bounds: &[f64], value: f64) -> usize {
    bounds
        .iter()
        .position(|&bound| value <= bound)
        .unwrap_or(bounds.len().saturating_sub(1))
}

/// Place each exemplar in its bucket. The result is ordered by bucket and
/// keeps arrival order within a bucket.
pub(crate) fn place_exemplars(bounds: &[f64], exemplars: &[Exemplar]) -> Vec<BucketExemplar> {
    let mut placed: Vec<BucketExemplar> = exemplars
        .iter()
        .map(|exemplar| BucketExemplar {
            bucket: bucket_index(bounds, exemplar.value),
            exemplar: exemplar.clone(),
        })
        .collect();
    placed.sort_by_key(|e| e.bucket);
    placed
}

/// Quantiles in ascending order.
pub(crate) fn ordered_quantiles(quantiles: &BTreeMap<OrderedFloat, f64>) -> Vec<QuantileValue> {
    quantiles
        .iter()
        .map(|(quantile, &value)| QuantileValue {
            quantile: quantile.0,
            value,
        })
        .collect()
}

/// Float counts from the exposition, truncated toward zero. Negative counts
/// clamp to zero; NaN and infinities have no count to report.
pub(crate) fn truncate_count(value: f64) -> Result<u64, AssemblyError> {
    if !value.is_finite() {
        return Err(AssemblyError::NonFiniteCount { value });
    }
    Ok(if value <= 0.0 { 0 } else { value.trunc() as u64 })
}
