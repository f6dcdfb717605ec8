//! Per-series accumulation of sample fragments.

use std::collections::BTreeMap;

use crate::error::AssemblyError;
use crate::point::{
    DistributionPoint, Exemplar, ScalarPoint, SummaryPoint, ordered_quantiles, place_exemplars,
    reconcile_buckets, truncate_count,
};
use crate::registry::LabelKeyRegistry;
use crate::types::{Label, OrderedFloat, Shape, millis_to_nanos};

/// The role a sample plays within its group.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Fragment {
    Value,
    Count,
    Sum,
    Bucket(f64),
    Quantile(f64),
    /// Start time in Unix nanoseconds, from a `_created` sample.
    Created(u64),
}

/// Type-specific state of a group.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupData {
    Scalar {
        value: Option<f64>,
    },
    Histogram {
        count: Option<f64>,
        sum: Option<f64>,
        /// Upper bound -> cumulative count.
        buckets: BTreeMap<OrderedFloat, f64>,
    },
    Summary {
        count: Option<f64>,
        sum: Option<f64>,
        quantiles: BTreeMap<OrderedFloat, f64>,
    },
}

impl GroupData {
    fn for_shape(shape: Shape) -> Self {
        match shape {
            Shape::Scalar => Self::Scalar { value: None },
            Shape::Histogram => Self::Histogram {
                count: None,
                sum: None,
                buckets: BTreeMap::new(),
            },
            Shape::Summary => Self::Summary {
                count: None,
                sum: None,
                quantiles: BTreeMap::new(),
            },
        }
    }
}

/// One logical time series within a family.
#[derive(Debug, Clone, PartialEq)]
pub struct GroupAccumulator {
    labels: Vec<Label>,
    timestamp_ms: i64,
    first_seen_ms: i64,
    created_unix_nano: Option<u64>,
    stale: bool,
    exemplars: Vec<Exemplar>,
    data: GroupData,
}

impl GroupAccumulator {
    /// `labels` are the group's identity labels; the first sample's
    /// timestamp anchors both the point time and the start time.
    pub(crate) fn new(shape: Shape, labels: Vec<Label>, timestamp_ms: i64) -> Self {
        Self {
            labels,
            timestamp_ms,
            first_seen_ms: timestamp_ms,
            created_unix_nano: None,
            stale: false,
            exemplars: Vec::new(),
            data: GroupData::for_shape(shape),
        }
    }

    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn timestamp_ms(&self) -> i64 {
        self.timestamp_ms
    }

    pub fn first_seen_ms(&self) -> i64 {
        self.first_seen_ms
    }

    pub fn data(&self) -> &GroupData {
        &self.data
    }

    pub fn exemplars(&self) -> &[Exemplar] {
        &self.exemplars
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub(crate) fn record(&mut self, fragment: Fragment, value: f64, stale: bool) {
        if stale {
            self.stale = true;
        }
        // Stale fragments keep the layout but carry no count.
        let value = if stale && !matches!(fragment, Fragment::Value) {
            0.0
        } else {
            value
        };

        match (&mut self.data, fragment) {
            (_, Fragment::Created(start)) => {
                if !stale {
                    self.created_unix_nano = Some(start);
                }
            }
            (GroupData::Scalar { value: slot }, _) => *slot = Some(value),
            (GroupData::Histogram { count, .. }, Fragment::Count)
            | (GroupData::Summary { count, .. }, Fragment::Count) => *count = Some(value),
            (GroupData::Histogram { sum, .. }, Fragment::Sum)
            | (GroupData::Summary { sum, .. }, Fragment::Sum) => *sum = Some(value),
            (GroupData::Histogram { buckets, .. }, Fragment::Bucket(bound)) => {
                buckets.insert(OrderedFloat(bound), value);
            }
            (GroupData::Summary { quantiles, .. }, Fragment::Quantile(quantile)) => {
                quantiles.insert(OrderedFloat(quantile), value);
            }
            (data, fragment) => {
                tracing::debug!(?fragment, ?data, "Fragment does not fit group shape");
            }
        }
    }

    pub(crate) fn push_exemplar(&mut self, exemplar: Exemplar) {
        self.exemplars.push(exemplar);
    }

    fn time_unix_nano(&self) -> u64 {
        millis_to_nanos(self.timestamp_ms)
    }

    /// Cumulative series start at their first sighting (or `_created`);
    /// everything else has no reset window and starts at the point itself.
    fn start_time_unix_nano(&self, cumulative: bool) -> u64 {
        if cumulative {
            self.created_unix_nano
                .unwrap_or_else(|| millis_to_nanos(self.first_seen_ms))
        } else {
            self.time_unix_nano()
        }
    }

    /// Assemble a histogram point. Pure: calling it twice yields equal points.
    pub fn to_distribution_point(
        &self,
        registry: &LabelKeyRegistry,
        cumulative: bool,
    ) -> Result<DistributionPoint, AssemblyError> {
        let GroupData::Histogram {
            count,
            sum,
            buckets,
        } = &self.data
        else {
            return Err(AssemblyError::EmptyGroup);
        };
        if count.is_none() && sum.is_none() && buckets.is_empty() {
            return Err(AssemblyError::EmptyGroup);
        }

        let layout = reconcile_buckets(buckets)?;
        let count = truncate_count(count.unwrap_or(layout.total))?;
        let exemplars = place_exemplars(&layout.bounds, &self.exemplars);

        Ok(DistributionPoint {
            labels: registry.render(&self.labels),
            start_time_unix_nano: self.start_time_unix_nano(cumulative),
            time_unix_nano: self.time_unix_nano(),
            count,
            sum: *sum,
            explicit_bounds: layout.explicit_bounds(),
            bucket_counts: layout.counts,
            exemplars,
            no_recorded_value: self.stale,
        })
    }

    pub fn to_summary_point(
        &self,
        registry: &LabelKeyRegistry,
        cumulative: bool,
    ) -> Result<SummaryPoint, AssemblyError> {
        let GroupData::Summary {
            count,
            sum,
            quantiles,
        } = &self.data
        else {
            return Err(AssemblyError::EmptyGroup);
        };
        if count.is_none() && sum.is_none() && quantiles.is_empty() {
            return Err(AssemblyError::EmptyGroup);
        }

        Ok(SummaryPoint {
            labels: registry.render(&self.labels),
            start_time_unix_nano: self.start_time_unix_nano(cumulative),
            time_unix_nano: self.time_unix_nano(),
            count: count.map(truncate_count).transpose()?.unwrap_or(0),
            sum: sum.unwrap_or(0.0),
            quantiles: ordered_quantiles(quantiles),
            no_recorded_value: self.stale,
        })
    }

    pub fn to_scalar_point(
        &self,
        registry: &LabelKeyRegistry,
        cumulative: bool,
    ) -> Result<ScalarPoint, AssemblyError> {
        let GroupData::Scalar { value: Some(value) } = &self.data else {
            return Err(AssemblyError::EmptyGroup);
        };

        Ok(ScalarPoint {
            labels: registry.render(&self.labels),
            start_time_unix_nano: self.start_time_unix_nano(cumulative),
            time_unix_nano: self.time_unix_nano(),
            value: *value,
            exemplars: self.exemplars.clone(),
            no_recorded_value: self.stale,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry_for(labels: &[Label]) -> LabelKeyRegistry {
        let mut registry = LabelKeyRegistry::new();
        registry.observe(labels);
        registry
    }

    #[test]
    fn test_histogram_point_from_fragments() {
        let labels = vec![Label::new("a", "A")];
        let registry = registry_for(&labels);
        let mut group = GroupAccumulator::new(Shape::Histogram, labels, 1_000);
        group.record(Fragment::Bucket(0.5), 4.0, false);
        group.record(Fragment::Bucket(f64::INFINITY), 9.0, false);
        group.record(Fragment::Bucket(0.1), 1.0, false);
        group.record(Fragment::Count, 9.0, false);
        group.record(Fragment::Sum, 3.25, false);

        let point = group.to_distribution_point(&registry, true).unwrap();
        assert_eq!(point.count, 9);
        assert_eq!(point.sum, Some(3.25));
        assert_eq!(point.explicit_bounds, vec![0.1, 0.5]);
        assert_eq!(point.bucket_counts, vec![1, 3, 5]);
        assert_eq!(point.time_unix_nano, 1_000_000_000);
        assert_eq!(point.start_time_unix_nano, 1_000_000_000);
    }

    #[test]
    fn test_count_falls_back_to_highest_bucket() {
        let registry = LabelKeyRegistry::new();
        let mut group = GroupAccumulator::new(Shape::Histogram, vec![], 5);
        group.record(Fragment::Bucket(1.0), 2.0, false);
        group.record(Fragment::Bucket(f64::INFINITY), 6.0, false);

        let point = group.to_distribution_point(&registry, false).unwrap();
        assert_eq!(point.count, 6);
        assert_eq!(point.sum, None);
    }

    #[test]
    fn test_non_finite_histogram_values_drop_point() {
        let registry = LabelKeyRegistry::new();

        let mut nan_bucket = GroupAccumulator::new(Shape::Histogram, vec![], 5);
        nan_bucket.record(Fragment::Bucket(1.0), f64::NAN, false);
        nan_bucket.record(Fragment::Bucket(2.0), 5.0, false);
        nan_bucket.record(Fragment::Bucket(f64::INFINITY), 7.0, false);
        nan_bucket.record(Fragment::Count, 7.0, false);
        assert!(matches!(
            nan_bucket.to_distribution_point(&registry, true),
            Err(AssemblyError::NonFiniteBucket { .. })
        ));

        let mut infinite_count = GroupAccumulator::new(Shape::Histogram, vec![], 5);
        infinite_count.record(Fragment::Bucket(f64::INFINITY), 3.0, false);
        infinite_count.record(Fragment::Count, f64::INFINITY, false);
        assert_eq!(
            infinite_count.to_distribution_point(&registry, true),
            Err(AssemblyError::NonFiniteCount {
                value: f64::INFINITY
            })
        );
    }

    #[test]
    fn test_histogram_without_buckets() {
        let registry = LabelKeyRegistry::new();
        let mut group = GroupAccumulator::new(Shape::Histogram, vec![], 5);
        group.record(Fragment::Count, 2.0, false);

        assert_eq!(
            group.to_distribution_point(&registry, true),
            Err(AssemblyError::MissingBuckets)
        );
    }

    #[test]
    fn test_empty_groups_emit_nothing() {
        let registry = LabelKeyRegistry::new();
        let histogram = GroupAccumulator::new(Shape::Histogram, vec![], 5);
        let summary = GroupAccumulator::new(Shape::Summary, vec![], 5);
        let scalar = GroupAccumulator::new(Shape::Scalar, vec![], 5);

        assert_eq!(
            histogram.to_distribution_point(&registry, true),
            Err(AssemblyError::EmptyGroup)
        );
        assert_eq!(
            summary.to_summary_point(&registry, false),
            Err(AssemblyError::EmptyGroup)
        );
        assert_eq!(
            scalar.to_scalar_point(&registry, true),
            Err(AssemblyError::EmptyGroup)
        );
    }

    #[test]
    fn test_summary_quantiles_sorted() {
        let registry = LabelKeyRegistry::new();
        let mut group = GroupAccumulator::new(Shape::Summary, vec![], 20);
        group.record(Fragment::Quantile(0.99), 12.0, false);
        group.record(Fragment::Quantile(0.5), 3.0, false);
        group.record(Fragment::Count, 40.0, false);
        group.record(Fragment::Sum, 100.5, false);

        let point = group.to_summary_point(&registry, false).unwrap();
        let quantiles: Vec<(f64, f64)> =
            point.quantiles.iter().map(|q| (q.quantile, q.value)).collect();
        assert_eq!(quantiles, vec![(0.5, 3.0), (0.99, 12.0)]);
        assert_eq!(point.count, 40);
        assert_eq!(point.sum, 100.5);
        assert_eq!(point.start_time_unix_nano, point.time_unix_nano);
    }

    #[test]
    fn test_created_overrides_start_for_cumulative_only() {
        let registry = LabelKeyRegistry::new();
        let mut group = GroupAccumulator::new(Shape::Scalar, vec![], 2_000);
        group.record(Fragment::Value, 7.0, false);
        group.record(Fragment::Created(1_500_000_000), 0.0, false);

        let cumulative = group.to_scalar_point(&registry, true).unwrap();
        assert_eq!(cumulative.start_time_unix_nano, 1_500_000_000);

        let instantaneous = group.to_scalar_point(&registry, false).unwrap();
        assert_eq!(instantaneous.start_time_unix_nano, 2_000_000_000);
    }

    #[test]
    fn test_stale_bucket_keeps_layout() {
        let registry = LabelKeyRegistry::new();
        let mut group = GroupAccumulator::new(Shape::Histogram, vec![], 1);
        group.record(Fragment::Bucket(1.0), crate::types::stale_marker(), true);
        group.record(Fragment::Bucket(f64::INFINITY), crate::types::stale_marker(), true);

        let point = group.to_distribution_point(&registry, true).unwrap();
        assert!(point.no_recorded_value);
        assert_eq!(point.bucket_counts, vec![0, 0]);
        assert_eq!(point.explicit_bounds, vec![1.0]);
    }
}
