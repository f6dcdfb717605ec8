//! One metric family for one scrape cycle.
//!
//! A family owns every group (series) sharing its base name, routes each
//! sample to the right group and sub-field, and finalizes the groups into a
//! single [`MetricRecord`].

use std::collections::HashMap;

use common::config::AssemblerConfig;

use crate::accumulator::{Fragment, GroupAccumulator};
use crate::error::{AddError, AssemblyError};
use crate::group_key::{self, GroupKey};
use crate::metadata::MetadataStore;
use crate::point::{Exemplar, MetricRecord, Points};
use crate::registry::LabelKeyRegistry;
use crate::types::{
    BUCKET_LABEL, Label, MetricType, QUANTILE_LABEL, Sample, SampleExemplar, Shape, get_label,
    is_stale_marker, parse_boundary,
};

const COUNT_SUFFIX: &str = "_count";
const SUM_SUFFIX: &str = "_sum";
const GAUGE_COUNT_SUFFIX: &str = "_gcount";
const GAUGE_SUM_SUFFIX: &str = "_gsum";
const CREATED_SUFFIX: &str = "_created";

const TRACE_ID_LABEL: &str = "trace_id";
const SPAN_ID_LABEL: &str = "span_id";

#[derive(Debug)]
pub struct MetricFamily {
    name: String,
    metric_type: MetricType,
    help: String,
    unit: String,
    name_label: String,
    honor_created: bool,
    record_exemplars: bool,
    registry: LabelKeyRegistry,
    groups: Vec<GroupAccumulator>,
    index: HashMap<GroupKey, usize>,
}

impl MetricFamily {
    /// Create a family with default assembler settings. `metadata` is
    /// consulted once, here, to classify the family.
    pub fn new(name: impl Into<String>, metadata: &dyn MetadataStore) -> Self {
        Self::with_config(name, metadata, &AssemblerConfig::default())
    }

    pub fn with_config(
        name: impl Into<String>,
        metadata: &dyn MetadataStore,
        config: &AssemblerConfig,
    ) -> Self {
        let name = name.into();
        let metadata = metadata.metadata(&name).unwrap_or_default();

        Self {
            name,
            metric_type: metadata.metric_type,
            help: metadata.help,
            unit: metadata.unit,
            name_label: config.name_label.clone(),
            honor_created: config.honor_created_timestamps,
            record_exemplars: config.exemplars,
            registry: LabelKeyRegistry::new(),
            groups: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metric_type(&self) -> MetricType {
        self.metric_type
    }

    pub fn is_cumulative(&self) -> bool {
        self.metric_type.is_cumulative()
    }

    pub fn label_keys_ordered(&self) -> &[String] {
        self.registry.ordered_keys()
    }

    pub fn registry(&self) -> &LabelKeyRegistry {
        &self.registry
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }

    /// Group key `labels` resolve to within this family.
    pub fn group_key(&self, labels: &[Label]) -> Result<GroupKey, AddError> {
        group_key::resolve(labels, self.metric_type.discriminators(), &self.name_label)
            .map(|resolved| resolved.key)
    }

    pub fn group(&self, key: &GroupKey) -> Option<&GroupAccumulator> {
        self.index.get(key).map(|&index| &self.groups[index])
    }

    /// Groups in the order they were first seen.
    pub fn groups(&self) -> impl Iterator<Item = &GroupAccumulator> {
        self.groups.iter()
    }

    pub fn add(
        &mut self,
        sample_name: &str,
        labels: &[Label],
        timestamp_ms: i64,
        value: f64,
    ) -> Result<(), AddError> {
        self.ingest(sample_name, labels, timestamp_ms, value, None)
    }

    pub fn add_sample(&mut self, sample: &Sample) -> Result<(), AddError> {
        self.ingest(
            &sample.name,
            &sample.labels,
            sample.timestamp_ms,
            sample.value,
            sample.exemplar.as_ref(),
        )
    }

    fn ingest(
        &mut self,
        sample_name: &str,
        labels: &[Label],
        timestamp_ms: i64,
        value: f64,
        exemplar: Option<&SampleExemplar>,
    ) -> Result<(), AddError> {
        let shape = self.metric_type.shape();
        let discriminators = self.metric_type.discriminators();
        let resolved = group_key::resolve(labels, discriminators, &self.name_label)?;
        let fragment = self.fragment_for(sample_name, labels, value)?;

        let existing = self.index.get(&resolved.key).copied();
        let index = match existing {
            Some(index) => {
                if self.groups[index].labels() != resolved.labels.as_slice() {
                    return Err(AddError::InconsistentGroup {
                        family: self.name.clone(),
                        group_key: resolved.key.to_string(),
                        labels: render_labels(&resolved.labels),
                    });
                }
                index
            }
            None => {
                let name_label = self.name_label.as_str();
                self.registry.observe(labels.iter().filter(|l| {
                    l.name != name_label && !discriminators.contains(&l.name.as_str())
                }));

                let index = self.groups.len();
                self.groups
                    .push(GroupAccumulator::new(shape, resolved.labels, timestamp_ms));
                self.index.insert(resolved.key, index);
                index
            }
        };

        let keep_exemplar = self.record_exemplars && shape != Shape::Summary;
        let group = &mut self.groups[index];
        if let Some(raw) = exemplar.filter(|_| keep_exemplar) {
            group.push_exemplar(filter_exemplar(labels, raw));
        }
        if let Some(fragment) = fragment {
            group.record(fragment, value, is_stale_marker(value));
        }

        Ok(())
    }

    /// Work out which sub-field a sample feeds. `None` means the sample is
    /// accepted but carries nothing to record.
    fn fragment_for(
        &self,
        sample_name: &str,
        labels: &[Label],
        value: f64,
    ) -> Result<Option<Fragment>, AddError> {
        let suffix = sample_name.strip_prefix(self.name.as_str());

        if suffix == Some(CREATED_SUFFIX) {
            return Ok(self
                .honor_created
                .then(|| created_unix_nano(value))
                .flatten()
                .map(Fragment::Created));
        }

        let gauge_histogram = self.metric_type == MetricType::GaugeHistogram;
        let fragment = match (self.metric_type.shape(), suffix) {
            (Shape::Scalar, _) => Fragment::Value,
            (_, Some(COUNT_SUFFIX)) => Fragment::Count,
            (_, Some(SUM_SUFFIX)) => Fragment::Sum,
            (_, Some(GAUGE_COUNT_SUFFIX)) if gauge_histogram => Fragment::Count,
            (_, Some(GAUGE_SUM_SUFFIX)) if gauge_histogram => Fragment::Sum,
            // `_bucket` and any other shape both key on the bound.
            (Shape::Histogram, _) => Fragment::Bucket(self.boundary(labels, BUCKET_LABEL)?),
            (Shape::Summary, _) => Fragment::Quantile(self.boundary(labels, QUANTILE_LABEL)?),
        };
        Ok(Some(fragment))
    }

    fn boundary(&self, labels: &[Label], label: &'static str) -> Result<f64, AddError> {
        let raw = get_label(labels, label).ok_or_else(|| AddError::MissingBoundary {
            family: self.name.clone(),
            label,
        })?;
        parse_boundary(raw).ok_or_else(|| AddError::InvalidBoundary {
            label,
            value: raw.to_string(),
        })
    }

    /// Assemble every group into one record. Read-only, so finalizing twice
    /// yields equal records. `None` when no group produced a point.
    pub fn finalize(&self) -> Option<MetricRecord> {
        let cumulative = self.is_cumulative();
        let registry = &self.registry;

        let points = match self.metric_type.shape() {
            Shape::Scalar => {
                Points::Scalar(self.assemble(|g| g.to_scalar_point(registry, cumulative)))
            }
            Shape::Histogram => Points::Histogram(
                self.assemble(|g| g.to_distribution_point(registry, cumulative)),
            ),
            Shape::Summary => {
                Points::Summary(self.assemble(|g| g.to_summary_point(registry, cumulative)))
            }
        };

        if points.is_empty() {
            tracing::debug!(
                family = %self.name,
                groups = self.groups.len(),
                "Family produced no points"
            );
            return None;
        }

        Some(MetricRecord {
            name: self.name.clone(),
            metric_type: self.metric_type,
            help: self.help.clone(),
            unit: self.unit.clone(),
            points,
        })
    }

    fn assemble<P>(
        &self,
        build: impl Fn(&GroupAccumulator) -> Result<P, AssemblyError>,
    ) -> Vec<P> {
        self.groups
            .iter()
            .filter_map(|group| match build(group) {
                Ok(point) => Some(point),
                Err(AssemblyError::EmptyGroup) => {
                    tracing::debug!(
                        family = %self.name,
                        labels = %render_labels(group.labels()),
                        "Skipping empty group"
                    );
                    None
                }
                Err(err) => {
                    tracing::warn!(
                        family = %self.name,
                        labels = %render_labels(group.labels()),
                        error = %err,
                        "Dropping group"
                    );
                    None
                }
            })
            .collect()
    }
}

/// `_created` carries Unix seconds.
fn created_unix_nano(seconds: f64) -> Option<u64> {
    (seconds.is_finite() && seconds >= 0.0).then(|| (seconds * 1e9).round() as u64)
}

/// Drop exemplar labels the series already carries and lift trace context
/// out of the rest.
fn filter_exemplar(series: &[Label], raw: &SampleExemplar) -> Exemplar {
    let mut exemplar = Exemplar {
        value: raw.value,
        timestamp_ms: raw.timestamp_ms,
        filtered_labels: Vec::new(),
        trace_id: None,
        span_id: None,
    };

    for label in &raw.labels {
        if series.iter().any(|l| l.name == label.name) {
            continue;
        }
        match label.name.as_str() {
            TRACE_ID_LABEL if exemplar.trace_id.is_none() => {
                if let Some(id) = decode_id::<16>(&label.value) {
                    exemplar.trace_id = Some(id);
                    continue;
                }
            }
            SPAN_ID_LABEL if exemplar.span_id.is_none() => {
                if let Some(id) = decode_id::<8>(&label.value) {
                    exemplar.span_id = Some(id);
                    continue;
                }
            }
            _ => {}
        }
        exemplar.filtered_labels.push(label.clone());
    }

    exemplar
}

fn decode_id<const N: usize>(raw: &str) -> Option<[u8; N]> {
    hex::decode(raw).ok()?.try_into().ok()
}

fn render_labels(labels: &[Label]) -> String {
    labels
        .iter()
        .map(|l| format!("{}=\"{}\"", l.name, l.value))
        .collect::<Vec<_>>()
        .join(",")
}
