//! Metric assembly for Prometheus scrapes.
//!
//! A scrape yields a flat stream of samples. This crate regroups them into
//! metric families and series, reconciles histogram and summary fragments,
//! and emits one [`MetricRecord`] per family for an exporter.
//!
//! ```text
//! Sample -> ScrapeCycle -> MetricFamily -> GroupAccumulator -> MetricRecord -> OTLP
//! ```

pub mod accumulator;
pub mod error;
pub mod family;
pub mod group_key;
pub mod metadata;
pub mod otlp;
pub mod point;
pub mod registry;
pub mod scrape;
pub mod types;

pub use accumulator::{GroupAccumulator, GroupData};
pub use error::{AddError, AssemblyError};
pub use family::MetricFamily;
pub use group_key::{GroupKey, ResolvedGroup};
pub use metadata::{MetadataStore, NoMetadata};
pub use point::{
    BucketExemplar, DistributionPoint, Exemplar, MetricRecord, Points, QuantileValue, ScalarPoint,
    SummaryPoint,
};
pub use registry::LabelKeyRegistry;
pub use scrape::{CycleStats, ScrapeCycle, ScrapeTarget};
pub use types::{Label, MetricMetadata, MetricType, Sample, SampleExemplar};
