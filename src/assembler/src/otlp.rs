//! Finished records to OTLP metrics.
//!
//! This is the only place the OpenTelemetry protobuf types appear; the rest of
//! the crate works on [`MetricRecord`].

use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::common::v1::{AnyValue, InstrumentationScope, KeyValue, any_value};
use opentelemetry_proto::tonic::metrics::v1::{
    AggregationTemporality, DataPointFlags, Gauge, Histogram, HistogramDataPoint, Metric,
    NumberDataPoint, ResourceMetrics, ScopeMetrics, Sum, Summary, SummaryDataPoint, exemplar,
    metric::Data, number_data_point, summary_data_point::ValueAtQuantile,
};
use opentelemetry_proto::tonic::metrics::v1::Exemplar as OtlpExemplar;
use opentelemetry_proto::tonic::resource::v1::Resource;
use prost::Message;

use crate::point::{
    DistributionPoint, Exemplar, MetricRecord, Points, ScalarPoint, SummaryPoint,
};
use crate::scrape::ScrapeTarget;
use crate::types::{Label, MetricType, millis_to_nanos};

/// Metric metadata key carrying the exposition type.
pub const PROMETHEUS_TYPE_KEY: &str = "prometheus.type";

const SCOPE_NAME: &str = env!("CARGO_PKG_NAME");
const SCOPE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convert one record to an OTLP metric.
pub fn record_to_metric(record: &MetricRecord) -> Metric {
    let data = match (&record.points, record.metric_type) {
        (Points::Scalar(points), MetricType::Counter) => Data::Sum(Sum {
            data_points: points.iter().map(number_point).collect(),
            aggregation_temporality: AggregationTemporality::Cumulative as i32,
            is_monotonic: true,
        }),
        (Points::Scalar(points), _) => Data::Gauge(Gauge {
            data_points: points.iter().map(number_point).collect(),
        }),
        (Points::Histogram(points), metric_type) => {
            let temporality = if metric_type.is_cumulative() {
                AggregationTemporality::Cumulative
            } else {
                AggregationTemporality::Unspecified
            };
            Data::Histogram(Histogram {
                data_points: points.iter().map(histogram_point).collect(),
                aggregation_temporality: temporality as i32,
            })
        }
        (Points::Summary(points), _) => Data::Summary(Summary {
            data_points: points.iter().map(summary_point).collect(),
        }),
    };

    let mut metadata = Vec::new();
    if record.metric_type != MetricType::Unknown {
        metadata.push(string_attribute(
            PROMETHEUS_TYPE_KEY,
            record.metric_type.as_str(),
        ));
    }

    Metric {
        name: record.name.clone(),
        description: record.help.clone(),
        unit: record.unit.clone(),
        data: Some(data),
        metadata,
    }
}

/// Wrap the records of one cycle into a single resource.
pub fn resource_metrics(target: &ScrapeTarget, records: &[MetricRecord]) -> ResourceMetrics {
    let mut attributes = Vec::new();
    if !target.job.is_empty() {
        attributes.push(string_attribute("service.name", &target.job));
    }
    if !target.instance.is_empty() {
        attributes.push(string_attribute("service.instance.id", &target.instance));
    }

    ResourceMetrics {
        resource: Some(Resource {
            attributes,
            ..Default::default()
        }),
        scope_metrics: vec![ScopeMetrics {
            scope: Some(InstrumentationScope {
                name: SCOPE_NAME.to_string(),
                version: SCOPE_VERSION.to_string(),
                ..Default::default()
            }),
            metrics: records.iter().map(record_to_metric).collect(),
            schema_url: String::new(),
        }],
        schema_url: String::new(),
    }
}

pub fn export_request(target: &ScrapeTarget, records: &[MetricRecord]) -> ExportMetricsServiceRequest {
    ExportMetricsServiceRequest {
        resource_metrics: vec![resource_metrics(target, records)],
    }
}

/// Protobuf encoding of [`export_request`], ready for an OTLP/HTTP body.
pub fn encode_export_request(target: &ScrapeTarget, records: &[MetricRecord]) -> Vec<u8> {
    export_request(target, records).encode_to_vec()
}

fn flags(no_recorded_value: bool) -> u32 {
    if no_recorded_value {
        DataPointFlags::NoRecordedValueMask as u32
    } else {
        0
    }
}

fn number_point(point: &ScalarPoint) -> NumberDataPoint {
    NumberDataPoint {
        attributes: attributes(&point.labels),
        start_time_unix_nano: point.start_time_unix_nano,
        time_unix_nano: point.time_unix_nano,
        value: Some(number_data_point::Value::AsDouble(point.value)),
        exemplars: point.exemplars.iter().map(otlp_exemplar).collect(),
        flags: flags(point.no_recorded_value),
    }
}

fn histogram_point(point: &DistributionPoint) -> HistogramDataPoint {
    HistogramDataPoint {
        attributes: attributes(&point.labels),
        start_time_unix_nano: point.start_time_unix_nano,
        time_unix_nano: point.time_unix_nano,
        count: point.count,
        sum: point.sum,
        bucket_counts: point.bucket_counts.clone(),
        explicit_bounds: point.explicit_bounds.clone(),
        exemplars: point
            .exemplars
            .iter()
            .map(|placed| otlp_exemplar(&placed.exemplar))
            .collect(),
        flags: flags(point.no_recorded_value),
        min: None,
        max: None,
    }
}

fn summary_point(point: &SummaryPoint) -> SummaryDataPoint {
    SummaryDataPoint {
        attributes: attributes(&point.labels),
        start_time_unix_nano: point.start_time_unix_nano,
        time_unix_nano: point.time_unix_nano,
        count: point.count,
        sum: point.sum,
        quantile_values: point
            .quantiles
            .iter()
            .map(|q| ValueAtQuantile {
                quantile: q.quantile,
                value: q.value,
            })
            .collect(),
        flags: flags(point.no_recorded_value),
    }
}

fn otlp_exemplar(exemplar: &Exemplar) -> OtlpExemplar {
    OtlpExemplar {
        filtered_attributes: attributes(&exemplar.filtered_labels),
        time_unix_nano: millis_to_nanos(exemplar.timestamp_ms),
        span_id: exemplar.span_id.map(Vec::from).unwrap_or_default(),
        trace_id: exemplar.trace_id.map(Vec::from).unwrap_or_default(),
        value: Some(exemplar::Value::AsDouble(exemplar.value)),
    }
}

fn attributes(labels: &[Label]) -> Vec<KeyValue> {
    labels
        .iter()
        .map(|l| string_attribute(&l.name, &l.value))
        .collect()
}

fn string_attribute(key: &str, value: &str) -> KeyValue {
    KeyValue {
        key: key.to_string(),
        value: Some(AnyValue {
            value: Some(any_value::Value::StringValue(value.to_string())),
        }),
    }
}
