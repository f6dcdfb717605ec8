//! End-to-end scrape cycles
//!
//! Tests the full flow: captured samples → scrape cycle → records → OTLP export

use std::path::Path;

use assembler::otlp::{PROMETHEUS_TYPE_KEY, encode_export_request, export_request};
use assembler::{MetricRecord, MetricType, Points, ScrapeCycle};
use common::config::AssemblerConfig;
use opentelemetry_proto::tonic::collector::metrics::v1::ExportMetricsServiceRequest;
use opentelemetry_proto::tonic::common::v1::any_value;
use opentelemetry_proto::tonic::metrics::v1::{AggregationTemporality, metric::Data};
use prost::Message;
use tests_integration::fixtures::ScrapeCapture;
use tests_integration::init_test_logging;

const START_OF_SCRAPE_NS: u64 = 1_700_000_000_000 * 1_000_000;

fn load_capture() -> ScrapeCapture {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data/scrape_capture.json");
    ScrapeCapture::from_file(&path).expect("Failed to load scrape capture")
}

fn run_cycle(capture: &ScrapeCapture, config: &AssemblerConfig) -> (Vec<MetricRecord>, usize) {
    let mut cycle = ScrapeCycle::new(capture.target.clone(), capture.metadata_store(), config);
    cycle.extend(&capture.samples);
    let rejected = cycle.stats().rejected;
    (cycle.finish(), rejected)
}

fn label_pairs(labels: &[assembler::Label]) -> Vec<(&str, &str)> {
    labels
        .iter()
        .map(|l| (l.name.as_str(), l.value.as_str()))
        .collect()
}

#[test]
fn test_capture_assembles_every_family() {
    init_test_logging();
    let capture = load_capture();
    let (records, rejected) = run_cycle(&capture, &AssemblerConfig::default());

    // The duplicated `queue` label is the only rejected sample.
    assert_eq!(rejected, 1);

    let families: Vec<(&str, MetricType)> = records
        .iter()
        .map(|r| (r.name.as_str(), r.metric_type))
        .collect();
    assert_eq!(
        families,
        vec![
            ("http_requests", MetricType::Counter),
            ("request_duration_seconds", MetricType::Histogram),
            ("queue_depth", MetricType::Gauge),
            ("rpc_duration_seconds", MetricType::Summary),
            ("build", MetricType::Unknown),
        ]
    );
}

#[test]
fn test_counter_start_times() {
    let capture = load_capture();
    let (records, _) = run_cycle(&capture, &AssemblerConfig::default());

    let Points::Scalar(points) = &records[0].points else {
        panic!("Expected scalar points for counter");
    };
    assert_eq!(points.len(), 2);

    assert_eq!(label_pairs(&points[0].labels), vec![("method", "GET"), ("code", "200")]);
    assert_eq!(points[0].value, 1027.0);
    assert_eq!(points[0].start_time_unix_nano, 1_699_990_000 * 1_000_000_000);
    assert_eq!(points[0].time_unix_nano, START_OF_SCRAPE_NS);

    // No `_created` for this series: it starts when first seen.
    assert_eq!(points[1].start_time_unix_nano, START_OF_SCRAPE_NS);
}

#[test]
fn test_histogram_buckets_and_exemplar() {
    let capture = load_capture();
    let (records, _) = run_cycle(&capture, &AssemblerConfig::default());

    let Points::Histogram(points) = &records[1].points else {
        panic!("Expected histogram points");
    };
    assert_eq!(points.len(), 1);
    let point = &points[0];

    assert_eq!(label_pairs(&point.labels), vec![("route", "/cart")]);
    assert_eq!(point.explicit_bounds, vec![0.1, 0.5]);
    assert_eq!(point.bucket_counts, vec![8, 6, 1]);
    assert_eq!(point.bucket_counts.iter().sum::<u64>(), point.count);
    assert_eq!(point.sum, Some(3.2));

    assert_eq!(point.exemplars.len(), 1);
    let placed = &point.exemplars[0];
    assert_eq!(placed.bucket, 1);
    assert!(placed.exemplar.filtered_labels.is_empty());
    assert_eq!(placed.exemplar.span_id, Some([0x00, 0xf0, 0x67, 0xaa, 0x0b, 0xa9, 0x02, 0xb7]));
    assert!(placed.exemplar.trace_id.is_some());
}

#[test]
fn test_summary_quantiles() {
    let capture = load_capture();
    let (records, _) = run_cycle(&capture, &AssemblerConfig::default());

    let Points::Summary(points) = &records[3].points else {
        panic!("Expected summary points");
    };
    let quantiles: Vec<(f64, f64)> = points[0]
        .quantiles
        .iter()
        .map(|q| (q.quantile, q.value))
        .collect();
    assert_eq!(quantiles, vec![(0.5, 0.2), (0.99, 0.9)]);
    assert_eq!(points[0].count, 200);
    assert_eq!(points[0].sum, 61.5);
}

#[test]
fn test_export_request_round_trips_through_protobuf() {
    let capture = load_capture();
    let (records, _) = run_cycle(&capture, &AssemblerConfig::default());

    let request = export_request(&capture.target, &records);
    let bytes = encode_export_request(&capture.target, &records);
    let decoded = ExportMetricsServiceRequest::decode(bytes.as_slice()).unwrap();
    assert_eq!(decoded, request);

    let metrics = &decoded.resource_metrics[0].scope_metrics[0].metrics;
    assert_eq!(metrics.len(), 5);

    let Some(Data::Sum(sum)) = &metrics[0].data else {
        panic!("Expected counter as sum");
    };
    assert!(sum.is_monotonic);
    assert_eq!(metrics[0].description, "Requests served");

    let Some(Data::Histogram(histogram)) = &metrics[1].data else {
        panic!("Expected histogram");
    };
    assert_eq!(
        histogram.aggregation_temporality,
        AggregationTemporality::Cumulative as i32
    );
    let exemplar = &histogram.data_points[0].exemplars[0];
    assert_eq!(exemplar.trace_id.len(), 16);
    assert_eq!(exemplar.span_id.len(), 8);

    assert!(matches!(metrics[2].data, Some(Data::Gauge(_))));
    assert!(matches!(metrics[3].data, Some(Data::Summary(_))));

    // Unknown-typed families are gauges without a type annotation.
    assert!(matches!(metrics[4].data, Some(Data::Gauge(_))));
    assert!(metrics[4].metadata.is_empty());

    let type_annotation = metrics[1]
        .metadata
        .iter()
        .find(|kv| kv.key == PROMETHEUS_TYPE_KEY)
        .and_then(|kv| kv.value.as_ref())
        .and_then(|v| v.value.as_ref());
    assert_eq!(
        type_annotation,
        Some(&any_value::Value::StringValue("histogram".to_string()))
    );
}

#[test]
fn test_family_order_of_arrival_does_not_change_points() {
    let capture = load_capture();
    let (forward, _) = run_cycle(&capture, &AssemblerConfig::default());

    // Same samples with families interleaved differently. Within each
    // series the label order is unchanged, so the rendered label order is
    // the same too.
    let mut reordered = load_capture();
    reordered.samples.reverse();
    let (backward, _) = run_cycle(&reordered, &AssemblerConfig::default());

    for record in &forward {
        let twin = backward
            .iter()
            .find(|r| r.name == record.name)
            .expect("Family missing from reordered cycle");
        match (&record.points, &twin.points) {
            (Points::Histogram(a), Points::Histogram(b)) => assert_eq!(a, b),
            (Points::Summary(a), Points::Summary(b)) => assert_eq!(a, b),
            (Points::Scalar(a), Points::Scalar(b)) => {
                assert_eq!(a.len(), b.len());
                for point in a {
                    assert!(b.contains(point), "{} point missing", record.name);
                }
            }
            _ => panic!("Point kinds differ for {}", record.name),
        }
    }
}

fn sorted_attributes(
    attributes: &[opentelemetry_proto::tonic::common::v1::KeyValue],
) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = attributes
        .iter()
        .map(|kv| match kv.value.as_ref().and_then(|v| v.value.as_ref()) {
            Some(any_value::Value::StringValue(s)) => (kv.key.clone(), s.clone()),
            other => panic!("Unexpected attribute value {other:?}"),
        })
        .collect();
    pairs.sort();
    pairs
}

fn sorted_labels(labels: &[assembler::Label]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = labels
        .iter()
        .map(|l| (l.name.clone(), l.value.clone()))
        .collect();
    pairs.sort();
    pairs
}

#[test]
fn test_otlp_encoding_agrees_with_records() {
    let capture = load_capture();
    let (records, _) = run_cycle(&capture, &AssemblerConfig::default());
    let request = export_request(&capture.target, &records);
    let metrics = &request.resource_metrics[0].scope_metrics[0].metrics;

    let Points::Histogram(points) = &records[1].points else {
        panic!("Expected histogram points");
    };
    let Some(Data::Histogram(histogram)) = &metrics[1].data else {
        panic!("Expected histogram");
    };

    for (point, encoded) in points.iter().zip(&histogram.data_points) {
        assert_eq!(point.count, encoded.count);
        assert_eq!(point.sum, encoded.sum);
        assert_eq!(point.time_unix_nano, encoded.time_unix_nano);
        assert_eq!(point.start_time_unix_nano, encoded.start_time_unix_nano);
        assert_eq!(point.bucket_counts, encoded.bucket_counts);
        assert_eq!(point.explicit_bounds, encoded.explicit_bounds);
        assert_eq!(
            sorted_labels(&point.labels),
            sorted_attributes(&encoded.attributes)
        );

        assert_eq!(point.exemplars.len(), encoded.exemplars.len());
        for (placed, exemplar) in point.exemplars.iter().zip(&encoded.exemplars) {
            assert_eq!(
                exemplar.value,
                Some(opentelemetry_proto::tonic::metrics::v1::exemplar::Value::AsDouble(
                    placed.exemplar.value
                ))
            );
            assert_eq!(
                exemplar.time_unix_nano,
                placed.exemplar.timestamp_ms as u64 * 1_000_000
            );
            assert_eq!(
                sorted_labels(&placed.exemplar.filtered_labels),
                sorted_attributes(&exemplar.filtered_attributes)
            );
        }
    }
}
