//! Sample generators for integration testing
//!
//! Expand observations into the flat exposition samples a scraper would
//! produce, so tests can check assembly against known distributions.

use assembler::{Label, Sample};

/// Samples of one histogram series: cumulative `_bucket` samples for every
/// bound in `bounds` plus `+Inf`, then `_sum` and `_count`.
pub fn histogram_samples(
    family: &str,
    series: &[Label],
    bounds: &[f64],
    observations: &[f64],
    timestamp_ms: i64,
) -> Vec<Sample> {
    let mut samples = Vec::with_capacity(bounds.len() + 3);
    let bucket_name = format!("{family}_bucket");

    for bound in bounds {
        let cumulative = observations.iter().filter(|&&v| v <= *bound).count();
        samples.push(Sample::new(
            bucket_name.clone(),
            with_label(series, "le", &bound.to_string()),
            timestamp_ms,
            cumulative as f64,
        ));
    }
    samples.push(Sample::new(
        bucket_name,
        with_label(series, "le", "+Inf"),
        timestamp_ms,
        observations.len() as f64,
    ));
    samples.push(Sample::new(
        format!("{family}_sum"),
        series.to_vec(),
        timestamp_ms,
        observations.iter().sum(),
    ));
    samples.push(Sample::new(
        format!("{family}_count"),
        series.to_vec(),
        timestamp_ms,
        observations.len() as f64,
    ));

    samples
}

/// Samples of one summary series with precomputed quantile values.
pub fn summary_samples(
    family: &str,
    series: &[Label],
    quantiles: &[(f64, f64)],
    count: u64,
    sum: f64,
    timestamp_ms: i64,
) -> Vec<Sample> {
    let mut samples: Vec<Sample> = quantiles
        .iter()
        .map(|(quantile, value)| {
            Sample::new(
                family,
                with_label(series, "quantile", &quantile.to_string()),
                timestamp_ms,
                *value,
            )
        })
        .collect();
    samples.push(Sample::new(
        format!("{family}_sum"),
        series.to_vec(),
        timestamp_ms,
        sum,
    ));
    samples.push(Sample::new(
        format!("{family}_count"),
        series.to_vec(),
        timestamp_ms,
        count as f64,
    ));
    samples
}

fn with_label(series: &[Label], name: &str, value: &str) -> Vec<Label> {
    let mut labels = series.to_vec();
    labels.push(Label::new(name, value));
    labels
}
