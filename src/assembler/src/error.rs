use thiserror::Error;

/// Reasons a single sample is rejected during ingestion.
///
/// Rejections are local: the scrape cycle carries on with the next sample.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddError {
    #[error("malformed labels: {reason}")]
    MalformedLabels { reason: String },
    #[error("labels {{{labels}}} collide with group '{group_key}' of family '{family}'")]
    InconsistentGroup {
        family: String,
        group_key: String,
        labels: String,
    },
    #[error("missing '{label}' label on a bucket or quantile sample of family '{family}'")]
    MissingBoundary { family: String, label: &'static str },
    #[error("invalid '{label}' value '{value}'")]
    InvalidBoundary { label: &'static str, value: String },
}

/// Reasons a group produces no point at finalization.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AssemblyError {
    /// Non-fatal: nothing value-bearing reached the group.
    #[error("group has no contributing samples")]
    EmptyGroup,
    #[error("histogram group has count or sum but no buckets")]
    MissingBuckets,
    #[error("bucket le={bound} holds {cumulative}, below {previous} of the bucket before it")]
    NonMonotonicBuckets {
        bound: f64,
        cumulative: f64,
        previous: f64,
    },
    #[error("bucket le={bound} holds non-finite value {value}")]
    NonFiniteBucket { bound: f64, value: f64 },
    #[error("non-finite count {value}")]
    NonFiniteCount { value: f64 },
}
