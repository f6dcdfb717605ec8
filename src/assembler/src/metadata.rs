//! Family metadata lookup.

use std::collections::HashMap;

use crate::types::MetricMetadata;

/// Read-only lookup of a family's declared metadata, injected into the
/// assembler by whoever parsed the exposition.
pub trait MetadataStore: Send + Sync {
    /// Metadata for `family_name`, or `None` when the scrape declared none.
    fn metadata(&self, family_name: &str) -> Option<MetricMetadata>;
}

impl MetadataStore for HashMap<String, MetricMetadata> {
    fn metadata(&self, family_name: &str) -> Option<MetricMetadata> {
        self.get(family_name).cloned()
    }
}

/// A store that knows nothing; every family classifies as unknown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMetadata;

impl MetadataStore for NoMetadata {
    fn metadata(&self, _family_name: &str) -> Option<MetricMetadata> {
        None
    }
}
