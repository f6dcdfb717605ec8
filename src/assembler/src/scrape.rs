//! One scrape cycle of one target.

use std::collections::HashMap;
use std::sync::Arc;

use common::config::AssemblerConfig;
use serde::{Deserialize, Serialize};

use crate::error::AddError;
use crate::family::MetricFamily;
use crate::metadata::MetadataStore;
use crate::point::MetricRecord;
use crate::types::{Sample, is_stale_marker};

/// Suffixes a sample name may carry on top of its family name.
const FAMILY_SUFFIXES: [&str; 7] = [
    "_bucket", "_count", "_sum", "_total", "_created", "_gcount", "_gsum",
];

/// The scraped endpoint, identified the way Prometheus labels it.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScrapeTarget {
    pub job: String,
    pub instance: String,
}

impl ScrapeTarget {
    pub fn new(job: impl Into<String>, instance: impl Into<String>) -> Self {
        Self {
            job: job.into(),
            instance: instance.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CycleStats {
    pub accepted: usize,
    pub rejected: usize,
    /// Stale markers dropped because stale handling is off.
    pub dropped_stale: usize,
}

/// Owns every family seen during one scrape and turns them into records
/// once the scrape is complete.
pub struct ScrapeCycle {
    target: ScrapeTarget,
    metadata: Arc<dyn MetadataStore>,
    config: AssemblerConfig,
    families: Vec<MetricFamily>,
    index: HashMap<String, usize>,
    stats: CycleStats,
}

impl std::fmt::Debug for ScrapeCycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrapeCycle")
            .field("target", &self.target)
            .field("families", &self.families.len())
            .field("stats", &self.stats)
            .finish()
    }
}

impl ScrapeCycle {
    pub fn new(
        target: ScrapeTarget,
        metadata: Arc<dyn MetadataStore>,
        config: &AssemblerConfig,
    ) -> Self {
        Self {
            target,
            metadata,
            config: config.clone(),
            families: Vec::new(),
            index: HashMap::new(),
            stats: CycleStats::default(),
        }
    }

    pub fn target(&self) -> &ScrapeTarget {
        &self.target
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn family(&self, name: &str) -> Option<&MetricFamily> {
        self.index.get(name).map(|&i| &self.families[i])
    }

    /// Route one sample to its family. A rejected sample is counted and
    /// logged; it never poisons the rest of the cycle.
    pub fn add(&mut self, sample: &Sample) -> Result<(), AddError> {
        if !self.config.keep_stale_markers && is_stale_marker(sample.value) {
            self.stats.dropped_stale += 1;
            return Ok(());
        }

        let family_name = self.family_name(&sample.name);
        let existing = self.index.get(family_name).copied();
        let index = match existing {
            Some(index) => index,
            None => {
                let family =
                    MetricFamily::with_config(family_name, self.metadata.as_ref(), &self.config);
                tracing::debug!(
                    family = family.name(),
                    metric_type = %family.metric_type(),
                    "New metric family"
                );
                self.index.insert(family_name.to_string(), self.families.len());
                self.families.push(family);
                self.families.len() - 1
            }
        };

        match self.families[index].add_sample(sample) {
            Ok(()) => {
                self.stats.accepted += 1;
                Ok(())
            }
            Err(err) => {
                self.stats.rejected += 1;
                tracing::debug!(
                    job = %self.target.job,
                    instance = %self.target.instance,
                    sample = %sample.name,
                    error = %err,
                    "Rejected sample"
                );
                Err(err)
            }
        }
    }

    /// Feed every sample, ignoring individual rejections.
    pub fn extend<'a>(&mut self, samples: impl IntoIterator<Item = &'a Sample>) {
        for sample in samples {
            let _ = self.add(sample);
        }
    }

    /// Finalize every family in first-seen order.
    pub fn finish(self) -> Vec<MetricRecord> {
        let records: Vec<MetricRecord> = self
            .families
            .iter()
            .filter_map(MetricFamily::finalize)
            .collect();

        tracing::debug!(
            job = %self.target.job,
            instance = %self.target.instance,
            families = self.families.len(),
            records = records.len(),
            accepted = self.stats.accepted,
            rejected = self.stats.rejected,
            "Scrape cycle finished"
        );
        records
    }

    /// The family a sample belongs to. Only metadata decides: the full name
    /// when it is known, otherwise the name without a known suffix when that
    /// base is known, otherwise the full name.
    fn family_name<'a>(&self, sample_name: &'a str) -> &'a str {
        if self.metadata.metadata(sample_name).is_some() {
            return sample_name;
        }
        FAMILY_SUFFIXES
            .iter()
            .filter_map(|suffix| sample_name.strip_suffix(suffix))
            .find(|base| self.metadata.metadata(base).is_some())
            .unwrap_or(sample_name)
    }
}
