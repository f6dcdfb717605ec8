//! Series identity for a sample's label set.

use std::collections::HashSet;
use std::fmt;

use crate::error::AddError;
use crate::types::{BUCKET_LABEL, Label, QUANTILE_LABEL};

/// Canonical, order-independent identity of one series within a family.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A resolved key together with the identity labels it was built from,
/// sorted by key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedGroup {
    pub key: GroupKey,
    pub labels: Vec<Label>,
}

/// Build the group key of `labels`, ignoring `name_key` and every label in
/// `discriminators`.
///
/// Fails on duplicate keys, and on a label set carrying both `le` and
/// `quantile`, since no fragment can be a bucket and a quantile at once.
pub fn resolve(
    labels: &[Label],
    discriminators: &[&str],
    name_key: &str,
) -> Result<ResolvedGroup, AddError> {
    let mut seen = HashSet::with_capacity(labels.len());
    for label in labels {
        if !seen.insert(label.name.as_str()) {
            return Err(AddError::MalformedLabels {
                reason: format!("duplicate label key '{}'", label.name),
            });
        }
    }
    if seen.contains(BUCKET_LABEL) && seen.contains(QUANTILE_LABEL) {
        return Err(AddError::MalformedLabels {
            reason: format!("both '{BUCKET_LABEL}' and '{QUANTILE_LABEL}' present"),
        });
    }

    let mut identity: Vec<Label> = labels
        .iter()
        .filter(|l| l.name != name_key && !discriminators.contains(&l.name.as_str()))
        .cloned()
        .collect();
    identity.sort_by(|a, b| a.name.cmp(&b.name));

    Ok(ResolvedGroup {
        key: attributes_key(&identity),
        labels: identity,
    })
}

/// `key="value"` pairs joined by commas. Expects labels sorted by key.
///
/// Keys escape `\` and `=`, values escape `\` and `"`, so no two label
/// sets share a key.
fn attributes_key(sorted: &[Label]) -> GroupKey {
    let mut key = String::new();
    for (i, label) in sorted.iter().enumerate() {
        if i > 0 {
            key.push(',');
        }
        push_escaped(&mut key, &label.name, '=');
        key.push_str("=\"");
        push_escaped(&mut key, &label.value, '"');
        key.push('"');
    }
    GroupKey(key)
}

fn push_escaped(out: &mut String, raw: &str, delimiter: char) {
    for c in raw.chars() {
        if c == '\\' || c == delimiter {
            out.push('\\');
        }
        out.push(c);
    }
}
