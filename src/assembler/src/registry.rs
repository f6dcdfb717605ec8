//! Ordered set of label keys seen across one family.

use std::collections::HashMap;

use crate::types::Label;

/// Tracks every distinct label key of a family in first-seen order.
///
/// The order is what labels are rendered in, so two encodings of the same
/// family produce the same shape. Keys are never removed.
#[derive(Debug, Clone, Default)]
pub struct LabelKeyRegistry {
    keys: Vec<String>,
    positions: HashMap<String, usize>,
}

impl LabelKeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record every key of `labels` not seen before, in the order given.
    pub fn observe<'a>(&mut self, labels: impl IntoIterator<Item = &'a Label>) {
        for label in labels {
            if !self.positions.contains_key(&label.name) {
                self.positions.insert(label.name.clone(), self.keys.len());
                self.keys.push(label.name.clone());
            }
        }
    }

    pub fn ordered_keys(&self) -> &[String] {
        &self.keys
    }

    pub fn position(&self, key: &str) -> Option<usize> {
        self.positions.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Copy of `labels` sorted into registry order. Keys the registry has
    /// not observed go last, by name.
    pub fn render(&self, labels: &[Label]) -> Vec<Label> {
        let mut rendered = labels.to_vec();
        rendered.sort_by(|a, b| {
            let pa = self.position(&a.name).unwrap_or(usize::MAX);
            let pb = self.position(&b.name).unwrap_or(usize::MAX);
            pa.cmp(&pb).then_with(|| a.name.cmp(&b.name))
        });
        rendered
    }
}
