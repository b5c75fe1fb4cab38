use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Attributes gathered for one matched key.
///
/// Merging is a per-field set union, so contributions from several children
/// at the same key never clobber each other.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    fields: BTreeMap<String, BTreeSet<String>>,
}

impl Document {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, field: impl Into<String>, value: impl Into<String>) {
        self.fields.entry(field.into()).or_default().insert(value.into());
    }

    pub fn merge(&mut self, other: &Document) {
        for (field, values) in &other.fields {
            self.fields
                .entry(field.clone())
                .or_default()
                .extend(values.iter().cloned());
        }
    }

    pub fn get(&self, field: &str) -> Option<&BTreeSet<String>> {
        self.fields.get(field)
    }

    pub fn fields(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Number of distinct fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl<F: Into<String>, V: Into<String>> FromIterator<(F, V)> for Document {
    fn from_iter<I: IntoIterator<Item = (F, V)>>(iter: I) -> Self {
        let mut doc = Document::new();
        for (field, value) in iter {
            doc.put(field, value);
        }
        doc
    }
}
