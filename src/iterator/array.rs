use super::{Document, Evaluation, IterKey, NestedIterator};
use crate::error::{Error, Result};

/// Leaf over a fixed set of keys, sorted and deduplicated at construction.
#[derive(Debug, Clone)]
pub struct ArrayIterator<T> {
    values: Vec<T>,
    documents: Vec<Document>,
    offset: usize,
    current: Option<usize>,
    deferred: bool,
}

impl<T: IterKey> ArrayIterator<T> {
    pub fn new(values: impl IntoIterator<Item = T>) -> Self {
        let mut values: Vec<T> = values.into_iter().collect();
        values.sort();
        values.dedup();
        let documents = vec![Document::default(); values.len()];
        Self {
            values,
            documents,
            offset: 0,
            current: None,
            deferred: false,
        }
    }

    /// Keys with per-key attributes. Duplicate keys merge their documents.
    pub fn with_documents(entries: impl IntoIterator<Item = (T, Document)>) -> Self {
        let mut entries: Vec<(T, Document)> = entries.into_iter().collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));

        let mut values: Vec<T> = Vec::with_capacity(entries.len());
        let mut documents: Vec<Document> = Vec::with_capacity(entries.len());
        for (value, doc) in entries {
            match (values.last(), documents.last_mut()) {
                (Some(last), Some(last_doc)) if *last == value => last_doc.merge(&doc),
                _ => {
                    values.push(value);
                    documents.push(doc);
                }
            }
        }

        Self {
            values,
            documents,
            offset: 0,
            current: None,
            deferred: false,
        }
    }

    /// A leaf that only answers `evaluate`
    pub fn deferred(values: impl IntoIterator<Item = T>) -> Self {
        Self {
            deferred: true,
            ..Self::new(values)
        }
    }

    pub fn peek(&self) -> Option<&T> {
        self.values.get(self.offset)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn advance(&mut self) -> Option<T> {
        let value = self.values.get(self.offset)?.clone();
        self.current = Some(self.offset);
        self.offset += 1;
        Some(value)
    }
}

impl<T: IterKey> NestedIterator<T> for ArrayIterator<T> {
    fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    fn has_next(&self) -> bool {
        !self.deferred && self.offset < self.values.len()
    }

    fn next(&mut self) -> Result<Option<T>> {
        if self.deferred {
            return Err(Error::CandidateRequired);
        }
        Ok(self.advance())
    }

    fn move_to(&mut self, minimum: &T) -> Result<Option<T>> {
        if self.deferred {
            return Ok(match self.evaluate(minimum)? {
                Evaluation::Match => Some(minimum.clone()),
                _ => None,
            });
        }
        while self.offset < self.values.len() && self.values[self.offset] < *minimum {
            self.offset += 1;
        }
        Ok(self.advance())
    }

    /// Does not move the cursor
    fn evaluate(&mut self, candidate: &T) -> Result<Evaluation<T>> {
        let index = self.values.partition_point(|v| v < candidate);
        Ok(match self.values.get(index) {
            Some(value) if value == candidate => {
                self.current = Some(index);
                Evaluation::Match
            }
            Some(value) => Evaluation::SkipTo(value.clone()),
            None => Evaluation::NoMatch,
        })
    }

    fn document(&self) -> Document {
        self.current
            .and_then(|i| self.documents.get(i))
            .cloned()
            .unwrap_or_default()
    }

    fn is_deferred(&self) -> bool {
        self.deferred
    }

    fn leaves(&self) -> Vec<&dyn NestedIterator<T>> {
        vec![self as &dyn NestedIterator<T>]
    }

    fn children(&self) -> Vec<&dyn NestedIterator<T>> {
        Vec::new()
    }
}
