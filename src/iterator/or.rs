use super::heads::HeadMap;
use super::{
    Document, Evaluation, IterKey, KeyTransformer, NestedIterator, evaluate_by_moving, negation, partition, transform,
};
use crate::error::{Error, Result};
use log::trace;
use std::collections::BTreeMap;
use std::fmt;

/// Merge union of nested iterators.
///
/// Only a pure union of seekable includes can be iterated. Any exclude or
/// deferred child makes the whole OR deferred: `X || !Y` holds for keys no
/// child has ever seen, so it can only judge candidates an enclosing AND
/// proposes.
pub struct OrIterator<T: IterKey> {
    includes: Vec<Box<dyn NestedIterator<T>>>,
    deferred_includes: Vec<Box<dyn NestedIterator<T>>>,
    excludes: Vec<Box<dyn NestedIterator<T>>>,
    deferred_excludes: Vec<Box<dyn NestedIterator<T>>>,
    include_heads: HeadMap<T>,
    exclude_heads: HeadMap<T>,
    transforms: BTreeMap<T, T>,
    transformer: Option<KeyTransformer<T>>,
    deferred: bool,
    initialized: bool,
    prev: Option<T>,
    pending: Option<T>,
    pending_document: Document,
    document: Document,
}

impl<T: IterKey> OrIterator<T> {
    pub fn new(includes: Vec<Box<dyn NestedIterator<T>>>, excludes: Vec<Box<dyn NestedIterator<T>>>) -> Self {
        let (includes, deferred_includes) = partition(includes);
        let (excludes, deferred_excludes) = partition(excludes);
        let deferred = includes.is_empty()
            || !deferred_includes.is_empty()
            || !excludes.is_empty()
            || !deferred_excludes.is_empty();

        Self {
            includes,
            deferred_includes,
            excludes,
            deferred_excludes,
            include_heads: HeadMap::new(),
            exclude_heads: HeadMap::new(),
            transforms: BTreeMap::new(),
            transformer: None,
            deferred,
            initialized: false,
            prev: None,
            pending: None,
            pending_document: Document::default(),
            document: Document::default(),
        }
    }

    pub fn with_transformer(mut self, transformer: KeyTransformer<T>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    fn put_head(&mut self, value: T, child: usize) {
        let key = transform(self.transformer, &value);
        self.transforms.insert(key.clone(), value);
        self.include_heads.insert(key, child);
    }

    fn documents_at(&self, key: &T) -> Document {
        let mut doc = Document::default();
        for &child in self.include_heads.get(key) {
            doc.merge(&self.includes[child].document());
        }
        doc
    }

    /// Take the lowest head and step every include sitting on it
    fn compute_next(&mut self) -> Result<()> {
        self.pending = None;
        self.pending_document = Document::default();

        let Some(lowest) = self.include_heads.first().cloned() else {
            return Ok(());
        };
        self.pending_document = self.documents_at(&lowest);
        self.pending = Some(self.transforms.remove(&lowest).unwrap_or_else(|| lowest.clone()));

        for child in self.include_heads.remove_all(&lowest) {
            match self.includes[child].next()? {
                Some(value) => self.put_head(value, child),
                None => trace!("or include {} exhausted", child),
            }
        }
        Ok(())
    }

    fn evaluate_deferred(&mut self, candidate: &T) -> Result<Evaluation<T>> {
        if !self.includes.is_empty() {
            negation::catch_up(candidate, &mut self.include_heads, &mut self.includes, self.transformer)?;
            if self.include_heads.contains(candidate) {
                self.document = self.documents_at(candidate);
                return Ok(Evaluation::Match);
            }
        }

        for child in self.deferred_includes.iter_mut() {
            if child.evaluate(candidate)? == Evaluation::Match {
                self.document = child.document();
                return Ok(Evaluation::Match);
            }
        }

        self.document = Document::default();
        if !self.excludes.is_empty() {
            negation::catch_up(candidate, &mut self.exclude_heads, &mut self.excludes, self.transformer)?;
            // at least one negated child does not hold the candidate
            if self.exclude_heads.get(candidate).len() < self.excludes.len() {
                return Ok(Evaluation::Match);
            }
        }

        for child in self.deferred_excludes.iter_mut() {
            if child.evaluate(candidate)? != Evaluation::Match {
                return Ok(Evaluation::Match);
            }
        }

        Ok(Evaluation::NoMatch)
    }
}

impl<T: IterKey> NestedIterator<T> for OrIterator<T> {
    fn initialize(&mut self) -> Result<()> {
        for child in self
            .includes
            .iter_mut()
            .chain(self.deferred_includes.iter_mut())
            .chain(self.excludes.iter_mut())
            .chain(self.deferred_excludes.iter_mut())
        {
            child.initialize()?;
        }

        self.include_heads.clear();
        self.transforms.clear();
        for child in 0..self.includes.len() {
            if let Some(value) = self.includes[child].next()? {
                self.put_head(value, child);
            }
        }

        self.exclude_heads.clear();
        for child in 0..self.excludes.len() {
            if let Some(value) = self.excludes[child].next()? {
                self.exclude_heads.insert(transform(self.transformer, &value), child);
            }
        }

        self.initialized = true;
        if !self.deferred {
            self.compute_next()?;
        }
        Ok(())
    }

    fn has_next(&self) -> bool {
        self.pending.is_some()
    }

    fn next(&mut self) -> Result<Option<T>> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if self.deferred {
            return Err(Error::CandidateRequired);
        }

        let found = self.pending.take();
        self.document = std::mem::take(&mut self.pending_document);
        if found.is_some() {
            self.prev = found.clone();
            self.compute_next()?;
        }
        Ok(found)
    }

    fn move_to(&mut self, minimum: &T) -> Result<Option<T>> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if let Some(prev) = &self.prev {
            if prev >= minimum {
                return Err(Error::move_backwards(prev, minimum));
            }
        }

        if self.deferred {
            return Ok(match self.evaluate_deferred(minimum)? {
                Evaluation::Match => {
                    self.prev = Some(minimum.clone());
                    Some(minimum.clone())
                }
                _ => None,
            });
        }

        if self.pending.as_ref().is_some_and(|p| p >= minimum) {
            return self.next();
        }

        for key in self.include_heads.keys_below(minimum) {
            self.transforms.remove(&key);
            for child in self.include_heads.remove_all(&key) {
                if let Some(value) = self.includes[child].move_to(minimum)? {
                    self.put_head(value, child);
                }
            }
        }
        self.compute_next()?;
        self.next()
    }

    fn evaluate(&mut self, candidate: &T) -> Result<Evaluation<T>> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if self.deferred {
            return self.evaluate_deferred(candidate);
        }
        let last = self.prev.clone();
        evaluate_by_moving(self, last.as_ref(), candidate)
    }

    fn document(&self) -> Document {
        self.document.clone()
    }

    fn is_deferred(&self) -> bool {
        self.deferred
    }

    fn leaves(&self) -> Vec<&dyn NestedIterator<T>> {
        self.children().into_iter().flat_map(|child| child.leaves()).collect()
    }

    fn children(&self) -> Vec<&dyn NestedIterator<T>> {
        self.includes
            .iter()
            .chain(&self.excludes)
            .chain(&self.deferred_includes)
            .chain(&self.deferred_excludes)
            .map(|child| child.as_ref())
            .collect()
    }
}

impl<T: IterKey> fmt::Debug for OrIterator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrIterator")
            .field("includes", &self.includes)
            .field("deferred_includes", &self.deferred_includes)
            .field("excludes", &self.excludes)
            .field("deferred_excludes", &self.deferred_excludes)
            .field("deferred", &self.deferred)
            .finish()
    }
}
