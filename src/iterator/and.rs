use super::heads::HeadMap;
use super::{
    ArrayIterator, Document, Evaluation, IterKey, KeyTransformer, NestedIterator, evaluate_by_moving, negation,
    partition, transform,
};
use crate::error::{Error, Result};
use log::trace;
use std::collections::BTreeMap;
use std::fmt;

/// What the non-seekable constraints say about an agreed candidate
enum Verdict<T> {
    Accept,
    Reject,
    SkipTo(T),
}

/// Merge-join intersection of nested iterators.
///
/// Seekable includes drive the join. Seekable excludes filter candidates,
/// deferred includes and excludes are asked about each candidate the
/// seekable includes agree on. With no seekable includes the AND is itself
/// deferred and only answers `evaluate`/`move_to`.
pub struct AndIterator<T: IterKey> {
    includes: Vec<Box<dyn NestedIterator<T>>>,
    deferred_includes: Vec<Box<dyn NestedIterator<T>>>,
    excludes: Vec<Box<dyn NestedIterator<T>>>,
    deferred_excludes: Vec<Box<dyn NestedIterator<T>>>,
    include_heads: HeadMap<T>,
    exclude_heads: HeadMap<T>,
    /// transformed head key -> value the include actually returned
    transforms: BTreeMap<T, T>,
    transformer: Option<KeyTransformer<T>>,
    deferred: bool,
    initialized: bool,
    prev: Option<T>,
    pending: Option<T>,
    pending_document: Document,
    document: Document,
}

impl<T: IterKey> AndIterator<T> {
    pub fn new(includes: Vec<Box<dyn NestedIterator<T>>>, excludes: Vec<Box<dyn NestedIterator<T>>>) -> Self {
        let (includes, deferred_includes) = partition(includes);
        let (excludes, deferred_excludes) = partition(excludes);
        let deferred = includes.is_empty();

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

    /// Compare heads on `transformer(value)` instead of the value itself
    pub fn with_transformer(mut self, transformer: KeyTransformer<T>) -> Self {
        self.transformer = Some(transformer);
        self
    }

    fn put_head(&mut self, value: T, child: usize) {
        let key = transform(self.transformer, &value);
        self.transforms.insert(key.clone(), value);
        self.include_heads.insert(key, child);
    }

    fn clear_heads(&mut self) {
        self.include_heads.clear();
        self.transforms.clear();
    }

    /// Step every include sitting on `key`. One include running dry empties
    /// the whole AND.
    fn advance_iterators(&mut self, key: &T) -> Result<()> {
        self.transforms.remove(key);
        for child in self.include_heads.remove_all(key) {
            match self.includes[child].next()? {
                Some(value) => self.put_head(value, child),
                None => {
                    self.clear_heads();
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    /// Move every include sitting on `key` to its first value `>= to`
    fn move_iterators(&mut self, key: &T, to: &T) -> Result<()> {
        self.transforms.remove(key);
        for child in self.include_heads.remove_all(key) {
            match self.includes[child].move_to(to)? {
                Some(value) => self.put_head(value, child),
                None => {
                    self.clear_heads();
                    return Ok(());
                }
            }
        }
        Ok(())
    }

    fn check_candidate(&mut self, candidate: &T) -> Result<Verdict<T>> {
        if !self.excludes.is_empty()
            && negation::is_filtered(candidate, &mut self.exclude_heads, &mut self.excludes, self.transformer)?
        {
            return Ok(Verdict::Reject);
        }

        let mut skip: Option<T> = None;
        let mut rejected = false;
        for child in self.deferred_includes.iter_mut() {
            match child.evaluate(candidate)? {
                Evaluation::Match => {}
                Evaluation::SkipTo(to) if &to > candidate => {
                    if skip.as_ref().is_none_or(|s| &to > s) {
                        skip = Some(to);
                    }
                }
                Evaluation::SkipTo(_) | Evaluation::NoMatch => rejected = true,
            }
        }
        if let Some(to) = skip {
            return Ok(Verdict::SkipTo(to));
        }
        if rejected {
            return Ok(Verdict::Reject);
        }

        for child in self.deferred_excludes.iter_mut() {
            if child.evaluate(candidate)? == Evaluation::Match {
                return Ok(Verdict::Reject);
            }
        }
        Ok(Verdict::Accept)
    }

    fn build_document(&self, key: &T) -> Document {
        let mut doc = Document::default();
        for &child in self.include_heads.get(key) {
            doc.merge(&self.includes[child].document());
        }
        for child in &self.deferred_includes {
            doc.merge(&child.document());
        }
        doc
    }

    /// Walk the include heads until they agree on an accepted key or run out
    fn compute_next(&mut self) -> Result<()> {
        self.pending = None;
        self.pending_document = Document::default();

        loop {
            let (lowest, highest) = match (self.include_heads.first(), self.include_heads.last()) {
                (Some(lowest), Some(highest)) => (lowest.clone(), highest.clone()),
                _ => return Ok(()),
            };

            if lowest != highest {
                self.move_iterators(&lowest, &highest)?;
                continue;
            }

            match self.check_candidate(&lowest)? {
                Verdict::Accept => {
                    trace!("and accepts {:?}", lowest);
                    self.pending = Some(self.transforms.get(&lowest).cloned().unwrap_or_else(|| lowest.clone()));
                    self.pending_document = self.build_document(&lowest);
                    self.advance_iterators(&lowest)?;
                    return Ok(());
                }
                Verdict::Reject => {
                    trace!("and rejects {:?}", lowest);
                    self.advance_iterators(&lowest)?;
                }
                Verdict::SkipTo(to) => {
                    trace!("and skips {:?} to {:?}", lowest, to);
                    self.move_iterators(&lowest, &to)?;
                }
            }
        }
    }

    /// Validate one externally supplied key through the regular join by
    /// seeding a single-value include with it.
    fn move_deferred(&mut self, minimum: &T) -> Result<Option<T>> {
        let mut probe = ArrayIterator::new([minimum.clone()]);
        let seed = probe.next()?;
        self.includes.push(Box::new(probe));
        let index = self.includes.len() - 1;

        self.clear_heads();
        if let Some(seed) = seed {
            self.put_head(seed, index);
        }
        let result = self.compute_next();
        self.includes.pop();
        self.clear_heads();
        result?;

        let found = self.pending.take();
        self.document = std::mem::take(&mut self.pending_document);
        if found.is_some() {
            self.prev = found.clone();
        }
        Ok(found)
    }
}

impl<T: IterKey> NestedIterator<T> for AndIterator<T> {
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

        self.clear_heads();
        if !self.deferred {
            for child in 0..self.includes.len() {
                match self.includes[child].next()? {
                    Some(value) => self.put_head(value, child),
                    None => {
                        // an AND is empty as soon as one seekable include is
                        trace!("and include {} is empty", child);
                        self.clear_heads();
                        break;
                    }
                }
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
            return self.move_deferred(minimum);
        }

        if self.pending.as_ref().is_some_and(|p| p >= minimum) {
            return self.next();
        }

        for key in self.include_heads.keys_below(minimum) {
            if self.include_heads.is_empty() {
                break;
            }
            self.move_iterators(&key, minimum)?;
        }
        self.compute_next()?;
        self.next()
    }

    fn evaluate(&mut self, candidate: &T) -> Result<Evaluation<T>> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        if !self.deferred {
            let last = self.prev.clone();
            return evaluate_by_moving(self, last.as_ref(), candidate);
        }

        Ok(match self.check_candidate(candidate)? {
            Verdict::Accept => {
                let mut doc = Document::default();
                for child in &self.deferred_includes {
                    doc.merge(&child.document());
                }
                self.document = doc;
                Evaluation::Match
            }
            Verdict::Reject => Evaluation::NoMatch,
            Verdict::SkipTo(to) => Evaluation::SkipTo(to),
        })
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

impl<T: IterKey> fmt::Debug for AndIterator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndIterator")
            .field("includes", &self.includes)
            .field("deferred_includes", &self.deferred_includes)
            .field("excludes", &self.excludes)
            .field("deferred_excludes", &self.deferred_excludes)
            .finish()
    }
}
