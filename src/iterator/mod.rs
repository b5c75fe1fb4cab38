//! Evaluation-time merge-join over sorted document keys.
//!
//! Every iterator yields keys in ascending order. Seekable iterators carry
//! their own cursor; deferred ones can only judge a candidate handed to them
//! by a parent.

mod and;
mod array;
mod document;
mod heads;
pub mod negation;
mod or;

pub use and::AndIterator;
pub use array::ArrayIterator;
pub use document::Document;
pub use heads::HeadMap;
pub use or::OrIterator;

use crate::error::{Error, Result};
use std::fmt::Debug;

/// Bounds every iterator key satisfies
pub trait IterKey: Ord + Clone + Debug + Send + 'static {}

impl<T: Ord + Clone + Debug + Send + 'static> IterKey for T {}

/// Maps a child's value onto the key space heads are compared in
pub type KeyTransformer<T> = fn(&T) -> T;

pub(crate) fn transform<T: Clone>(transformer: Option<KeyTransformer<T>>, value: &T) -> T {
    match transformer {
        Some(f) => f(value),
        None => value.clone(),
    }
}

/// Outcome of judging a candidate key
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation<T> {
    Match,
    NoMatch,
    /// The candidate fails and nothing below this key can match
    SkipTo(T),
}

pub trait NestedIterator<T: IterKey>: Debug + Send {
    /// Prime the iterator. Must precede `next` and `move_to`.
    fn initialize(&mut self) -> Result<()>;

    fn has_next(&self) -> bool;

    /// The next key, or `None` once exhausted
    fn next(&mut self) -> Result<Option<T>>;

    /// Consume and return the first key `>= minimum`
    fn move_to(&mut self, minimum: &T) -> Result<Option<T>>;

    /// Judge an externally supplied candidate
    fn evaluate(&mut self, candidate: &T) -> Result<Evaluation<T>>;

    /// Attributes for the key last returned
    fn document(&self) -> Document;

    fn is_deferred(&self) -> bool;

    fn leaves(&self) -> Vec<&dyn NestedIterator<T>>;

    fn children(&self) -> Vec<&dyn NestedIterator<T>>;

    fn remove(&mut self) -> Result<()> {
        Err(Error::Unsupported("remove"))
    }
}

/// A child classified by how it can be driven
#[derive(Debug)]
pub enum Nested<T: IterKey> {
    Seekable(Box<dyn NestedIterator<T>>),
    Deferred(Box<dyn NestedIterator<T>>),
}

impl<T: IterKey> Nested<T> {
    pub fn classify(iter: Box<dyn NestedIterator<T>>) -> Self {
        if iter.is_deferred() {
            Nested::Deferred(iter)
        } else {
            Nested::Seekable(iter)
        }
    }
}

/// Split children into seekable and deferred, keeping their order
pub(crate) fn partition<T: IterKey>(
    children: Vec<Box<dyn NestedIterator<T>>>,
) -> (Vec<Box<dyn NestedIterator<T>>>, Vec<Box<dyn NestedIterator<T>>>) {
    let mut seekable = Vec::new();
    let mut deferred = Vec::new();
    for child in children {
        match Nested::classify(child) {
            Nested::Seekable(iter) => seekable.push(iter),
            Nested::Deferred(iter) => deferred.push(iter),
        }
    }
    (seekable, deferred)
}

/// Judge a candidate against a seekable iterator by moving it, given the key
/// it last returned. Candidates must arrive in ascending order.
pub(crate) fn evaluate_by_moving<T: IterKey>(
    iter: &mut dyn NestedIterator<T>,
    last: Option<&T>,
    candidate: &T,
) -> Result<Evaluation<T>> {
    if let Some(last) = last {
        if last == candidate {
            return Ok(Evaluation::Match);
        }
        if last > candidate {
            // already moved past it without stopping there
            return Ok(Evaluation::NoMatch);
        }
    }
    Ok(match iter.move_to(candidate)? {
        Some(value) if &value == candidate => Evaluation::Match,
        Some(value) => Evaluation::SkipTo(value),
        None => Evaluation::NoMatch,
    })
}

/// Drain a seekable iterator
pub fn collect_keys<T: IterKey>(iter: &mut dyn NestedIterator<T>) -> Result<Vec<T>> {
    let mut keys = Vec::new();
    while let Some(key) = iter.next()? {
        keys.push(key);
    }
    Ok(keys)
}
