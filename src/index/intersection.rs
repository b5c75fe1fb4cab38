//! Intersection of index streams.
//!
//! A merge-join driven by the highest head: every lagging child is seeked up
//! to it, and once all heads agree their infos are intersected. A day head
//! agrees with any shard of that day, and the emitted key is the most
//! specific one.

use super::context::StreamContext;
use super::info::IndexInfo;
use super::intersector::{DefaultUidIntersector, InfiniteIntersectionStrategy, UidIntersector};
use super::shard;
use super::stream::{IndexEntry, IndexStream};
use crate::error::{Error, Result};
use crate::expr::{ExprRef, NodeSet, flatten};
use log::{debug, trace};

pub struct Intersection {
    streams: Vec<Box<dyn IndexStream>>,
    delayed: NodeSet,
    next: Option<IndexEntry>,
    node: Option<ExprRef>,
    context: StreamContext,
    context_reason: &'static str,
    children_debug: Vec<String>,
    strategy: InfiniteIntersectionStrategy,
    intersector: Box<dyn UidIntersector>,
}

impl Intersection {
    pub fn new(children: Vec<Box<dyn IndexStream>>, strategy: InfiniteIntersectionStrategy) -> Result<Self> {
        Self::with_intersector(children, strategy, Box::new(DefaultUidIntersector))
    }

    pub fn with_intersector(
        children: Vec<Box<dyn IndexStream>>,
        strategy: InfiniteIntersectionStrategy,
        intersector: Box<dyn UidIntersector>,
    ) -> Result<Self> {
        let mut streams = Vec::with_capacity(children.len());
        let mut nodes = NodeSet::new();
        let mut delayed = NodeSet::new();
        let mut absent = false;
        let mut children_debug = Vec::with_capacity(children.len());

        for child in children {
            children_debug.push(child.context_debug());

            if child.has_next() {
                nodes.add_all(child.current_node());
                streams.push(child);
                continue;
            }

            match child.context() {
                StreamContext::NoOp => {}
                StreamContext::Absent | StreamContext::Present => {
                    nodes.add_all(child.current_node());
                    absent = true;
                }
                StreamContext::Unindexed
                | StreamContext::DelayedField
                | StreamContext::Ignored
                | StreamContext::Variable
                | StreamContext::UnknownField
                | StreamContext::ExceededTermThreshold => {
                    nodes.add_all(child.current_node());
                    delayed.add_all(child.current_node());
                }
                StreamContext::Initialized => {
                    return Err(Error::InvalidStreamContext(StreamContext::Initialized));
                }
            }
        }

        let (context, context_reason) = if absent {
            (StreamContext::Absent, "a child has no data")
        } else if streams.is_empty() && delayed.is_empty() {
            (StreamContext::Absent, "no usable children")
        } else if delayed.is_empty() {
            (StreamContext::Present, "children are all present")
        } else if !streams.is_empty() {
            (StreamContext::Variable, "children are a mix of delayed and non-delayed")
        } else {
            (StreamContext::DelayedField, "children are all delayed")
        };
        debug!(
            "intersection of {} live and {} delayed children is {}",
            streams.len(),
            delayed.len(),
            context
        );

        if context == StreamContext::Absent {
            streams.clear();
        }

        let mut intersection = Self {
            streams,
            delayed,
            next: None,
            node: nodes.and_of().map(|n| flatten(&n)),
            context,
            context_reason,
            children_debug,
            strategy,
            intersector,
        };
        intersection.next = intersection.advance();
        Ok(intersection)
    }

    /// Highest head key, or `None` once any child is exhausted
    fn target(&self) -> Option<String> {
        let mut target: Option<&str> = None;
        for stream in &self.streams {
            let (key, _) = stream.peek()?;
            if target.is_none_or(|t| key.as_str() > t) {
                target = Some(key);
            }
        }
        target.map(str::to_string)
    }

    fn advance(&mut self) -> Option<IndexEntry> {
        if self.streams.is_empty() {
            return None;
        }

        loop {
            let target = self.target()?;

            let mut aligned = true;
            for stream in self.streams.iter_mut() {
                let (key, _) = stream.peek()?;
                if key == &target || shard::matches(key, &target) {
                    continue;
                }
                aligned = false;
                trace!("intersection seeks {} to {}", key, target);
                stream.seek(&target)?;
            }
            if !aligned {
                continue;
            }

            let mut merged: Option<IndexInfo> = None;
            for stream in &self.streams {
                let (_, info) = stream.peek()?;
                merged = Some(match merged {
                    Some(acc) => acc.intersect(info, &[], self.intersector.as_ref(), self.strategy),
                    None => info.clone(),
                });
            }

            // Shard heads move on, day heads stay until every shard of the day is done
            for stream in self.streams.iter_mut() {
                if stream.peek().is_some_and(|(key, _)| key == &target) {
                    stream.next();
                }
            }

            let mut info = merged?;
            if !self.delayed.is_empty() {
                let delayed: Vec<ExprRef> = self.delayed.iter().cloned().collect();
                if !info.intersect_delayed(&delayed) {
                    let mut nodes = NodeSet::new();
                    nodes.add_all(info.node());
                    nodes.add_all(delayed.iter());
                    if let Some(node) = nodes.and_of() {
                        info.set_node(flatten(&node));
                    }
                }
            }

            if info.is_exact() && info.count() == 0 {
                trace!("intersection at {} is empty", target);
                continue;
            }
            return Some((target, info));
        }
    }
}

impl IndexStream for Intersection {
    fn peek(&self) -> Option<&IndexEntry> {
        self.next.as_ref()
    }

    fn next(&mut self) -> Option<IndexEntry> {
        let entry = self.next.take()?;
        self.next = self.advance();
        Some(entry)
    }

    fn seek(&mut self, target: &str) -> Option<String> {
        let target = shard::normalize_seek(target);

        if let Some((top, info)) = self.next.take() {
            if shard::greater_than_or_equal(&top, target) {
                let key = top.clone();
                self.next = Some((top, info));
                return Some(key);
            }
            if shard::matches(&top, target) {
                self.next = Some((target.to_string(), info));
                return Some(target.to_string());
            }
        }

        for stream in self.streams.iter_mut() {
            let lagging = stream
                .peek()
                .is_some_and(|(key, _)| !shard::greater_than_or_equal(key, target) && !shard::matches(key, target));
            if lagging {
                stream.seek(target);
            }
        }

        self.next = self.advance();
        self.next.as_ref().map(|(key, _)| key.clone())
    }

    fn context(&self) -> StreamContext {
        self.context
    }

    fn current_node(&self) -> Option<&ExprRef> {
        self.node.as_ref()
    }

    fn context_debug(&self) -> String {
        let mut out = format!("{}: Intersection ({})", self.context, self.context_reason);
        for child in &self.children_debug {
            let mut prefix = "\n - ";
            for line in child.lines() {
                out.push_str(prefix);
                out.push_str(line);
                prefix = "\n   ";
            }
        }
        out
    }
}
