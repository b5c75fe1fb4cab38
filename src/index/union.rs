//! Union of index streams.
//!
//! Children are merged by key with a min-heap. A day key absorbs every shard
//! of that day, so a day-granularity child can be unioned with
//! shard-granularity children.

use super::context::StreamContext;
use super::info::IndexInfo;
use super::shard;
use super::stream::{IndexEntry, IndexStream};
use crate::error::{Error, Result};
use crate::expr::{ExprRef, NodeSet};
use log::{debug, trace, warn};
use rayon::prelude::*;
use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::fmt;

/// Deferred construction of a child stream, run by [`UnionBuilder::build`]
pub type ScannerInitializer = Box<dyn FnOnce() -> Result<Box<dyn IndexStream>> + Send>;

/// Heap entry: head key, then child index as a stable tie-break
type HeadKey = Reverse<(String, usize)>;

pub struct Union {
    streams: Vec<Box<dyn IndexStream>>,
    heap: BinaryHeap<HeadKey>,
    delayed: NodeSet,
    next: Option<IndexEntry>,
    node: Option<ExprRef>,
    context: StreamContext,
    context_reason: &'static str,
    children_debug: Vec<String>,
}

impl Union {
    pub fn new(children: Vec<Box<dyn IndexStream>>) -> Result<Self> {
        let mut streams = Vec::with_capacity(children.len());
        let mut heap = BinaryHeap::with_capacity(children.len());
        let mut live_nodes = NodeSet::new();
        let mut delayed = NodeSet::new();
        let mut unindexed = false;
        let mut children_debug = Vec::with_capacity(children.len());

        for child in children {
            children_debug.push(child.context_debug());
            trace!("union child {} has_next={}", child.context_debug(), child.has_next());

            if let Some((key, _)) = child.peek() {
                heap.push(Reverse((key.clone(), streams.len())));
                live_nodes.add_all(child.current_node());
                streams.push(child);
                continue;
            }

            match child.context() {
                StreamContext::NoOp | StreamContext::Absent => {}
                StreamContext::Present => {
                    warn!("union dropping exhausted child {}", child.context_debug());
                }
                StreamContext::Unindexed => {
                    unindexed = true;
                    delayed.add_all(child.current_node());
                }
                StreamContext::Ignored
                | StreamContext::Variable
                | StreamContext::DelayedField
                | StreamContext::UnknownField
                | StreamContext::ExceededTermThreshold => {
                    delayed.add_all(child.current_node());
                }
                StreamContext::Initialized => {
                    return Err(Error::InvalidStreamContext(StreamContext::Initialized));
                }
            }
        }

        let (context, context_reason) = if unindexed {
            (StreamContext::Unindexed, "child contains an unindexed field")
        } else if !streams.is_empty() && !delayed.is_empty() {
            (StreamContext::Variable, "children are a mix of delayed and non-delayed")
        } else if !streams.is_empty() {
            (StreamContext::Present, "children are all present")
        } else if !delayed.is_empty() {
            (StreamContext::DelayedField, "children are all delayed")
        } else {
            (StreamContext::Absent, "children are all absent")
        };
        debug!(
            "union of {} live and {} delayed children is {}",
            streams.len(),
            delayed.len(),
            context
        );

        let mut nodes = live_nodes;
        nodes.add_all(delayed.iter());

        let mut union = Self {
            streams,
            heap,
            delayed,
            next: None,
            node: nodes.or_of(),
            context,
            context_reason,
            children_debug,
        };
        union.next = union.advance_queue();
        Ok(union)
    }

    pub fn builder() -> UnionBuilder {
        UnionBuilder::default()
    }

    /// Merge every child sitting on the round's key into one entry.
    ///
    /// Each pass first collects the whole set of matching children and only
    /// then advances them, so a child that moves to a key still covered by
    /// the round is picked up by the next pass rather than mid-pass.
    fn advance_queue(&mut self) -> Option<IndexEntry> {
        let Reverse((round_key, _)) = self.heap.peek()?.clone();
        let mut merged: Option<IndexInfo> = None;

        loop {
            let mut round = Vec::new();
            while let Some(Reverse((key, _))) = self.heap.peek() {
                if !shard::matches(&round_key, key) {
                    break;
                }
                if let Some(Reverse((_, index))) = self.heap.pop() {
                    round.push(index);
                }
            }
            if round.is_empty() {
                break;
            }

            for index in round {
                let stream = &mut self.streams[index];
                if let Some((key, info)) = stream.next() {
                    trace!("union {} takes {} {}", round_key, key, info);
                    merged = Some(match merged {
                        Some(acc) => acc.union(&info, &[]),
                        None => info,
                    });
                }
                match stream.peek() {
                    Some((key, _)) => self.heap.push(Reverse((key.clone(), index))),
                    None => trace!("union child exhausted: {}", stream.context_debug()),
                }
            }
        }

        let mut info = merged?;
        let mut nodes = NodeSet::new();
        nodes.add_all(info.node());
        nodes.add_all(self.delayed.iter());
        self.node = nodes.or_of();

        if !self.delayed.is_empty() {
            if let Some(node) = &self.node {
                info.set_node(ExprRef::clone(node));
            }
        }
        Some((round_key, info))
    }
}

impl IndexStream for Union {
    fn peek(&self) -> Option<&IndexEntry> {
        self.next.as_ref()
    }

    fn next(&mut self) -> Option<IndexEntry> {
        let entry = self.next.take()?;
        self.next = self.advance_queue();
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
                // Hand back the concrete shard so an intersection compares like for like
                self.next = Some((target.to_string(), info));
                return Some(target.to_string());
            }
        }

        let mut kept = Vec::with_capacity(self.heap.len());
        while let Some(Reverse((key, index))) = self.heap.pop() {
            if shard::matches(&key, target) || shard::greater_than_or_equal(&key, target) {
                kept.push(Reverse((key, index)));
                continue;
            }
            let stream = &mut self.streams[index];
            stream.seek(target);
            if let Some((key, _)) = stream.peek() {
                kept.push(Reverse((key.clone(), index)));
            }
        }
        self.heap.extend(kept);

        self.next = self.advance_queue();
        self.next.as_ref().map(|(key, _)| key.clone())
    }

    fn context(&self) -> StreamContext {
        self.context
    }

    fn current_node(&self) -> Option<&ExprRef> {
        self.node.as_ref()
    }

    fn context_debug(&self) -> String {
        let mut out = format!("{}: Union ({})", self.context, self.context_reason);
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

impl fmt::Debug for Union {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Union")
            .field("context", &self.context)
            .field("children", &self.children_debug)
            .field("node", &self.node)
            .finish_non_exhaustive()
    }
}

/// Accumulates children for a [`Union`], optionally with streams that still
/// have to be initialized.
#[derive(Default)]
pub struct UnionBuilder {
    built: bool,
    children: Vec<Box<dyn IndexStream>>,
    todo: Vec<ScannerInitializer>,
}

impl UnionBuilder {
    pub fn add_child(&mut self, child: Box<dyn IndexStream>) -> Result<()> {
        if self.built {
            return Err(Error::BuilderAlreadyBuilt);
        }
        self.children.push(child);
        Ok(())
    }

    pub fn add_children(&mut self, todo: Vec<ScannerInitializer>) -> Result<()> {
        if self.built {
            return Err(Error::BuilderAlreadyBuilt);
        }
        self.todo.extend(todo);
        Ok(())
    }

    /// Children plus pending initializers
    pub fn size(&self) -> usize {
        self.children.len() + self.todo.len()
    }

    pub fn children(&self) -> &[Box<dyn IndexStream>] {
        &self.children
    }

    /// Take over another builder's children and pending initializers
    pub fn consume(&mut self, other: UnionBuilder) -> Result<()> {
        if self.built {
            return Err(Error::BuilderAlreadyBuilt);
        }
        self.children.extend(other.children);
        self.todo.extend(other.todo);
        Ok(())
    }

    /// Run pending initializers (on `pool` when given) and freeze the union.
    ///
    /// The builder is spent even when an initializer fails.
    pub fn build(&mut self, pool: Option<&rayon::ThreadPool>) -> Result<Union> {
        if self.built {
            return Err(Error::BuilderAlreadyBuilt);
        }
        self.built = true;

        let mut children = std::mem::take(&mut self.children);
        let todo = std::mem::take(&mut self.todo);
        if !todo.is_empty() {
            debug!("initializing {} pending streams", todo.len());
            let streams: Vec<Result<Box<dyn IndexStream>>> = match pool {
                Some(pool) => pool.install(|| todo.into_par_iter().map(|init| init()).collect()),
                None => todo.into_iter().map(|init| init()).collect(),
            };
            for stream in streams {
                let stream = stream.map_err(|e| match e {
                    Error::Initialization(_) => e,
                    other => Error::Initialization(other.to_string()),
                })?;
                children.push(stream);
            }
        }

        Union::new(children)
    }
}
