use super::matches::{IndexMatch, MatchKind};
use crate::expr::{ExprRef, NodeSet};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

/// Id-level intersection of two exact match sets
pub trait UidIntersector: Send + Sync {
    fn intersect(
        &self,
        left: &BTreeSet<IndexMatch>,
        right: &BTreeSet<IndexMatch>,
        delayed: &[ExprRef],
    ) -> BTreeSet<IndexMatch>;
}

/// Keeps ids present on both sides and ANDs their fragments together with
/// the delayed predicates.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultUidIntersector;

impl UidIntersector for DefaultUidIntersector {
    fn intersect(
        &self,
        left: &BTreeSet<IndexMatch>,
        right: &BTreeSet<IndexMatch>,
        delayed: &[ExprRef],
    ) -> BTreeSet<IndexMatch> {
        let mut result = BTreeSet::new();
        let mut left = left.iter().peekable();
        let mut right = right.iter().peekable();

        // Both sets are sorted by id
        while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
            match l.id().cmp(r.id()) {
                Ordering::Less => {
                    left.next();
                }
                Ordering::Greater => {
                    right.next();
                }
                Ordering::Equal => {
                    let mut nodes = NodeSet::new();
                    nodes.add_all(l.node());
                    nodes.add_all(r.node());
                    nodes.add_all(delayed);
                    result.insert(IndexMatch::from_nodes(&nodes, l.id(), MatchKind::And));
                    left.next();
                    right.next();
                }
            }
        }

        result
    }
}

/// How an intersection treats a side that cannot enumerate its ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InfiniteIntersectionStrategy {
    /// Pivot on the enumerable side: its ids survive, each carrying the
    /// unenumerable side's fragment. An exact side intersected with a pruned
    /// one keeps its ids too.
    #[default]
    Conservative,
    /// Only exact sides intersect by id. Everything else collapses to the
    /// smaller count.
    Bypass,
}

impl InfiniteIntersectionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            InfiniteIntersectionStrategy::Conservative => "conservative",
            InfiniteIntersectionStrategy::Bypass => "bypass",
        }
    }
}

impl fmt::Display for InfiniteIntersectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InfiniteIntersectionStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "conservative" => Ok(InfiniteIntersectionStrategy::Conservative),
            "bypass" => Ok(InfiniteIntersectionStrategy::Bypass),
            other => Err(format!(
                "unknown intersection strategy '{}' (expected conservative or bypass)",
                other
            )),
        }
    }
}
