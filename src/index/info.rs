//! Per shard/day match summaries.
//!
//! An `IndexInfo` is in one of three regimes:
//! - exact: `count >= 0 && count == ids.len()`, the id list is exhaustive
//! - infinite: `count == -1`, every document is a candidate
//! - pruned: `count > ids.len()`, only an estimate survived
//!
//! `union` and `intersect` never touch their operands; they build a new value.

use super::intersector::{InfiniteIntersectionStrategy, UidIntersector};
use super::matches::{IndexMatch, MatchKind};
use crate::error::{Error, Result};
use crate::expr::{ExprRef, NodeSet, flatten, source_node};
use crate::utils::encoding::{SliceReader, encode_varint, encode_varint_i64};
use log::{trace, warn};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::hash::{Hash, Hasher};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IndexInfo {
    count: i64,
    #[serde(default)]
    ids: BTreeSet<IndexMatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    node: Option<ExprRef>,
}

impl IndexInfo {
    /// Exact and empty
    pub fn new() -> Self {
        Self::default()
    }

    /// A bare count with no ids
    pub fn with_count(count: i64) -> Self {
        Self {
            count,
            ..Self::default()
        }
    }

    pub fn infinite() -> Self {
        Self::with_count(-1)
    }

    pub fn from_ids(ids: impl IntoIterator<Item = IndexMatch>) -> Self {
        let ids: BTreeSet<IndexMatch> = ids.into_iter().collect();
        Self {
            count: ids.len() as i64,
            ids,
            node: None,
        }
    }

    /// An explicit count with whatever ids survived. A count below the id
    /// total cannot be honoured and collapses to the exact id count.
    pub fn with_ids(count: i64, ids: impl IntoIterator<Item = IndexMatch>) -> Self {
        let mut info = Self::from_ids(ids);
        if count == -1 || count >= info.count {
            info.count = count;
        } else {
            warn!("count {} below {} ids, keeping the ids", count, info.count);
        }
        info
    }

    pub fn count(&self) -> i64 {
        self.count
    }

    pub fn ids(&self) -> &BTreeSet<IndexMatch> {
        &self.ids
    }

    pub fn node(&self) -> Option<&ExprRef> {
        self.node.as_ref()
    }

    pub fn is_infinite(&self) -> bool {
        self.count == -1
    }

    pub fn is_exact(&self) -> bool {
        self.count >= 0 && self.count as usize == self.ids.len()
    }

    pub fn is_pruned(&self) -> bool {
        !self.is_infinite() && !self.is_exact()
    }

    /// Replace the fragment and push it into every match
    pub fn set_node(&mut self, node: ExprRef) {
        self.ids = std::mem::take(&mut self.ids)
            .into_iter()
            .map(|mut m| {
                m.set(ExprRef::clone(&node));
                m
            })
            .collect();
        self.node = Some(node);
    }

    /// Set the fragment and fold it into every match with the match's own
    /// combinator
    pub fn apply_node(&mut self, node: ExprRef) {
        self.ids = std::mem::take(&mut self.ids)
            .into_iter()
            .map(|mut m| {
                m.add(ExprRef::clone(&node));
                m
            })
            .collect();
        self.node = Some(node);
    }

    pub fn union(&self, other: &IndexInfo, delayed: &[ExprRef]) -> IndexInfo {
        let mut terms = NodeSet::new();
        collect_union_terms(self.node.as_ref(), &mut terms);
        collect_union_terms(other.node.as_ref(), &mut terms);
        terms.add_all(delayed);

        let mut merged = if self.is_infinite() || other.is_infinite() {
            IndexInfo::infinite()
        } else if self.is_exact() && other.is_exact() {
            let mut grouped: FxHashMap<&str, NodeSet> = FxHashMap::default();
            for m in self.ids.iter().chain(other.ids.iter()) {
                grouped.entry(m.id()).or_default().add_all(m.node());
            }
            IndexInfo::from_ids(grouped.into_iter().map(|(id, mut nodes)| {
                // Delayed predicates hold no matter which side produced the id
                nodes.add_all(delayed);
                IndexMatch::from_nodes(&nodes, id, MatchKind::Or)
            }))
        } else {
            IndexInfo::with_count(self.count + other.count)
        };

        merged.node = terms.or_of().map(|n| flatten(&n));
        trace!("union {} + {} -> {}", self, other, merged);
        merged
    }

    pub fn intersect(
        &self,
        other: &IndexInfo,
        delayed: &[ExprRef],
        intersector: &dyn UidIntersector,
        strategy: InfiniteIntersectionStrategy,
    ) -> IndexInfo {
        use InfiniteIntersectionStrategy::*;

        if strategy == Conservative {
            if self.is_infinite() && other.is_exact() {
                return pivot(self.count.max(other.count), other, self.node.as_ref(), delayed);
            }
            if other.is_infinite() && self.is_exact() {
                return pivot(self.count.max(other.count), self, other.node.as_ref(), delayed);
            }
        }

        let mut merged = if self.is_exact() && other.is_exact() {
            IndexInfo::from_ids(intersector.intersect(&self.ids, &other.ids, delayed))
        } else if self.is_infinite() && other.is_infinite() {
            IndexInfo::infinite()
        } else if strategy == Conservative && self.is_exact() {
            keep_exact_side(self, other.node.as_ref(), delayed)
        } else if strategy == Conservative && other.is_exact() {
            keep_exact_side(other, self.node.as_ref(), delayed)
        } else {
            IndexInfo::with_count(self.count.min(other.count))
        };

        let mut nodes = NodeSet::new();
        nodes.add_all(self.node.as_ref());
        nodes.add_all(other.node.as_ref());
        nodes.add_all(delayed);
        merged.node = nodes.and_of().map(|n| flatten(&n));

        trace!("intersect {} * {} -> {}", self, other, merged);
        merged
    }

    /// AND delayed predicates into every exact match and the top fragment.
    /// Returns false when there are no ids to carry them.
    pub fn intersect_delayed(&mut self, delayed: &[ExprRef]) -> bool {
        if !self.is_exact() {
            return false;
        }

        self.ids = std::mem::take(&mut self.ids)
            .into_iter()
            .map(|mut m| {
                if let Some(node) = m.node() {
                    let mut nodes = NodeSet::new();
                    nodes.add(ExprRef::clone(node));
                    nodes.add_all(delayed);
                    if let Some(and) = nodes.and_of() {
                        m.set(flatten(&and));
                    }
                }
                m
            })
            .collect();

        let mut nodes = NodeSet::new();
        nodes.add_all(self.node.as_ref());
        nodes.add_all(delayed);
        if let Some(and) = nodes.and_of() {
            self.node = Some(flatten(&and));
        }
        true
    }

    /// `[zigzag varint count][varint id_count][matches]`
    pub fn encode(&self, buf: &mut Vec<u8>) {
        encode_varint_i64(self.count, buf);
        encode_varint(self.ids.len() as u32, buf);
        for m in &self.ids {
            m.encode(buf);
        }
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        self.encode(&mut buf);
        buf
    }

    pub fn decode(reader: &mut SliceReader<'_>) -> Result<Self> {
        let count = reader.read_varint_i64()?;
        if count < -1 {
            return Err(Error::decode(format!("negative count {}", count)));
        }
        let id_count = reader.read_varint()?;
        let mut ids = BTreeSet::new();
        for _ in 0..id_count {
            ids.insert(IndexMatch::decode(reader)?);
        }
        Ok(Self {
            count,
            ids,
            node: None,
        })
    }

    pub fn from_bytes(buf: &[u8]) -> Result<Self> {
        let mut reader = SliceReader::new(buf);
        let info = Self::decode(&mut reader)?;
        if !reader.is_empty() {
            return Err(Error::decode(format!(
                "{} trailing bytes after index info",
                buf.len() - reader.position()
            )));
        }
        Ok(info)
    }
}

/// A top-level OR contributes its children, anything else contributes itself
fn collect_union_terms(node: Option<&ExprRef>, terms: &mut NodeSet) {
    let Some(node) = node else {
        return;
    };
    match source_node(node).or_children() {
        Some(children) => terms.add_all(children),
        None => {
            terms.add(ExprRef::clone(node));
        }
    }
}

/// Infinite against exact: the exact side's ids survive, each carrying the
/// infinite side's fragment as an extra condition.
fn pivot(
    max_count: i64,
    exact: &IndexInfo,
    infinite_node: Option<&ExprRef>,
    delayed: &[ExprRef],
) -> IndexInfo {
    let mut extra = NodeSet::new();
    extra.add_all(delayed);
    extra.add_all(infinite_node);

    let matches: BTreeSet<IndexMatch> = exact
        .ids
        .iter()
        .map(|m| {
            let mut nodes = NodeSet::new();
            nodes.add_all(m.node());
            nodes.add_all(extra.iter());
            IndexMatch::from_nodes(&nodes, m.id(), MatchKind::And)
        })
        .collect();

    // Each match is its own query path, so the paths are OR'd
    let paths: NodeSet = matches.iter().filter_map(|m| m.node().cloned()).collect();
    let node = match paths.or_of() {
        Some(node) => Some(flatten(&node)),
        None => {
            let mut nodes = extra;
            nodes.add_all(exact.node.as_ref());
            nodes.and_of().map(|n| flatten(&n))
        }
    };

    let mut merged = if matches.is_empty() {
        IndexInfo::with_count(max_count)
    } else {
        IndexInfo::from_ids(matches)
    };
    merged.node = node;
    merged
}

/// Exact against pruned: the exact side keeps its ids, each AND'ed with the
/// pruned side's fragment.
fn keep_exact_side(exact: &IndexInfo, other_node: Option<&ExprRef>, delayed: &[ExprRef]) -> IndexInfo {
    IndexInfo::from_ids(exact.ids.iter().map(|m| {
        let mut nodes = NodeSet::new();
        nodes.add_all(m.node());
        nodes.add_all(delayed);
        nodes.add_all(other_node);
        IndexMatch::from_nodes(&nodes, m.id(), MatchKind::And)
    }))
}

impl PartialEq for IndexInfo {
    fn eq(&self, other: &Self) -> bool {
        self.count == other.count && self.ids == other.ids
    }
}

impl Eq for IndexInfo {}

impl Hash for IndexInfo {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.count.hash(state);
        self.ids.hash(state);
    }
}

impl fmt::Display for IndexInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{ \"count\": {} - {} }}", self.count, self.ids.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::index::intersector::DefaultUidIntersector;
    use crate::index::matches::term_match;

    fn exact(field: &str, value: &str, ids: &[&str]) -> IndexInfo {
        let mut info = IndexInfo::from_ids(ids.iter().map(|id| term_match(id, field, value)));
        info.node = Some(Expr::eq(field, value));
        info
    }

    fn with_node(mut info: IndexInfo, field: &str, value: &str) -> IndexInfo {
        info.node = Some(Expr::eq(field, value));
        info
    }

    fn ids(info: &IndexInfo) -> Vec<&str> {
        info.ids().iter().map(|m| m.id()).collect()
    }

    fn conservative(a: &IndexInfo, b: &IndexInfo, delayed: &[ExprRef]) -> IndexInfo {
        a.intersect(b, delayed, &DefaultUidIntersector, InfiniteIntersectionStrategy::Conservative)
    }

    fn bypass(a: &IndexInfo, b: &IndexInfo) -> IndexInfo {
        a.intersect(b, &[], &DefaultUidIntersector, InfiniteIntersectionStrategy::Bypass)
    }

    #[test]
    fn test_regimes() {
        assert!(IndexInfo::new().is_exact());
        assert!(IndexInfo::infinite().is_infinite());
        assert!(IndexInfo::with_count(5).is_pruned());
        assert!(exact("A", "1", &["a", "b"]).is_exact());
    }

    #[test]
    fn test_equality_ignores_node() {
        let a = IndexInfo::with_count(5);
        let b = with_node(IndexInfo::with_count(5), "FOO", "bar");
        assert_eq!(a, b);
        assert_ne!(a, IndexInfo::with_count(6));
    }

    #[test]
    fn test_union_exact_merges_per_id() {
        let a = exact("A", "1", &["a", "b"]);
        let b = exact("B", "2", &["b", "c"]);
        let merged = a.union(&b, &[]);

        assert_eq!(merged.count(), 3);
        assert_eq!(ids(&merged), vec!["a", "b", "c"]);
        let b_node = merged.ids().iter().find(|m| m.id() == "b").unwrap().node().unwrap();
        assert_eq!(b_node.text(), "(A == '1' || B == '2')");
        assert_eq!(merged.node().unwrap().text(), "(A == '1' || B == '2')");
    }

    #[test]
    fn test_union_attaches_delayed_to_every_id() {
        let delayed = Expr::delayed(Expr::eq("D", "x"));
        let merged = exact("A", "1", &["a"]).union(&exact("B", "2", &["b"]), &[delayed.clone()]);

        for m in merged.ids() {
            let text = m.node().unwrap().text();
            assert!(text.contains(delayed.text()), "{} lacks delayed node", text);
        }
    }

    #[test]
    fn test_union_with_infinite_drops_ids() {
        let inf = with_node(IndexInfo::infinite(), "B", "2");
        let merged = exact("A", "1", &["a"]).union(&inf, &[]);

        assert!(merged.is_infinite());
        assert!(merged.ids().is_empty());
        assert_eq!(merged.node().unwrap().text(), "(A == '1' || B == '2')");
    }

    #[test]
    fn test_union_pruned_sums_counts() {
        let pruned = with_node(IndexInfo::with_count(40), "B", "2");
        let merged = exact("A", "1", &["a", "b"]).union(&pruned, &[]);
        assert_eq!(merged.count(), 42);
        assert!(merged.ids().is_empty());
    }

    #[test]
    fn test_union_flattens_top_level_or() {
        let mut a = IndexInfo::with_count(3);
        a.node = Some(Expr::or(vec![Expr::eq("A", "1"), Expr::eq("B", "2")]));
        let b = with_node(IndexInfo::with_count(4), "C", "3");
        let merged = a.union(&b, &[]);
        assert_eq!(merged.node().unwrap().text(), "(A == '1' || B == '2' || C == '3')");
    }

    #[test]
    fn test_intersect_exact() {
        let a = exact("A", "1", &["a", "b", "c"]);
        let b = exact("B", "2", &["b", "c", "d"]);
        let merged = conservative(&a, &b, &[]);

        assert_eq!(ids(&merged), vec!["b", "c"]);
        assert_eq!(merged.count(), 2);
        assert_eq!(merged.node().unwrap().text(), "(A == '1' && B == '2')");
        for m in merged.ids() {
            assert_eq!(m.node().unwrap().text(), "(A == '1' && B == '2')");
        }
    }

    #[test]
    fn test_intersect_infinite_pivots_on_exact() {
        let inf = with_node(IndexInfo::infinite(), "B", "2");
        let small = exact("A", "1", &["a", "b"]);
        let merged = conservative(&inf, &small, &[]);

        assert_eq!(ids(&merged), vec!["a", "b"]);
        assert_eq!(merged.count(), 2);
        for m in merged.ids() {
            assert_eq!(m.node().unwrap().text(), "(A == '1' && B == '2')");
        }
        // identical paths collapse to one
        assert_eq!(merged.node().unwrap().text(), "(A == '1' && B == '2')");

        let reversed = conservative(&small, &inf, &[]);
        assert_eq!(reversed, merged);
    }

    #[test]
    fn test_intersect_infinite_with_empty_exact() {
        let inf = with_node(IndexInfo::infinite(), "B", "2");
        let empty = with_node(IndexInfo::new(), "A", "1");
        let merged = conservative(&inf, &empty, &[]);

        assert_eq!(merged.count(), 0);
        assert!(merged.is_exact());
        assert_eq!(merged.node().unwrap().text(), "(A == '1' && B == '2')");
    }

    #[test]
    fn test_intersect_both_infinite() {
        let a = IndexInfo::infinite();
        let b = IndexInfo::infinite();
        assert!(conservative(&a, &b, &[]).is_infinite());
        assert!(bypass(&a, &b).is_infinite());
    }

    #[test]
    fn test_intersect_exact_with_pruned() {
        let small = exact("A", "1", &["a", "b"]);
        let large = with_node(IndexInfo::with_count(50), "B", "2");

        let kept = conservative(&small, &large, &[]);
        assert_eq!(ids(&kept), vec!["a", "b"]);
        assert_eq!(
            kept.ids().iter().next().unwrap().node().unwrap().text(),
            "(A == '1' && B == '2')"
        );

        let dropped = bypass(&small, &large);
        assert_eq!(dropped.count(), 2);
        assert!(dropped.ids().is_empty());
    }

    #[test]
    fn test_bypass_infinite_with_exact_is_min() {
        let inf = IndexInfo::infinite();
        let small = exact("A", "1", &["a"]);
        let merged = bypass(&inf, &small);
        assert!(merged.is_infinite());
        assert!(merged.ids().is_empty());
    }

    #[test]
    fn test_intersect_pruned_pair() {
        let a = IndexInfo::with_count(30);
        let b = IndexInfo::with_count(20);
        let merged = conservative(&a, &b, &[]);
        assert_eq!(merged.count(), 20);
        assert!(merged.ids().is_empty());
    }

    #[test]
    fn test_intersect_delayed() {
        let mut info = exact("A", "1", &["a"]);
        let delayed = Expr::delayed(Expr::eq("D", "x"));
        assert!(info.intersect_delayed(&[delayed]));
        let expected = "(((_Delayed_ = true) && (D == 'x')) && A == '1')";
        assert_eq!(info.node().unwrap().text(), expected);
        assert_eq!(info.ids().iter().next().unwrap().node().unwrap().text(), expected);

        let mut inf = IndexInfo::infinite();
        assert!(!inf.intersect_delayed(&[Expr::eq("D", "x")]));
    }

    #[test]
    fn test_set_node_propagates() {
        let mut info = exact("A", "1", &["a", "b"]);
        info.set_node(Expr::eq("Z", "9"));
        assert!(info.ids().iter().all(|m| m.node().unwrap().text() == "Z == '9'"));
        assert_eq!(info.node().unwrap().text(), "Z == '9'");
    }

    #[test]
    fn test_apply_node_combines() {
        let mut info = exact("A", "1", &["a"]);
        info.apply_node(Expr::eq("Z", "9"));
        assert_eq!(
            info.ids().iter().next().unwrap().node().unwrap().text(),
            "(A == '1' || Z == '9')"
        );
    }

    #[test]
    fn test_binary_round_trip() {
        let info = exact("A", "1", &["a", "b"]);
        let decoded = IndexInfo::from_bytes(&info.to_bytes()).unwrap();
        assert_eq!(decoded, info);

        let inf = IndexInfo::infinite();
        assert_eq!(inf.to_bytes(), vec![1, 0]);
        assert_eq!(IndexInfo::from_bytes(&inf.to_bytes()).unwrap(), inf);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(IndexInfo::from_bytes(&[]).is_err());
        assert!(IndexInfo::from_bytes(&[3]).is_err()); // count -2
        assert!(IndexInfo::from_bytes(&[0, 0, 0]).is_err());
    }

    #[test]
    fn test_with_ids_regimes() {
        let pruned = IndexInfo::with_ids(10, [IndexMatch::new("a")]);
        assert!(pruned.is_pruned());
        assert_eq!(pruned.ids().len(), 1);

        assert!(IndexInfo::with_ids(-1, [IndexMatch::new("a")]).is_infinite());

        let clamped = IndexInfo::with_ids(0, [IndexMatch::new("a"), IndexMatch::new("b")]);
        assert!(clamped.is_exact());
        assert_eq!(clamped.count(), 2);
    }

    #[test]
    fn test_display() {
        assert_eq!(exact("A", "1", &["a"]).to_string(), "{ \"count\": 1 - 1 }");
    }
}
