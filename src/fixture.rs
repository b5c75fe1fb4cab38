//! JSON descriptions of planning streams and iterator trees.
//!
//! Planning fixture:
//!
//! ```json
//! {
//!   "streams": [
//!     { "field": "FOO", "value": "bar",
//!       "entries": [ { "key": "20200101_1", "ids": ["uid.1", "uid.2"] },
//!                    { "key": "20200102", "count": -1 } ] },
//!     { "field": "BAZ", "value": "x", "context": "DELAYED_FIELD" }
//!   ]
//! }
//! ```
//!
//! Iterator fixture:
//!
//! ```json
//! { "op": "and", "includes": [["a", "b", "c"]],
//!   "children": [ { "op": "or", "excludes": [["b", "c"], ["a", "b"]] } ] }
//! ```

use crate::error::Error;
use crate::expr::{Expr, ExprRef};
use crate::index::{
    IndexEntry, IndexInfo, IndexMatch, IndexStream, InfiniteIntersectionStrategy, Intersection, ScannerInitializer,
    ScannerStream, StreamContext, Union, UnionBuilder,
};
use crate::iterator::{AndIterator, ArrayIterator, NestedIterator, OrIterator};
use anyhow::{Context, Result, bail};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

fn present() -> StreamContext {
    StreamContext::Present
}

/// One key of a data-bearing stream.
///
/// `ids` alone is exact, `count` alone is a bare estimate (`-1` for
/// infinite), both together describe a pruned entry. Neither means infinite.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFixture {
    pub key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
}

impl EntryFixture {
    pub fn to_info(&self) -> IndexInfo {
        match (&self.ids, self.count) {
            (Some(ids), count) => {
                let ids = ids.iter().map(|id| IndexMatch::new(id.as_str()));
                match count {
                    Some(count) => IndexInfo::with_ids(count, ids),
                    None => IndexInfo::from_ids(ids),
                }
            }
            (None, Some(count)) => IndexInfo::with_count(count),
            (None, None) => IndexInfo::infinite(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamFixture {
    #[serde(default = "present")]
    pub context: StreamContext,
    /// Full fragment; takes precedence over `field`/`value`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<ExprRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default)]
    pub entries: Vec<EntryFixture>,
    /// Build the stream on the union builder's pool instead of up front
    #[serde(default)]
    pub lazy: bool,
}

impl StreamFixture {
    pub fn node(&self) -> Result<ExprRef> {
        if let Some(node) = &self.node {
            return Ok(ExprRef::clone(node));
        }
        match (&self.field, &self.value) {
            (Some(field), Some(value)) => Ok(Expr::eq(field.as_str(), value.as_str())),
            _ => bail!("stream needs either a node or a field and value"),
        }
    }

    /// Entries sorted by key
    pub fn entries(&self) -> Vec<IndexEntry> {
        let mut entries: Vec<IndexEntry> = self.entries.iter().map(|e| (e.key.clone(), e.to_info())).collect();
        entries.sort_by(|a, b| a.0.cmp(&b.0));
        entries
    }

    pub fn to_stream(&self) -> Result<Box<dyn IndexStream>> {
        let node = self.node()?;
        if self.context == StreamContext::Present {
            return Ok(Box::new(ScannerStream::with_data(self.entries(), node)));
        }
        if !self.entries.is_empty() {
            warn!("ignoring {} entries of a {} stream", self.entries.len(), self.context);
        }
        Ok(Box::new(ScannerStream::with_context(self.context, node)))
    }

    fn initializer(&self) -> ScannerInitializer {
        let fixture = self.clone();
        Box::new(move || fixture.to_stream().map_err(|e| Error::Initialization(format!("{:#}", e))))
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlanFixture {
    #[serde(default)]
    pub streams: Vec<StreamFixture>,
}

impl PlanFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse plan fixture")
    }

    pub fn streams(&self) -> Result<Vec<Box<dyn IndexStream>>> {
        self.streams.iter().map(StreamFixture::to_stream).collect()
    }

    /// Lazy streams are materialized by the builder, on `pool` when given
    pub fn union(&self, pool: Option<&rayon::ThreadPool>) -> Result<Union> {
        let mut builder = UnionBuilder::default();
        let mut todo = Vec::new();
        for stream in &self.streams {
            if stream.lazy {
                todo.push(stream.initializer());
            } else {
                builder.add_child(stream.to_stream()?)?;
            }
        }
        debug!("union fixture: {} ready, {} lazy", builder.children().len(), todo.len());
        builder.add_children(todo)?;
        Ok(builder.build(pool)?)
    }

    pub fn intersection(&self, strategy: InfiniteIntersectionStrategy) -> Result<Intersection> {
        Ok(Intersection::new(self.streams()?, strategy)?)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IteratorOp {
    #[default]
    And,
    Or,
}

/// A boolean tree of sorted key lists
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IteratorFixture {
    #[serde(default)]
    pub op: IteratorOp,
    #[serde(default)]
    pub includes: Vec<Vec<String>>,
    #[serde(default)]
    pub excludes: Vec<Vec<String>>,
    /// Nested terms, included
    #[serde(default)]
    pub children: Vec<IteratorFixture>,
    /// Nested terms, negated
    #[serde(default)]
    pub negated: Vec<IteratorFixture>,
}

impl IteratorFixture {
    pub fn load(path: &Path) -> Result<Self> {
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read fixture {}", path.display()))?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self> {
        serde_json::from_str(content).context("Failed to parse iterator fixture")
    }

    /// The uninitialized iterator tree
    pub fn build(&self) -> Box<dyn NestedIterator<String>> {
        let leaf = |values: &Vec<String>| -> Box<dyn NestedIterator<String>> {
            Box::new(ArrayIterator::new(values.iter().cloned()))
        };

        let mut includes: Vec<Box<dyn NestedIterator<String>>> = self.includes.iter().map(leaf).collect();
        includes.extend(self.children.iter().map(IteratorFixture::build));
        let mut excludes: Vec<Box<dyn NestedIterator<String>>> = self.excludes.iter().map(leaf).collect();
        excludes.extend(self.negated.iter().map(IteratorFixture::build));

        match self.op {
            IteratorOp::And => Box::new(AndIterator::new(includes, excludes)),
            IteratorOp::Or => Box::new(OrIterator::new(includes, excludes)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::collect_entries;
    use crate::iterator::collect_keys;

    #[test]
    fn test_entry_regimes() {
        let exact = EntryFixture {
            key: "20200101_1".into(),
            count: None,
            ids: Some(vec!["a".into(), "b".into()]),
        };
        assert!(exact.to_info().is_exact());

        let pruned = EntryFixture {
            count: Some(10),
            ..exact.clone()
        };
        assert!(pruned.to_info().is_pruned());

        let bare = EntryFixture {
            key: "20200101".into(),
            count: None,
            ids: None,
        };
        assert!(bare.to_info().is_infinite());
    }

    #[test]
    fn test_stream_context_and_node() {
        let fixture = PlanFixture::from_json(
            r#"{"streams": [
                {"field": "FOO", "value": "bar", "entries": [{"key": "20200102_0", "ids": ["b"]}, {"key": "20200101_0", "ids": ["a"]}]},
                {"field": "BAZ", "value": "x", "context": "DELAYED_FIELD"},
                {"field": "QUX", "value": "y", "entries": []}
            ]}"#,
        )
        .unwrap();

        let mut streams = fixture.streams().unwrap();
        assert_eq!(streams[0].context(), StreamContext::Present);
        assert_eq!(streams[1].context(), StreamContext::DelayedField);
        assert_eq!(streams[2].context(), StreamContext::Absent);

        let entries = collect_entries(&mut streams[0]);
        let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["20200101_0", "20200102_0"]);
        assert_eq!(entries[0].1.node().unwrap().text(), "FOO == 'bar'");
    }

    #[test]
    fn test_stream_needs_node() {
        let fixture = PlanFixture::from_json(r#"{"streams": [{"field": "FOO"}]}"#).unwrap();
        assert!(fixture.streams().is_err());
    }

    #[test]
    fn test_lazy_streams_join_union() {
        let fixture = PlanFixture::from_json(
            r#"{"streams": [
                {"field": "A", "value": "1", "entries": [{"key": "20200101_0", "ids": ["a"]}]},
                {"field": "B", "value": "2", "lazy": true, "entries": [{"key": "20200101_1", "ids": ["b"]}]}
            ]}"#,
        )
        .unwrap();

        let mut union = fixture.union(None).unwrap();
        let keys: Vec<String> = collect_entries(&mut union).into_iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["20200101_0", "20200101_1"]);
    }

    #[test]
    fn test_lazy_failure_surfaces() {
        let fixture = PlanFixture::from_json(r#"{"streams": [{"lazy": true}]}"#).unwrap();
        let err = fixture.union(None).unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::Initialization(_))));
    }

    #[test]
    fn test_iterator_tree() {
        // X && (!Y || !Z)
        let fixture = IteratorFixture::from_json(
            r#"{"includes": [["a", "b", "c"]], "children": [{"op": "or", "excludes": [["b", "c"], ["a", "b"]]}]}"#,
        )
        .unwrap();
        let mut iter = fixture.build();
        iter.initialize().unwrap();
        assert_eq!(collect_keys(iter.as_mut()).unwrap(), vec!["a", "c"]);
    }
}
