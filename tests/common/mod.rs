//! Helpers shared by the integration tests

#![allow(dead_code)]

use shardjoin::expr::Expr;
use shardjoin::index::{IndexEntry, IndexInfo, IndexMatch, IndexStream, ScannerStream, collect_entries};
use shardjoin::iterator::{ArrayIterator, NestedIterator, collect_keys};

pub type Iter = Box<dyn NestedIterator<String>>;

/// Seekable leaf over string keys
pub fn leaf(values: &[&str]) -> Iter {
    Box::new(ArrayIterator::new(values.iter().map(|v| v.to_string())))
}

pub fn drain(iter: &mut dyn NestedIterator<String>) -> Vec<String> {
    iter.initialize().expect("initialize");
    collect_keys(iter).expect("iterate")
}

/// Stream where every key holds the given ids, fragment `FIELD == 'v'`
pub fn exact_stream(field: &str, entries: &[(&str, &[&str])]) -> Box<dyn IndexStream> {
    let entries: Vec<IndexEntry> = entries
        .iter()
        .map(|(key, ids)| {
            (
                key.to_string(),
                IndexInfo::from_ids(ids.iter().map(|id| IndexMatch::new(*id))),
            )
        })
        .collect();
    Box::new(ScannerStream::with_data(entries, Expr::eq(field, "v")))
}

/// Stream where every key is an unenumerable range
pub fn infinite_stream(field: &str, keys: &[&str]) -> Box<dyn IndexStream> {
    let entries: Vec<IndexEntry> = keys.iter().map(|k| (k.to_string(), IndexInfo::infinite())).collect();
    Box::new(ScannerStream::with_data(entries, Expr::eq(field, "v")))
}

pub fn keys(stream: &mut dyn IndexStream) -> Vec<String> {
    collect_entries(stream).into_iter().map(|(k, _)| k).collect()
}

pub fn ids(info: &IndexInfo) -> Vec<&str> {
    info.ids().iter().map(|m| m.id()).collect()
}
