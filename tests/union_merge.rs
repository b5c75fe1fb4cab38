//! Planning-time merge scenarios across unions and intersections

mod common;

use common::{exact_stream, ids, infinite_stream, keys};
use shardjoin::config::EngineConfig;
use shardjoin::expr::Expr;
use shardjoin::fixture::PlanFixture;
use shardjoin::index::{
    IndexStream, InfiniteIntersectionStrategy, Intersection, ScannerStream, StreamContext, Union, collect_entries,
};

#[test]
fn test_day_and_shards_merge_in_one_round() {
    let mut union = Union::new(vec![
        exact_stream("A", &[("20200101_0", &["a"]), ("20200102_0", &["d"])]),
        exact_stream("B", &[("20200101_1", &["b"]), ("20200102_1", &["e"])]),
        infinite_stream("C", &["20200101", "20200102"]),
    ])
    .unwrap();

    let entries = collect_entries(&mut union);
    let keys: Vec<&str> = entries.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys, vec!["20200101", "20200102"]);
    assert!(entries.iter().all(|(_, info)| info.is_infinite()));
}

#[test]
fn test_union_keeps_exact_ids_per_shard() {
    let mut union = Union::new(vec![
        exact_stream("A", &[("20200101_0", &["a", "b"])]),
        exact_stream("B", &[("20200101_0", &["b", "c"]), ("20200101_1", &["x"])]),
    ])
    .unwrap();

    let entries = collect_entries(&mut union);
    assert_eq!(entries.len(), 2);

    let (key, info) = &entries[0];
    assert_eq!(key, "20200101_0");
    assert!(info.is_exact());
    assert_eq!(ids(info), vec!["a", "b", "c"]);
    let b = info.ids().iter().find(|m| m.id() == "b").unwrap();
    assert_eq!(b.node().unwrap().text(), "(A == 'v' || B == 'v')");
}

#[test]
fn test_union_of_intersections() {
    // (A && B) || C
    let left = Intersection::new(
        vec![
            exact_stream("A", &[("20200101_0", &["a", "b"]), ("20200102_0", &["c"])]),
            exact_stream("B", &[("20200101_0", &["b"]), ("20200102_0", &["c"])]),
        ],
        InfiniteIntersectionStrategy::Conservative,
    )
    .unwrap();
    let right = exact_stream("C", &[("20200101_0", &["z"])]);

    let mut union = Union::new(vec![Box::new(left), right]).unwrap();
    assert_eq!(union.context(), StreamContext::Present);

    let entries = collect_entries(&mut union);
    assert_eq!(entries.len(), 2);
    assert_eq!(ids(&entries[0].1), vec!["b", "z"]);
    assert_eq!(entries[1].0, "20200102_0");
    assert_eq!(ids(&entries[1].1), vec!["c"]);
}

#[test]
fn test_intersection_of_union_and_delayed() {
    // (A || B) && D, D unindexed
    let union = Union::new(vec![
        exact_stream("A", &[("20200101_0", &["a"])]),
        exact_stream("B", &[("20200101_0", &["b"])]),
    ])
    .unwrap();
    let mut intersection = Intersection::new(
        vec![Box::new(union), Box::new(ScannerStream::delayed(Expr::eq("D", "x")))],
        InfiniteIntersectionStrategy::Conservative,
    )
    .unwrap();
    assert_eq!(intersection.context(), StreamContext::Variable);

    let (_, info) = intersection.next().unwrap();
    assert_eq!(ids(&info), vec!["a", "b"]);
    for m in info.ids() {
        assert!(m.node().unwrap().text().contains("D == 'x'"));
    }
}

#[test]
fn test_bypass_estimates_infinite_against_exact() {
    let children = || {
        vec![
            infinite_stream("A", &["20200101_0"]),
            exact_stream("B", &[("20200101_0", &["a", "b"])]),
        ]
    };

    let mut conservative = Intersection::new(children(), InfiniteIntersectionStrategy::Conservative).unwrap();
    let (_, info) = conservative.next().unwrap();
    assert!(info.is_exact());
    assert_eq!(ids(&info), vec!["a", "b"]);

    let mut bypass = Intersection::new(children(), InfiniteIntersectionStrategy::Bypass).unwrap();
    let (_, info) = bypass.next().unwrap();
    assert!(info.is_infinite());
}

#[test]
fn test_fixture_round_trip_through_union() {
    let fixture = PlanFixture::from_json(
        r#"{
            "streams": [
                {"field": "FOO", "value": "bar", "entries": [
                    {"key": "20200101_0", "ids": ["uid.1", "uid.2"]},
                    {"key": "20200102_0", "count": 40, "ids": ["uid.3"]}
                ]},
                {"field": "BAZ", "value": "x", "lazy": true, "entries": [
                    {"key": "20200101_0", "ids": ["uid.2", "uid.9"]}
                ]},
                {"field": "QUX", "value": "y", "context": "IGNORED"}
            ]
        }"#,
    )
    .unwrap();

    let config = EngineConfig::from_json(r#"{"initializer_threads": 2}"#).unwrap();
    let pool = config.thread_pool().unwrap();
    let mut union = fixture.union(Some(&pool)).unwrap();
    assert_eq!(union.context(), StreamContext::Variable);

    let entries = collect_entries(&mut union);
    assert_eq!(entries.len(), 2);
    assert_eq!(ids(&entries[0].1), vec!["uid.1", "uid.2", "uid.9"]);
    assert!(entries[1].1.is_pruned());

    for (_, info) in &entries {
        let back = shardjoin::index::IndexInfo::from_bytes(&info.to_bytes()).unwrap();
        assert_eq!(&back, info);
    }
}

#[test]
fn test_fixture_intersection_seek() {
    let fixture = PlanFixture::from_json(
        r#"{"streams": [
            {"field": "A", "value": "1", "entries": [{"key": "20200101_0"}, {"key": "20200102_0"}, {"key": "20200103_0"}]},
            {"field": "B", "value": "2", "entries": [{"key": "20200101"}, {"key": "20200103"}]}
        ]}"#,
    )
    .unwrap();

    let mut intersection = fixture.intersection(InfiniteIntersectionStrategy::Conservative).unwrap();
    assert_eq!(intersection.seek("20200102_"), Some("20200103_0".to_string()));
    assert_eq!(keys(&mut intersection), vec!["20200103_0"]);
}
