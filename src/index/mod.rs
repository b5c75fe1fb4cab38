//! Planning-time stream algebra over shard and day keys.

mod context;
mod info;
mod intersection;
mod intersector;
pub mod matches;
mod scanner;
pub mod shard;
mod stream;
mod union;

pub use context::StreamContext;
pub use info::IndexInfo;
pub use intersection::Intersection;
pub use intersector::{DefaultUidIntersector, InfiniteIntersectionStrategy, UidIntersector};
pub use matches::{IndexMatch, MatchKind};
pub use scanner::ScannerStream;
pub use stream::{IndexEntry, IndexStream, collect_entries};
pub use union::{ScannerInitializer, Union, UnionBuilder};
