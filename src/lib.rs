//! # shardjoin - sorted-stream joins for sharded query planning
//!
//! Two layers share one idea: every participant yields keys in ascending
//! order, so boolean combinations are merge-joins.
//!
//! ## Architecture
//!
//! - [`index`] - planning time. Per shard/day [`index::IndexInfo`] summaries,
//!   streams of them, and their [`index::Union`] / [`index::Intersection`].
//! - [`iterator`] - evaluation time. [`iterator::AndIterator`] and
//!   [`iterator::OrIterator`] over document keys, including negated and
//!   deferred terms.
//! - [`expr`] - immutable query fragments carried along with matches.
//! - [`config`], [`fixture`], [`output`], [`logging`] - the pieces the
//!   `shardjoin` binary is built from.
//!
//! ## Quick Start
//!
//! ```ignore
//! use shardjoin::expr::Expr;
//! use shardjoin::index::{IndexInfo, IndexMatch, IndexStream, ScannerStream, Union};
//!
//! let a = ScannerStream::with_data(
//!     vec![("20200101_0".to_string(), IndexInfo::from_ids([IndexMatch::new("uid.1")]))],
//!     Expr::eq("FOO", "bar"),
//! );
//! let b = ScannerStream::with_data(
//!     vec![("20200101".to_string(), IndexInfo::infinite())],
//!     Expr::eq("BAZ", "x"),
//! );
//! let mut union = Union::new(vec![Box::new(a), Box::new(b)]).unwrap();
//! while let Some((key, info)) = union.next() {
//!     println!("{} {}", key, info);
//! }
//! ```

pub mod config;
pub mod error;
pub mod expr;
pub mod fixture;
pub mod index;
pub mod iterator;
pub mod logging;
pub mod output;
pub mod utils;

pub use error::{Error, Result};
