//! Expression fragments carried alongside index matches.
//!
//! Fragments are persistent: nodes never change after construction and
//! transforms share unchanged subtrees.

pub mod codec;
mod node_set;
mod tree;

pub use node_set::{NodeSet, unwrapped_or};
pub use tree::{CompareOp, Expr, ExprKind, ExprRef, MarkerKind, flatten, source_node};
