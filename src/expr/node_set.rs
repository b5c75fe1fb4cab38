use super::tree::{Expr, ExprRef};
use std::collections::BTreeMap;

/// Set of expression nodes deduplicated by canonical text.
///
/// Iteration order is the canonical text order, so anything rebuilt from a
/// set is reproducible regardless of insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeSet {
    nodes: BTreeMap<String, ExprRef>,
}

impl NodeSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the node was not already present
    pub fn add(&mut self, node: ExprRef) -> bool {
        let key = node.text().to_string();
        if self.nodes.contains_key(&key) {
            return false;
        }
        self.nodes.insert(key, node);
        true
    }

    pub fn add_all<'a>(&mut self, nodes: impl IntoIterator<Item = &'a ExprRef>) {
        for node in nodes {
            self.add(ExprRef::clone(node));
        }
    }

    pub fn contains(&self, node: &Expr) -> bool {
        self.nodes.contains_key(node.text())
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExprRef> {
        self.nodes.values()
    }

    /// AND of every node, a lone node unwrapped, `None` when empty
    pub fn and_of(&self) -> Option<ExprRef> {
        match self.nodes.len() {
            0 => None,
            1 => self.nodes.values().next().cloned(),
            _ => Some(Expr::and(self.nodes.values().cloned().collect())),
        }
    }

    /// OR of every node, a lone node unwrapped, `None` when empty
    pub fn or_of(&self) -> Option<ExprRef> {
        match self.nodes.len() {
            0 => None,
            1 => self.nodes.values().next().cloned(),
            _ => Some(Expr::or(self.nodes.values().cloned().collect())),
        }
    }
}

impl FromIterator<ExprRef> for NodeSet {
    fn from_iter<I: IntoIterator<Item = ExprRef>>(iter: I) -> Self {
        let mut set = NodeSet::new();
        for node in iter {
            set.add(node);
        }
        set
    }
}

impl Extend<ExprRef> for NodeSet {
    fn extend<I: IntoIterator<Item = ExprRef>>(&mut self, iter: I) {
        for node in iter {
            self.add(node);
        }
    }
}

/// Deduplicate `nodes` and OR them together, leaving a lone node unwrapped.
pub fn unwrapped_or(nodes: impl IntoIterator<Item = ExprRef>) -> Option<ExprRef> {
    nodes.into_iter().collect::<NodeSet>().or_of()
}
