use crate::error::{Error, Result};
use crate::expr::{self, Expr, ExprRef, NodeSet, flatten};
use crate::utils::encoding::{SliceReader, encode_str};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

/// How the fragments gathered for one id combine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchKind {
    And,
    #[default]
    Or,
}

impl MatchKind {
    fn combine(&self, nodes: &NodeSet) -> Option<ExprRef> {
        let node = match self {
            MatchKind::And => nodes.and_of(),
            MatchKind::Or => nodes.or_of(),
        };
        node.map(|n| flatten(&n))
    }

    fn code(&self) -> u8 {
        match self {
            MatchKind::And => 0,
            MatchKind::Or => 1,
        }
    }
}

/// A document id and the fragment that matched it.
///
/// Ordering and equality look at the id only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMatch {
    id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    node: Option<ExprRef>,
    #[serde(default)]
    kind: MatchKind,
}

impl IndexMatch {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node: None,
            kind: MatchKind::default(),
        }
    }

    pub fn with_node(id: impl Into<String>, node: ExprRef) -> Self {
        Self {
            id: id.into(),
            node: Some(node),
            kind: MatchKind::default(),
        }
    }

    /// Combine a set of fragments for `id` using `kind`
    pub fn from_nodes(nodes: &NodeSet, id: impl Into<String>, kind: MatchKind) -> Self {
        Self {
            id: id.into(),
            node: kind.combine(nodes),
            kind,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn node(&self) -> Option<&ExprRef> {
        self.node.as_ref()
    }

    pub fn kind(&self) -> MatchKind {
        self.kind
    }

    /// Replace the fragment wholesale
    pub fn set(&mut self, node: ExprRef) {
        self.node = Some(node);
    }

    /// Fold another fragment in with this match's combinator
    pub fn add(&mut self, node: ExprRef) {
        let mut nodes = NodeSet::new();
        if let Some(existing) = self.node.take() {
            nodes.add(existing);
        }
        nodes.add(node);
        self.node = self.kind.combine(&nodes);
    }

    /// `[varint id_len][id][u8 kind][u8 has_node][node?]`
    pub fn encode(&self, buf: &mut Vec<u8>) {
        encode_str(&self.id, buf);
        buf.push(self.kind.code());
        match &self.node {
            Some(node) => {
                buf.push(1);
                expr::codec::encode(node, buf);
            }
            None => buf.push(0),
        }
    }

    pub fn decode(reader: &mut SliceReader<'_>) -> Result<Self> {
        let id = reader.read_str()?;
        let kind = match reader.read_u8()? {
            0 => MatchKind::And,
            1 => MatchKind::Or,
            other => return Err(Error::decode(format!("unknown match kind {}", other))),
        };
        let node = match reader.read_u8()? {
            0 => None,
            1 => Some(expr::codec::decode(reader)?),
            other => return Err(Error::decode(format!("bad node flag {}", other))),
        };
        Ok(Self { id, node, kind })
    }
}

impl PartialEq for IndexMatch {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for IndexMatch {}

impl Hash for IndexMatch {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for IndexMatch {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for IndexMatch {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl From<&str> for IndexMatch {
    fn from(id: &str) -> Self {
        IndexMatch::new(id)
    }
}

/// Convenience for a match whose fragment is a single `FIELD == 'value'` term
pub fn term_match(id: &str, field: &str, value: &str) -> IndexMatch {
    IndexMatch::with_node(id, Expr::eq(field, value))
}
