use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Shared handle to an immutable expression node
pub type ExprRef = Arc<Expr>;

/// Comparison operator of a leaf predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CompareOp {
    #[serde(rename = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Le,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Ge,
    #[serde(rename = "=~")]
    RegexMatch,
    #[serde(rename = "!~")]
    RegexNotMatch,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "==",
            CompareOp::Ne => "!=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::RegexMatch => "=~",
            CompareOp::RegexNotMatch => "!~",
        }
    }

    pub(crate) fn code(&self) -> u8 {
        match self {
            CompareOp::Eq => 0,
            CompareOp::Ne => 1,
            CompareOp::Lt => 2,
            CompareOp::Le => 3,
            CompareOp::Gt => 4,
            CompareOp::Ge => 5,
            CompareOp::RegexMatch => 6,
            CompareOp::RegexNotMatch => 7,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => CompareOp::Eq,
            1 => CompareOp::Ne,
            2 => CompareOp::Lt,
            3 => CompareOp::Le,
            4 => CompareOp::Gt,
            5 => CompareOp::Ge,
            6 => CompareOp::RegexMatch,
            7 => CompareOp::RegexNotMatch,
            _ => return None,
        })
    }
}

/// Query property markers. A marker wraps a source subtree whose evaluation
/// has to wait for full-document context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MarkerKind {
    Delayed,
    ExceededOr,
    ExceededValue,
    ExceededTerm,
    IndexHole,
}

impl MarkerKind {
    pub fn label(&self) -> &'static str {
        match self {
            MarkerKind::Delayed => "_Delayed_",
            MarkerKind::ExceededOr => "_List_",
            MarkerKind::ExceededValue => "_Value_",
            MarkerKind::ExceededTerm => "_Term_",
            MarkerKind::IndexHole => "_Hole_",
        }
    }

    pub(crate) fn code(&self) -> u8 {
        match self {
            MarkerKind::Delayed => 0,
            MarkerKind::ExceededOr => 1,
            MarkerKind::ExceededValue => 2,
            MarkerKind::ExceededTerm => 3,
            MarkerKind::IndexHole => 4,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0 => MarkerKind::Delayed,
            1 => MarkerKind::ExceededOr,
            2 => MarkerKind::ExceededValue,
            3 => MarkerKind::ExceededTerm,
            4 => MarkerKind::IndexHole,
            _ => return None,
        })
    }
}

/// Node shape
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExprKind {
    Term {
        field: String,
        op: CompareOp,
        value: String,
    },
    And(Vec<ExprRef>),
    Or(Vec<ExprRef>),
    Not(ExprRef),
    Marker {
        kind: MarkerKind,
        source: ExprRef,
    },
}

/// An immutable boolean expression fragment.
///
/// Nodes are never mutated after construction; every transform builds new
/// nodes and shares untouched subtrees. Identity (equality, ordering,
/// hashing) is the canonical text, which is computed once per node.
#[derive(Clone, Serialize, Deserialize)]
#[serde(from = "ExprKind", into = "ExprKind")]
pub struct Expr {
    kind: ExprKind,
    text: String,
}

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Self {
        let text = render(&kind);
        Self { kind, text }
    }
}

impl From<Expr> for ExprKind {
    fn from(expr: Expr) -> Self {
        expr.kind
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'"))
}

/// Plain identifiers render bare, anything else is quoted like a value
fn render_field(field: &str) -> String {
    let plain = !field.is_empty() && field.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.');
    if plain { field.to_string() } else { quote(field) }
}

fn render(kind: &ExprKind) -> String {
    fn join(children: &[ExprRef], sep: &str) -> String {
        let parts: Vec<&str> = children.iter().map(|c| c.text()).collect();
        format!("({})", parts.join(sep))
    }

    match kind {
        ExprKind::Term { field, op, value } => {
            format!("{} {} {}", render_field(field), op.symbol(), quote(value))
        }
        ExprKind::And(children) => join(children, " && "),
        ExprKind::Or(children) => join(children, " || "),
        ExprKind::Not(child) => format!("!({})", child.text()),
        ExprKind::Marker { kind, source } => {
            format!("(({} = true) && ({}))", kind.label(), source.text())
        }
    }
}

impl Expr {
    pub fn new(kind: ExprKind) -> ExprRef {
        Arc::new(Expr::from(kind))
    }

    pub fn term(field: impl Into<String>, op: CompareOp, value: impl Into<String>) -> ExprRef {
        Expr::new(ExprKind::Term {
            field: field.into(),
            op,
            value: value.into(),
        })
    }

    /// `FIELD == 'value'`
    pub fn eq(field: impl Into<String>, value: impl Into<String>) -> ExprRef {
        Expr::term(field, CompareOp::Eq, value)
    }

    pub fn and(children: Vec<ExprRef>) -> ExprRef {
        Expr::new(ExprKind::And(children))
    }

    pub fn or(children: Vec<ExprRef>) -> ExprRef {
        Expr::new(ExprKind::Or(children))
    }

    pub fn not(child: ExprRef) -> ExprRef {
        Expr::new(ExprKind::Not(child))
    }

    pub fn marker(kind: MarkerKind, source: ExprRef) -> ExprRef {
        Expr::new(ExprKind::Marker { kind, source })
    }

    pub fn delayed(source: ExprRef) -> ExprRef {
        Expr::marker(MarkerKind::Delayed, source)
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    /// Canonical textual form
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn is_and(&self) -> bool {
        matches!(self.kind, ExprKind::And(_))
    }

    pub fn is_or(&self) -> bool {
        matches!(self.kind, ExprKind::Or(_))
    }

    /// Children of an OR node, `None` for anything else
    pub fn or_children(&self) -> Option<&[ExprRef]> {
        match &self.kind {
            ExprKind::Or(children) => Some(children),
            _ => None,
        }
    }

    /// Direct children of this node, in order
    pub fn children(&self) -> Vec<&ExprRef> {
        match &self.kind {
            ExprKind::Term { .. } => Vec::new(),
            ExprKind::And(children) | ExprKind::Or(children) => children.iter().collect(),
            ExprKind::Not(child) => vec![child],
            ExprKind::Marker { source, .. } => vec![source],
        }
    }

    /// Rebuild the whole subtree into freshly allocated nodes that share
    /// nothing with `self`.
    pub fn deep_copy(&self) -> ExprRef {
        let kind = match &self.kind {
            ExprKind::Term { field, op, value } => ExprKind::Term {
                field: field.clone(),
                op: *op,
                value: value.clone(),
            },
            ExprKind::And(children) => ExprKind::And(children.iter().map(|c| c.deep_copy()).collect()),
            ExprKind::Or(children) => ExprKind::Or(children.iter().map(|c| c.deep_copy()).collect()),
            ExprKind::Not(child) => ExprKind::Not(child.deep_copy()),
            ExprKind::Marker { kind, source } => ExprKind::Marker {
                kind: *kind,
                source: source.deep_copy(),
            },
        };
        Expr::new(kind)
    }
}

/// Unwrap a marker node to the subtree it marks. Unmarked nodes are returned
/// as-is.
pub fn source_node(node: &ExprRef) -> ExprRef {
    match &node.kind {
        ExprKind::Marker { source, .. } => Arc::clone(source),
        _ => Arc::clone(node),
    }
}

/// Collapse nested same-operator nodes and single-child AND/OR wrappers.
///
/// Subtrees that need no change are shared with the input.
pub fn flatten(node: &ExprRef) -> ExprRef {
    match &node.kind {
        ExprKind::Term { .. } => Arc::clone(node),
        ExprKind::And(children) => flatten_junction(node, children, true),
        ExprKind::Or(children) => flatten_junction(node, children, false),
        ExprKind::Not(child) => {
            let flat = flatten(child);
            if Arc::ptr_eq(&flat, child) {
                Arc::clone(node)
            } else {
                Expr::not(flat)
            }
        }
        ExprKind::Marker { kind, source } => {
            let flat = flatten(source);
            if Arc::ptr_eq(&flat, source) {
                Arc::clone(node)
            } else {
                Expr::marker(*kind, flat)
            }
        }
    }
}

fn flatten_junction(node: &ExprRef, children: &[ExprRef], is_and: bool) -> ExprRef {
    let mut changed = false;
    let mut flat_children = Vec::with_capacity(children.len());

    for child in children {
        let flat = flatten(child);
        if !Arc::ptr_eq(&flat, child) {
            changed = true;
        }
        let same_op = if is_and { flat.is_and() } else { flat.is_or() };
        if same_op {
            changed = true;
            flat_children.extend(flat.children().into_iter().cloned());
        } else {
            flat_children.push(flat);
        }
    }

    if flat_children.len() == 1 {
        return flat_children.pop().unwrap_or_else(|| Arc::clone(node));
    }
    if !changed {
        return Arc::clone(node);
    }
    if is_and {
        Expr::and(flat_children)
    } else {
        Expr::or(flat_children)
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr({})", self.text)
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.text.hash(state);
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        self.text.cmp(&other.text)
    }
}
