use super::context::StreamContext;
use super::shard;
use super::stream::{IndexEntry, IndexStream};
use crate::expr::ExprRef;
use std::fmt;

type EntrySource = Box<dyn Iterator<Item = IndexEntry> + Send>;

/// Leaf stream over an ordered source of entries.
///
/// Whatever feeds it (a store scan, a fixture) must already yield keys in
/// ascending order.
pub struct ScannerStream {
    source: EntrySource,
    head: Option<IndexEntry>,
    context: StreamContext,
    node: Option<ExprRef>,
}

impl ScannerStream {
    /// `PRESENT` if the source yields anything, otherwise `ABSENT`
    pub fn with_data<I>(entries: I, node: ExprRef) -> Self
    where
        I: IntoIterator<Item = IndexEntry>,
        I::IntoIter: Send + 'static,
    {
        let mut stream = Self {
            source: Box::new(entries.into_iter()),
            head: None,
            context: StreamContext::Present,
            node: Some(node),
        };
        stream.advance();
        if stream.head.is_none() {
            stream.context = StreamContext::Absent;
        }
        stream
    }

    fn empty(context: StreamContext, node: ExprRef) -> Self {
        Self {
            source: Box::new(std::iter::empty()),
            head: None,
            context,
            node: Some(node),
        }
    }

    pub fn no_data(node: ExprRef) -> Self {
        Self::empty(StreamContext::Absent, node)
    }

    pub fn unindexed(node: ExprRef) -> Self {
        Self::empty(StreamContext::Unindexed, node)
    }

    pub fn delayed(node: ExprRef) -> Self {
        Self::empty(StreamContext::DelayedField, node)
    }

    pub fn ignored(node: ExprRef) -> Self {
        Self::empty(StreamContext::Ignored, node)
    }

    pub fn variable(node: ExprRef) -> Self {
        Self::empty(StreamContext::Variable, node)
    }

    pub fn unknown_field(node: ExprRef) -> Self {
        Self::empty(StreamContext::UnknownField, node)
    }

    pub fn exceeded_term_threshold(node: ExprRef) -> Self {
        Self::empty(StreamContext::ExceededTermThreshold, node)
    }

    pub fn no_op(node: ExprRef) -> Self {
        Self::empty(StreamContext::NoOp, node)
    }

    pub fn initialized(node: ExprRef) -> Self {
        Self::empty(StreamContext::Initialized, node)
    }

    /// Empty stream for an arbitrary context
    pub fn with_context(context: StreamContext, node: ExprRef) -> Self {
        Self::empty(context, node)
    }

    fn advance(&mut self) {
        self.head = self.source.next().map(|(key, mut info)| {
            if info.node().is_none() {
                if let Some(node) = &self.node {
                    info.apply_node(ExprRef::clone(node));
                }
            }
            (key, info)
        });
    }
}

impl IndexStream for ScannerStream {
    fn peek(&self) -> Option<&IndexEntry> {
        self.head.as_ref()
    }

    fn next(&mut self) -> Option<IndexEntry> {
        let entry = self.head.take()?;
        self.advance();
        Some(entry)
    }

    fn seek(&mut self, target: &str) -> Option<String> {
        let target = shard::normalize_seek(target);
        while let Some((key, _)) = &self.head {
            if shard::greater_than_or_equal(key, target) || shard::matches(key, target) {
                break;
            }
            self.advance();
        }
        self.head.as_ref().map(|(key, _)| key.clone())
    }

    fn context(&self) -> StreamContext {
        self.context
    }

    fn current_node(&self) -> Option<&ExprRef> {
        self.node.as_ref()
    }
}

impl fmt::Debug for ScannerStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScannerStream")
            .field("context", &self.context)
            .field("head", &self.head.as_ref().map(|(key, _)| key))
            .field("node", &self.node)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;
    use crate::index::IndexInfo;

    fn entries(keys: &[&str]) -> Vec<IndexEntry> {
        keys.iter().map(|k| (k.to_string(), IndexInfo::infinite())).collect()
    }

    #[test]
    fn test_context_from_data() {
        let present = ScannerStream::with_data(entries(&["20200101_0"]), Expr::eq("A", "1"));
        assert_eq!(present.context(), StreamContext::Present);

        let absent = ScannerStream::with_data(Vec::new(), Expr::eq("A", "1"));
        assert_eq!(absent.context(), StreamContext::Absent);
        assert!(!absent.has_next());
    }

    #[test]
    fn test_applies_node_to_entries() {
        let mut stream = ScannerStream::with_data(entries(&["20200101_0"]), Expr::eq("A", "1"));
        let (_, info) = stream.next().unwrap();
        assert_eq!(info.node().unwrap().text(), "A == '1'");
    }

    #[test]
    fn test_seek_stops_on_covering_day() {
        let mut stream = ScannerStream::with_data(
            entries(&["20200101_0", "20200102", "20200103_1"]),
            Expr::eq("A", "1"),
        );
        assert_eq!(stream.seek("20200102_4"), Some("20200102".to_string()));
        assert_eq!(stream.seek("20200102_"), Some("20200102".to_string()));
        assert_eq!(stream.seek("20200103_0"), Some("20200103_1".to_string()));
        assert_eq!(stream.seek("20200104"), None);
    }

    #[test]
    fn test_context_debug() {
        let stream = ScannerStream::unindexed(Expr::eq("A", "1"));
        assert_eq!(stream.context_debug(), "UNINDEXED: A == '1'");
    }
}
