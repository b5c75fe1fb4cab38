use super::context::StreamContext;
use super::info::IndexInfo;
use crate::expr::ExprRef;

/// One emitted planning entry: a shard or day key and what matched there
pub type IndexEntry = (String, IndexInfo);

/// A lazy, peekable, seekable sequence of entries in ascending key order.
///
/// Streams without live data still report a context and usually a node, so
/// a combining stream can decide what to do with them.
pub trait IndexStream: Send {
    fn has_next(&self) -> bool {
        self.peek().is_some()
    }

    fn peek(&self) -> Option<&IndexEntry>;

    fn next(&mut self) -> Option<IndexEntry>;

    /// Skip to the first entry at or after `target` (or the day covering
    /// it). Returns the new head key.
    fn seek(&mut self, target: &str) -> Option<String>;

    fn context(&self) -> StreamContext;

    /// The query fragment this stream stands for
    fn current_node(&self) -> Option<&ExprRef>;

    fn context_debug(&self) -> String {
        match self.current_node() {
            Some(node) => format!("{}: {}", self.context(), node),
            None => self.context().to_string(),
        }
    }
}

impl<S: IndexStream + ?Sized> IndexStream for Box<S> {
    fn has_next(&self) -> bool {
        (**self).has_next()
    }

    fn peek(&self) -> Option<&IndexEntry> {
        (**self).peek()
    }

    fn next(&mut self) -> Option<IndexEntry> {
        (**self).next()
    }

    fn seek(&mut self, target: &str) -> Option<String> {
        (**self).seek(target)
    }

    fn context(&self) -> StreamContext {
        (**self).context()
    }

    fn current_node(&self) -> Option<&ExprRef> {
        (**self).current_node()
    }

    fn context_debug(&self) -> String {
        (**self).context_debug()
    }
}

/// Drain a stream into a vector
pub fn collect_entries(stream: &mut dyn IndexStream) -> Vec<IndexEntry> {
    let mut entries = Vec::new();
    while let Some(entry) = stream.next() {
        entries.push(entry);
    }
    entries
}
