use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a stream does or does not have live data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamContext {
    /// Data is available now
    Present,
    /// The term does not occur in the index
    Absent,
    /// The field is never indexed; evaluate against the document
    DelayedField,
    /// Some children present, some delayed
    Variable,
    /// Field is not indexed at all
    Unindexed,
    /// Deliberately skipped during planning
    Ignored,
    /// Field is not known to the data dictionary
    UnknownField,
    /// Too many expansions; evaluate against the document
    ExceededTermThreshold,
    /// Contributes nothing to the plan
    NoOp,
    /// Created but never given a context
    Initialized,
}

impl StreamContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            StreamContext::Present => "PRESENT",
            StreamContext::Absent => "ABSENT",
            StreamContext::DelayedField => "DELAYED_FIELD",
            StreamContext::Variable => "VARIABLE",
            StreamContext::Unindexed => "UNINDEXED",
            StreamContext::Ignored => "IGNORED",
            StreamContext::UnknownField => "UNKNOWN_FIELD",
            StreamContext::ExceededTermThreshold => "EXCEEDED_TERM_THRESHOLD",
            StreamContext::NoOp => "NO_OP",
            StreamContext::Initialized => "INITIALIZED",
        }
    }

    /// Contexts whose node is kept as a delayed predicate by a combining stream
    pub fn is_delayed(&self) -> bool {
        matches!(
            self,
            StreamContext::DelayedField
                | StreamContext::Variable
                | StreamContext::Unindexed
                | StreamContext::Ignored
                | StreamContext::UnknownField
                | StreamContext::ExceededTermThreshold
        )
    }
}

impl fmt::Display for StreamContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_matches_serde_name() {
        for context in [
            StreamContext::Present,
            StreamContext::DelayedField,
            StreamContext::ExceededTermThreshold,
            StreamContext::NoOp,
        ] {
            let json = serde_json::to_string(&context).unwrap();
            assert_eq!(json, format!("\"{}\"", context));
        }
    }

    #[test]
    fn test_delayed_contexts() {
        assert!(StreamContext::Ignored.is_delayed());
        assert!(!StreamContext::Absent.is_delayed());
        assert!(!StreamContext::NoOp.is_delayed());
        assert!(!StreamContext::Initialized.is_delayed());
    }
}
