//! Error type shared by the planning and evaluation layers.
//!
//! Every failure surfaced here is a local contract violation or malformed
//! input. Nothing in this crate performs I/O against the store, so there is
//! no retry policy at this layer.

use crate::index::StreamContext;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// `next`/`move_to` was called before `initialize`
    #[error("initialize() was never called")]
    NotInitialized,

    /// `move_to` was asked to go to or behind the last emitted value
    #[error("tried to move when already at or beyond move point: topkey={previous}, movekey={minimum}")]
    MoveBackwards { previous: String, minimum: String },

    #[error("builder already built a union")]
    BuilderAlreadyBuilt,

    /// A child stream was still in a state that should never reach a merge
    #[error("invalid stream context {0} for a child stream")]
    InvalidStreamContext(StreamContext),

    #[error("{0} is not supported")]
    Unsupported(&'static str),

    /// A deferred iterator has no cursor of its own
    #[error("a deferred iterator can only be evaluated against a candidate")]
    CandidateRequired,

    #[error("malformed input: {0}")]
    Decode(String),

    #[error("scanner initialization failed: {0}")]
    Initialization(String),
}

impl Error {
    pub(crate) fn decode(context: impl Into<String>) -> Self {
        Error::Decode(context.into())
    }

    pub(crate) fn move_backwards<T: std::fmt::Debug>(previous: &T, minimum: &T) -> Self {
        Error::MoveBackwards {
            previous: format!("{:?}", previous),
            minimum: format!("{:?}", minimum),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
