//! Shared helpers.
//!
//! - [`encoding`] - varints and a bounds-checked slice reader for the wire
//!   formats of matches, summaries and fragments

pub mod encoding;
