//! The staged match-and-rank pipeline and its supporting pieces.
//!
//! - [`pipeline`] - stage ordering, short-circuiting, dedup, final sort
//! - [`semantic`] - stage 3 backends: embedding similarity and vision re-analysis
//! - [`format`] - maps ranked candidates to the external result shape

pub mod format;
pub mod pipeline;
pub mod semantic;
