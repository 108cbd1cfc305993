//! Cross-dataset matching of clusters to a canonical group list.
//!
//! Records stream through in fixed-size chunks. The first member seen for a
//! cluster decides its group; the decision is cached in a [`MatchContext`]
//! and reused for every later member of the same cluster.

pub mod context;
pub mod matcher;
pub mod reference;

pub use context::MatchContext;
pub use matcher::{GroupMatcher, MatchInput};
pub use reference::{dedup_reference, reference_from_rows};

#[cfg(test)]
mod tests;
