//! Name canonicalization for counterparty records.
//!
//! Passes, repeated until the text settles:
//! 1. Truncation at care-of markers
//! 2. Noise substring removal (legal-entity tags, cash-sale placeholders)
//! 3. Fixed rewrites (`REINSURANCE` -> `RE`)
//! 4. Punctuation stripping
//! 5. Whitespace trimming
//!
//! Then the first matching alias marker maps the name to its fixed label.

pub mod canonicalizer;
pub mod noise_terms;
pub mod rules;

pub use canonicalizer::Canonicalizer;
pub use noise_terms::{standardize_name, suggest_noise_terms, tfidf_scores};
pub use rules::{load_noise_list, AliasRule, Replacement, RuleSpec, RuleTable};
