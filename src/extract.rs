//! Hierarchical rule extraction.
//!
//! Extraction turns one word-aligned sentence pair into synchronous rules and
//! folds them into a corpus-wide, content-keyed rule set:
//!
//! ```text
//! AlignedSentence ── ConsistentPhraseIndex::from_sentence ──┐
//!                                                           │
//!                     RuleBuilder::extract_all (builder.rs) │
//!                       - seed from every span              ▼
//!                       - fresh rule per phrase      for each phrase:
//!                       - promote nested slots       create_rules ─▶ Rule (rule.rs)
//!                         left to right, recursively                   │ prevalidate
//!                                                                      │ create_target
//!                                                                      ▼
//!                                          RuleRegistry (registry.rs): kept arena
//!                                                                      │ consolidate
//!                                                                      ▼
//!                                         merged set keyed by RuleKey, counts summed
//! ```
//!
//! ## Responsibilities by module
//!
//! - `rule.rs`: one rule record, its structural checks (`Flaws`) and its
//!   target-side projection through the alignment.
//! - `builder.rs`: enumerates rule shapes for a phrase. Each shape is produced
//!   once because nonterminals are only ever added to the right of the last
//!   one.
//! - `registry.rs`: per-sentence arena of generated rules, count policies and
//!   the merged, ordered output set.
//!
//! Invalid rules are an expected outcome and are dropped with a trace event;
//! only input that contradicts its own alignment is reported as an error.

#[path = "extract/builder.rs"]
mod builder;
#[path = "extract/registry.rs"]
mod registry;
#[path = "extract/rule.rs"]
mod rule;
#[cfg(test)]
#[path = "extract/tests.rs"]
mod tests;

pub use builder::RuleBuilder;
pub use registry::{CountPolicy, Fractional, Indicator, RuleKey, RuleRegistry, parse_rule_line};
pub use rule::{Flaws, Rule, RuleId};
