//! Per-span translation option lists.
//!
//! Candidates for one span arrive unordered from the phrase table. The
//! builder keeps at most `rule_limit` of them with a two-phase policy:
//!
//! ```text
//! len < L        admit, threshold = min(threshold, estimate)
//! len >= L       admit only if estimate > threshold      (O(1) reject)
//! len > 2L       select the L best, drop the rest,
//!                threshold = worst kept estimate
//! ```
//!
//! so the expensive reordering runs once per `L` admissions at most.

use crate::{Span, Symbol};
use std::cmp::Ordering;

/// Index of an option in the per-sentence [`OptionArena`](crate::decode::OptionArena).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct OptionId(pub(crate) u32);

impl OptionId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A candidate target pattern for one span.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredOption {
    pub span: Span,
    pub lhs: String,
    /// Target pattern. `NonTerm { index }` refers to `slots[index]`.
    pub target: Vec<Symbol>,
    /// Sub-spans covered by nonterminals, in source order.
    pub slots: Vec<Span>,
    /// Rule score on its own.
    pub score: f32,
    /// `score` plus the best derivation score of every slot.
    pub estimate: f32,
}

impl ScoredOption {
    pub fn new(span: Span, lhs: impl Into<String>, target: Vec<Symbol>, slots: Vec<Span>, score: f32) -> Self {
        ScoredOption { span, lhs: lhs.into(), target, slots, score, estimate: score }
    }

    /// Option without nonterminals.
    pub fn phrase(span: Span, target: Vec<Symbol>, score: f32) -> Self {
        Self::new(span, crate::sentence::DEFAULT_LABEL, target, Vec::new(), score)
    }
}

/// Best estimate first; ties resolved on content so the order is reproducible.
pub(crate) fn by_estimate(a: &ScoredOption, b: &ScoredOption) -> Ordering {
    b.estimate
        .total_cmp(&a.estimate)
        .then_with(|| a.slots.cmp(&b.slots))
        .then_with(|| a.target.cmp(&b.target))
        .then_with(|| a.lhs.cmp(&b.lhs))
}

/// View of the chart cells that are already final.
pub trait FinalizedCells {
    /// Number of derivations in the cell for `span`, `None` while it is still open.
    fn finalized_len(&self, span: Span) -> Option<usize>;
}

/// An option whose slots have been bound to finalized cells.
#[derive(Debug, Clone)]
pub struct BoundOption {
    pub option: ScoredOption,
    /// Derivations available for each slot, in slot order.
    pub dims: Vec<usize>,
}

/// Final, best-first option list of one span.
#[derive(Debug, Clone)]
pub struct OptionList {
    pub span: Span,
    pub options: Vec<BoundOption>,
}

impl OptionList {
    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct OptionListBuilder {
    span: Span,
    options: Vec<ScoredOption>,
    threshold: f32,
}

impl OptionListBuilder {
    pub fn new(span: Span) -> Self {
        OptionListBuilder { span, options: Vec::new(), threshold: f32::INFINITY }
    }

    pub fn span(&self) -> Span {
        self.span
    }

    /// Current admission bound. `+inf` until the first admission.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Offer a candidate. Returns whether it was admitted.
    pub fn add(&mut self, candidate: ScoredOption, rule_limit: usize) -> bool {
        debug_assert_eq!(candidate.span, self.span);

        if self.options.len() < rule_limit {
            self.threshold = self.threshold.min(candidate.estimate);
            self.options.push(candidate);
        } else if candidate.estimate > self.threshold {
            self.options.push(candidate);
        } else {
            return false;
        }

        if self.options.len() > rule_limit * 2 {
            self.compact(rule_limit);
        }

        true
    }

    /// Keep the `limit` best options and raise the threshold to the worst of them.
    fn compact(&mut self, limit: usize) {
        self.select(limit);
        self.threshold = self.options.iter().map(|o| o.estimate).reduce(f32::min).unwrap_or(f32::INFINITY);

        tracing::trace!(span = %self.span, kept = self.options.len(), threshold = self.threshold, "option list compacted");
    }

    fn select(&mut self, limit: usize) {
        if self.options.len() > limit {
            if limit > 0 {
                self.options.select_nth_unstable_by(limit, by_estimate);
            }
            self.options.truncate(limit);
        }
    }

    /// Cut to `rule_limit` and bind every slot to its finalized cell.
    ///
    /// Options with a slot whose cell holds no derivation are dropped.
    ///
    /// # Panics
    ///
    /// If a slot refers to a cell that is not finalized yet.
    pub fn finalize(mut self, rule_limit: usize, cells: &impl FinalizedCells) -> OptionList {
        self.select(rule_limit);
        self.options.sort_by(by_estimate);

        let mut options = Vec::with_capacity(self.options.len());
        for option in self.options {
            let dims: Vec<usize> = option
                .slots
                .iter()
                .map(|&slot| match cells.finalized_len(slot) {
                    Some(len) => len,
                    None => panic!("option list for {} finalized before its child cell {slot}", self.span),
                })
                .collect();

            if dims.iter().all(|&len| len > 0) {
                options.push(BoundOption { option, dims });
            }
        }

        OptionList { span: self.span, options }
    }
}

/// Single-cut pruning for plain phrase lists.
///
/// Drops every option whose estimate is more than `beam_width` below the best
/// one, then sorts the rest best first.
pub fn prune_flat(mut options: Vec<ScoredOption>, beam_width: f32) -> Vec<ScoredOption> {
    let Some(best) = options.iter().map(|o| o.estimate).reduce(f32::max) else {
        return options;
    };
    let threshold = best - beam_width;

    options.retain(|o| o.estimate >= threshold);
    options.sort_by(by_estimate);
    options
}
