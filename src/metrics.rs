//! Run metrics.
//!
//! Extraction and decoding both keep a few counters and timings so a run can
//! be inspected without turning on trace logging:
//!
//! - [`ExtractMetrics`] aggregates over every sentence passed to extraction.
//! - [`DecodeMetrics`] covers one decoded sentence, with one [`PassMetrics`]
//!   per span length (the chart is filled one length at a time).
//!
//! Collection is cheap and always on; nothing here allocates per candidate.

use std::time::Duration;

// --- Extraction ---------------------------------------------------------------

#[derive(Debug, Default, Clone)]
pub struct ExtractMetrics {
    /// Wall time spent generating and consolidating rules.
    pub total: Duration,
    /// Sentences that produced rules.
    pub sentences: usize,
    /// Sentences skipped because their input was malformed.
    pub skipped: usize,
    /// Consistent phrases used as rule roots.
    pub phrases: usize,
    /// Rules built, valid or not.
    pub generated: usize,
    /// Rules that passed validation and were kept for consolidation.
    pub kept: usize,
}

impl ExtractMetrics {
    /// Rules rejected by validation.
    pub fn dropped(&self) -> usize {
        self.generated - self.kept
    }

    pub(crate) fn absorb(&mut self, other: &ExtractMetrics) {
        self.total += other.total;
        self.sentences += other.sentences;
        self.skipped += other.skipped;
        self.phrases += other.phrases;
        self.generated += other.generated;
        self.kept += other.kept;
    }
}

// --- Decoding -------------------------------------------------------------------

/// Timing and counters for one decoded sentence.
#[derive(Debug, Default, Clone)]
pub struct DecodeMetrics {
    /// Total elapsed time for the sentence.
    pub total: Duration,
    /// One entry per span length, shortest first.
    pub passes: Vec<PassMetrics>,
}

impl DecodeMetrics {
    pub fn pops(&self) -> usize {
        self.passes.iter().map(|p| p.pops).sum()
    }

    pub fn options_admitted(&self) -> usize {
        self.passes.iter().map(|p| p.options_admitted).sum()
    }
}

/// Work done while filling every chart cell of one span length.
#[derive(Debug, Default, Clone)]
pub struct PassMetrics {
    /// Span length of the cells filled in this pass.
    pub span_len: usize,
    /// Elapsed time for the pass.
    pub duration: Duration,
    /// Cells that ended up with at least one derivation.
    pub filled_cells: usize,
    /// Candidates returned by the phrase table.
    pub options_seen: usize,
    /// Candidates admitted into an option list.
    pub options_admitted: usize,
    /// Derivations popped off cube frontiers.
    pub pops: usize,
}
