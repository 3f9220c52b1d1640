//! A single extracted rule and its validity checks.
//!
//! A rule is rooted at one consistent phrase. Its nonterminals are nested
//! slots of that phrase, kept in source order, so the source pattern of
//!
//! ```text
//! root:    A  B  C  D          slots: (1..=1), (3..=3)
//! source:  A [X,1] C [X,2]
//! ```
//!
//! is derived by walking the root span and replacing each slot with one
//! placeholder. The target pattern is built the same way over the root's
//! target span, with placeholders ordered by where their target spans fall;
//! the placeholder index always refers back to source order.
//!
//! Rules are immutable once built. A derived rule remembers its parent by
//! `RuleId` (an index into the registry arena) instead of pointing at it.

use crate::config::ExtractConfig;
use crate::sentence::{AlignedSentence, ConsistentPhrase, NonTermSlot};
use crate::{Span, Symbol, format_pattern};
use std::fmt;

/// Index of a rule in the registry arena of the sentence being extracted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleId(pub(crate) u32);

impl RuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags::bitflags! {
    /// Reasons a rule may not be kept.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Flaws: u16 {
        const TOO_MANY_NON_TERMS  = 1 << 0;
        const TOO_MANY_SYMBOLS    = 1 << 1;
        const HOLE_TOO_SMALL      = 1 << 2;
        const ADJACENT_NON_TERMS  = 1 << 3;
        const NON_TERM_FIRST_WORD = 1 << 4;
        const NO_TERMINAL         = 1 << 5;
        const NO_ALIGNED_WORD     = 1 << 6;
        const SPAN_TOO_WIDE       = 1 << 7;
        /// Slots overlap, leave the root, or an alignment link crosses a slot boundary.
        const MALFORMED           = 1 << 8;
    }
}

impl Flaws {
    /// Flaws that promoting a further nonterminal can still repair.
    pub const REPAIRABLE: Flaws = Flaws::TOO_MANY_SYMBOLS;

    pub fn blocks_recursion(self) -> bool {
        !self.difference(Self::REPAIRABLE).is_empty()
    }
}

/// What a word position of a pattern's span turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cover {
    Word(usize),
    Hole(usize),
}

/// Pattern built over one side of a rule.
struct Projection {
    symbols: Vec<Symbol>,
    /// One entry per word of the span.
    cover: Vec<Cover>,
    /// Pattern position of each nonterminal, by nonterminal index.
    holes: Vec<usize>,
}

/// Walk `span`, emitting words and one placeholder per hole.
///
/// `holes` are `(span, nonterminal index)` pairs and must be sorted by span
/// start. Returns `None` if a hole leaves `span` or two holes overlap.
fn project(span: Span, holes: &[(Span, usize)], words: &[String], labels: &[NonTermSlot]) -> Option<Projection> {
    let mut symbols = Vec::with_capacity(span.len());
    let mut cover = Vec::with_capacity(span.len());
    let mut hole_positions = vec![0; holes.len()];
    let mut next_hole = 0;
    let mut pos = span.start;

    while pos <= span.end {
        match holes.get(next_hole) {
            Some(&(hole, index)) if hole.start == pos => {
                if hole.end > span.end {
                    return None;
                }
                hole_positions[index] = symbols.len();
                symbols.push(Symbol::non_term(labels[index].label.as_str(), index));
                cover.extend(std::iter::repeat_n(Cover::Hole(index), hole.len()));
                pos = hole.end + 1;
                next_hole += 1;
            }
            Some(&(hole, _)) if hole.start < pos => return None,
            _ => {
                cover.push(Cover::Word(symbols.len()));
                symbols.push(Symbol::terminal(words[pos].as_str()));
                pos += 1;
            }
        }
    }

    if next_hole != holes.len() {
        return None;
    }

    Some(Projection { symbols, cover, holes: hole_positions })
}

/// A synchronous rule over one root phrase.
#[derive(Debug, Clone)]
pub struct Rule {
    parent: Option<RuleId>,
    root: Span,
    root_target: Span,
    lhs: String,
    non_terms: Vec<NonTermSlot>,
    source: Vec<Symbol>,
    source_cover: Vec<Cover>,
    source_holes: Vec<usize>,
    target: Vec<Symbol>,
    alignment: Vec<(usize, usize)>,
    flaws: Flaws,
    count: f64,
}

impl Rule {
    fn over(root: Span, root_target: Span, lhs: String, parent: Option<RuleId>, non_terms: Vec<NonTermSlot>) -> Self {
        Rule {
            parent,
            root,
            root_target,
            lhs,
            non_terms,
            source: Vec::new(),
            source_cover: Vec::new(),
            source_holes: Vec::new(),
            target: Vec::new(),
            alignment: Vec::new(),
            flaws: Flaws::empty(),
            count: 0.0,
        }
    }

    /// All-terminal rule covering `phrase`.
    pub(crate) fn fresh(phrase: &ConsistentPhrase) -> Self {
        Self::over(phrase.source, phrase.target, phrase.label.clone(), None, Vec::new())
    }

    /// `parent` with one more nonterminal, placed after its existing ones.
    pub(crate) fn extend(parent_id: RuleId, parent: &Rule, slot: &NonTermSlot) -> Self {
        let mut non_terms = Vec::with_capacity(parent.non_terms.len() + 1);
        non_terms.extend(parent.non_terms.iter().cloned());
        non_terms.push(slot.clone());

        Self::over(parent.root, parent.root_target, parent.lhs.clone(), Some(parent_id), non_terms)
    }

    /// Cheap source-side checks, then the source pattern itself.
    pub(crate) fn prevalidate(&mut self, config: &ExtractConfig, sentence: &AlignedSentence) {
        let mut flaws = Flaws::empty();

        if self.root.len() > config.max_span {
            flaws |= Flaws::SPAN_TOO_WIDE;
        }
        if self.non_terms.len() > config.max_non_terms {
            flaws |= Flaws::TOO_MANY_NON_TERMS;
        }

        for (i, nt) in self.non_terms.iter().enumerate() {
            if !self.root.strictly_contains(&nt.source) || !self.root_target.contains(&nt.target) {
                flaws |= Flaws::MALFORMED;
            }
            if nt.source.len() < config.min_hole_source {
                flaws |= Flaws::HOLE_TOO_SMALL;
            }
            if i > 0 {
                let prev = &self.non_terms[i - 1];
                if prev.source.end >= nt.source.start {
                    flaws |= Flaws::MALFORMED;
                } else if prev.source.end + 1 == nt.source.start && !config.non_term_consec_source {
                    flaws |= Flaws::ADJACENT_NON_TERMS;
                }
            }
        }

        let holes: Vec<(Span, usize)> = self.non_terms.iter().enumerate().map(|(k, nt)| (nt.source, k)).collect();
        match project(self.root, &holes, sentence.source(), &self.non_terms) {
            Some(projection) if !flaws.contains(Flaws::MALFORMED) => {
                self.source = projection.symbols;
                self.source_cover = projection.cover;
                self.source_holes = projection.holes;
            }
            _ => {
                self.flaws = flaws | Flaws::MALFORMED;
                return;
            }
        }

        if self.source.len() > config.max_symbols_source {
            flaws |= Flaws::TOO_MANY_SYMBOLS;
        }
        if !config.non_term_first_word && self.source.first().is_some_and(|s| !s.is_terminal()) {
            flaws |= Flaws::NON_TERM_FIRST_WORD;
        }

        let mut terminals = self
            .source_cover
            .iter()
            .enumerate()
            .filter(|(_, cover)| matches!(cover, Cover::Word(_)))
            .map(|(offset, _)| self.root.start + offset)
            .peekable();
        let any_terminal = terminals.peek().is_some();
        let any_aligned = terminals.any(|pos| !sentence.source_links(pos).is_empty());
        if !any_terminal {
            flaws |= Flaws::NO_TERMINAL;
        }
        if config.require_aligned_word && !any_aligned {
            flaws |= Flaws::NO_ALIGNED_WORD;
        }

        self.flaws = flaws;
    }

    /// Build the target pattern and the pattern-level alignment.
    ///
    /// Terminal links map word positions to pattern positions; each
    /// nonterminal contributes one link between its two placeholders.
    pub(crate) fn create_target(&mut self, sentence: &AlignedSentence) {
        if self.flaws.contains(Flaws::MALFORMED) {
            return;
        }

        let mut holes: Vec<(Span, usize)> = self.non_terms.iter().enumerate().map(|(k, nt)| (nt.target, k)).collect();
        holes.sort_unstable();

        let Some(projection) = project(self.root_target, &holes, sentence.target(), &self.non_terms) else {
            self.flaws |= Flaws::MALFORMED;
            return;
        };

        let mut alignment = Vec::new();
        for &(s, t) in sentence.alignment() {
            let in_source = self.root.contains_pos(s);
            let in_target = self.root_target.contains_pos(t);
            if in_source != in_target {
                self.flaws |= Flaws::MALFORMED;
                return;
            }
            if !in_source {
                continue;
            }

            match (self.source_cover[s - self.root.start], projection.cover[t - self.root_target.start]) {
                (Cover::Word(i), Cover::Word(j)) => alignment.push((i, j)),
                (Cover::Hole(a), Cover::Hole(b)) if a == b => {}
                _ => {
                    self.flaws |= Flaws::MALFORMED;
                    return;
                }
            }
        }
        for (k, &target_pos) in projection.holes.iter().enumerate() {
            alignment.push((self.source_holes[k], target_pos));
        }
        alignment.sort_unstable();

        self.target = projection.symbols;
        self.alignment = alignment;
    }

    pub fn is_valid(&self) -> bool {
        self.flaws.is_empty()
    }

    /// Whether extension may promote one more slot.
    pub fn can_recurse(&self, config: &ExtractConfig) -> bool {
        !self.flaws.blocks_recursion()
            && self.non_terms.len() < config.max_non_terms
            && self.next_source_pos() <= self.root.end
    }

    /// First source position a new nonterminal may start at.
    ///
    /// Nonterminals are only added left to right, so this is just past the
    /// last one (or the root start when there is none).
    pub fn next_source_pos(&self) -> usize {
        self.non_terms.last().map(|nt| nt.source.end + 1).unwrap_or(self.root.start)
    }

    pub fn parent(&self) -> Option<RuleId> {
        self.parent
    }

    pub fn root(&self) -> Span {
        self.root
    }

    pub fn root_target(&self) -> Span {
        self.root_target
    }

    pub fn lhs(&self) -> &str {
        &self.lhs
    }

    pub fn non_terms(&self) -> &[NonTermSlot] {
        &self.non_terms
    }

    pub fn source(&self) -> &[Symbol] {
        &self.source
    }

    pub fn target(&self) -> &[Symbol] {
        &self.target
    }

    pub fn alignment(&self) -> &[(usize, usize)] {
        &self.alignment
    }

    pub fn flaws(&self) -> Flaws {
        self.flaws
    }

    pub fn count(&self) -> f64 {
        self.count
    }

    pub fn set_count(&mut self, count: f64) {
        self.count = count;
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} → {}", format_pattern(&self.source), format_pattern(&self.target))
    }
}
