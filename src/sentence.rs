//! Word-aligned sentence pairs and the consistent-phrase index over them.
//!
//! A source span and a target span are *consistent* when every alignment link
//! touching one of them stays inside the other. Rule extraction only ever
//! starts from, and only ever carves holes out of, consistent phrases.
//!
//! ```text
//!  source:  A   B   C
//!           |    \ /
//!  target:  a     b        links A-a, B-b, C-b
//!
//!  consistent: (A | a), (B C | b), (A B C | a b)
//!  not:        (B | b)  because C-b leaves the source span
//! ```
//!
//! The index is normally computed here from the alignment, but it can also be
//! populated by hand (`ConsistentPhraseIndex::insert`) when an upstream
//! component already knows which phrases and holes to use.

use crate::config::ExtractConfig;
use crate::{Error, Result, Span};

/// Label given to nonterminals when nothing more specific is known.
pub const DEFAULT_LABEL: &str = "X";

/// Source/target tokens plus the word alignment between them.
#[derive(Debug, Clone)]
pub struct AlignedSentence {
    id: usize,
    source: Vec<String>,
    target: Vec<String>,
    alignment: Vec<(usize, usize)>,
    source_links: Vec<Vec<usize>>,
    target_links: Vec<Vec<usize>>,
}

impl AlignedSentence {
    /// Build a sentence from tokens and `(source, target)` links.
    ///
    /// Links pointing outside either side are rejected as malformed input.
    pub fn new(
        id: usize,
        source: Vec<String>,
        target: Vec<String>,
        mut alignment: Vec<(usize, usize)>,
    ) -> Result<Self> {
        if let Some(&(s, t)) = alignment.iter().find(|(s, t)| *s >= source.len() || *t >= target.len()) {
            return Err(Error::MalformedInput {
                line: id,
                message: format!(
                    "alignment link {s}-{t} is out of range ({} source, {} target tokens)",
                    source.len(),
                    target.len()
                ),
            });
        }

        alignment.sort_unstable();
        alignment.dedup();

        let mut source_links = vec![Vec::new(); source.len()];
        let mut target_links = vec![Vec::new(); target.len()];
        for &(s, t) in &alignment {
            source_links[s].push(t);
            target_links[t].push(s);
        }

        Ok(AlignedSentence { id, source, target, alignment, source_links, target_links })
    }

    /// Parse whitespace-tokenised text and a Pharaoh alignment (`0-0 1-2 ...`).
    pub fn parse(id: usize, source: &str, target: &str, alignment: &str) -> Result<Self> {
        let source: Vec<String> = source.split_whitespace().map(str::to_string).collect();
        let target: Vec<String> = target.split_whitespace().map(str::to_string).collect();

        let mut links: Vec<(usize, usize)> = Vec::new();
        for item in alignment.split_whitespace() {
            let link: Option<(usize, usize)> = regex!(r"^(\d+)-(\d+)$")
                .captures(item)
                .and_then(|caps| Some((caps.get(1)?.as_str().parse().ok()?, caps.get(2)?.as_str().parse().ok()?)));
            match link {
                Some(link) => links.push(link),
                None => {
                    return Err(Error::MalformedInput {
                        line: id,
                        message: format!("cannot read alignment link '{item}'"),
                    });
                }
            }
        }

        Self::new(id, source, target, links)
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn source(&self) -> &[String] {
        &self.source
    }

    pub fn target(&self) -> &[String] {
        &self.target
    }

    /// Sorted, de-duplicated `(source, target)` links.
    pub fn alignment(&self) -> &[(usize, usize)] {
        &self.alignment
    }

    /// Target positions linked to source position `pos`.
    pub fn source_links(&self, pos: usize) -> &[usize] {
        &self.source_links[pos]
    }

    /// Source positions linked to target position `pos`.
    pub fn target_links(&self, pos: usize) -> &[usize] {
        &self.target_links[pos]
    }

    /// Smallest target span holding every link out of `source`, if any.
    pub fn target_projection(&self, source: Span) -> Option<Span> {
        let mut linked = source.positions().flat_map(|s| self.source_links[s].iter().copied());
        let first = linked.next()?;
        let (min, max) = linked.fold((first, first), |(lo, hi), t| (lo.min(t), hi.max(t)));
        Some(Span::new(min, max))
    }

    /// True when no link crosses the boundary of either span.
    pub fn is_consistent(&self, source: Span, target: Span) -> bool {
        if source.end >= self.source.len() || target.end >= self.target.len() {
            return false;
        }
        let source_ok = source.positions().all(|s| self.source_links[s].iter().all(|t| target.contains_pos(*t)));
        let target_ok = target.positions().all(|t| self.target_links[t].iter().all(|s| source.contains_pos(*s)));
        source_ok && target_ok
    }
}

/// A consistent sub-phrase that may be replaced by a nonterminal inside a
/// larger rule.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NonTermSlot {
    pub source: Span,
    pub target: Span,
    pub label: String,
}

impl NonTermSlot {
    pub fn new(source: Span, target: Span) -> Self {
        NonTermSlot { source, target, label: DEFAULT_LABEL.to_string() }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }
}

/// A consistent span pair together with the holes that may be cut into it.
#[derive(Debug, Clone)]
pub struct ConsistentPhrase {
    pub source: Span,
    pub target: Span,
    /// Left-hand-side label of rules rooted here.
    pub label: String,
    /// Promotion candidates, ordered by `(start, end)` of their source span.
    pub slots: Vec<NonTermSlot>,
    /// Alignment links with both ends inside the phrase.
    pub alignment: Vec<(usize, usize)>,
}

impl ConsistentPhrase {
    pub fn new(sentence: &AlignedSentence, source: Span, target: Span) -> Self {
        let alignment = sentence
            .alignment()
            .iter()
            .copied()
            .filter(|(s, t)| source.contains_pos(*s) && target.contains_pos(*t))
            .collect();

        ConsistentPhrase { source, target, label: DEFAULT_LABEL.to_string(), slots: Vec::new(), alignment }
    }

    /// Add a promotion candidate, keeping slots in source order.
    pub fn add_slot(&mut self, slot: NonTermSlot) {
        let pos = self.slots.partition_point(|s| (s.source, s.target) <= (slot.source, slot.target));
        self.slots.insert(pos, slot);
    }

    pub fn with_slot(mut self, slot: NonTermSlot) -> Self {
        self.add_slot(slot);
        self
    }
}

/// All consistent phrases of one sentence, addressable by source span.
#[derive(Debug, Clone, Default)]
pub struct ConsistentPhraseIndex {
    len: usize,
    cells: Vec<Vec<ConsistentPhrase>>,
}

impl ConsistentPhraseIndex {
    /// Empty index for a source sentence of `len` tokens.
    pub fn new(len: usize) -> Self {
        ConsistentPhraseIndex { len, cells: vec![Vec::new(); len * len] }
    }

    /// Compute every tight consistent phrase up to `max_span` source tokens.
    ///
    /// Each phrase receives every strictly smaller consistent phrase nested in
    /// it as a promotion candidate.
    pub fn from_sentence(sentence: &AlignedSentence, config: &ExtractConfig) -> Self {
        let len = sentence.source().len();
        let mut index = Self::new(len);

        let mut found: Vec<(Span, Span)> = Vec::new();
        for start in 0..len {
            for end in start..len.min(start + config.max_span) {
                let source = Span::new(start, end);
                if let Some(target) = sentence.target_projection(source) {
                    if sentence.is_consistent(source, target) {
                        found.push((source, target));
                    }
                }
            }
        }

        for &(source, target) in &found {
            let mut phrase = ConsistentPhrase::new(sentence, source, target);
            phrase.slots = found
                .iter()
                .filter(|(inner, _)| source.strictly_contains(inner))
                .map(|&(inner, inner_target)| NonTermSlot::new(inner, inner_target))
                .collect();
            let cell = index.cell_index(source.start, source.end);
            index.cells[cell].push(phrase);
        }

        tracing::trace!(sentence = sentence.id(), phrases = found.len(), "consistent phrases indexed");

        index
    }

    /// Number of source tokens the index covers.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn cell_index(&self, start: usize, end: usize) -> usize {
        start * self.len + end
    }

    fn check(&self, start: usize, end: usize) -> Result<usize> {
        if start > end || end >= self.len {
            return Err(Error::SpanOutOfRange { span: Span { start, end }, len: self.len });
        }
        Ok(self.cell_index(start, end))
    }

    pub fn insert(&mut self, phrase: ConsistentPhrase) -> Result<()> {
        let cell = self.check(phrase.source.start, phrase.source.end)?;
        self.cells[cell].push(phrase);
        Ok(())
    }

    /// Phrases whose source side is exactly `start..=end`.
    pub fn lookup(&self, start: usize, end: usize) -> Result<&[ConsistentPhrase]> {
        let cell = self.check(start, end)?;
        Ok(&self.cells[cell])
    }

    /// Every phrase, ordered by source span.
    pub fn iter(&self) -> impl Iterator<Item = &ConsistentPhrase> {
        self.cells.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crossing() -> AlignedSentence {
        // A B C -> a b, with B and C both on b.
        AlignedSentence::parse(0, "A B C", "a b", "0-0 1-1 2-1").unwrap()
    }

    #[test]
    fn parse_reads_tokens_and_links() {
        let sentence = AlignedSentence::parse(3, "das Haus", "the house", "1-1 0-0 0-0").unwrap();

        assert_eq!(sentence.id(), 3);
        assert_eq!(sentence.source(), ["das", "Haus"]);
        assert_eq!(sentence.alignment(), [(0, 0), (1, 1)]);
        assert_eq!(sentence.source_links(1), [1]);
        assert_eq!(sentence.target_links(0), [0]);
    }

    #[test]
    fn malformed_alignment_is_sentence_scoped() {
        let err = AlignedSentence::parse(7, "A B", "a b", "0-0 1:1").unwrap_err();
        assert!(err.is_sentence_scoped());
        assert!(err.to_string().contains("1:1"), "{err}");

        let err = AlignedSentence::parse(7, "A B", "a b", "0-0 1-5").unwrap_err();
        assert!(matches!(err, Error::MalformedInput { line: 7, .. }));
    }

    #[test]
    fn consistency_respects_crossing_links() {
        let sentence = crossing();

        assert!(sentence.is_consistent(Span::new(0, 0), Span::new(0, 0)));
        assert!(!sentence.is_consistent(Span::new(1, 1), Span::new(1, 1)));
        assert!(sentence.is_consistent(Span::new(1, 2), Span::new(1, 1)));
        assert_eq!(sentence.target_projection(Span::new(1, 2)), Some(Span::new(1, 1)));
    }

    #[test]
    fn index_lists_phrases_and_nested_slots() {
        let sentence = crossing();
        let index = ConsistentPhraseIndex::from_sentence(&sentence, &ExtractConfig::default());

        let spans: Vec<Span> = index.iter().map(|p| p.source).collect();
        assert_eq!(spans, vec![Span::new(0, 0), Span::new(0, 2), Span::new(1, 2)]);

        let whole = &index.lookup(0, 2).unwrap()[0];
        assert_eq!(whole.target, Span::new(0, 1));
        let slots: Vec<Span> = whole.slots.iter().map(|s| s.source).collect();
        assert_eq!(slots, vec![Span::new(0, 0), Span::new(1, 2)]);
        assert_eq!(whole.alignment, vec![(0, 0), (1, 1), (2, 1)]);

        assert!(index.lookup(1, 1).unwrap().is_empty());
    }

    #[test]
    fn max_span_limits_phrases() {
        let sentence = crossing();
        let config = ExtractConfig { max_span: 1, ..ExtractConfig::default() };
        let index = ConsistentPhraseIndex::from_sentence(&sentence, &config);

        assert_eq!(index.iter().count(), 1);
    }

    #[test]
    fn out_of_range_lookup_is_an_error() {
        let index = ConsistentPhraseIndex::new(2);

        assert!(matches!(index.lookup(0, 2), Err(Error::SpanOutOfRange { len: 2, .. })));
        assert!(index.lookup(1, 0).is_err());
        assert!(index.lookup(1, 1).unwrap().is_empty());
    }

    #[test]
    fn slots_stay_in_source_order() {
        let sentence = AlignedSentence::parse(0, "A B C", "a b c", "0-0 1-1 2-2").unwrap();
        let phrase = ConsistentPhrase::new(&sentence, Span::new(0, 2), Span::new(0, 2))
            .with_slot(NonTermSlot::new(Span::new(2, 2), Span::new(2, 2)))
            .with_slot(NonTermSlot::new(Span::new(0, 1), Span::new(0, 1)))
            .with_slot(NonTermSlot::new(Span::new(0, 0), Span::new(0, 0)));

        let order: Vec<Span> = phrase.slots.iter().map(|s| s.source).collect();
        assert_eq!(order, vec![Span::new(0, 0), Span::new(0, 1), Span::new(2, 2)]);
    }
}
