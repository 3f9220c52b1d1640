//! Per-sentence chart and option arena.
//!
//! Everything built while decoding one sentence lives here and is dropped
//! together: options are owned by the [`OptionArena`] and referred to by
//! [`OptionId`], derivations refer to their children by `(span, rank)`.

use crate::decode::{FinalizedCells, OptionId, ScoredOption};
use crate::{Error, Result, Span, Symbol};

#[derive(Debug, Default, Clone)]
pub struct OptionArena {
    options: Vec<ScoredOption>,
}

impl OptionArena {
    pub fn push(&mut self, option: ScoredOption) -> OptionId {
        let id = OptionId(self.options.len() as u32);
        self.options.push(option);
        id
    }

    pub fn get(&self, id: OptionId) -> &ScoredOption {
        &self.options[id.index()]
    }

    pub fn len(&self) -> usize {
        self.options.len()
    }

    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }
}

/// One way of building a span: an option plus a derivation for each slot.
#[derive(Debug, Clone)]
pub struct Derivation<S> {
    pub option: OptionId,
    /// `(slot span, rank in that cell)`, in slot order.
    pub children: Vec<(Span, usize)>,
    pub score: f32,
    /// Scorer state handed to parents.
    pub state: S,
}

#[derive(Debug, Clone)]
pub struct Chart<S> {
    len: usize,
    /// `None` until the cell is finalized. Indexed by `start * len + end`.
    cells: Vec<Option<Vec<Derivation<S>>>>,
    options: OptionArena,
}

impl<S> Chart<S> {
    pub fn new(len: usize) -> Self {
        let mut cells = Vec::with_capacity(len * len);
        cells.resize_with(len * len, || None);
        Chart { len, cells, options: OptionArena::default() }
    }

    /// Number of source tokens.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn options(&self) -> &OptionArena {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut OptionArena {
        &mut self.options
    }

    fn index(&self, span: Span) -> Result<usize> {
        if span.start > span.end || span.end >= self.len {
            return Err(Error::SpanOutOfRange { span, len: self.len });
        }
        Ok(span.start * self.len + span.end)
    }

    pub fn is_finalized(&self, span: Span) -> Result<bool> {
        Ok(self.cells[self.index(span)?].is_some())
    }

    /// Derivations of a finalized cell, best first. Open cells read as empty.
    pub fn derivations(&self, span: Span) -> Result<&[Derivation<S>]> {
        Ok(self.cells[self.index(span)?].as_deref().unwrap_or_default())
    }

    pub fn best(&self, span: Span) -> Result<Option<&Derivation<S>>> {
        Ok(self.derivations(span)?.first())
    }

    /// Store the derivations of `span` and mark it final.
    ///
    /// # Panics
    ///
    /// If the cell was already finalized.
    pub fn finalize(&mut self, span: Span, derivations: Vec<Derivation<S>>) -> Result<()> {
        let index = self.index(span)?;
        assert!(self.cells[index].is_none(), "chart cell {span} finalized twice");
        self.cells[index] = Some(derivations);
        Ok(())
    }

    /// Target words of the derivation at `rank` in the cell of `span`.
    pub fn render(&self, span: Span, rank: usize) -> Result<String> {
        let mut words = Vec::new();
        self.collect_words(span, rank, &mut words)?;
        Ok(words.join(" "))
    }

    fn collect_words<'a>(&'a self, span: Span, rank: usize, words: &mut Vec<&'a str>) -> Result<()> {
        let Some(derivation) = self.derivations(span)?.get(rank) else {
            return Ok(());
        };

        for symbol in &self.options.get(derivation.option).target {
            match symbol {
                Symbol::Terminal(word) => words.push(word),
                Symbol::NonTerm { index, .. } => {
                    let (child_span, child_rank) = derivation.children[*index];
                    self.collect_words(child_span, child_rank, words)?;
                }
            }
        }

        Ok(())
    }
}

impl<S> FinalizedCells for Chart<S> {
    fn finalized_len(&self, span: Span) -> Option<usize> {
        let index = self.index(span).ok()?;
        self.cells[index].as_ref().map(Vec::len)
    }
}
