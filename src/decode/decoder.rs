use crate::decode::{
    Chart, CubeFrontierQueue, Derivation, DerivationCube, IncrementalScorer, NullScorer, OptionId, OptionListBuilder,
    PhraseTable, ScoredOption,
};
use crate::{DecodeConfig, DecodeMetrics, PassMetrics, Result, Span, Symbol, WeightConfig};
use std::time::Instant;

/// Outcome of decoding one sentence.
#[derive(Debug, Clone, Default)]
pub struct Decoded {
    /// Best full-sentence translation, empty when none was found.
    pub translation: String,
    pub score: Option<f32>,
    /// Every full-sentence derivation that survived the beam, best first.
    pub nbest: Vec<(String, f32)>,
    pub metrics: DecodeMetrics,
}

/// Bottom-up chart decoder over a [`PhraseTable`].
pub struct Decoder<'a, S = NullScorer> {
    table: &'a dyn PhraseTable,
    config: &'a DecodeConfig,
    weights: &'a WeightConfig,
    scorer: S,
}

impl<'a> Decoder<'a, NullScorer> {
    pub fn new(table: &'a dyn PhraseTable, config: &'a DecodeConfig, weights: &'a WeightConfig) -> Self {
        Decoder { table, config, weights, scorer: NullScorer }
    }
}

impl<'a, S: IncrementalScorer> Decoder<'a, S> {
    pub fn with_scorer(
        table: &'a dyn PhraseTable,
        config: &'a DecodeConfig,
        weights: &'a WeightConfig,
        scorer: S,
    ) -> Self {
        Decoder { table, config, weights, scorer }
    }

    /// Decode a tokenised sentence and render its best derivations.
    pub fn decode(&self, words: &[String]) -> Result<Decoded> {
        let (chart, metrics) = self.fill(words)?;
        if chart.is_empty() {
            return Ok(Decoded { metrics, ..Decoded::default() });
        }

        let full = Span::new(0, chart.len() - 1);
        let mut nbest = Vec::new();
        for (rank, derivation) in chart.derivations(full)?.iter().enumerate() {
            nbest.push((chart.render(full, rank)?, derivation.score));
        }

        let (translation, score) = match nbest.first() {
            Some((text, score)) => (text.clone(), Some(*score)),
            None => (String::new(), None),
        };

        Ok(Decoded { translation, score, nbest, metrics })
    }

    /// Fill every chart cell, shortest spans first.
    pub fn fill(&self, words: &[String]) -> Result<(Chart<S::State>, DecodeMetrics)> {
        let started = Instant::now();
        let len = words.len();
        let mut chart = Chart::new(len);
        let mut metrics = DecodeMetrics::default();

        for span_len in 1..=len {
            let pass_started = Instant::now();
            let mut pass = PassMetrics { span_len, ..PassMetrics::default() };

            for start in 0..=len - span_len {
                self.fill_cell(words, Span::new(start, start + span_len - 1), &mut chart, &mut pass)?;
            }

            pass.duration = pass_started.elapsed();
            metrics.passes.push(pass);
        }

        metrics.total = started.elapsed();
        tracing::debug!(
            words = len,
            options = chart.options().len(),
            pops = metrics.pops(),
            elapsed_us = metrics.total.as_micros() as u64,
            "sentence decoded"
        );

        Ok((chart, metrics))
    }

    fn fill_cell(
        &self,
        words: &[String],
        span: Span,
        chart: &mut Chart<S::State>,
        pass: &mut PassMetrics,
    ) -> Result<()> {
        let mut candidates = self.table.lookup(words, span);
        if candidates.is_empty() && span.len() == 1 {
            let word = words[span.start].as_str();
            tracing::debug!(word, "unknown word passed through");
            candidates.push(ScoredOption::phrase(span, vec![Symbol::terminal(word)], self.weights.unknown));
        }
        pass.options_seen += candidates.len();

        let mut builder = OptionListBuilder::new(span);
        for mut option in candidates {
            let Some(children) = best_children(chart, &option)? else {
                continue;
            };
            if !slots_fit(&option, span) {
                tracing::warn!(span = %span, slots = ?option.slots, "phrase table returned misplaced slots");
                continue;
            }
            option.estimate = option.score + children;
            if builder.add(option, self.config.rule_limit) {
                pass.options_admitted += 1;
            }
        }

        let list = builder.finalize(self.config.rule_limit, chart);
        let ids: Vec<OptionId> = list.options.into_iter().map(|bound| chart.options_mut().push(bound.option)).collect();

        let popped = {
            let mut cubes = Vec::with_capacity(ids.len());
            for &id in &ids {
                let option = chart.options().get(id);
                let slots = option.slots.iter().map(|&slot| chart.derivations(slot)).collect::<Result<Vec<_>>>()?;
                cubes.push(DerivationCube::new(id, option.score, slots));
            }
            CubeFrontierQueue::new(cubes).take_best(self.config.beam_size)
        };
        pass.pops += popped.len();

        let mut derivations = Vec::with_capacity(popped.len());
        for entry in popped {
            let option = chart.options().get(entry.option);
            let children: Vec<(Span, usize)> = option.slots.iter().copied().zip(entry.coord).collect();
            let states = children
                .iter()
                .map(|&(slot, rank)| chart.derivations(slot).map(|cell| &cell[rank].state))
                .collect::<Result<Vec<_>>>()?;

            let (delta, state) = self.scorer.evaluate(option, &states);
            derivations.push(Derivation { option: entry.option, children, score: entry.score + delta, state });
        }
        // stable: equal scores keep pop order
        derivations.sort_by(|a, b| b.score.total_cmp(&a.score));

        if !derivations.is_empty() {
            pass.filled_cells += 1;
        }
        tracing::trace!(span = %span, options = ids.len(), derivations = derivations.len(), "cell filled");

        chart.finalize(span, derivations)
    }
}

/// Sum of the best derivation score of every slot, `None` if a slot cell is empty.
fn best_children<S>(chart: &Chart<S>, option: &ScoredOption) -> Result<Option<f32>> {
    let mut sum = 0.0;
    for &slot in &option.slots {
        match chart.best(slot)? {
            Some(best) => sum += best.score,
            None => return Ok(None),
        }
    }
    Ok(Some(sum))
}

/// Slots must be ordered, disjoint, strictly inside `span` and cover every
/// nonterminal of the target.
fn slots_fit(option: &ScoredOption, span: Span) -> bool {
    let nested = option.slots.iter().all(|slot| span.strictly_contains(slot));
    let ordered = option.slots.windows(2).all(|pair| pair[0].end < pair[1].start);
    let indexed = option.target.iter().all(|symbol| match symbol {
        Symbol::NonTerm { index, .. } => *index < option.slots.len(),
        Symbol::Terminal(_) => true,
    });
    nested && ordered && indexed
}
