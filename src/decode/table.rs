//! Phrase tables: where the decoder gets its translation options.
//!
//! [`RuleTable`] is the in-memory table built from extracted rules. Rules are
//! grouped by source pattern and scored once at load time:
//!
//! ```text
//! score = translation  * ln(count / total count of the source pattern)
//!       + word_penalty * target terminals
//! ```
//!
//! Each group is beam-pruned and capped at `table_limit` entries. Lookup
//! matches the source patterns against a span, letting every nonterminal
//! cover one word or more.

use crate::decode::{ScoredOption, prune_flat};
use crate::extract::{RuleKey, RuleRegistry, parse_rule_line};
use crate::sentence::DEFAULT_LABEL;
use crate::{DecodeConfig, Result, Span, Symbol, WeightConfig};
use std::collections::{BTreeMap, HashMap};
use std::io::BufRead;

/// Source of translation options for the chart decoder.
pub trait PhraseTable: Send + Sync {
    /// Options whose source side matches `words[span]`.
    ///
    /// Returned options carry `estimate == score`; the decoder fills in the
    /// slot part of the estimate.
    fn lookup(&self, words: &[String], span: Span) -> Vec<ScoredOption>;
}

#[derive(Debug, Clone)]
struct Target {
    lhs: String,
    target: Vec<Symbol>,
    score: f32,
}

#[derive(Debug, Clone)]
struct Entry {
    source: Vec<Symbol>,
    targets: Vec<Target>,
}

#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    entries: Vec<Entry>,
    /// Entries keyed by the first terminal of their source pattern.
    by_word: HashMap<String, Vec<usize>>,
    /// Entries without any source terminal, such as glue rules.
    unanchored: Vec<usize>,
}

impl RuleTable {
    pub fn from_registry(registry: &RuleRegistry, decode: &DecodeConfig, weights: &WeightConfig) -> Self {
        Self::from_rules(registry.merged().map(|(key, count)| (key.clone(), count)), decode, weights)
    }

    /// Read a rule stream as written by [`RuleRegistry::write_rules`].
    ///
    /// Repeated rules are summed.
    pub fn read<R: BufRead>(reader: R, decode: &DecodeConfig, weights: &WeightConfig) -> Result<Self> {
        let mut registry = RuleRegistry::new();
        for (i, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            let (key, count) = parse_rule_line(i + 1, &line)?;
            registry.merge(key, count);
        }

        Ok(Self::from_registry(&registry, decode, weights))
    }

    pub fn from_rules(
        rules: impl IntoIterator<Item = (RuleKey, f64)>,
        decode: &DecodeConfig,
        weights: &WeightConfig,
    ) -> Self {
        let mut grouped: BTreeMap<Vec<Symbol>, Vec<(RuleKey, f64)>> = BTreeMap::new();
        for (key, count) in rules {
            if key.source.is_empty() || (key.source.len() == 1 && !key.source[0].is_terminal()) {
                tracing::warn!(rule = %key, "skipping unary nonterminal rule");
                continue;
            }
            grouped.entry(key.source.clone()).or_default().push((key, count));
        }

        let mut table = RuleTable::default();
        for (source, rules) in grouped {
            let total: f64 = rules.iter().map(|(_, count)| count).sum();
            let scored = rules
                .into_iter()
                .map(|(key, count)| {
                    let terminals = key.target.iter().filter(|s| s.is_terminal()).count() as f32;
                    let score =
                        weights.translation * (count / total).ln() as f32 + weights.word_penalty * terminals;
                    ScoredOption::new(Span::new(0, source.len() - 1), key.lhs, key.target, Vec::new(), score)
                })
                .collect();

            let targets = prune_flat(scored, decode.beam_width)
                .into_iter()
                .take(decode.table_limit)
                .map(|option| Target { lhs: option.lhs, target: option.target, score: option.score })
                .collect();
            table.insert(Entry { source, targets });
        }

        if decode.glue {
            let pair = vec![Symbol::non_term(DEFAULT_LABEL, 0), Symbol::non_term(DEFAULT_LABEL, 1)];
            let glue = Target { lhs: DEFAULT_LABEL.to_string(), target: pair.clone(), score: weights.glue };
            match table.entries.iter().position(|entry| entry.source == pair) {
                Some(id) => table.entries[id].targets.push(glue),
                None => table.insert(Entry { source: pair, targets: vec![glue] }),
            }
        }

        tracing::debug!(patterns = table.entries.len(), "rule table loaded");

        table
    }

    fn insert(&mut self, entry: Entry) {
        let id = self.entries.len();
        let anchor = entry.source.iter().find_map(|symbol| match symbol {
            Symbol::Terminal(word) => Some(word.clone()),
            Symbol::NonTerm { .. } => None,
        });
        match anchor {
            Some(word) => self.by_word.entry(word).or_default().push(id),
            None => self.unanchored.push(id),
        }
        self.entries.push(entry);
    }

    /// Number of distinct source patterns.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl PhraseTable for RuleTable {
    fn lookup(&self, words: &[String], span: Span) -> Vec<ScoredOption> {
        let mut candidates: Vec<usize> = words[span.start..=span.end]
            .iter()
            .filter_map(|word| self.by_word.get(word))
            .flatten()
            .copied()
            .collect();
        if span.len() > 1 {
            candidates.extend(&self.unanchored);
        }
        candidates.sort_unstable();
        candidates.dedup();

        let mut options = Vec::new();
        for id in candidates {
            let entry = &self.entries[id];
            let mut matches = Vec::new();
            match_pattern(&entry.source, words, span.start, span.end, &mut Vec::new(), &mut matches);

            for slots in matches {
                for target in &entry.targets {
                    options.push(ScoredOption::new(
                        span,
                        target.lhs.as_str(),
                        target.target.clone(),
                        slots.clone(),
                        target.score,
                    ));
                }
            }
        }

        options
    }
}

/// Every way `pattern` can cover `words[pos..=end]`, as nonterminal spans.
fn match_pattern(
    pattern: &[Symbol],
    words: &[String],
    pos: usize,
    end: usize,
    slots: &mut Vec<Span>,
    out: &mut Vec<Vec<Span>>,
) {
    let Some((first, rest)) = pattern.split_first() else {
        if pos == end + 1 {
            out.push(slots.clone());
        }
        return;
    };
    // every remaining symbol needs a word of its own
    if pos + rest.len() > end {
        return;
    }

    match first {
        Symbol::Terminal(word) => {
            if words[pos] == *word {
                match_pattern(rest, words, pos + 1, end, slots, out);
            }
        }
        Symbol::NonTerm { .. } => {
            for last in pos..=end - rest.len() {
                slots.push(Span::new(pos, last));
                match_pattern(rest, words, last + 1, end, slots, out);
                slots.pop();
            }
        }
    }
}
