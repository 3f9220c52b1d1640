use crate::config::ExtractConfig;
use crate::extract::{Rule, RuleId, RuleRegistry};
use crate::sentence::{AlignedSentence, ConsistentPhrase, ConsistentPhraseIndex, NonTermSlot};
use crate::{Error, ExtractMetrics, Result};
use std::time::Instant;

/// Generates the rules of one sentence into a [`RuleRegistry`].
///
/// The builder only borrows its inputs; everything it produces lands in the
/// registry, so one registry can collect a whole corpus.
pub struct RuleBuilder<'a> {
    sentence: &'a AlignedSentence,
    index: &'a ConsistentPhraseIndex,
    config: &'a ExtractConfig,
}

impl<'a> RuleBuilder<'a> {
    pub fn new(sentence: &'a AlignedSentence, index: &'a ConsistentPhraseIndex, config: &'a ExtractConfig) -> Self {
        Self { sentence, index, config }
    }

    /// Create rules for every consistent phrase of the sentence.
    ///
    /// On error nothing from this sentence stays in the registry; rules of
    /// earlier, not yet consolidated sentences are left alone.
    pub fn extract_all(&self, registry: &mut RuleRegistry) -> Result<ExtractMetrics> {
        let started = Instant::now();
        let mut metrics = ExtractMetrics::default();

        let mark = registry.pending_len();
        if let Err(err) = self.seed(registry, &mut metrics) {
            registry.rollback(mark);
            return Err(err);
        }

        metrics.sentences = 1;
        metrics.total = started.elapsed();

        tracing::debug!(
            sentence = self.sentence.id(),
            phrases = metrics.phrases,
            generated = metrics.generated,
            kept = metrics.kept,
            "rules extracted"
        );

        Ok(metrics)
    }

    fn seed(&self, registry: &mut RuleRegistry, metrics: &mut ExtractMetrics) -> Result<()> {
        let len = self.sentence.source().len();
        if self.index.len() != len {
            return Err(Error::MalformedInput {
                line: self.sentence.id(),
                message: format!("phrase index covers {} tokens, sentence has {len}", self.index.len()),
            });
        }

        for start in 0..len {
            for end in start..len {
                for phrase in self.index.lookup(start, end)? {
                    self.create_rules(phrase, registry, metrics)?;
                }
            }
        }

        Ok(())
    }

    /// Build the fresh rule over `phrase`, then every rule obtained by
    /// promoting its slots to nonterminals, left to right.
    pub fn create_rules(
        &self,
        phrase: &ConsistentPhrase,
        registry: &mut RuleRegistry,
        metrics: &mut ExtractMetrics,
    ) -> Result<()> {
        self.check_phrase(phrase)?;
        metrics.phrases += 1;

        self.build(Rule::fresh(phrase), &phrase.slots, registry, metrics);

        Ok(())
    }

    fn check_phrase(&self, phrase: &ConsistentPhrase) -> Result<()> {
        let malformed = |message: String| Error::MalformedInput { line: self.sentence.id(), message };

        if !self.sentence.is_consistent(phrase.source, phrase.target) {
            return Err(malformed(format!("phrase {} / {} is not consistent", phrase.source, phrase.target)));
        }
        for slot in &phrase.slots {
            if !phrase.source.contains(&slot.source) || !phrase.target.contains(&slot.target) {
                return Err(malformed(format!("slot {} lies outside phrase {}", slot.source, phrase.source)));
            }
            if !self.sentence.is_consistent(slot.source, slot.target) {
                return Err(malformed(format!("slot {} / {} is not consistent", slot.source, slot.target)));
            }
        }

        Ok(())
    }

    fn build(&self, mut rule: Rule, slots: &[NonTermSlot], registry: &mut RuleRegistry, metrics: &mut ExtractMetrics) {
        rule.prevalidate(self.config, self.sentence);
        rule.create_target(self.sentence);
        metrics.generated += 1;

        let valid = rule.is_valid();
        let recurse = rule.can_recurse(self.config);
        if valid {
            metrics.kept += 1;
        } else {
            tracing::trace!(root = %rule.root(), rule = %rule, flaws = ?rule.flaws(), "rule rejected");
            if !recurse {
                return;
            }
        }

        let id = registry.push(rule);
        if recurse {
            self.extend(id, slots, registry, metrics);
        }
    }

    /// Promote one more slot of the root phrase in every admissible way.
    fn extend(&self, parent: RuleId, slots: &[NonTermSlot], registry: &mut RuleRegistry, metrics: &mut ExtractMetrics) {
        let (from, root) = {
            let rule = registry.rule(parent);
            (rule.next_source_pos(), rule.root())
        };

        for slot in slots.iter().filter(|slot| slot.source.start >= from && slot.source != root) {
            let rule = Rule::extend(parent, registry.rule(parent), slot);
            self.build(rule, slots, registry, metrics);
        }
    }
}
