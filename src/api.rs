use crate::decode::{Decoder, IncrementalScorer};
use crate::extract::{RuleBuilder, RuleRegistry};
use crate::{AlignedSentence, ConsistentPhraseIndex, DecodeMetrics, Error, ExtractConfig, ExtractMetrics, Result};
use std::io::BufRead;

/// Result from [`extract_corpus`].
#[derive(Debug)]
pub struct ExtractResult {
    /// Merged rules of every sentence that could be read.
    pub registry: RuleRegistry,
    pub metrics: ExtractMetrics,
}

/// Result from [`decode_line`].
#[derive(Debug, Clone)]
pub struct DecodeResult {
    /// The input line, as given.
    pub text: String,
    /// Best translation; empty when the sentence could not be covered.
    pub translation: String,
    pub score: Option<f32>,
    /// Ranked full-sentence translations with their scores.
    pub nbest: Vec<(String, f32)>,
    pub metrics: DecodeMetrics,
}

/// Extract and consolidate the rules of one sentence into `registry`.
///
/// On error the registry is left as it was.
pub fn extract_sentence(
    registry: &mut RuleRegistry,
    sentence: &AlignedSentence,
    config: &ExtractConfig,
) -> Result<ExtractMetrics> {
    let index = ConsistentPhraseIndex::from_sentence(sentence, config);
    let mut metrics = RuleBuilder::new(sentence, &index, config).extract_all(registry)?;

    let started = std::time::Instant::now();
    registry.consolidate(config.count_policy());
    metrics.total += started.elapsed();

    Ok(metrics)
}

/// Extract rules from a line-aligned corpus: one sentence per line in each of
/// `source`, `target` and `alignment`.
///
/// Malformed sentences are logged and skipped. Read errors, and inputs with a
/// different number of lines, abort the run.
pub fn extract_corpus<S, T, A>(source: S, target: T, alignment: A, config: &ExtractConfig) -> Result<ExtractResult>
where
    S: BufRead,
    T: BufRead,
    A: BufRead,
{
    let mut registry = RuleRegistry::new();
    let mut metrics = ExtractMetrics::default();

    let mut targets = target.lines();
    let mut alignments = alignment.lines();
    let mut line_no = 0;

    for source_line in source.lines() {
        line_no += 1;
        let source_line = source_line?;
        let (Some(target_line), Some(alignment_line)) = (targets.next(), alignments.next()) else {
            return Err(Error::MalformedInput {
                line: line_no,
                message: "target or alignment input ended before the source".to_string(),
            });
        };
        let (target_line, alignment_line) = (target_line?, alignment_line?);

        let outcome = AlignedSentence::parse(line_no, &source_line, &target_line, &alignment_line)
            .and_then(|sentence| extract_sentence(&mut registry, &sentence, config));
        match outcome {
            Ok(sentence_metrics) => metrics.absorb(&sentence_metrics),
            Err(err) if err.is_sentence_scoped() => {
                tracing::warn!(line = line_no, error = %err, "skipping sentence");
                metrics.skipped += 1;
            }
            Err(err) => return Err(err),
        }
    }

    if targets.next().is_some() || alignments.next().is_some() {
        return Err(Error::MalformedInput {
            line: line_no + 1,
            message: "target or alignment input has more lines than the source".to_string(),
        });
    }

    tracing::info!(
        sentences = metrics.sentences,
        skipped = metrics.skipped,
        rules = registry.merged_len(),
        "extraction finished"
    );

    Ok(ExtractResult { registry, metrics })
}

/// Decode one whitespace-tokenised line.
pub fn decode_line<S: IncrementalScorer>(decoder: &Decoder<'_, S>, line: &str) -> Result<DecodeResult> {
    let words: Vec<String> = line.split_whitespace().map(str::to_string).collect();
    let decoded = decoder.decode(&words)?;

    Ok(DecodeResult {
        text: line.to_string(),
        translation: decoded.translation,
        score: decoded.score,
        nbest: decoded.nbest,
        metrics: decoded.metrics,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::RuleTable;
    use crate::{DecodeConfig, WeightConfig};

    const SOURCE: &str = "das Haus\nein Haus\nkaputt 0 9\ndas Buch\n";
    const TARGET: &str = "the house\na house\nbroken\nthe book\n";
    const ALIGN: &str = "0-0 1-1\n0-0 1-1\n0-7\n0-0 1-1\n";

    #[test]
    fn extract_corpus_skips_malformed_sentences() {
        let config = ExtractConfig::default();
        let res = extract_corpus(SOURCE.as_bytes(), TARGET.as_bytes(), ALIGN.as_bytes(), &config).unwrap();

        assert_eq!(res.metrics.sentences, 3);
        assert_eq!(res.metrics.skipped, 1);
        assert!(res.metrics.kept <= res.metrics.generated);

        let house: Vec<f64> = res
            .registry
            .merged()
            .filter(|(key, _)| key.to_string() == "[X] ||| Haus ||| house ||| 0-0")
            .map(|(_, count)| count)
            .collect();
        assert_eq!(house, vec![2.0]);
    }

    #[test]
    fn extract_corpus_rejects_uneven_inputs() {
        let config = ExtractConfig::default();
        let err = extract_corpus(SOURCE.as_bytes(), "the house\n".as_bytes(), ALIGN.as_bytes(), &config).unwrap_err();

        assert!(matches!(err, Error::MalformedInput { line: 2, .. }), "{err}");
    }

    #[test]
    fn decode_line_uses_extracted_rules() {
        let config = ExtractConfig::default();
        let res = extract_corpus(SOURCE.as_bytes(), TARGET.as_bytes(), ALIGN.as_bytes(), &config).unwrap();

        let decode = DecodeConfig::default();
        let weights = WeightConfig::default();
        let table = RuleTable::from_registry(&res.registry, &decode, &weights);
        let decoder = Decoder::new(&table, &decode, &weights);

        let out = decode_line(&decoder, "  ein Buch ").unwrap();
        assert_eq!(out.text, "  ein Buch ");
        assert_eq!(out.translation, "a book");
        assert!(out.score.is_some());
        assert_eq!(out.metrics.passes.len(), 2);
    }
}
