use crate::extract::{CountPolicy, Fractional, Indicator, Rule, RuleBuilder, RuleKey, RuleRegistry, parse_rule_line};
use crate::{AlignedSentence, ConsistentPhrase, ConsistentPhraseIndex, Error, ExtractConfig, NonTermSlot, Span, Symbol};

fn monotone(words: &str) -> AlignedSentence {
    let source: Vec<&str> = words.split_whitespace().collect();
    let target = words.to_lowercase();
    let links: Vec<String> = (0..source.len()).map(|i| format!("{i}-{i}")).collect();
    AlignedSentence::parse(0, words, &target, &links.join(" ")).unwrap()
}

fn slot(start: usize, end: usize) -> NonTermSlot {
    NonTermSlot::new(Span::new(start, end), Span::new(start, end))
}

/// Index holding a single phrase over the whole (monotone) sentence.
fn single_phrase(sentence: &AlignedSentence, slots: &[NonTermSlot]) -> ConsistentPhraseIndex {
    let last = sentence.source().len() - 1;
    let mut phrase = ConsistentPhrase::new(sentence, Span::new(0, last), Span::new(0, last));
    for s in slots {
        phrase.add_slot(s.clone());
    }
    let mut index = ConsistentPhraseIndex::new(sentence.source().len());
    index.insert(phrase).unwrap();
    index
}

fn extract(
    sentence: &AlignedSentence,
    index: &ConsistentPhraseIndex,
    config: &ExtractConfig,
    registry: &mut RuleRegistry,
) -> Vec<String> {
    RuleBuilder::new(sentence, index, config).extract_all(registry).unwrap();
    registry.kept().map(Rule::to_string).collect()
}

fn key(lhs: &str, source: &str, target: &str, alignment: &[(usize, usize)]) -> RuleKey {
    let pattern = |side: &str| -> Vec<Symbol> { side.split_whitespace().filter_map(Symbol::parse).collect() };
    RuleKey { lhs: lhs.to_string(), source: pattern(source), target: pattern(target), alignment: alignment.to_vec() }
}

#[test]
fn single_slot_phrase_yields_fresh_and_promoted_rule() {
    let sentence = monotone("A B");
    let index = single_phrase(&sentence, &[slot(0, 0)]);
    let config = ExtractConfig::default();

    let mut registry = RuleRegistry::new();
    let rules = extract(&sentence, &index, &config, &mut registry);
    assert_eq!(rules, vec!["A B → a b", "[X,1] B → [X,1] b"]);

    let promoted = registry.kept().nth(1).unwrap();
    assert_eq!(promoted.alignment(), [(0, 0), (1, 1)]);
    assert_eq!(promoted.parent().map(|id| registry.rule(id).to_string()).as_deref(), Some("A B → a b"));

    registry.consolidate(&Indicator);
    extract(&sentence, &index, &config, &mut registry);
    registry.consolidate(&Indicator);

    assert_eq!(registry.merged_len(), 2);
    assert_eq!(registry.count(&key("X", "A B", "a b", &[(0, 0), (1, 1)])), Some(2.0));
    assert_eq!(registry.count(&key("X", "[X,1] B", "[X,1] b", &[(0, 0), (1, 1)])), Some(2.0));
    assert_eq!(registry.kept_len(), 0);
}

#[test]
fn depth_one_rules_are_bounded_by_slots() {
    let sentence = monotone("A B C D");
    let slots = [slot(0, 0), slot(1, 2), slot(2, 3), slot(3, 3)];
    let index = single_phrase(&sentence, &slots);
    let config = ExtractConfig::default();

    let mut registry = RuleRegistry::new();
    extract(&sentence, &index, &config, &mut registry);

    let depth_one = registry.kept().filter(|rule| rule.non_terms().len() == 1).count();
    assert!(depth_one <= slots.len());
    assert_eq!(depth_one, 4);

    for rule in registry.kept() {
        assert!(rule.non_terms().iter().all(|nt| nt.source != rule.root()), "{rule}");
        assert!(rule.non_terms().len() <= config.max_non_terms, "{rule}");
    }
}

#[test]
fn root_span_is_never_a_slot() {
    let sentence = monotone("A B");
    let index = single_phrase(&sentence, &[slot(0, 1), slot(1, 1)]);

    let mut registry = RuleRegistry::new();
    let rules = extract(&sentence, &index, &ExtractConfig::default(), &mut registry);

    assert_eq!(rules, vec!["A B → a b", "A [X,1] → a [X,1]"]);
}

#[test]
fn each_rule_shape_is_generated_once() {
    let sentence = monotone("A B C D E");
    let slots = [slot(0, 0), slot(2, 2), slot(4, 4)];
    let index = single_phrase(&sentence, &slots);

    let mut registry = RuleRegistry::new();
    let rules = extract(&sentence, &index, &ExtractConfig::default(), &mut registry);

    let mut unique = rules.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), rules.len());
    // fresh + 3 single + 3 pairs
    assert_eq!(rules.len(), 7);
    assert!(rules.contains(&"[X,1] B [X,2] D E → [X,1] b [X,2] d e".to_string()));
}

#[test]
fn adjacent_non_terms_follow_policy() {
    let sentence = monotone("A B C D");
    let index = single_phrase(&sentence, &[slot(0, 0), slot(1, 1)]);

    let mut strict = RuleRegistry::new();
    let rules = extract(&sentence, &index, &ExtractConfig::default(), &mut strict);
    assert_eq!(rules.len(), 3);

    let config = ExtractConfig { non_term_consec_source: true, ..ExtractConfig::default() };
    let mut relaxed = RuleRegistry::new();
    let rules = extract(&sentence, &index, &config, &mut relaxed);
    assert_eq!(rules.len(), 4);
    assert!(rules.contains(&"[X,1] [X,2] C D → [X,1] [X,2] c d".to_string()));
}

#[test]
fn first_word_policy_rejects_leading_non_term() {
    let sentence = monotone("A B");
    let index = single_phrase(&sentence, &[slot(0, 0)]);
    let config = ExtractConfig { non_term_first_word: false, ..ExtractConfig::default() };

    let mut registry = RuleRegistry::new();
    let rules = extract(&sentence, &index, &config, &mut registry);

    assert_eq!(rules, vec!["A B → a b"]);
}

#[test]
fn too_many_symbols_is_repaired_by_promotion() {
    let sentence = monotone("A B C D E F");
    let index = single_phrase(&sentence, &[slot(0, 2), slot(3, 5)]);

    let mut registry = RuleRegistry::new();
    let metrics = RuleBuilder::new(&sentence, &index, &ExtractConfig::default()).extract_all(&mut registry).unwrap();
    let rules: Vec<String> = registry.kept().map(Rule::to_string).collect();

    assert_eq!(rules, vec!["[X,1] D E F → [X,1] d e f", "A B C [X,1] → a b c [X,1]"]);
    assert_eq!(metrics.generated, 4);
    assert_eq!(metrics.kept, 2);
    assert_eq!(metrics.dropped(), 2);
}

#[test]
fn unaligned_rules_need_an_aligned_terminal() {
    let sentence = AlignedSentence::parse(0, "A B", "a b", "0-0").unwrap();
    let mut index = ConsistentPhraseIndex::new(2);
    index.insert(ConsistentPhrase::new(&sentence, Span::new(0, 1), Span::new(0, 0))).unwrap();
    index
        .insert(
            ConsistentPhrase::new(&sentence, Span::new(0, 1), Span::new(0, 1))
                .with_slot(NonTermSlot::new(Span::new(0, 0), Span::new(0, 0))),
        )
        .unwrap();

    let mut registry = RuleRegistry::new();
    let rules = extract(&sentence, &index, &ExtractConfig::default(), &mut registry);
    assert_eq!(rules, vec!["A B → a", "A B → a b"]);

    let config = ExtractConfig { require_aligned_word: false, ..ExtractConfig::default() };
    let mut registry = RuleRegistry::new();
    let rules = extract(&sentence, &index, &config, &mut registry);
    assert_eq!(rules, vec!["A B → a", "A B → a b", "[X,1] B → [X,1] b"]);
}

#[test]
fn inconsistent_phrase_discards_the_sentence() {
    let sentence = AlignedSentence::parse(4, "A B C", "a b", "0-0 1-1 2-1").unwrap();
    let mut index = ConsistentPhraseIndex::new(3);
    index.insert(ConsistentPhrase::new(&sentence, Span::new(0, 0), Span::new(0, 0))).unwrap();
    index.insert(ConsistentPhrase::new(&sentence, Span::new(1, 1), Span::new(1, 1))).unwrap();

    let mut registry = RuleRegistry::new();
    let err = RuleBuilder::new(&sentence, &index, &ExtractConfig::default()).extract_all(&mut registry).unwrap_err();

    assert!(matches!(err, Error::MalformedInput { line: 4, .. }), "{err}");
    assert_eq!(registry.kept_len(), 0);
}

#[test]
fn index_must_match_sentence_length() {
    let sentence = monotone("A B");
    let index = ConsistentPhraseIndex::new(3);

    let mut registry = RuleRegistry::new();
    let err = RuleBuilder::new(&sentence, &index, &ExtractConfig::default()).extract_all(&mut registry).unwrap_err();

    assert!(err.is_sentence_scoped());
}

#[test]
fn merge_is_order_independent() {
    let corpus = [
        AlignedSentence::parse(0, "A B C", "a b", "0-0 1-1 2-1").unwrap(),
        AlignedSentence::parse(1, "A B", "a b", "0-0 1-1").unwrap(),
        AlignedSentence::parse(2, "B C A", "b a", "0-0 1-0 2-1").unwrap(),
        AlignedSentence::parse(3, "A B C", "a b", "0-0 1-1 2-1").unwrap(),
    ];
    let orders: [[usize; 4]; 4] = [[0, 1, 2, 3], [3, 2, 1, 0], [1, 3, 0, 2], [2, 0, 3, 1]];
    let config = ExtractConfig::default();

    for policy in [&Indicator as &dyn CountPolicy, &Fractional] {
        let runs: Vec<Vec<(RuleKey, u64)>> = orders
            .iter()
            .map(|order| {
                let mut registry = RuleRegistry::new();
                for &i in order {
                    let index = ConsistentPhraseIndex::from_sentence(&corpus[i], &config);
                    RuleBuilder::new(&corpus[i], &index, &config).extract_all(&mut registry).unwrap();
                    registry.consolidate(policy);
                }
                registry.merged().map(|(key, count)| (key.clone(), count.to_bits())).collect()
            })
            .collect();

        assert!(!runs[0].is_empty());
        for run in &runs[1..] {
            assert_eq!(run, &runs[0], "policy {}", policy.name());
        }
    }
}

#[test]
fn fractional_counts_share_a_unit_per_phrase() {
    let sentence = AlignedSentence::parse(0, "A B C", "a b", "0-0 1-1 2-1").unwrap();
    let config = ExtractConfig::default();
    let index = ConsistentPhraseIndex::from_sentence(&sentence, &config);

    let mut registry = RuleRegistry::new();
    RuleBuilder::new(&sentence, &index, &config).extract_all(&mut registry).unwrap();
    registry.consolidate(&Fractional);

    assert_eq!(registry.count(&key("X", "A", "a", &[(0, 0)])), Some(1.0));
    assert_eq!(registry.count(&key("X", "A [X,1]", "a [X,1]", &[(0, 0), (1, 1)])), Some(1.0 / 3.0));
    let total: f64 = registry.merged().map(|(_, count)| count).sum();
    assert!((total - 3.0).abs() < 1e-9, "{total}");
}

#[test]
fn rule_stream_is_deterministic() {
    let sentence = AlignedSentence::parse(0, "A B C", "a b", "0-0 1-1 2-1").unwrap();
    let config = ExtractConfig::default();
    let index = ConsistentPhraseIndex::from_sentence(&sentence, &config);

    let mut registry = RuleRegistry::new();
    RuleBuilder::new(&sentence, &index, &config).extract_all(&mut registry).unwrap();
    registry.consolidate(config.count_policy());

    let mut out = Vec::new();
    registry.write_rules(&mut out).unwrap();
    let stream = String::from_utf8(out).unwrap();

    insta::assert_snapshot!(stream.trim_end(), @r"
    [X] ||| A ||| a ||| 0-0 ||| 1
    [X] ||| A B C ||| a b ||| 0-0 1-1 2-1 ||| 1
    [X] ||| A [X,1] ||| a [X,1] ||| 0-0 1-1 ||| 1
    [X] ||| B C ||| b ||| 0-0 1-0 ||| 1
    [X] ||| [X,1] B C ||| [X,1] b ||| 0-0 1-1 2-1 ||| 1
    ");

    let mut reread = RuleRegistry::new();
    for (i, line) in stream.lines().enumerate() {
        let (key, count) = parse_rule_line(i + 1, line).unwrap();
        reread.merge(key, count);
    }
    let mut again = Vec::new();
    reread.write_rules(&mut again).unwrap();
    assert_eq!(String::from_utf8(again).unwrap(), stream);
}

#[test]
fn malformed_rule_lines_are_rejected() {
    for line in [
        "[X] ||| A ||| a ||| 0-0",
        "X ||| A ||| a ||| 0-0 ||| 1",
        "[X] ||| A ||| a ||| 0-3 ||| 1",
        "[X] ||| A ||| a ||| 0-0 ||| many",
        "[X] ||| A ||| a ||| 0-0 ||| -1",
        "[X] |||  ||| a ||| 0-0 ||| 1",
        "[X] ||| A [X,1] ||| a ||| 0-0 ||| 1",
        "[X] ||| A ||| a [X,1] ||| 0-0 ||| 1",
        "[X] ||| A [X,2] ||| a [X,2] ||| 0-0 1-1 ||| 1",
        "[X] ||| [X,1] A [X,2] ||| [X,1] a [X,1] ||| 1-1 ||| 1",
        "[X] ||| A [X,1] ||| a [Y,1] ||| 0-0 1-1 ||| 1",
        "[X] ||| A a|b ||| a ||| 0-0 ||| 1",
    ] {
        let err = parse_rule_line(9, line).unwrap_err();
        assert!(matches!(err, Error::MalformedInput { line: 9, .. }), "{line}: {err}");
    }
}

#[test]
fn reserved_tokens_survive_the_rule_stream() {
    let corpus = [
        AlignedSentence::parse(0, "a ||| b", "x ||| y", "0-0 1-1 2-2").unwrap(),
        AlignedSentence::parse(1, "[X,1] b", "[X,1] y", "0-0 1-1").unwrap(),
        AlignedSentence::parse(2, "R&D &#91;", "F&E [", "0-0 1-1").unwrap(),
    ];
    let config = ExtractConfig::default();

    let mut registry = RuleRegistry::new();
    for sentence in &corpus {
        let index = ConsistentPhraseIndex::from_sentence(sentence, &config);
        RuleBuilder::new(sentence, &index, &config).extract_all(&mut registry).unwrap();
        registry.consolidate(config.count_policy());
    }

    let mut out = Vec::new();
    registry.write_rules(&mut out).unwrap();
    let stream = String::from_utf8(out).unwrap();
    assert_eq!(stream.lines().count(), registry.merged_len());

    let mut reread = RuleRegistry::new();
    for (i, line) in stream.lines().enumerate() {
        let (key, count) = parse_rule_line(i + 1, line).unwrap();
        reread.merge(key, count);
    }

    let written: Vec<(RuleKey, f64)> = registry.merged().map(|(key, count)| (key.clone(), count)).collect();
    let read: Vec<(RuleKey, f64)> = reread.merged().map(|(key, count)| (key.clone(), count)).collect();
    assert_eq!(read, written);

    // the all-terminal rule and the promoted one print alike in plain text
    let literal = key("X", "b", "y", &[(0, 0)]);
    let literal = RuleKey {
        source: vec![Symbol::terminal("[X,1]"), literal.source[0].clone()],
        target: vec![Symbol::terminal("[X,1]"), literal.target[0].clone()],
        alignment: vec![(0, 0), (1, 1)],
        ..literal
    };
    assert_eq!(reread.count(&literal), Some(1.0));
    assert_eq!(reread.count(&key("X", "[X,1] b", "[X,1] y", &[(0, 0), (1, 1)])), Some(1.0));
    assert!(read.iter().any(|(key, _)| key.source == vec![Symbol::terminal("R&D"), Symbol::terminal("&#91;")]));
}

#[test]
fn failed_sentence_keeps_earlier_pending_rules() {
    let config = ExtractConfig::default();
    let first = monotone("A B");
    let first_index = ConsistentPhraseIndex::from_sentence(&first, &config);

    let mut registry = RuleRegistry::new();
    RuleBuilder::new(&first, &first_index, &config).extract_all(&mut registry).unwrap();
    let pending = registry.kept_len();
    assert!(pending > 0);

    let broken = AlignedSentence::parse(1, "A B C", "a b", "0-0 1-1 2-1").unwrap();
    let mut broken_index = ConsistentPhraseIndex::new(3);
    broken_index.insert(ConsistentPhrase::new(&broken, Span::new(0, 0), Span::new(0, 0))).unwrap();
    broken_index.insert(ConsistentPhrase::new(&broken, Span::new(1, 1), Span::new(1, 1))).unwrap();
    RuleBuilder::new(&broken, &broken_index, &config).extract_all(&mut registry).unwrap_err();

    assert_eq!(registry.kept_len(), pending);
    registry.consolidate(config.count_policy());
    assert_eq!(registry.merged_len(), pending);
    assert_eq!(registry.count(&key("X", "A B", "a b", &[(0, 0), (1, 1)])), Some(1.0));
}
