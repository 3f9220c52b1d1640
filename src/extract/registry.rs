//! Rule storage: the per-sentence arena and the merged corpus set.
//!
//! ```text
//! push ──▶ arena (every rule that was kept or extended, indexed by RuleId)
//!             │
//!             │ consolidate(policy): assign counts to valid rules
//!             ▼
//!          merged: RuleKey ─▶ Tally   (multiset of contributed counts)
//! ```
//!
//! A `Tally` remembers how often each distinct count value was contributed
//! and sums them in a fixed order, so the merged count of a key depends only
//! on the multiset of contributions, never on the order sentences or rules
//! arrived in.

use crate::extract::{Rule, RuleId};
use crate::{Error, Result, Span, Symbol, format_alignment, format_pattern};
use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;

// --- Keys ---------------------------------------------------------------------

/// Content identity of a rule. Two rules with equal keys are merged.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuleKey {
    pub lhs: String,
    pub source: Vec<Symbol>,
    pub target: Vec<Symbol>,
    pub alignment: Vec<(usize, usize)>,
}

impl RuleKey {
    pub fn of(rule: &Rule) -> Self {
        RuleKey {
            lhs: rule.lhs().to_string(),
            source: rule.source().to_vec(),
            target: rule.target().to_vec(),
            alignment: rule.alignment().to_vec(),
        }
    }

    pub fn non_terms(&self) -> usize {
        self.source.iter().filter(|s| !s.is_terminal()).count()
    }
}

impl fmt::Display for RuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] ||| {} ||| {} ||| {}",
            self.lhs,
            format_pattern(&self.source),
            format_pattern(&self.target),
            format_alignment(&self.alignment)
        )
    }
}

/// Read one line of the stream written by [`RuleRegistry::write_rules`].
pub fn parse_rule_line(line_no: usize, line: &str) -> Result<(RuleKey, f64)> {
    let malformed = |message: String| Error::MalformedInput { line: line_no, message };

    let fields: Vec<&str> = line.split("|||").map(str::trim).collect();
    let &[lhs, source, target, alignment, count] = fields.as_slice() else {
        return Err(malformed(format!("expected 5 fields separated by '|||', found {}", fields.len())));
    };

    let lhs = regex!(r"^\[([^\[\]\s]+)\]$")
        .captures(lhs)
        .and_then(|caps| caps.get(1))
        .ok_or_else(|| malformed(format!("cannot read left-hand side '{lhs}'")))?
        .as_str()
        .to_string();

    let pattern = |side: &str| -> Result<Vec<Symbol>> {
        side.split_whitespace()
            .map(|token| Symbol::parse(token).ok_or_else(|| malformed(format!("cannot read symbol '{token}'"))))
            .collect()
    };
    let source = pattern(source)?;
    let target = pattern(target)?;
    if source.is_empty() || target.is_empty() {
        return Err(malformed("rule has an empty side".to_string()));
    }
    check_non_terms(&source, &target).map_err(malformed)?;

    let mut pairs = Vec::new();
    for item in alignment.split_whitespace() {
        let pair = regex!(r"^(\d+)-(\d+)$")
            .captures(item)
            .and_then(|caps| Some((caps.get(1)?.as_str().parse().ok()?, caps.get(2)?.as_str().parse().ok()?)));
        match pair {
            Some((s, t)) if s < source.len() && t < target.len() => pairs.push((s, t)),
            _ => return Err(malformed(format!("cannot read alignment pair '{item}'"))),
        }
    }

    let count: f64 = count.parse().map_err(|_| malformed(format!("cannot read count '{count}'")))?;
    if !count.is_finite() || count <= 0.0 {
        return Err(malformed(format!("count must be positive, found {count}")));
    }

    Ok((RuleKey { lhs, source, target, alignment: pairs }, count))
}

/// Source nonterminals must be numbered `1..=k` left to right and the target
/// must use each of them exactly once, with the same label.
fn check_non_terms(source: &[Symbol], target: &[Symbol]) -> std::result::Result<(), String> {
    let non_terms = |side: &[Symbol]| -> Vec<(usize, String)> {
        side.iter()
            .filter_map(|symbol| match symbol {
                Symbol::NonTerm { label, index } => Some((*index, label.clone())),
                Symbol::Terminal(_) => None,
            })
            .collect()
    };

    let source_nts = non_terms(source);
    if source_nts.iter().enumerate().any(|(k, (index, _))| *index != k) {
        return Err("source nonterminals are not numbered in order".to_string());
    }

    let mut target_nts = non_terms(target);
    target_nts.sort_unstable();
    if target_nts != source_nts {
        return Err("target nonterminals do not match the source ones".to_string());
    }

    Ok(())
}

// --- Counting -----------------------------------------------------------------

/// How kept rules of one sentence are weighted before merging.
pub trait CountPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Set the count of every rule in `rules`.
    fn assign(&self, rules: &mut [Rule]);
}

/// Every rule counts once.
#[derive(Debug, Clone, Copy, Default)]
pub struct Indicator;

impl CountPolicy for Indicator {
    fn name(&self) -> &'static str {
        "indicator"
    }

    fn assign(&self, rules: &mut [Rule]) {
        for rule in rules {
            rule.set_count(1.0);
        }
    }
}

/// Each root phrase spreads a unit of mass evenly over its rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fractional;

impl CountPolicy for Fractional {
    fn name(&self) -> &'static str {
        "fractional"
    }

    fn assign(&self, rules: &mut [Rule]) {
        let root = |rule: &Rule| (rule.root(), rule.root_target(), rule.lhs().to_string());

        let mut per_root: BTreeMap<(Span, Span, String), usize> = BTreeMap::new();
        for rule in rules.iter() {
            *per_root.entry(root(rule)).or_default() += 1;
        }
        let shares: Vec<f64> = rules.iter().map(|rule| 1.0 / per_root[&root(rule)] as f64).collect();

        for (rule, share) in rules.iter_mut().zip(shares) {
            rule.set_count(share);
        }
    }
}

/// Multiset of contributed counts, keyed by their bit pattern.
#[derive(Debug, Clone, Default)]
struct Tally(BTreeMap<u64, u64>);

impl Tally {
    fn add(&mut self, count: f64) {
        *self.0.entry(count.to_bits()).or_default() += 1;
    }

    fn total(&self) -> f64 {
        self.0.iter().map(|(&bits, &times)| f64::from_bits(bits) * times as f64).sum()
    }
}

// --- Registry -----------------------------------------------------------------

/// Kept rules of the sentence in progress plus the merged corpus set.
#[derive(Debug, Default)]
pub struct RuleRegistry {
    arena: Vec<Rule>,
    kept: Vec<RuleId>,
    merged: BTreeMap<RuleKey, Tally>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a generated rule. Valid rules are also marked as kept.
    pub(crate) fn push(&mut self, rule: Rule) -> RuleId {
        let id = RuleId(self.arena.len() as u32);
        if rule.is_valid() {
            self.kept.push(id);
        }
        self.arena.push(rule);
        id
    }

    /// A rule of the sentence in progress. Panics on an id from another sentence.
    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.arena[id.index()]
    }

    /// Valid rules awaiting consolidation, in generation order.
    pub fn kept(&self) -> impl Iterator<Item = &Rule> + '_ {
        self.kept.iter().map(|id| &self.arena[id.index()])
    }

    pub fn kept_len(&self) -> usize {
        self.kept.len()
    }

    /// Number of rules in the arena; a mark for [`Self::rollback`].
    pub(crate) fn pending_len(&self) -> usize {
        self.arena.len()
    }

    /// Drop the rules pushed since `mark` was taken, keeping older ones.
    pub(crate) fn rollback(&mut self, mark: usize) {
        self.arena.truncate(mark);
        self.kept.retain(|id| id.index() < mark);
    }

    /// Count the kept rules with `policy` and fold them into the merged set.
    pub fn consolidate(&mut self, policy: &dyn CountPolicy) {
        let arena = std::mem::take(&mut self.arena);
        self.kept.clear();

        let mut rules: Vec<Rule> = arena.into_iter().filter(Rule::is_valid).collect();
        policy.assign(&mut rules);

        for rule in &rules {
            self.merge(RuleKey::of(rule), rule.count());
        }

        tracing::debug!(policy = policy.name(), rules = rules.len(), merged = self.merged.len(), "rules consolidated");
    }

    /// Add `count` for `key`, e.g. when reading back a written rule stream.
    pub fn merge(&mut self, key: RuleKey, count: f64) {
        self.merged.entry(key).or_default().add(count);
    }

    /// Merged rules with their summed counts, in key order.
    pub fn merged(&self) -> impl Iterator<Item = (&RuleKey, f64)> + '_ {
        self.merged.iter().map(|(key, tally)| (key, tally.total()))
    }

    pub fn merged_len(&self) -> usize {
        self.merged.len()
    }

    pub fn count(&self, key: &RuleKey) -> Option<f64> {
        self.merged.get(key).map(Tally::total)
    }

    /// Write the merged set, one rule per line.
    pub fn write_rules<W: Write>(&self, out: &mut W) -> Result<()> {
        for (key, count) in self.merged() {
            writeln!(out, "{key} ||| {count}")?;
        }
        Ok(())
    }
}
