extern crate self as cubist;

#[macro_use]
mod macros;
mod api;
pub mod config;
pub mod decode;
mod error;
pub mod extract;
mod metrics;
mod sentence;

pub use api::{DecodeResult, ExtractResult, decode_line, extract_corpus, extract_sentence};
pub use config::{Config, DecodeConfig, ExtractConfig, WeightConfig};
pub use error::{Error, Result};
pub use metrics::{DecodeMetrics, ExtractMetrics, PassMetrics};
pub use sentence::{AlignedSentence, ConsistentPhrase, ConsistentPhraseIndex, NonTermSlot};

use std::fmt;

// --- Shared types -----------------------------------------------------------

/// Inclusive `(start, end)` range of token indices.
///
/// Both rule extraction and chart decoding address the sentence through
/// spans; a chart cell is keyed by exactly one `Span`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Span {
    /// First covered token.
    pub start: usize,
    /// Last covered token (inclusive).
    pub end: usize,
}

impl Span {
    /// Create a span. `start` must not exceed `end`.
    pub const fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Span { start, end }
    }

    /// Number of covered tokens.
    pub const fn len(&self) -> usize {
        self.end - self.start + 1
    }

    /// Spans always cover at least one token.
    pub const fn is_empty(&self) -> bool {
        false
    }

    pub const fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// True when `other` is nested in `self` and differs from it.
    pub const fn strictly_contains(&self, other: &Span) -> bool {
        self.contains(other) && (self.start != other.start || self.end != other.end)
    }

    pub const fn contains_pos(&self, pos: usize) -> bool {
        self.start <= pos && pos <= self.end
    }

    pub const fn overlaps(&self, other: &Span) -> bool {
        self.start <= other.end && other.start <= self.end
    }

    pub fn positions(&self) -> std::ops::RangeInclusive<usize> {
        self.start..=self.end
    }
}

impl fmt::Display for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// One position of a rule pattern: a word, or a placeholder for a nested
/// sub-derivation.
///
/// `index` is the nonterminal's position in source order, so the same index on
/// both sides of a rule names the same placeholder.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Symbol {
    Terminal(String),
    NonTerm { label: String, index: usize },
}

impl Symbol {
    pub fn terminal(word: impl Into<String>) -> Self {
        Symbol::Terminal(word.into())
    }

    pub fn non_term(label: impl Into<String>, index: usize) -> Self {
        Symbol::NonTerm { label: label.into(), index }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Symbol::Terminal(_))
    }

    /// Parse the textual form produced by `Display` (`word` or `[X,1]`).
    ///
    /// The nonterminal index in the text is 1-based. Terminals carry `&`, `[`,
    /// `]` and `|` as entities; a terminal with a raw bracket or bar is
    /// rejected.
    pub fn parse(token: &str) -> Option<Self> {
        if let Some(caps) = regex!(r"^\[([^\[\],\s]+),([1-9][0-9]*)\]$").captures(token) {
            let index: usize = caps.get(2)?.as_str().parse().ok()?;
            return Some(Symbol::non_term(caps.get(1)?.as_str(), index - 1));
        }
        if token.is_empty() || token.contains(['[', ']', '|']) {
            return None;
        }

        let word = regex!(r"&(amp|#91|#93|#124);").replace_all(token, |caps: &regex::Captures<'_>| match &caps[1] {
            "amp" => "&",
            "#91" => "[",
            "#93" => "]",
            _ => "|",
        });
        Some(Symbol::terminal(word))
    }
}

/// Write `word` with the characters the rule stream reserves as entities.
fn escape_word(f: &mut fmt::Formatter<'_>, word: &str) -> fmt::Result {
    for ch in word.chars() {
        match ch {
            '&' => f.write_str("&amp;")?,
            '[' => f.write_str("&#91;")?,
            ']' => f.write_str("&#93;")?,
            '|' => f.write_str("&#124;")?,
            _ => write!(f, "{ch}")?,
        }
    }
    Ok(())
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Symbol::Terminal(word) => escape_word(f, word),
            Symbol::NonTerm { label, index } => write!(f, "[{},{}]", label, index + 1),
        }
    }
}

/// Join a pattern with single spaces.
pub(crate) fn format_pattern(symbols: &[Symbol]) -> String {
    symbols.iter().map(|s| s.to_string()).collect::<Vec<_>>().join(" ")
}

/// Format alignment pairs in Pharaoh notation (`0-0 1-1`).
pub(crate) fn format_alignment(pairs: &[(usize, usize)]) -> String {
    pairs.iter().map(|(s, t)| format!("{s}-{t}")).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn span_relations() {
        let outer = Span::new(1, 4);
        assert_eq!(outer.len(), 4);
        assert!(outer.contains(&Span::new(1, 4)));
        assert!(!outer.strictly_contains(&Span::new(1, 4)));
        assert!(outer.strictly_contains(&Span::new(2, 4)));
        assert!(!outer.contains(&Span::new(0, 2)));
        assert!(outer.overlaps(&Span::new(0, 1)));
        assert!(!outer.overlaps(&Span::new(5, 6)));
        assert_eq!(outer.to_string(), "1..=4");
    }

    #[test]
    fn symbol_text_form() {
        assert_eq!(Symbol::parse("[X,2]"), Some(Symbol::non_term("X", 1)));
        assert_eq!(Symbol::parse("house"), Some(Symbol::terminal("house")));
        assert_eq!(Symbol::parse("[X,0]"), None);
        assert_eq!(Symbol::parse(""), None);
        assert_eq!(Symbol::non_term("NP", 0).to_string(), "[NP,1]");
    }

    #[test]
    fn reserved_characters_are_escaped_in_terminals() {
        for word in ["[X,1]", "|||", "a&b", "&#91;", "x]y["] {
            let text = Symbol::terminal(word).to_string();
            assert!(!text.contains(['[', ']', '|']), "{text}");
            assert_eq!(Symbol::parse(&text), Some(Symbol::terminal(word)), "{text}");
        }
        assert_eq!(Symbol::terminal("[X,1]").to_string(), "&#91;X,1&#93;");
        assert_eq!(Symbol::parse("a|b"), None);
    }
}
