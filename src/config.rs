//! Run configuration.
//!
//! A configuration file is TOML with three required sections:
//!
//! ```toml
//! [extract]
//! max_non_terms = 2
//!
//! [decode]
//! rule_limit = 100
//!
//! [weight]
//! translation = 1.0
//! ```
//!
//! Keys inside a section fall back to the defaults below. Unknown keys and
//! missing sections are rejected up front so a typo never silently turns into
//! a default.

use crate::extract::{CountPolicy, Fractional, Indicator};
use crate::{Error, Result};
use serde::Deserialize;
use std::{fs, path::Path};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub extract: ExtractConfig,
    pub decode: DecodeConfig,
    pub weight: WeightConfig,
}

/// Limits applied while turning consistent phrases into rules.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ExtractConfig {
    /// Maximum number of nonterminals per rule.
    pub max_non_terms: usize,
    /// Widest source span a rule may be rooted at.
    pub max_span: usize,
    /// Maximum number of source-side symbols (terminals + nonterminals).
    pub max_symbols_source: usize,
    /// Narrowest source span a nonterminal may cover.
    pub min_hole_source: usize,
    /// Allow two nonterminals to be adjacent on the source side.
    pub non_term_consec_source: bool,
    /// Allow a rule's source side to start with a nonterminal.
    pub non_term_first_word: bool,
    /// Require at least one aligned source terminal.
    pub require_aligned_word: bool,
    /// Spread unit mass over the rules of each phrase instead of counting 1 per rule.
    pub fractional_counting: bool,
}

impl Default for ExtractConfig {
    fn default() -> Self {
        Self {
            max_non_terms: 2,
            max_span: 10,
            max_symbols_source: 5,
            min_hole_source: 1,
            non_term_consec_source: false,
            non_term_first_word: true,
            require_aligned_word: true,
            fractional_counting: false,
        }
    }
}

impl ExtractConfig {
    /// Count policy selected by `fractional_counting`.
    pub fn count_policy(&self) -> &'static dyn CountPolicy {
        if self.fractional_counting { &Fractional as &'static dyn CountPolicy } else { &Indicator }
    }
}

/// Search limits for chart decoding.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DecodeConfig {
    /// Translation options kept per chart cell.
    pub rule_limit: usize,
    /// Rule-table entries kept per source pattern.
    pub table_limit: usize,
    /// Derivations popped from the cube frontier per chart cell.
    pub beam_size: usize,
    /// Score distance below the best option at which flat lists are cut.
    pub beam_width: f32,
    /// Add monotone `[X,1] [X,2]` concatenation rules.
    pub glue: bool,
}

impl Default for DecodeConfig {
    fn default() -> Self {
        Self { rule_limit: 100, table_limit: 20, beam_size: 200, beam_width: 10.0, glue: true }
    }
}

/// Log-linear weights for the built-in features.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WeightConfig {
    /// Weight on the log relative frequency of a rule.
    pub translation: f32,
    /// Weight per target terminal.
    pub word_penalty: f32,
    /// Score of passing an unknown word through untranslated.
    pub unknown: f32,
    /// Score of one glue concatenation.
    pub glue: f32,
}

impl Default for WeightConfig {
    fn default() -> Self {
        Self { translation: 1.0, word_penalty: -0.1, unknown: -100.0, glue: -1.0 }
    }
}

impl Config {
    /// Parse and validate a configuration held in memory.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let cfg: Config =
            toml::from_str(raw).map_err(|err| Error::ParseConfig { origin: "<inline>".to_string(), source: err })?;

        validate(&cfg)?;

        Ok(cfg)
    }
}

/// Read, parse and validate the configuration file at `path`.
pub fn load(path: &Path) -> Result<Config> {
    let raw = fs::read_to_string(path).map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

    let cfg: Config = toml::from_str(&raw)
        .map_err(|err| Error::ParseConfig { origin: path.display().to_string(), source: err })?;

    validate(&cfg)?;

    Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
    if cfg.extract.max_span == 0 {
        return Err(Error::Validation { message: "extract.max_span must be greater than zero.".to_string() });
    }
    if cfg.extract.max_symbols_source == 0 {
        return Err(Error::Validation {
            message: "extract.max_symbols_source must be greater than zero.".to_string(),
        });
    }
    if cfg.extract.min_hole_source == 0 {
        return Err(Error::Validation { message: "extract.min_hole_source must be greater than zero.".to_string() });
    }
    if cfg.decode.rule_limit == 0 {
        return Err(Error::Validation { message: "decode.rule_limit must be greater than zero.".to_string() });
    }
    if cfg.decode.table_limit == 0 {
        return Err(Error::Validation { message: "decode.table_limit must be greater than zero.".to_string() });
    }
    if cfg.decode.beam_size == 0 {
        return Err(Error::Validation { message: "decode.beam_size must be greater than zero.".to_string() });
    }
    if !cfg.decode.beam_width.is_finite() || cfg.decode.beam_width < 0.0 {
        return Err(Error::Validation {
            message: "decode.beam_width must be a finite number, zero or greater.".to_string(),
        });
    }

    for (label, weight) in [
        ("translation", cfg.weight.translation),
        ("word_penalty", cfg.weight.word_penalty),
        ("unknown", cfg.weight.unknown),
        ("glue", cfg.weight.glue),
    ] {
        if !weight.is_finite() {
            return Err(Error::Validation { message: format!("weight.{label} must be a finite number.") });
        }
    }

    Ok(())
}
