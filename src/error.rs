use crate::Span;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors surfaced by configuration loading and per-sentence input handling.
///
/// Rejected rules and pruned options are not errors; they are filtered
/// silently. Broken internal invariants panic instead of returning here.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Failed to read config file at {path:?}.")]
    ReadConfig { path: std::path::PathBuf, source: std::io::Error },
    #[error("Failed to parse config from {origin}: {source}")]
    ParseConfig { origin: String, source: toml::de::Error },
    #[error("{message}")]
    Validation { message: String },
    #[error("Malformed input on line {line}: {message}")]
    MalformedInput { line: usize, message: String },
    #[error("Span {span} is out of range for a sentence of {len} tokens.")]
    SpanOutOfRange { span: Span, len: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error only invalidates the current sentence.
    ///
    /// Callers processing a corpus log these and move on.
    pub fn is_sentence_scoped(&self) -> bool {
        matches!(self, Error::MalformedInput { .. } | Error::SpanOutOfRange { .. })
    }
}
