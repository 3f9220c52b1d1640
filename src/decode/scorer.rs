use crate::decode::ScoredOption;
use std::fmt;

/// Stateful feature applied to every derivation a cube search produces.
///
/// `evaluate` sees the option being applied and the states of the chosen
/// child derivations (slot order) and returns a score delta plus the state
/// to hand to parents. Implementations must be usable from several threads
/// decoding different sentences.
pub trait IncrementalScorer: Send + Sync {
    type State: Clone + fmt::Debug;

    fn evaluate(&self, option: &ScoredOption, children: &[&Self::State]) -> (f32, Self::State);
}

/// Adds nothing; rule scores alone decide.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullScorer;

impl IncrementalScorer for NullScorer {
    type State = ();

    fn evaluate(&self, _option: &ScoredOption, _children: &[&()]) -> (f32, ()) {
        (0.0, ())
    }
}
