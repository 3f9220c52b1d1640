use crate::decode::{Derivation, OptionId};

/// Search grid of one translation option.
///
/// Axis `i` walks slot `i`'s derivation list, which is sorted best first, so
/// the combined score never increases when a coordinate grows.
#[derive(Debug)]
pub struct DerivationCube<'c, S> {
    option: OptionId,
    score: f32,
    slots: Vec<&'c [Derivation<S>]>,
}

impl<'c, S> DerivationCube<'c, S> {
    /// # Panics
    ///
    /// If a slot has no derivations; such an option cannot be built.
    pub fn new(option: OptionId, score: f32, slots: Vec<&'c [Derivation<S>]>) -> Self {
        assert!(slots.iter().all(|s| !s.is_empty()), "cube for option {option:?} has an empty dimension");
        DerivationCube { option, score, slots }
    }

    pub fn option(&self) -> OptionId {
        self.option
    }

    /// Number of nonterminal dimensions.
    pub fn dims(&self) -> usize {
        self.slots.len()
    }

    /// Length of dimension `dim`.
    pub fn bound(&self, dim: usize) -> usize {
        self.slots[dim].len()
    }

    pub fn origin(&self) -> Vec<usize> {
        vec![0; self.slots.len()]
    }

    /// Option score plus the chosen derivation of every slot.
    ///
    /// # Panics
    ///
    /// If `coord` has the wrong arity or leaves the grid.
    pub fn combined_score(&self, coord: &[usize]) -> f32 {
        assert_eq!(coord.len(), self.slots.len(), "coordinate arity mismatch for option {:?}", self.option);

        self.slots.iter().zip(coord).fold(self.score, |acc, (slot, &rank)| {
            assert!(rank < slot.len(), "coordinate {coord:?} out of bounds for option {:?}", self.option);
            acc + slot[rank].score
        })
    }

    /// Derivation chosen for slot `dim` at `coord`.
    pub fn child(&self, dim: usize, coord: &[usize]) -> &'c Derivation<S> {
        &self.slots[dim][coord[dim]]
    }

    /// Coordinates one step further along each axis that stay inside the grid.
    pub fn neighbours<'a>(&'a self, coord: &'a [usize]) -> impl Iterator<Item = Vec<usize>> + 'a {
        (0..self.slots.len()).filter(move |&dim| coord[dim] + 1 < self.slots[dim].len()).map(move |dim| {
            let mut next = coord.to_vec();
            next[dim] += 1;
            next
        })
    }
}
