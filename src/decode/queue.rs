//! Lazy best-first search over the cubes of one chart cell.
//!
//! ```text
//! seed:   every cube's origin (0, .., 0), marked visited
//! pop:    best entry overall  ──▶ next derivation of the cell
//! expand: (.., c_i + 1, ..) for every axis i, if in bounds and unvisited
//! stop:   after `beam_size` pops, or when the frontier runs dry
//! ```
//!
//! Scores never increase along an axis, so an unexpanded point can never beat
//! the entry that would have exposed it; the k-th pop is the k-th best point
//! of all grids together.

use crate::decode::{DerivationCube, OptionId};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// A point of one cube with its combined score.
#[derive(Debug, Clone)]
pub struct FrontierEntry {
    pub score: f32,
    /// Position of the cube in the queue.
    pub cube: usize,
    pub option: OptionId,
    pub coord: Vec<usize>,
}

/// Max-heap order: higher score first, then lower option id, then the
/// lexicographically smaller coordinate.
impl Ord for FrontierEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.option.cmp(&self.option))
            .then_with(|| other.coord.cmp(&self.coord))
    }
}

impl PartialOrd for FrontierEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for FrontierEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for FrontierEntry {}

pub struct CubeFrontierQueue<'c, S> {
    cubes: Vec<DerivationCube<'c, S>>,
    frontier: BinaryHeap<FrontierEntry>,
    visited: HashSet<(OptionId, Vec<usize>)>,
    pops: usize,
}

impl<'c, S> CubeFrontierQueue<'c, S> {
    /// Seed the frontier with the origin of every cube.
    pub fn new(cubes: Vec<DerivationCube<'c, S>>) -> Self {
        let mut queue =
            CubeFrontierQueue { frontier: BinaryHeap::with_capacity(cubes.len()), visited: HashSet::new(), pops: 0, cubes };

        for index in 0..queue.cubes.len() {
            let origin = queue.cubes[index].origin();
            queue.push(index, origin);
        }

        queue
    }

    fn push(&mut self, cube: usize, coord: Vec<usize>) {
        let option = self.cubes[cube].option();
        if !self.visited.insert((option, coord.clone())) {
            return;
        }

        let score = self.cubes[cube].combined_score(&coord);
        self.frontier.push(FrontierEntry { score, cube, option, coord });
    }

    pub fn is_empty(&self) -> bool {
        self.frontier.is_empty()
    }

    /// Entries waiting on the frontier.
    pub fn len(&self) -> usize {
        self.frontier.len()
    }

    pub fn pops(&self) -> usize {
        self.pops
    }

    /// Take the best point and put its unvisited neighbours on the frontier.
    pub fn pop(&mut self) -> Option<FrontierEntry> {
        let entry = self.frontier.pop()?;
        self.pops += 1;

        let next: Vec<Vec<usize>> = self.cubes[entry.cube].neighbours(&entry.coord).collect();
        for coord in next {
            self.push(entry.cube, coord);
        }

        tracing::trace!(option = entry.option.index(), coord = ?entry.coord, score = entry.score, "cube pop");

        Some(entry)
    }

    /// Pop up to `beam_size` entries, best first.
    pub fn take_best(&mut self, beam_size: usize) -> Vec<FrontierEntry> {
        let mut best = Vec::with_capacity(beam_size.min(self.frontier.len().max(1)));
        while best.len() < beam_size {
            match self.pop() {
                Some(entry) => best.push(entry),
                None => break,
            }
        }
        best
    }

    pub fn cube(&self, index: usize) -> &DerivationCube<'c, S> {
        &self.cubes[index]
    }
}
