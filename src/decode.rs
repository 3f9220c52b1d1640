//! Cube-pruning chart decoder.
//!
//! Cells are filled bottom-up, one span length at a time, so every sub-span a
//! rule refers to is final before the span containing it is processed:
//!
//! ```text
//! PhraseTable::lookup (table.rs) ── candidates for span
//!                │
//!                v
//! OptionListBuilder::add (option_list.rs)
//!   - estimate = rule score + best child scores
//!   - threshold admission, compaction at 2 × rule_limit
//!                │ finalize: cut to rule_limit, bind slots
//!                v
//! DerivationCube per option (cube.rs)
//!                │
//!                v
//! CubeFrontierQueue::take_best (queue.rs)
//!   - beam_size pops, neighbours expanded lazily
//!                │ IncrementalScorer::evaluate (scorer.rs)
//!                v
//! Chart cell, sorted best first (chart.rs)
//! ```
//!
//! `Decoder` (decoder.rs) drives the loop and renders the best derivation of
//! the whole sentence. All per-sentence state lives in the [`Chart`]; nothing
//! is shared between sentences except the phrase table and configuration.

#[path = "decode/chart.rs"]
mod chart;
#[path = "decode/cube.rs"]
mod cube;
#[path = "decode/decoder.rs"]
mod decoder;
#[path = "decode/option_list.rs"]
mod option_list;
#[path = "decode/queue.rs"]
mod queue;
#[path = "decode/scorer.rs"]
mod scorer;
#[path = "decode/table.rs"]
mod table;

pub use chart::{Chart, Derivation, OptionArena};
pub use cube::DerivationCube;
pub use decoder::{Decoded, Decoder};
pub use option_list::{BoundOption, FinalizedCells, OptionId, OptionList, OptionListBuilder, ScoredOption, prune_flat};
pub use queue::{CubeFrontierQueue, FrontierEntry};
pub use scorer::{IncrementalScorer, NullScorer};
pub use table::{PhraseTable, RuleTable};
