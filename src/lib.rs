//! quartz-sat - CDCL SAT solver search core
//!
//! The search machinery of a conflict-driven clause-learning solver:
//!
//! ## Core search
//! - 2-watched literal propagation with blocking literals and a binary
//!   fast path
//! - First-UIP conflict analysis with recursive clause minimization and
//!   bounded eager subsumption
//! - Chronological and non-chronological backjumping with trail reuse
//! - VMTF (focused mode) and EVSIDS (stable mode) decision heuristics
//! - Phase saving with target phases for stable mode
//!
//! ## Preprocessing support
//! - Gate extraction (equivalence / AND / ITE / XOR recognition) used to
//!   restrict resolutions during bounded variable elimination
//! - Lucky-phase pre-solving: eight cheap satisfiability attempts before
//!   real search
//!
//! ## Proofs
//! - DRAT output (text and binary), with binary clause deletions deferred
//!   to physical reclamation
//!
//! Restart, reduce and rephase *scheduling* are deliberately outside this
//! crate; the solver exposes the hooks such a driver needs (`backtrack`,
//! `collect_garbage`, `set_stable`, the shuffles, `decision_of_level`).

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clause;
pub mod conflict;
pub mod gates;
pub mod literal;
pub mod options;
pub mod proof;
pub mod queue;
pub mod solver;
pub mod sort;
pub mod vsids;
pub mod watched;

pub use clause::{ClauseDb, ClauseHeader, ClauseRef};
pub use gates::{Gate, GateExtractor, GateKind, GateScan, GateStats, Occurrences};
pub use literal::{Literal, Variable};
pub use options::Options;
pub use proof::ProofWriter;
pub use queue::Queue;
pub use solver::{LuckyStats, Reason, SearchStats, Solver, Status};
pub use vsids::ScoreHeap;
pub use watched::{WatchLists, Watcher};
