//! covrand: functional coverage and constrained-random stimulus
//!
//! Two halves of a verification testbench in one crate:
//!
//! - [`coverage`]: cover points, crosses and checks registered in a
//!   hierarchical [`CoverageDb`], with threshold and bin callbacks.
//! - [`crv`]: random variables resolved under hard constraints and weighted
//!   distributions, staged by an optional solve order.
//!
//! [`export`] writes coverage trees as XML, YAML or JSON documents and
//! merges documents from several runs without double-counting bins.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐  sample(Args)  ┌──────────────┐  export   ┌──────────────────┐
//! │ Testbench    │───────────────►│ CoverageDb   │──────────►│ CoverageDocument │
//! │ (call sites) │                │ (tree, cbs)  │           │ xml / yaml / json│
//! └──────┬───────┘                └──────────────┘           └────────┬─────────┘
//!        │ randomize()                                          merge │
//! ┌──────▼──────────────┐   joint hard   ┌───────────────────┐        ▼
//! │ RandomVariableSet   │───────────────►│ ConstraintSolver  │   merged report
//! │ prune, weigh, pick  │◄───────────────│ (backtracking)    │
//! └─────────────────────┘   solutions    └───────────────────┘
//! ```

#![warn(missing_docs)]

pub mod coverage;
pub mod crv;
pub mod export;
pub mod result;
pub mod value;

pub use coverage::{
    CoverCheck, CoverCheckBuilder, CoverCross, CoverCrossBuilder, CoverItem, CoverPoint,
    CoverPointBuilder, CoverageDb, CoverageSection, ItemKind, NodeSnapshot, FAIL, PASS,
};
pub use crv::{
    Assignment, BacktrackingSolver, Bindings, Constraint, ConstraintId, ConstraintSolver,
    CspConstraint, CspProblem, RandomVariableSet, Randomized, Seed, Verdict, WeightedChoice,
};
pub use export::{merge_files, BinRecord, CoverageDocument, DocumentFormat, NodeRecord, TOP};
pub use result::{CovError, CovResult};
pub use value::{values, Args, Value};
