//! Constrained-random value generation.
//!
//! A [`RandomVariableSet`] holds fields, declares some of them as random
//! variables with finite domains and resolves them under registered
//! constraints:
//!
//! - simple hard constraints prune a single variable's domain,
//! - joint hard constraints are solved by a [`ConstraintSolver`],
//! - distributions weigh the surviving candidates for a [`WeightedChoice`].
//!
//! An optional solve order resolves the variables in stages, treating
//! earlier stages as constants.
//!
//! Enumerating joint candidates is exhaustive over the pruned domains, so
//! large domains under joint constraints get expensive quickly. Keep them
//! small or prune them with simple constraints first.
//!
//! ```
//! use covrand::{Constraint, RandomVariableSet, Randomized, Seed};
//!
//! # fn main() -> covrand::CovResult<()> {
//! let mut set = RandomVariableSet::with_seed(Seed::from_u64(1));
//! set.set_field("kind", "read");
//! set.set_field("addr", 0);
//! set.add_rand("kind", ["read", "write"])?;
//! set.add_rand("addr", 0..16)?;
//! set.add_constraint(Constraint::hard(["kind", "addr"], |b| {
//!     b.str("kind") != "write" || b.int("addr") < 4
//! }))?;
//!
//! for _ in 0..20 {
//!     set.randomize()?;
//!     if set.field("kind").and_then(|v| v.as_str()) == Some("write") {
//!         assert!(set.int("addr") < 4);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod classify;
mod constraint;
mod random_set;
mod resolve;
mod solver;
mod weighted;


pub use classify::{ConstraintClassifier, Role, SlotKey};
pub use constraint::{Assignment, Bindings, Constraint, ConstraintId, Verdict};
pub use random_set::{RandomVariableSet, Randomized, Seed, DEFAULT_DOMAIN_MAX};
pub use solver::{BacktrackingSolver, ConstraintSolver, CspConstraint, CspProblem};
pub use weighted::WeightedChoice;
