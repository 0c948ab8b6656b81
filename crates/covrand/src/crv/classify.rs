//! Classification of constraints into simple/joint, hard/weighted slots.
//!
//! A constraint is keyed by its role and the random variables it reads.
//! One slot holds one constraint: adding another constraint with the same
//! key replaces the first, which is how `randomize_with` overrides a
//! declared constraint for a single call.

use super::constraint::{Constraint, ConstraintId};
use std::collections::{BTreeMap, BTreeSet};

/// How a constraint takes part in resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    /// Hard constraint over one random variable (domain pruning)
    SimpleHard,
    /// Distribution over one random variable
    SimpleWeight,
    /// Hard constraint over several random variables (solver input)
    JointHard,
    /// Distribution over several random variables
    JointWeight,
}

impl Role {
    fn of(constraint: &Constraint, random_args: usize) -> Self {
        match (constraint.is_hard(), random_args > 1) {
            (true, false) => Self::SimpleHard,
            (false, false) => Self::SimpleWeight,
            (true, true) => Self::JointHard,
            (false, true) => Self::JointWeight,
        }
    }

    /// Check if the role involves several random variables
    #[must_use]
    pub const fn is_joint(self) -> bool {
        matches!(self, Self::JointHard | Self::JointWeight)
    }
}

/// Slot of a constraint in the table
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotKey {
    /// Role of the constraint
    pub role: Role,
    /// Random variables the constraint reads, sorted
    pub vars: Vec<String>,
}

impl SlotKey {
    /// Key of `constraint` given the set of random variable names
    ///
    /// Returns `None` when the constraint reads no random variable.
    #[must_use]
    pub fn of(constraint: &Constraint, is_random: impl Fn(&str) -> bool) -> Option<Self> {
        let vars: Vec<String> = constraint
            .args()
            .iter()
            .filter(|a| is_random(a))
            .cloned()
            .collect();
        if vars.is_empty() {
            return None;
        }
        Some(Self {
            role: Role::of(constraint, vars.len()),
            vars,
        })
    }
}

/// Table of declared constraints, one per slot
#[derive(Debug, Clone, Default)]
pub struct ConstraintClassifier {
    slots: BTreeMap<SlotKey, Constraint>,
}

impl ConstraintClassifier {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `constraint` under `key`, returning the constraint it replaced
    pub fn insert(&mut self, key: SlotKey, constraint: Constraint) -> Option<Constraint> {
        self.slots.insert(key, constraint)
    }

    /// Clear a slot
    pub fn remove_slot(&mut self, key: &SlotKey) -> Option<Constraint> {
        self.slots.remove(key)
    }

    /// Remove the constraint with this identity, wherever it is stored
    pub fn remove(&mut self, id: ConstraintId) -> Option<Constraint> {
        let key = self
            .slots
            .iter()
            .find(|(_, c)| c.id() == id)
            .map(|(k, _)| k.clone())?;
        self.slots.remove(&key)
    }

    /// Constraint stored under `key`
    #[must_use]
    pub fn get(&self, key: &SlotKey) -> Option<&Constraint> {
        self.slots.get(key)
    }

    /// Iterate over slots in key order
    pub fn iter(&self) -> impl Iterator<Item = (&SlotKey, &Constraint)> {
        self.slots.iter()
    }

    /// Number of stored constraints
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Random variables read by any joint constraint
    pub(crate) fn joint_vars(&self) -> BTreeSet<&str> {
        self.slots
            .keys()
            .filter(|k| k.role.is_joint())
            .flat_map(|k| k.vars.iter().map(String::as_str))
            .collect()
    }

    /// Constraints relevant to one resolution stage
    ///
    /// Variables in `resolved` already carry their final value and are read
    /// like fields. A constraint still reading an unresolved variable outside
    /// `scope` belongs to a later stage and is left out.
    pub(crate) fn view(
        &self,
        scope: &BTreeSet<String>,
        random: &BTreeSet<String>,
        resolved: &BTreeSet<String>,
    ) -> ConstraintView {
        let mut view = ConstraintView::default();
        for constraint in self.slots.values() {
            let pending = |a: &&String| random.contains(*a) && !resolved.contains(*a);
            if constraint.args().iter().filter(pending).any(|a| !scope.contains(a)) {
                continue;
            }
            let Some(key) = SlotKey::of(constraint, |a| scope.contains(a)) else {
                continue;
            };
            let constraint = constraint.clone();
            let SlotKey { role, mut vars } = key;
            match role {
                Role::SimpleHard => {
                    let var = vars.swap_remove(0);
                    view.simple_hard.entry(var).or_default().push(constraint);
                }
                Role::SimpleWeight => {
                    let var = vars.swap_remove(0);
                    view.simple_weight.entry(var).or_default().push(constraint);
                }
                Role::JointHard => view.joint_hard.push((vars, constraint)),
                Role::JointWeight => view.joint_weight.push((vars, constraint)),
            }
        }
        view
    }
}

/// Constraints of one stage grouped by role
///
/// Several constraints may land on the same variable set once earlier
/// stages are resolved; hard ones are conjoined and weights multiplied.
#[derive(Debug, Default)]
pub(crate) struct ConstraintView {
    pub simple_hard: BTreeMap<String, Vec<Constraint>>,
    pub simple_weight: BTreeMap<String, Vec<Constraint>>,
    pub joint_hard: Vec<(Vec<String>, Constraint)>,
    pub joint_weight: Vec<(Vec<String>, Constraint)>,
}
