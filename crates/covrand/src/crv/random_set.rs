//! Random variables, their fields and registered constraints.

use super::classify::{ConstraintClassifier, SlotKey};
use super::constraint::{Assignment, Constraint};
use super::solver::{BacktrackingSolver, ConstraintSolver};
use crate::result::{CovError, CovResult};
use crate::value::Value;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Largest value of the domain given to variables declared without one
pub const DEFAULT_DOMAIN_MAX: i64 = 65_534;

/// Deterministic seed for reproducible randomization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Seed(u64);

impl Seed {
    /// Create a seed from a u64 value
    #[must_use]
    pub const fn from_u64(value: u64) -> Self {
        Self(value)
    }

    /// Get the raw seed value
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone)]
pub(crate) struct RandVar {
    pub name: String,
    pub domain: Vec<Value>,
}

/// Constraint slots replaced by `randomize_with`, with what they held before
#[derive(Debug)]
pub(crate) struct Overlay {
    restore: Vec<(SlotKey, Option<Constraint>)>,
}

/// A set of random variables resolved together under constraints
///
/// Every random variable is backed by a field of the same name holding its
/// current value; other fields act as constants that constraints may read.
///
/// ```
/// use covrand::{Constraint, RandomVariableSet, Randomized, Seed};
///
/// let mut set = RandomVariableSet::with_seed(Seed::from_u64(7));
/// set.set_field("x", 0);
/// set.set_field("y", 0);
/// set.add_rand("x", 0..10).unwrap();
/// set.add_rand("y", 0..10).unwrap();
/// set.add_constraint(Constraint::hard(["x", "y"], |b| b.int("x") < b.int("y"))).unwrap();
///
/// set.randomize().unwrap();
/// assert!(set.int("x") < set.int("y"));
/// ```
#[derive(Debug, Clone)]
pub struct RandomVariableSet {
    pub(crate) fields: Assignment,
    pub(crate) rand_vars: Vec<RandVar>,
    pub(crate) constraints: ConstraintClassifier,
    pub(crate) order: Vec<Vec<String>>,
    pub(crate) solver: Arc<dyn ConstraintSolver>,
    pub(crate) rng: StdRng,
}

impl Default for RandomVariableSet {
    fn default() -> Self {
        Self::new()
    }
}

impl RandomVariableSet {
    fn with_rng(rng: StdRng) -> Self {
        Self {
            fields: Assignment::new(),
            rand_vars: Vec::new(),
            constraints: ConstraintClassifier::new(),
            order: Vec::new(),
            solver: Arc::new(BacktrackingSolver::new()),
            rng,
        }
    }

    /// Create an empty set seeded from system entropy
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create an empty set with a reproducible random stream
    #[must_use]
    pub fn with_seed(seed: Seed) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed.value()))
    }

    /// Replace the solver used for joint hard constraints
    #[must_use]
    pub fn with_solver(mut self, solver: impl ConstraintSolver + 'static) -> Self {
        self.solver = Arc::new(solver);
        self
    }

    /// Set a field, creating it if needed
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let _ = self.fields.insert(name.into(), value.into());
    }

    /// Current value of a field
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Integer value of a field, 0 when missing or not an integer
    #[must_use]
    pub fn int(&self, name: &str) -> i64 {
        self.field(name).and_then(Value::as_int).unwrap_or(0)
    }

    /// All fields by name
    #[must_use]
    pub const fn fields(&self) -> &Assignment {
        &self.fields
    }

    /// Declare `name` as a random variable drawn from `domain`
    ///
    /// An empty domain means `0..=DEFAULT_DOMAIN_MAX`. The field must
    /// already exist, and all random variables must be declared before the
    /// first constraint. Declaring a variable again replaces its domain.
    pub fn add_rand<I, T>(&mut self, name: &str, domain: I) -> CovResult<()>
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        if !self.constraints.is_empty() {
            return Err(CovError::configuration(format!(
                "random variable '{name}' declared after constraints"
            )));
        }
        if !self.fields.contains_key(name) {
            return Err(CovError::configuration(format!(
                "random variable '{name}' has no field"
            )));
        }

        let mut domain: Vec<Value> = domain.into_iter().map(Into::into).collect();
        if domain.is_empty() {
            domain = (0..=DEFAULT_DOMAIN_MAX).map(Value::Int).collect();
        }
        debug!(var = name, domain = domain.len(), "random variable declared");
        match self.rand_vars.iter_mut().find(|v| v.name == name) {
            Some(var) => var.domain = domain,
            None => self.rand_vars.push(RandVar {
                name: name.to_string(),
                domain,
            }),
        }
        Ok(())
    }

    /// Declare `name` as a random variable over the default domain
    pub fn add_rand_default(&mut self, name: &str) -> CovResult<()> {
        self.add_rand(name, Vec::<Value>::new())
    }

    /// Names of the random variables, in declaration order
    pub fn rand_names(&self) -> impl Iterator<Item = &str> {
        self.rand_vars.iter().map(|v| v.name.as_str())
    }

    /// Domain of a random variable
    #[must_use]
    pub fn domain(&self, name: &str) -> Option<&[Value]> {
        self.rand_vars
            .iter()
            .find(|v| v.name == name)
            .map(|v| v.domain.as_slice())
    }

    pub(crate) fn is_rand(&self, name: &str) -> bool {
        self.rand_vars.iter().any(|v| v.name == name)
    }

    fn slot_key(&self, constraint: &Constraint) -> CovResult<SlotKey> {
        if let Some(unknown) = constraint
            .args()
            .iter()
            .find(|a| !self.fields.contains_key(*a) && !self.is_rand(a))
        {
            return Err(CovError::configuration(format!(
                "constraint reads unknown variable '{unknown}'"
            )));
        }
        SlotKey::of(constraint, |a| self.is_rand(a)).ok_or_else(|| {
            CovError::configuration(format!(
                "constraint over {:?} reads no random variable",
                constraint.args()
            ))
        })
    }

    /// Register a constraint, returning the one it replaced
    ///
    /// At most one hard constraint and one distribution are kept per set of
    /// random variables.
    pub fn add_constraint(&mut self, constraint: Constraint) -> CovResult<Option<Constraint>> {
        let key = self.slot_key(&constraint)?;
        debug!(role = ?key.role, vars = ?key.vars, "constraint added");
        Ok(self.constraints.insert(key, constraint))
    }

    /// Remove a constraint; returns false if it was not registered
    pub fn del_constraint(&mut self, constraint: &Constraint) -> bool {
        self.constraints.remove(constraint.id()).is_some()
    }

    /// Registered constraints
    #[must_use]
    pub const fn constraints(&self) -> &ConstraintClassifier {
        &self.constraints
    }

    /// Resolve the variables in stages, one group at a time
    ///
    /// ```
    /// # use covrand::RandomVariableSet;
    /// let mut set = RandomVariableSet::new();
    /// for name in ["x", "y", "z"] {
    ///     set.set_field(name, 0);
    ///     set.add_rand(name, 0..4).unwrap();
    /// }
    /// set.solve_order([vec!["x"], vec!["y", "z"]]).unwrap();
    /// ```
    pub fn solve_order<G, S>(&mut self, groups: impl IntoIterator<Item = G>) -> CovResult<()>
    where
        G: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let groups: Vec<Vec<String>> = groups
            .into_iter()
            .map(|g| g.into_iter().map(Into::into).collect())
            .collect();

        let mut seen = BTreeSet::new();
        for name in groups.iter().flatten() {
            if !self.is_rand(name) {
                return Err(CovError::configuration(format!(
                    "solve order names '{name}', which is not a random variable"
                )));
            }
            if !seen.insert(name.as_str()) {
                return Err(CovError::configuration(format!(
                    "solve order names '{name}' more than once"
                )));
            }
        }
        if groups.iter().any(Vec::is_empty) {
            return Err(CovError::configuration("solve order has an empty group"));
        }

        self.order = groups;
        Ok(())
    }

    /// Install temporary constraints
    pub(crate) fn push_overlay(&mut self, extra: &[Constraint]) -> CovResult<Overlay> {
        let mut overlay = Overlay {
            restore: Vec::new(),
        };
        for constraint in extra {
            let key = match self.slot_key(constraint) {
                Ok(key) => key,
                Err(e) => {
                    self.pop_overlay(overlay);
                    return Err(e);
                }
            };
            let previous = self.constraints.insert(key.clone(), constraint.clone());
            // Only the first replacement of a slot holds the declared constraint
            if !overlay.restore.iter().any(|(k, _)| *k == key) {
                overlay.restore.push((key, previous));
            }
        }
        Ok(overlay)
    }

    /// Undo `push_overlay`
    pub(crate) fn pop_overlay(&mut self, overlay: Overlay) {
        for (key, previous) in overlay.restore {
            match previous {
                Some(constraint) => {
                    let _ = self.constraints.insert(key, constraint);
                }
                None => {
                    let _ = self.constraints.remove_slot(&key);
                }
            }
        }
    }
}

/// Objects whose random variables can be resolved on demand
///
/// Implementors expose their [`RandomVariableSet`] and may override the
/// hooks around each resolution.
///
/// ```
/// use covrand::{Constraint, CovResult, RandomVariableSet, Randomized};
///
/// struct Packet {
///     rand: RandomVariableSet,
///     resolved: usize,
/// }
///
/// impl Randomized for Packet {
///     fn random_set(&self) -> &RandomVariableSet {
///         &self.rand
///     }
///     fn random_set_mut(&mut self) -> &mut RandomVariableSet {
///         &mut self.rand
///     }
///     fn post_randomize(&mut self) {
///         self.resolved += 1;
///     }
/// }
///
/// # fn main() -> CovResult<()> {
/// let mut rand = RandomVariableSet::new();
/// rand.set_field("len", 0);
/// rand.add_rand("len", 1..=64)?;
/// let mut packet = Packet { rand, resolved: 0 };
/// packet.randomize_with(&[Constraint::hard(["len"], |b| b.int("len") > 60)])?;
/// assert!(packet.random_set().int("len") > 60);
/// assert_eq!(packet.resolved, 1);
/// # Ok(())
/// # }
/// ```
pub trait Randomized {
    /// The random variables of this object
    fn random_set(&self) -> &RandomVariableSet;

    /// Mutable access to the random variables
    fn random_set_mut(&mut self) -> &mut RandomVariableSet;

    /// Runs before every resolution
    fn pre_randomize(&mut self) {}

    /// Runs after every successful resolution
    fn post_randomize(&mut self) {}

    /// Draw new values for all random variables
    fn randomize(&mut self) -> CovResult<()> {
        self.pre_randomize();
        self.random_set_mut().resolve()?;
        self.post_randomize();
        Ok(())
    }

    /// Draw new values under additional constraints for this call only
    ///
    /// The extra constraints replace declared ones with the same variables
    /// and role; the declared set is restored whether or not resolution
    /// succeeds.
    fn randomize_with(&mut self, extra: &[Constraint]) -> CovResult<()> {
        let overlay = self.random_set_mut().push_overlay(extra)?;
        let result = self.randomize();
        self.random_set_mut().pop_overlay(overlay);
        result
    }
}

impl Randomized for RandomVariableSet {
    fn random_set(&self) -> &RandomVariableSet {
        self
    }

    fn random_set_mut(&mut self) -> &mut RandomVariableSet {
        self
    }
}
