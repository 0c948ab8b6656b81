//! Constraints over random variables and fields.

use crate::value::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Values of every variable a constraint may read, by name
pub type Assignment = BTreeMap<String, Value>;

type HardFn = dyn Fn(&Bindings<'_>) -> bool + Send + Sync;
type WeightFn = dyn Fn(&Bindings<'_>) -> f64 + Send + Sync;

/// Identity of a constraint, shared by its clones
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConstraintId(u64);

impl ConstraintId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Result of evaluating a constraint
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Verdict {
    /// Hard constraint: the assignment must satisfy it
    Hard(bool),
    /// Distribution: relative likelihood, zero excludes the assignment
    Weight(f64),
}

#[derive(Clone)]
enum Body {
    Hard(Arc<HardFn>),
    Weight(Arc<WeightFn>),
}

/// A hard constraint or a distribution over named variables
///
/// The argument names are given explicitly and decide, together with the
/// set's random variables, whether the constraint is simple (one random
/// variable) or joint (several).
///
/// ```
/// use covrand::Constraint;
///
/// let lt = Constraint::hard(["x", "y"], |b| b.int("x") < b.int("y"));
/// let skew = Constraint::weight(["x"], |b| if b.int("x") == 0 { 10.0 } else { 1.0 });
/// assert!(lt.is_hard());
/// assert!(!skew.is_hard());
/// ```
#[derive(Clone)]
pub struct Constraint {
    id: ConstraintId,
    args: Vec<String>,
    body: Body,
}

fn arg_names<I, S>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut names: Vec<String> = args.into_iter().map(Into::into).collect();
    names.sort();
    names.dedup();
    names
}

impl Constraint {
    /// A constraint every accepted assignment must satisfy
    pub fn hard<I, S>(args: I, f: impl Fn(&Bindings<'_>) -> bool + Send + Sync + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: ConstraintId::next(),
            args: arg_names(args),
            body: Body::Hard(Arc::new(f)),
        }
    }

    /// A distribution weighting otherwise valid assignments
    pub fn weight<I, S>(args: I, f: impl Fn(&Bindings<'_>) -> f64 + Send + Sync + 'static) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: ConstraintId::next(),
            args: arg_names(args),
            body: Body::Weight(Arc::new(f)),
        }
    }

    /// Identity used by `del_constraint`
    #[must_use]
    pub const fn id(&self) -> ConstraintId {
        self.id
    }

    /// Argument names, sorted
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Check if this is a hard constraint
    #[must_use]
    pub const fn is_hard(&self) -> bool {
        matches!(self.body, Body::Hard(_))
    }

    /// Evaluate against the given bindings
    #[must_use]
    pub fn eval(&self, bindings: &Bindings<'_>) -> Verdict {
        match &self.body {
            Body::Hard(f) => Verdict::Hard(f(bindings)),
            Body::Weight(f) => Verdict::Weight(f(bindings)),
        }
    }

    /// Hard constraints must hold; distributions hold where they weigh above zero
    pub(crate) fn holds(&self, bindings: &Bindings<'_>) -> bool {
        match self.eval(bindings) {
            Verdict::Hard(ok) => ok,
            Verdict::Weight(w) => w > 0.0,
        }
    }

    /// Distributions weigh themselves; hard constraints weigh 1 or 0
    pub(crate) fn weigh(&self, bindings: &Bindings<'_>) -> f64 {
        match self.eval(bindings) {
            Verdict::Hard(ok) => f64::from(u8::from(ok)),
            Verdict::Weight(w) => w,
        }
    }
}

impl fmt::Debug for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constraint")
            .field("id", &self.id)
            .field("args", &self.args)
            .field("hard", &self.is_hard())
            .finish()
    }
}

/// Variable values visible to a constraint
///
/// A name resolves to the value under test first, then to the candidate
/// assignment, then to the current field table.
#[derive(Debug, Clone, Copy)]
pub struct Bindings<'a> {
    fields: &'a Assignment,
    assignment: Option<&'a Assignment>,
    probe: Option<(&'a str, &'a Value)>,
}

impl<'a> Bindings<'a> {
    /// Bindings over a field table only
    #[must_use]
    pub const fn new(fields: &'a Assignment) -> Self {
        Self {
            fields,
            assignment: None,
            probe: None,
        }
    }

    /// Overlay a candidate assignment
    #[must_use]
    pub const fn with_assignment(mut self, assignment: &'a Assignment) -> Self {
        self.assignment = Some(assignment);
        self
    }

    /// Overlay a single variable
    #[must_use]
    pub const fn with_probe(mut self, name: &'a str, value: &'a Value) -> Self {
        self.probe = Some((name, value));
        self
    }

    /// Value bound to `name`
    #[must_use]
    pub fn value(&self, name: &str) -> Option<&'a Value> {
        if let Some((probe, value)) = self.probe {
            if probe == name {
                return Some(value);
            }
        }
        self.assignment
            .and_then(|a| a.get(name))
            .or_else(|| self.fields.get(name))
    }

    /// Integer bound to `name`, 0 when unbound or not an integer
    #[must_use]
    pub fn int(&self, name: &str) -> i64 {
        self.value(name).and_then(Value::as_int).unwrap_or(0)
    }

    /// Boolean bound to `name`, false when unbound or not a boolean
    #[must_use]
    pub fn bool(&self, name: &str) -> bool {
        self.value(name).and_then(Value::as_bool).unwrap_or(false)
    }

    /// String bound to `name`, empty when unbound or not a string
    #[must_use]
    pub fn str(&self, name: &str) -> &'a str {
        self.value(name).and_then(Value::as_str).unwrap_or("")
    }
}
