//! Finite-domain constraint satisfaction.
//!
//! The randomizer hands the joint hard constraints of a stage to a
//! [`ConstraintSolver`] and expects every satisfying assignment back, so it
//! can weigh them against each other before picking one.

use super::constraint::Assignment;
use crate::value::Value;
use std::fmt;

/// Predicate over the variables in `scope`
pub struct CspConstraint<'a> {
    /// Variables the predicate reads
    pub scope: Vec<String>,
    predicate: Box<dyn Fn(&Assignment) -> bool + 'a>,
}

impl<'a> CspConstraint<'a> {
    /// Create a constraint over `scope`
    pub fn new(scope: Vec<String>, predicate: impl Fn(&Assignment) -> bool + 'a) -> Self {
        Self {
            scope,
            predicate: Box::new(predicate),
        }
    }

    /// Check the predicate on a (partial) assignment
    #[must_use]
    pub fn check(&self, assignment: &Assignment) -> bool {
        (self.predicate)(assignment)
    }
}

impl fmt::Debug for CspConstraint<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CspConstraint")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

/// Variables with finite domains plus constraints over them
#[derive(Debug, Default)]
pub struct CspProblem<'a> {
    /// Variable names with their candidate values
    pub variables: Vec<(String, Vec<Value>)>,
    /// Constraints every solution must satisfy
    pub constraints: Vec<CspConstraint<'a>>,
}

impl<'a> CspProblem<'a> {
    /// Create an empty problem
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable
    pub fn add_variable(&mut self, name: impl Into<String>, domain: Vec<Value>) {
        self.variables.push((name.into(), domain));
    }

    /// Add a constraint
    pub fn add_constraint(&mut self, constraint: CspConstraint<'a>) {
        self.constraints.push(constraint);
    }
}

/// Pluggable finite-domain solver
pub trait ConstraintSolver: Send + Sync + fmt::Debug {
    /// Every assignment of all variables satisfying all constraints
    ///
    /// The order of the returned solutions is not significant.
    fn solve(&self, problem: &CspProblem<'_>) -> Vec<Assignment>;
}

/// Exhaustive depth-first search with early constraint checks
///
/// Variables in many constraints are assigned first, ties broken by the
/// smaller domain. A constraint is checked as soon as the last variable of
/// its scope is assigned, so failing prefixes are cut early.
#[derive(Debug, Clone, Copy, Default)]
pub struct BacktrackingSolver;

impl BacktrackingSolver {
    /// Create a solver
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

struct Search<'p, 'a> {
    order: Vec<usize>,
    variables: &'p [(String, Vec<Value>)],
    /// Constraints to check once the variable at each depth is assigned
    checks: Vec<Vec<&'p CspConstraint<'a>>>,
    solutions: Vec<Assignment>,
}

impl Search<'_, '_> {
    fn run(&mut self, depth: usize, assignment: &mut Assignment) {
        if depth == self.order.len() {
            self.solutions.push(assignment.clone());
            return;
        }
        let variables = self.variables;
        let (name, domain) = &variables[self.order[depth]];
        for value in domain {
            let _ = assignment.insert(name.clone(), value.clone());
            if self.checks[depth].iter().all(|c| c.check(assignment)) {
                self.run(depth + 1, assignment);
            }
        }
        let _ = assignment.remove(name);
    }
}

impl ConstraintSolver for BacktrackingSolver {
    fn solve(&self, problem: &CspProblem<'_>) -> Vec<Assignment> {
        let variables = &problem.variables;
        let degree = |name: &str| {
            problem
                .constraints
                .iter()
                .filter(|c| c.scope.iter().any(|s| s == name))
                .count()
        };

        let mut order: Vec<usize> = (0..variables.len()).collect();
        order.sort_by(|&a, &b| {
            let (name_a, dom_a) = &variables[a];
            let (name_b, dom_b) = &variables[b];
            degree(name_b)
                .cmp(&degree(name_a))
                .then(dom_a.len().cmp(&dom_b.len()))
                .then(name_a.cmp(name_b))
        });

        let position = |name: &str| order.iter().position(|&i| variables[i].0 == name);
        let mut checks = vec![Vec::new(); order.len()];
        let mut upfront = Vec::new();
        for constraint in &problem.constraints {
            match constraint.scope.iter().filter_map(|s| position(s)).max() {
                Some(depth) => checks[depth].push(constraint),
                None => upfront.push(constraint),
            }
        }

        let empty = Assignment::new();
        if !upfront.iter().all(|c| c.check(&empty)) {
            return Vec::new();
        }

        let mut search = Search {
            order,
            variables,
            checks,
            solutions: Vec::new(),
        };
        search.run(0, &mut Assignment::new());
        search.solutions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::values;

    fn int(a: &Assignment, name: &str) -> i64 {
        a.get(name).and_then(Value::as_int).unwrap_or(0)
    }

    #[test]
    fn test_all_solutions_found() {
        let mut problem = CspProblem::new();
        problem.add_variable("x", values(0..4));
        problem.add_variable("y", values(0..4));
        problem.add_constraint(CspConstraint::new(vec!["x".into(), "y".into()], |a| {
            int(a, "x") < int(a, "y")
        }));
        let solutions = BacktrackingSolver::new().solve(&problem);
        assert_eq!(solutions.len(), 6);
        assert!(solutions.iter().all(|s| int(s, "x") < int(s, "y")));
    }

    #[test]
    fn test_unconstrained_variables_enumerated() {
        let mut problem = CspProblem::new();
        problem.add_variable("a", values([true, false]));
        problem.add_variable("b", values(["p", "q", "r"]));
        assert_eq!(BacktrackingSolver.solve(&problem).len(), 6);
    }

    #[test]
    fn test_no_solution() {
        let mut problem = CspProblem::new();
        problem.add_variable("x", values(0..3));
        problem.add_variable("y", values(0..3));
        problem.add_constraint(CspConstraint::new(vec!["x".into(), "y".into()], |a| {
            int(a, "x") + int(a, "y") > 10
        }));
        assert!(BacktrackingSolver.solve(&problem).is_empty());
    }

    #[test]
    fn test_constraint_on_unknown_scope_checked_once() {
        let mut problem = CspProblem::new();
        problem.add_variable("x", values(0..3));
        problem.add_constraint(CspConstraint::new(vec!["size".into()], |_| false));
        assert!(BacktrackingSolver.solve(&problem).is_empty());
    }

    #[test]
    fn test_three_variable_chain() {
        let mut problem = CspProblem::new();
        for name in ["x", "y", "z"] {
            problem.add_variable(name, values(0..5));
        }
        problem.add_constraint(CspConstraint::new(vec!["x".into(), "y".into()], |a| {
            int(a, "x") < int(a, "y")
        }));
        problem.add_constraint(CspConstraint::new(vec!["y".into(), "z".into()], |a| {
            int(a, "y") < int(a, "z")
        }));
        // Strictly increasing triples from 0..5
        assert_eq!(BacktrackingSolver.solve(&problem).len(), 10);
    }
}
