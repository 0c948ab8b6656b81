//! Resolution of random variables: prune, solve, weigh, pick.

use super::classify::ConstraintView;
use super::constraint::{Assignment, Bindings};
use super::random_set::RandomVariableSet;
use super::solver::{CspConstraint, CspProblem};
use super::weighted::WeightedChoice;
use crate::result::{CovError, CovResult};
use crate::value::{cartesian_product, Value};
use rand::prelude::SliceRandom;
use rand::rngs::StdRng;
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, trace, warn};

impl RandomVariableSet {
    /// Resolve every random variable and write the results to the fields
    pub(crate) fn resolve(&mut self) -> CovResult<()> {
        let random: BTreeSet<String> = self.rand_vars.iter().map(|v| v.name.clone()).collect();
        let mut resolved = BTreeSet::new();

        for stage in self.stages() {
            let scope: BTreeSet<String> = stage.iter().cloned().collect();
            let view = self.constraints.view(&scope, &random, &resolved);
            debug!(stage = ?stage, "resolving");
            let picked = self.resolve_stage(&stage, &view)?;
            trace!(values = ?picked, "resolved");
            self.fields.extend(picked);
            resolved.extend(stage);
        }
        Ok(())
    }

    /// Groups of variables resolved together, in order
    ///
    /// Without a solve order everything is one stage. With one, variables
    /// outside the order and outside any joint constraint join the first
    /// stage, and joint variables outside the order get a final stage.
    pub(super) fn stages(&self) -> Vec<Vec<String>> {
        let all: Vec<String> = self.rand_vars.iter().map(|v| v.name.clone()).collect();
        if self.order.is_empty() {
            return vec![all];
        }

        let joint = self.constraints.joint_vars();
        let mut pending: BTreeSet<&str> = self.order.iter().flatten().map(String::as_str).collect();
        let mut remaining = all;
        let mut stages = Vec::with_capacity(self.order.len() + 1);

        for group in &self.order {
            for name in group {
                let _ = pending.remove(name.as_str());
            }
            remaining.retain(|r| !group.contains(r));
            let (loose, kept): (Vec<String>, Vec<String>) = remaining
                .into_iter()
                .partition(|r| !joint.contains(r.as_str()) && !pending.contains(r.as_str()));
            remaining = kept;

            let mut stage = group.clone();
            stage.extend(loose);
            stages.push(stage);
        }
        if !remaining.is_empty() {
            stages.push(remaining);
        }
        stages
    }

    fn resolve_stage(&mut self, stage: &[String], view: &ConstraintView) -> CovResult<Assignment> {
        let fields = &self.fields;
        let rng = &mut self.rng;

        // Simple hard constraints prune each domain
        let mut domains: BTreeMap<&str, Vec<Value>> = BTreeMap::new();
        for name in stage {
            let declared = self
                .rand_vars
                .iter()
                .find(|v| v.name == *name)
                .map(|v| v.domain.as_slice())
                .unwrap_or_default();
            let domain: Vec<Value> = match view.simple_hard.get(name) {
                Some(constraints) => declared
                    .iter()
                    .filter(|value| {
                        let b = Bindings::new(fields).with_probe(name, value);
                        constraints.iter().all(|c| c.holds(&b))
                    })
                    .cloned()
                    .collect(),
                None => declared.to_vec(),
            };
            if domain.is_empty() {
                return Err(CovError::unsatisfiable(format!(
                    "no value of '{name}' satisfies its constraints"
                )));
            }
            let _ = domains.insert(name.as_str(), domain);
        }

        // Joint hard constraints go to the solver
        let mut joint_vars: Vec<&str> = Vec::new();
        for (vars, _) in &view.joint_hard {
            for var in vars {
                if !joint_vars.contains(&var.as_str()) {
                    joint_vars.push(var);
                }
            }
        }
        let mut candidates = if view.joint_hard.is_empty() {
            vec![Assignment::new()]
        } else {
            let mut problem = CspProblem::new();
            for var in &joint_vars {
                problem.add_variable(*var, domains.get(var).cloned().unwrap_or_default());
            }
            for (vars, constraint) in &view.joint_hard {
                problem.add_constraint(CspConstraint::new(vars.clone(), move |a| {
                    constraint.holds(&Bindings::new(fields).with_assignment(a))
                }));
            }
            let solutions = self.solver.solve(&problem);
            trace!(vars = ?joint_vars, solutions = solutions.len(), "joint solve");
            if solutions.is_empty() {
                return Err(CovError::unsatisfiable(format!(
                    "no assignment of {joint_vars:?} satisfies the joint constraints"
                )));
            }
            solutions
        };

        // Variables only under joint distributions are enumerated
        let mut dist_vars: Vec<&str> = Vec::new();
        for (vars, _) in &view.joint_weight {
            for var in vars {
                if !joint_vars.contains(&var.as_str()) && !dist_vars.contains(&var.as_str()) {
                    dist_vars.push(var);
                }
            }
        }
        if !dist_vars.is_empty() {
            let lists: Vec<Vec<Value>> = dist_vars
                .iter()
                .map(|v| domains.get(v).cloned().unwrap_or_default())
                .collect();
            let combos = cartesian_product(&lists);
            let mut expanded = Vec::with_capacity(candidates.len() * combos.len());
            for base in &candidates {
                for combo in &combos {
                    let mut candidate = base.clone();
                    for (var, value) in dist_vars.iter().zip(combo) {
                        let _ = candidate.insert((*var).to_string(), value.clone());
                    }
                    expanded.push(candidate);
                }
            }
            candidates = expanded;
        }

        let mut picked = Assignment::new();
        let handled: BTreeSet<&str> = joint_vars.iter().chain(&dist_vars).copied().collect();
        if !handled.is_empty() {
            let weights: Vec<f64> = candidates
                .iter()
                .map(|candidate| {
                    let b = Bindings::new(fields).with_assignment(candidate);
                    let joint: f64 = view.joint_weight.iter().map(|(_, c)| c.weigh(&b)).product();
                    let simple: f64 = candidate
                        .keys()
                        .filter_map(|k| view.simple_weight.get(k))
                        .flatten()
                        .map(|c| c.weigh(&b))
                        .product();
                    joint * simple
                })
                .collect();
            let weighted = WeightedChoice::new(candidates, &weights);
            let choice = match weighted.sample(rng) {
                Some(choice) => choice,
                None => {
                    warn!(vars = ?handled, "every candidate weighs zero, picking uniformly");
                    weighted.items().choose(rng).ok_or_else(|| {
                        CovError::unsatisfiable(format!("no candidates for {handled:?}"))
                    })?
                }
            };
            picked.extend(choice.clone());
        }

        // Everything else is drawn on its own
        for name in stage {
            if handled.contains(name.as_str()) {
                continue;
            }
            let domain = domains.get(name.as_str()).map(Vec::as_slice).unwrap_or_default();
            let value = match view.simple_weight.get(name) {
                Some(constraints) => {
                    let weights: Vec<f64> = domain
                        .iter()
                        .map(|value| {
                            let b = Bindings::new(fields).with_probe(name, value);
                            constraints.iter().map(|c| c.weigh(&b)).product()
                        })
                        .collect();
                    let choice = WeightedChoice::new(domain.to_vec(), &weights);
                    if let Some(value) = choice.sample(rng) {
                        value.clone()
                    } else {
                        warn!(
                            var = %name,
                            "distribution is zero over the domain, picking uniformly"
                        );
                        uniform(name, domain, rng)?
                    }
                }
                None => uniform(name, domain, rng)?,
            };
            let _ = picked.insert(name.clone(), value);
        }
        Ok(picked)
    }
}

fn uniform(name: &str, domain: &[Value], rng: &mut StdRng) -> CovResult<Value> {
    domain
        .choose(rng)
        .cloned()
        .ok_or_else(|| CovError::unsatisfiable(format!("'{name}' has an empty domain")))
}
