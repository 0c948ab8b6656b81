//! Cover checks: pass/fail coverage with sticky failure.

use super::node::{find_callback, CheckModel, CoverageNode, NodeKind, Predicate, FAIL, PASS};
use super::{CoverItem, CoverageDb, ItemHandle, NodeId};
use crate::result::{CovError, CovResult};
use crate::value::{Args, Value};
use std::sync::Arc;
use tracing::{debug, trace};

/// Handle to a cover check
///
/// A sample fails when `f_fail` holds, otherwise passes when `f_pass` holds,
/// and is otherwise ignored. The check is covered once it has passed
/// `at_least` times and has never failed.
#[derive(Debug, Clone)]
pub struct CoverCheck {
    handle: ItemHandle,
}

impl CoverCheck {
    /// Start declaring a cover check
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CoverCheckBuilder {
        CoverCheckBuilder {
            name: name.into(),
            f_fail: None,
            f_pass: None,
            weight: 1,
            at_least: 1,
        }
    }

    /// Registry id of this check
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.handle.id
    }
}

/// Builder for [`CoverCheck`]
#[must_use]
pub struct CoverCheckBuilder {
    name: String,
    f_fail: Option<Predicate>,
    f_pass: Option<Predicate>,
    weight: u64,
    at_least: u64,
}

impl std::fmt::Debug for CoverCheckBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverCheckBuilder")
            .field("name", &self.name)
            .field("weight", &self.weight)
            .field("at_least", &self.at_least)
            .finish_non_exhaustive()
    }
}

impl CoverCheckBuilder {
    /// Failure condition (required)
    pub fn f_fail(mut self, f: impl Fn(&Args) -> bool + Send + Sync + 'static) -> Self {
        self.f_fail = Some(Arc::new(f));
        self
    }

    /// Pass condition; without one every non-failing sample passes
    pub fn f_pass(mut self, f: impl Fn(&Args) -> bool + Send + Sync + 'static) -> Self {
        self.f_pass = Some(Arc::new(f));
        self
    }

    /// Coverage contributed when the check is covered
    pub const fn weight(mut self, weight: u64) -> Self {
        self.weight = weight;
        self
    }

    /// Passes needed before the check counts as covered
    pub const fn at_least(mut self, at_least: u64) -> Self {
        self.at_least = at_least;
        self
    }

    /// Register the check
    pub fn build(self, db: &CoverageDb) -> CovResult<CoverCheck> {
        let Some(f_fail) = self.f_fail else {
            return Err(CovError::configuration(format!(
                "check '{}' needs a failure condition",
                self.name
            )));
        };
        let model = CheckModel {
            f_fail,
            f_pass: self.f_pass,
            pass: 0,
            fail: 0,
        };
        let handle = ItemHandle::insert(db, &self.name, self.weight, self.at_least, |_| {
            Ok(NodeKind::Check(model))
        })?;
        Ok(CoverCheck { handle })
    }
}

impl CoverItem for CoverCheck {
    fn name(&self) -> &str {
        &self.handle.name
    }

    fn db(&self) -> &CoverageDb {
        &self.handle.db
    }

    fn sample(&self, args: &Args) -> CovResult<()> {
        self.handle.sample(|reg, id, fired| {
            let CoverageNode {
                name,
                at_least,
                bins_callbacks,
                kind,
                ..
            } = reg.node_mut(id);
            let NodeKind::Check(check) = kind else {
                return Err(CovError::configuration(format!("'{name}' is not a cover check")));
            };

            let outcome = if (check.f_fail)(args) {
                Some(false)
            } else if check.f_pass.as_ref().map_or(true, |f| f(args)) {
                Some(true)
            } else {
                None
            };
            trace!(check = %name, ?outcome, "sample");

            match outcome {
                Some(true) => {
                    check.pass += 1;
                    if check.pass == *at_least {
                        fired.extend(find_callback(bins_callbacks, &Value::from(PASS)));
                    }
                }
                Some(false) => {
                    check.fail += 1;
                    if check.fail == 1 {
                        debug!(check = %name, "check failed");
                        fired.extend(find_callback(bins_callbacks, &Value::from(FAIL)));
                    }
                }
                None => {}
            }
            Ok(())
        })
    }
}
