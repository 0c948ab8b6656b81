//! Functional coverage model.
//!
//! Coverage items live in a [`CoverageDb`] under dotted names. Every dotted
//! prefix becomes a group node, and groups aggregate the weighted size and
//! coverage of everything below them:
//!
//! ```
//! use covrand::{Args, CoverItem, CoverPoint, CoverageDb};
//!
//! let db = CoverageDb::new();
//! let point = CoverPoint::builder("top.fifo.level").bins(0..4).build(&db).unwrap();
//! for level in [0, 1, 1, 3] {
//!     point.sample(&Args::new().arg("level", level)).unwrap();
//! }
//! assert_eq!(db.coverage("top").unwrap(), 3);
//! assert_eq!(db.size("top").unwrap(), 4);
//! ```

mod check;
mod cross;
mod node;
mod point;
mod registry;
pub(crate) mod report;
mod section;

#[cfg(test)]
mod tests;

pub use check::{CoverCheck, CoverCheckBuilder};
pub use cross::{CoverCross, CoverCrossBuilder};
pub use node::{
    percentage, Callback, ItemKind, NodeId, NodeSnapshot, Predicate, Relation, Transform, FAIL,
    PASS,
};
pub use point::{CoverPoint, CoverPointBuilder};
pub use registry::CoverageDb;
pub use section::CoverageSection;

pub(crate) use registry::parent_name;

use crate::result::{CovError, CovResult};
use crate::value::{Args, Value};
use node::NodeKind;
use registry::CoverageRegistry;

/// A sampled coverage item bound to one database
pub trait CoverItem: Send + Sync {
    /// Dotted name of the item
    fn name(&self) -> &str;

    /// Database the item is registered in
    fn db(&self) -> &CoverageDb;

    /// Record one event
    fn sample(&self, args: &Args) -> CovResult<()>;

    /// Current state of the item
    fn snapshot(&self) -> CovResult<NodeSnapshot> {
        self.db().node(self.name())
    }

    /// Weighted capacity of the item
    fn size(&self) -> CovResult<u64> {
        self.snapshot().map(|s| s.size)
    }

    /// Achieved weighted coverage of the item
    fn coverage(&self) -> CovResult<u64> {
        self.snapshot().map(|s| s.coverage)
    }

    /// Coverage in percent
    fn cover_percentage(&self) -> CovResult<f64> {
        self.snapshot().map(|s| s.cover_percentage)
    }

    /// Bin key to hit count
    fn detailed_coverage(&self) -> CovResult<Vec<(Value, u64)>> {
        self.snapshot().map(|s| s.detailed_coverage)
    }

    /// Bins matched by the most recent sample
    fn new_hits(&self) -> CovResult<Vec<Value>> {
        self.snapshot().map(|s| s.new_hits)
    }
}

/// Registry location of one item, valid until the next reset
#[derive(Debug, Clone)]
pub(crate) struct ItemHandle {
    db: CoverageDb,
    id: NodeId,
    generation: u64,
    name: String,
}

impl ItemHandle {
    /// Register an item and return its handle
    fn insert(
        db: &CoverageDb,
        name: &str,
        weight: u64,
        at_least: u64,
        kind: impl FnOnce(&CoverageRegistry) -> CovResult<NodeKind>,
    ) -> CovResult<Self> {
        if at_least == 0 {
            return Err(CovError::configuration(format!(
                "'{name}': at_least must be at least 1"
            )));
        }
        db.with_registry(|reg| {
            let kind = kind(reg)?;
            let (id, _) = reg.insert_item(name, weight, at_least, kind)?;
            Ok(Self {
                db: db.clone(),
                id,
                generation: reg.generation(),
                name: name.to_string(),
            })
        })
    }

    /// Apply a sample under the lock and propagate the coverage change
    fn sample(
        &self,
        f: impl FnOnce(&mut CoverageRegistry, NodeId, &mut Vec<Callback>) -> CovResult<()>,
    ) -> CovResult<()> {
        self.db.mutate(|reg, fired| {
            let id = reg.checked(self.id, self.generation, &self.name)?;
            let before = reg.node(id).own_coverage();
            f(reg, id, fired)?;
            reg.settle(id, before, fired);
            Ok(())
        })
    }
}
