//! Cover crosses: joint occurrence of bins within one sampling event.

use super::node::{distinct_labels, find_callback, CoverageNode, CrossModel, NodeKind};
use super::registry::CoverageRegistry;
use super::{CoverItem, CoverageDb, ItemHandle, ItemKind, NodeId};
use crate::result::{CovError, CovResult};
use crate::value::{cartesian_product, Args, Value};
use std::collections::HashMap;
use tracing::trace;

/// Handle to a cover cross
///
/// Bins are the Cartesian product of the referenced items' bin keys, minus
/// ignored tuples. A sample counts the product of the items' *new* hits, so
/// the referenced items must be sampled first for the same event.
#[derive(Debug, Clone)]
pub struct CoverCross {
    handle: ItemHandle,
}

impl CoverCross {
    /// Start declaring a cover cross
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CoverCrossBuilder {
        CoverCrossBuilder {
            name: name.into(),
            items: Vec::new(),
            ignore: Vec::new(),
            weight: 1,
            at_least: 1,
        }
    }

    /// Registry id of this cross
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.handle.id
    }
}

/// Builder for [`CoverCross`]
#[derive(Debug)]
#[must_use]
pub struct CoverCrossBuilder {
    name: String,
    items: Vec<String>,
    ignore: Vec<Vec<Option<Value>>>,
    weight: u64,
    at_least: u64,
}

impl CoverCrossBuilder {
    /// Dotted names of the crossed points (or crosses), in tuple order
    pub fn items<I, S>(mut self, items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.items = items.into_iter().map(Into::into).collect();
        self
    }

    /// Exclude every tuple matching `pattern`; `None` matches anything
    pub fn ignore_bins<I, T>(mut self, pattern: I) -> Self
    where
        I: IntoIterator<Item = Option<T>>,
        T: Into<Value>,
    {
        self.ignore
            .push(pattern.into_iter().map(|p| p.map(Into::into)).collect());
        self
    }

    /// Coverage contributed by each covered tuple
    pub const fn weight(mut self, weight: u64) -> Self {
        self.weight = weight;
        self
    }

    /// Hits needed before a tuple counts as covered
    pub const fn at_least(mut self, at_least: u64) -> Self {
        self.at_least = at_least;
        self
    }

    /// Register the cross; the crossed items must already exist
    pub fn build(self, db: &CoverageDb) -> CovResult<CoverCross> {
        let Self {
            name,
            items,
            ignore,
            weight,
            at_least,
        } = self;
        if items.is_empty() {
            return Err(CovError::configuration(format!("cross '{name}' has no items")));
        }
        if let Some(bad) = ignore.iter().find(|p| p.len() != items.len()) {
            return Err(CovError::configuration(format!(
                "cross '{name}': ignore pattern of length {} for {} items",
                bad.len(),
                items.len()
            )));
        }
        let handle = ItemHandle::insert(db, &name, weight, at_least, |reg| {
            cross_model(reg, &items, &ignore)
        })?;
        Ok(CoverCross { handle })
    }
}

fn ignored(combo: &[Value], patterns: &[Vec<Option<Value>>]) -> bool {
    patterns.iter().any(|pattern| {
        pattern
            .iter()
            .zip(combo)
            .all(|(p, v)| p.as_ref().map_or(true, |p| p == v))
    })
}

fn cross_model(
    reg: &CoverageRegistry,
    items: &[String],
    ignore: &[Vec<Option<Value>>],
) -> CovResult<NodeKind> {
    let mut ids = Vec::with_capacity(items.len());
    let mut keys = Vec::with_capacity(items.len());
    for item in items {
        let id = reg.lookup(item)?;
        let node = reg.node(id);
        if !matches!(node.kind.item_kind(), ItemKind::Point | ItemKind::Cross) {
            return Err(CovError::configuration(format!(
                "'{item}' is a {}, only points and crosses can be crossed",
                node.kind.item_kind()
            )));
        }
        ids.push(id);
        keys.push(node.bin_keys());
    }

    let bins: Vec<(Value, u64)> = cartesian_product(&keys)
        .into_iter()
        .filter(|combo| !ignored(combo, ignore))
        .map(|combo| (Value::Tuple(combo), 0))
        .collect();
    distinct_labels(&items.join(" x "), bins.iter().map(|(key, _)| key))?;
    let index: HashMap<Value, usize> = bins
        .iter()
        .enumerate()
        .map(|(i, (key, _))| (key.clone(), i))
        .collect();
    Ok(NodeKind::Cross(CrossModel {
        items: ids,
        bins,
        index,
        new_hits: Vec::new(),
    }))
}

impl CoverItem for CoverCross {
    fn name(&self) -> &str {
        &self.handle.name
    }

    fn db(&self) -> &CoverageDb {
        &self.handle.db
    }

    fn sample(&self, _args: &Args) -> CovResult<()> {
        self.handle.sample(|reg, id, fired| {
            let items = match &reg.node(id).kind {
                NodeKind::Cross(cross) => cross.items.clone(),
                _ => return Err(CovError::configuration(format!("'{}' is not a cover cross", self.name()))),
            };
            let hit_lists: Vec<Vec<Value>> = items
                .iter()
                .map(|item| reg.node(*item).new_hits().to_vec())
                .collect();

            let CoverageNode {
                name,
                at_least,
                bins_callbacks,
                kind,
                ..
            } = reg.node_mut(id);
            let NodeKind::Cross(cross) = kind else {
                return Ok(());
            };
            cross.new_hits.clear();
            for combo in cartesian_product(&hit_lists) {
                let key = Value::Tuple(combo);
                let Some(&slot) = cross.index.get(&key) else {
                    continue;
                };
                let hits = &mut cross.bins[slot].1;
                *hits += 1;
                if *hits == *at_least {
                    if let Some(cb) = find_callback(bins_callbacks, &key) {
                        fired.push(cb);
                    }
                }
                cross.new_hits.push(key);
            }
            trace!(cross = %name, hits = cross.new_hits.len(), "sample");
            Ok(())
        })
    }
}
