//! Coverage registry: dotted name to node, with delta propagation.
//!
//! Every mutation of a node's own coverage is pushed up the parent chain as a
//! delta, so aggregates are never recomputed from scratch. Threshold callbacks
//! are evaluated on every node the delta passes through.

use super::node::{percentage, Callback, CoverageNode, NodeId, NodeKind, NodeSnapshot};
use super::report::{self, ReportRow};
use crate::result::{CovError, CovResult};
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::debug;

/// Arena of coverage nodes indexed by dotted name
#[derive(Debug, Default)]
pub struct CoverageRegistry {
    nodes: Vec<CoverageNode>,
    index: HashMap<String, NodeId>,
    /// Bumped on reset so stale item handles are detected
    generation: u64,
}

fn validate_name(name: &str) -> CovResult<()> {
    if name.is_empty() || name.split('.').any(str::is_empty) {
        return Err(CovError::configuration(format!(
            "invalid coverage name '{name}': empty path segment"
        )));
    }
    Ok(())
}

pub(crate) fn parent_name(name: &str) -> Option<&str> {
    name.rsplit_once('.').map(|(parent, _)| parent)
}

impl CoverageRegistry {
    pub(crate) const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn node(&self, id: NodeId) -> &CoverageNode {
        &self.nodes[id.index()]
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> &mut CoverageNode {
        &mut self.nodes[id.index()]
    }

    pub(crate) fn lookup(&self, name: &str) -> CovResult<NodeId> {
        self.index
            .get(name)
            .copied()
            .ok_or_else(|| CovError::node_not_found(name))
    }

    /// Resolve an item handle, rejecting handles issued before a reset
    pub(crate) fn checked(&self, id: NodeId, generation: u64, name: &str) -> CovResult<NodeId> {
        if generation == self.generation && id.index() < self.nodes.len() {
            Ok(id)
        } else {
            Err(CovError::node_not_found(name))
        }
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &CoverageNode> {
        self.nodes.iter()
    }

    /// Get or create a group node and all of its dotted ancestors
    pub(crate) fn register(&mut self, name: &str) -> CovResult<NodeId> {
        if let Some(id) = self.index.get(name) {
            return Ok(*id);
        }
        validate_name(name)?;
        let parent = parent_name(name).map(|p| self.register(p)).transpose()?;
        Ok(self.attach(CoverageNode::group(name, parent)))
    }

    /// Get or create a coverage item
    ///
    /// Items must sit below a parent segment. An existing node of the same
    /// kind is returned unchanged; the builder's settings are then ignored.
    pub(crate) fn insert_item(
        &mut self,
        name: &str,
        weight: u64,
        at_least: u64,
        kind: NodeKind,
    ) -> CovResult<(NodeId, bool)> {
        if let Some(id) = self.index.get(name).copied() {
            let existing = self.node(id).kind.item_kind();
            if existing != kind.item_kind() {
                return Err(CovError::configuration(format!(
                    "'{name}' is already registered as a {existing}, not a {}",
                    kind.item_kind()
                )));
            }
            return Ok((id, false));
        }
        validate_name(name)?;
        let Some(parent) = parent_name(name) else {
            return Err(CovError::configuration(format!(
                "coverage {} '{name}' must have a parent (parent.{name})",
                kind.item_kind()
            )));
        };
        let parent = self.register(parent)?;
        let id = self.attach(CoverageNode::new(name, Some(parent), weight, at_least, kind));
        let own = self.node(id).own_size();
        self.propagate_size(id, own);
        Ok((id, true))
    }

    fn attach(&mut self, node: CoverageNode) -> NodeId {
        let id = NodeId::new(self.nodes.len());
        debug!(name = %node.name, kind = %node.kind.item_kind(), "registering coverage node");
        if let Some(parent) = node.parent {
            self.nodes[parent.index()].children.push(id);
        }
        let _ = self.index.insert(node.name.clone(), id);
        self.nodes.push(node);
        id
    }

    /// Add `delta` to the size of `id` and every ancestor
    pub(crate) fn propagate_size(&mut self, id: NodeId, delta: u64) {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.node_mut(current);
            node.size += delta;
            cursor = node.parent;
        }
    }

    /// Add `delta` to the coverage of `id` and every ancestor
    ///
    /// Threshold callbacks whose percentage was crossed upwards
    /// (`old < threshold <= new`) are appended to `fired`.
    pub(crate) fn propagate_coverage(&mut self, id: NodeId, delta: i64, fired: &mut Vec<Callback>) {
        if delta == 0 {
            return;
        }
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            let node = self.node_mut(current);
            let old = node.cover_percentage();
            node.coverage = node.coverage.saturating_add_signed(delta);
            let new = node.cover_percentage();
            for (threshold, callback) in &node.threshold_callbacks {
                if old < *threshold && *threshold <= new {
                    fired.push(Arc::clone(callback));
                }
            }
            cursor = node.parent;
        }
    }

    /// Re-derive the own coverage of `id` after its bins changed
    pub(crate) fn settle(&mut self, id: NodeId, own_before: u64, fired: &mut Vec<Callback>) {
        let own_after = self.node(id).own_coverage();
        let delta = own_after as i64 - own_before as i64;
        self.propagate_coverage(id, delta, fired);
    }

    pub(crate) fn snapshot(&self, id: NodeId) -> NodeSnapshot {
        let node = self.node(id);
        NodeSnapshot {
            name: node.name.clone(),
            kind: node.kind.item_kind(),
            size: node.size,
            coverage: node.coverage,
            cover_percentage: node.cover_percentage(),
            weight: node.weight,
            at_least: node.at_least,
            detailed_coverage: node.detailed_coverage(),
            new_hits: node.new_hits().to_vec(),
            children: node
                .children
                .iter()
                .map(|c| self.node(*c).name.clone())
                .collect(),
        }
    }

    fn clear(&mut self) {
        self.nodes.clear();
        self.index.clear();
        self.generation += 1;
    }

    fn report_rows(&self) -> Vec<ReportRow> {
        self.nodes
            .iter()
            .map(|n| ReportRow {
                name: n.name.clone(),
                kind: n.kind.item_kind(),
                size: n.size,
                coverage: n.coverage,
                cover_percentage: percentage(n.coverage, n.size),
                bins: n
                    .detailed_coverage()
                    .into_iter()
                    .map(|(k, h)| (k.to_string(), h))
                    .collect(),
            })
            .collect()
    }
}

/// Shared handle to one coverage registry
///
/// Cloning is cheap and every clone sees the same registry. All access is
/// serialized by one mutex; callbacks run after it is released, so they may
/// query the database. Transforms, relations and check predicates run while
/// it is held and must not call back into the same database.
#[derive(Clone, Default)]
pub struct CoverageDb {
    inner: Arc<Mutex<CoverageRegistry>>,
}

impl fmt::Debug for CoverageDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.with_registry(|r| r.nodes.len());
        f.debug_struct("CoverageDb").field("nodes", &len).finish()
    }
}

impl CoverageDb {
    /// Create an empty database
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_registry<R>(&self, f: impl FnOnce(&mut CoverageRegistry) -> R) -> R {
        let mut guard = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Run a mutation, then fire the callbacks it collected outside the lock
    pub(crate) fn mutate(
        &self,
        f: impl FnOnce(&mut CoverageRegistry, &mut Vec<Callback>) -> CovResult<()>,
    ) -> CovResult<()> {
        let mut fired = Vec::new();
        let result = self.with_registry(|reg| f(reg, &mut fired));
        for callback in fired {
            callback();
        }
        result
    }

    /// Make sure a group node (and its ancestors) exists
    pub fn register(&self, name: &str) -> CovResult<()> {
        self.with_registry(|r| r.register(name)).map(|_| ())
    }

    /// Check whether a node is registered
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.with_registry(|r| r.index.contains_key(name))
    }

    /// All registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.with_registry(|r| r.index.keys().cloned().collect());
        names.sort();
        names
    }

    /// Number of registered nodes
    #[must_use]
    pub fn len(&self) -> usize {
        self.with_registry(|r| r.nodes.len())
    }

    /// Check if nothing is registered
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of one node
    pub fn node(&self, name: &str) -> CovResult<NodeSnapshot> {
        self.with_registry(|r| r.lookup(name).map(|id| r.snapshot(id)))
    }

    /// Total weighted capacity of a node
    pub fn size(&self, name: &str) -> CovResult<u64> {
        self.node(name).map(|n| n.size)
    }

    /// Achieved weighted coverage of a node
    pub fn coverage(&self, name: &str) -> CovResult<u64> {
        self.node(name).map(|n| n.coverage)
    }

    /// Coverage of a node in percent
    pub fn cover_percentage(&self, name: &str) -> CovResult<f64> {
        self.node(name).map(|n| n.cover_percentage)
    }

    /// Bin key to hit count of a coverage item
    pub fn detailed_coverage(&self, name: &str) -> CovResult<Vec<(Value, u64)>> {
        self.node(name).map(|n| n.detailed_coverage)
    }

    /// Bins matched by the most recent sample of a point or cross
    pub fn new_hits(&self, name: &str) -> CovResult<Vec<Value>> {
        self.node(name).map(|n| n.new_hits)
    }

    /// Fire `callback` whenever the node's percentage rises across `threshold`
    pub fn add_threshold_callback(
        &self,
        name: &str,
        threshold: f64,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> CovResult<()> {
        if !(0.0..=100.0).contains(&threshold) {
            return Err(CovError::configuration(format!(
                "threshold {threshold} is outside 0..=100"
            )));
        }
        self.with_registry(|r| {
            let id = r.lookup(name)?;
            r.node_mut(id)
                .threshold_callbacks
                .push((threshold, Arc::new(callback)));
            Ok(())
        })
    }

    /// Fire `callback` when the given bin first becomes covered
    ///
    /// Re-registering a bin replaces its callback.
    pub fn add_bins_callback(
        &self,
        name: &str,
        bin: impl Into<Value>,
        callback: impl Fn() + Send + Sync + 'static,
    ) -> CovResult<()> {
        let bin = bin.into();
        self.with_registry(|r| {
            let id = r.lookup(name)?;
            let node = r.node_mut(id);
            node.bins_callbacks.retain(|(k, _)| *k != bin);
            node.bins_callbacks.push((bin, Arc::new(callback)));
            Ok(())
        })
    }

    /// Write an indented report of every node whose name starts with `node`
    pub fn report_coverage(&self, mut sink: impl FnMut(&str), bins: bool, node: Option<&str>) {
        let rows = self.with_registry(|r| r.report_rows());
        report::render(rows, bins, node, &mut sink);
    }

    /// The report as a string, one node per line
    #[must_use]
    pub fn report(&self, bins: bool, node: Option<&str>) -> String {
        let mut out = String::new();
        self.report_coverage(
            |line| {
                out.push_str(line);
                out.push('\n');
            },
            bins,
            node,
        );
        out
    }

    /// Drop every node; handles created before the reset become invalid
    pub fn reset(&self) {
        debug!("resetting coverage database");
        self.with_registry(CoverageRegistry::clear);
    }
}
