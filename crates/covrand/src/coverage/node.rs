//! Coverage node records held by the registry.
//!
//! A node is either a plain group (created for every dotted prefix) or one of
//! the three coverage items. `size` and `coverage` are aggregates: the node's
//! own contribution plus that of every descendant.

use crate::result::{CovError, CovResult};
use crate::value::{Args, Value};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Callback fired by threshold crossings and bin hits
pub type Callback = Arc<dyn Fn() + Send + Sync>;

/// Bin matching relation: `relation(sampled, bin)`
pub type Relation = Arc<dyn Fn(&Value, &Value) -> bool + Send + Sync>;

/// Maps call-site arguments to the value matched against bins
pub type Transform = Arc<dyn Fn(&Args) -> Value + Send + Sync>;

/// Pass/fail predicate of a cover check
pub type Predicate = Arc<dyn Fn(&Args) -> bool + Send + Sync>;

/// Index of a node inside its registry
///
/// Only meaningful together with the registry generation it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    #[inline]
    pub(crate) const fn new(index: usize) -> Self {
        Self(index)
    }

    #[inline]
    pub(crate) const fn index(self) -> usize {
        self.0
    }
}

/// What a coverage node models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    /// Hierarchy node without bins of its own
    #[default]
    Group,
    /// Cover point
    Point,
    /// Cover cross
    Cross,
    /// Cover check
    Check,
}

impl ItemKind {
    /// Lowercase name used in reports and exports
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Point => "point",
            Self::Cross => "cross",
            Self::Check => "check",
        }
    }

    /// Parse the lowercase name back
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "group" => Some(Self::Group),
            "point" => Some(Self::Point),
            "cross" => Some(Self::Cross),
            "check" => Some(Self::Check),
            _ => None,
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coverage percentage, 100 for an empty node
#[must_use]
pub fn percentage(coverage: u64, size: u64) -> f64 {
    if size == 0 {
        return 100.0;
    }
    100.0 * coverage as f64 / size as f64
}

fn uncovered(hits: impl Iterator<Item = u64>, at_least: u64) -> u64 {
    hits.filter(|h| *h < at_least).count() as u64
}

pub(crate) fn find_callback(callbacks: &[(Value, Callback)], key: &Value) -> Option<Callback> {
    callbacks
        .iter()
        .find_map(|(k, cb)| (k == key).then(|| Arc::clone(cb)))
}

/// Reject bins whose keys export to the same label
pub(crate) fn distinct_labels<'a>(
    name: &str,
    keys: impl IntoIterator<Item = &'a Value>,
) -> CovResult<()> {
    let mut seen = HashSet::new();
    for key in keys {
        let label = key.to_string();
        if !seen.insert(label.clone()) {
            return Err(CovError::configuration(format!(
                "'{name}': more than one bin exports as '{label}'"
            )));
        }
    }
    Ok(())
}

/// How a cover point derives the matched value from its arguments
#[derive(Clone)]
pub(crate) enum Sampler {
    /// Single argument or tuple of all arguments
    Args,
    /// One argument selected by name
    Named(String),
    /// User transform
    Transform(Transform),
}

#[derive(Debug, Clone)]
pub(crate) struct PointBin {
    /// Label if given, else the bin value
    pub(crate) key: Value,
    pub(crate) value: Value,
    pub(crate) hits: u64,
}

pub(crate) struct PointModel {
    pub(crate) bins: Vec<PointBin>,
    /// Bin-less point: one `true` bin that matches every sample
    pub(crate) implicit: bool,
    pub(crate) relation: Option<Relation>,
    pub(crate) sampler: Sampler,
    pub(crate) injection: bool,
    pub(crate) new_hits: Vec<Value>,
}

pub(crate) struct CrossModel {
    pub(crate) items: Vec<NodeId>,
    pub(crate) bins: Vec<(Value, u64)>,
    pub(crate) index: HashMap<Value, usize>,
    pub(crate) new_hits: Vec<Value>,
}

pub(crate) struct CheckModel {
    pub(crate) f_fail: Predicate,
    pub(crate) f_pass: Option<Predicate>,
    pub(crate) pass: u64,
    pub(crate) fail: u64,
}

pub(crate) enum NodeKind {
    Group,
    Point(PointModel),
    Cross(CrossModel),
    Check(CheckModel),
}

impl NodeKind {
    pub(crate) const fn item_kind(&self) -> ItemKind {
        match self {
            Self::Group => ItemKind::Group,
            Self::Point(_) => ItemKind::Point,
            Self::Cross(_) => ItemKind::Cross,
            Self::Check(_) => ItemKind::Check,
        }
    }
}

/// Bin key of a passing cover check sample
pub const PASS: &str = "PASS";
/// Bin key of a failing cover check sample
pub const FAIL: &str = "FAIL";

pub(crate) struct CoverageNode {
    pub(crate) name: String,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
    pub(crate) size: u64,
    pub(crate) coverage: u64,
    pub(crate) weight: u64,
    pub(crate) at_least: u64,
    pub(crate) threshold_callbacks: Vec<(f64, Callback)>,
    pub(crate) bins_callbacks: Vec<(Value, Callback)>,
    pub(crate) kind: NodeKind,
}

impl CoverageNode {
    pub(crate) fn new(name: &str, parent: Option<NodeId>, weight: u64, at_least: u64, kind: NodeKind) -> Self {
        Self {
            name: name.to_string(),
            parent,
            children: Vec::new(),
            size: 0,
            coverage: 0,
            weight,
            at_least,
            threshold_callbacks: Vec::new(),
            bins_callbacks: Vec::new(),
            kind,
        }
    }

    pub(crate) fn group(name: &str, parent: Option<NodeId>) -> Self {
        Self::new(name, parent, 0, 0, NodeKind::Group)
    }

    /// Capacity contributed by this node alone
    pub(crate) fn own_size(&self) -> u64 {
        match &self.kind {
            NodeKind::Group => 0,
            NodeKind::Point(p) => self.weight * p.bins.len() as u64,
            NodeKind::Cross(c) => self.weight * c.bins.len() as u64,
            NodeKind::Check(_) => self.weight,
        }
    }

    /// Coverage contributed by this node alone
    pub(crate) fn own_coverage(&self) -> u64 {
        match &self.kind {
            NodeKind::Group => 0,
            NodeKind::Point(p) => {
                let missing = uncovered(p.bins.iter().map(|b| b.hits), self.at_least);
                self.own_size() - self.weight * missing
            }
            NodeKind::Cross(c) => {
                let missing = uncovered(c.bins.iter().map(|(_, h)| *h), self.at_least);
                self.own_size() - self.weight * missing
            }
            NodeKind::Check(c) => {
                if c.fail == 0 && c.pass >= self.at_least {
                    self.weight
                } else {
                    0
                }
            }
        }
    }

    pub(crate) fn detailed_coverage(&self) -> Vec<(Value, u64)> {
        match &self.kind {
            NodeKind::Group => Vec::new(),
            NodeKind::Point(p) => p.bins.iter().map(|b| (b.key.clone(), b.hits)).collect(),
            NodeKind::Cross(c) => c.bins.clone(),
            NodeKind::Check(c) => vec![(Value::from(PASS), c.pass), (Value::from(FAIL), c.fail)],
        }
    }

    pub(crate) fn new_hits(&self) -> &[Value] {
        match &self.kind {
            NodeKind::Point(p) => &p.new_hits,
            NodeKind::Cross(c) => &c.new_hits,
            NodeKind::Group | NodeKind::Check(_) => &[],
        }
    }

    /// Bin keys in declaration order (what a cross multiplies)
    pub(crate) fn bin_keys(&self) -> Vec<Value> {
        self.detailed_coverage().into_iter().map(|(k, _)| k).collect()
    }

    pub(crate) fn cover_percentage(&self) -> f64 {
        percentage(self.coverage, self.size)
    }
}

/// Read-only view of one registry node
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    /// Dotted name
    pub name: String,
    /// Node kind
    pub kind: ItemKind,
    /// Total weighted capacity including descendants
    pub size: u64,
    /// Achieved weighted coverage including descendants
    pub coverage: u64,
    /// `100 * coverage / size`
    pub cover_percentage: f64,
    /// Per-bin weight (0 for groups)
    pub weight: u64,
    /// Hits needed per bin (0 for groups)
    pub at_least: u64,
    /// Bin key to hit count, in declaration order
    pub detailed_coverage: Vec<(Value, u64)>,
    /// Bins matched by the most recent sample
    pub new_hits: Vec<Value>,
    /// Dotted names of direct children
    pub children: Vec<String>,
}

impl NodeSnapshot {
    /// Hit count of one bin
    #[must_use]
    pub fn hits(&self, key: impl Into<Value>) -> Option<u64> {
        let key = key.into();
        self.detailed_coverage
            .iter()
            .find_map(|(k, h)| (*k == key).then_some(*h))
    }
}

impl fmt::Debug for Sampler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Args => f.write_str("Args"),
            Self::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Self::Transform(_) => f.write_str("Transform(..)"),
        }
    }
}

impl fmt::Debug for CoverageNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CoverageNode")
            .field("name", &self.name)
            .field("kind", &self.kind.item_kind())
            .field("size", &self.size)
            .field("coverage", &self.coverage)
            .field("weight", &self.weight)
            .field("at_least", &self.at_least)
            .finish_non_exhaustive()
    }
}
