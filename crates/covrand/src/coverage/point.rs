//! Cover points: bins over one value derived from each sample.

use super::node::{
    distinct_labels, find_callback, CoverageNode, NodeKind, PointBin, PointModel, Relation,
    Sampler, Transform,
};
use super::{CoverItem, CoverageDb, ItemHandle, NodeId};
use crate::result::{CovError, CovResult};
use crate::value::{Args, Value};
use std::sync::Arc;
use tracing::trace;

/// Handle to a cover point
///
/// Each sample derives one value from the call-site arguments and counts a
/// hit on every bin the relation accepts. Without injection only the first
/// matching bin (in declaration order) is hit.
#[derive(Debug, Clone)]
pub struct CoverPoint {
    handle: ItemHandle,
}

impl CoverPoint {
    /// Start declaring a cover point
    #[must_use]
    pub fn builder(name: impl Into<String>) -> CoverPointBuilder {
        CoverPointBuilder::new(name.into())
    }

    /// Registry id of this point
    #[must_use]
    pub const fn id(&self) -> NodeId {
        self.handle.id
    }
}

/// Builder for [`CoverPoint`]
#[must_use]
pub struct CoverPointBuilder {
    name: String,
    bins: Vec<Value>,
    labels: Option<Vec<Value>>,
    sampler: Sampler,
    relation: Option<Relation>,
    weight: u64,
    at_least: u64,
    injection: bool,
}

impl std::fmt::Debug for CoverPointBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoverPointBuilder")
            .field("name", &self.name)
            .field("bins", &self.bins)
            .field("labels", &self.labels)
            .field("sampler", &self.sampler)
            .field("weight", &self.weight)
            .field("at_least", &self.at_least)
            .field("injection", &self.injection)
            .finish_non_exhaustive()
    }
}

impl CoverPointBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            bins: Vec::new(),
            labels: None,
            sampler: Sampler::Args,
            relation: None,
            weight: 1,
            at_least: 1,
            injection: false,
        }
    }

    /// Bins in matching order
    pub fn bins<I, T>(mut self, bins: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.bins = bins.into_iter().map(Into::into).collect();
        self
    }

    /// Labels reported in place of the bin values, one per bin
    pub fn bins_labels<I, T>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<Value>,
    {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    /// Sample the argument with this name
    pub fn vname(mut self, name: impl Into<String>) -> Self {
        self.sampler = Sampler::Named(name.into());
        self
    }

    /// Derive the sampled value with a function of all arguments
    pub fn transform(mut self, f: impl Fn(&Args) -> Value + Send + Sync + 'static) -> Self {
        let f: Transform = Arc::new(f);
        self.sampler = Sampler::Transform(f);
        self
    }

    /// Bin matching relation `rel(sampled, bin)`, equality by default
    pub fn relation(mut self, f: impl Fn(&Value, &Value) -> bool + Send + Sync + 'static) -> Self {
        self.relation = Some(Arc::new(f));
        self
    }

    /// Coverage contributed by each covered bin
    pub const fn weight(mut self, weight: u64) -> Self {
        self.weight = weight;
        self
    }

    /// Hits needed before a bin counts as covered
    pub const fn at_least(mut self, at_least: u64) -> Self {
        self.at_least = at_least;
        self
    }

    /// Let one sample hit every matching bin
    pub const fn injection(mut self, enabled: bool) -> Self {
        self.injection = enabled;
        self
    }

    /// Register the point
    ///
    /// Returns the existing point when `name` is already a cover point.
    pub fn build(self, db: &CoverageDb) -> CovResult<CoverPoint> {
        let Self {
            name,
            bins,
            labels,
            sampler,
            relation,
            weight,
            at_least,
            injection,
        } = self;
        let keys = match labels {
            Some(labels) if labels.len() != bins.len() => {
                return Err(CovError::configuration(format!(
                    "'{name}': {} bins but {} labels",
                    bins.len(),
                    labels.len()
                )));
            }
            Some(labels) => labels,
            None => bins.clone(),
        };
        distinct_labels(&name, &keys)?;
        let implicit = bins.is_empty();
        let bins = if implicit {
            vec![PointBin {
                key: Value::Bool(true),
                value: Value::Bool(true),
                hits: 0,
            }]
        } else {
            keys.into_iter()
                .zip(bins)
                .map(|(key, value)| PointBin {
                    key,
                    value,
                    hits: 0,
                })
                .collect()
        };
        let model = PointModel {
            bins,
            implicit,
            relation,
            sampler,
            injection,
            new_hits: Vec::new(),
        };
        let handle = ItemHandle::insert(db, &name, weight, at_least, |_| Ok(NodeKind::Point(model)))?;
        Ok(CoverPoint { handle })
    }
}

fn sampled_value(sampler: &Sampler, args: &Args, name: &str) -> CovResult<Value> {
    match sampler {
        Sampler::Args => Ok(args.as_sample()),
        Sampler::Named(var) => args.get(var).cloned().ok_or_else(|| {
            CovError::configuration(format!("'{name}': call site has no argument '{var}'"))
        }),
        Sampler::Transform(f) => Ok(f(args)),
    }
}

impl CoverItem for CoverPoint {
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
            let NodeKind::Point(point) = kind else {
                return Err(CovError::configuration(format!("'{name}' is not a cover point")));
            };
            let value = sampled_value(&point.sampler, args, name)?;
            trace!(point = %name, %value, "sample");

            point.new_hits.clear();
            for bin in &mut point.bins {
                let matched = point.implicit
                    || point
                        .relation
                        .as_ref()
                        .map_or(value == bin.value, |rel| rel(&value, &bin.value));
                if !matched {
                    continue;
                }
                bin.hits += 1;
                point.new_hits.push(bin.key.clone());
                if bin.hits == *at_least {
                    if let Some(cb) = find_callback(bins_callbacks, &bin.key) {
                        fired.push(cb);
                    }
                }
                if !point.injection {
                    break;
                }
            }
            Ok(())
        })
    }
}
