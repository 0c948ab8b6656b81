//! Weighted random choice.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

/// Items drawn with probability proportional to their weight
///
/// Non-positive and non-finite weights count as zero. When every weight is
/// zero the choice is degenerate and [`sample`](Self::sample) yields nothing;
/// [`items`](Self::items) still lists what was offered.
#[derive(Debug, Clone)]
pub struct WeightedChoice<T> {
    items: Vec<T>,
    dist: Option<WeightedIndex<f64>>,
}

impl<T> WeightedChoice<T> {
    /// Pair `items` with `weights`; extra entries on either side are dropped
    pub fn new(items: Vec<T>, weights: &[f64]) -> Self {
        let mut items = items;
        items.truncate(weights.len());
        let weights: Vec<f64> = weights[..items.len()]
            .iter()
            .map(|&w| if w.is_finite() && w > 0.0 { w } else { 0.0 })
            .collect();
        let dist = WeightedIndex::new(&weights).ok();
        Self { items, dist }
    }

    /// Check if no item can be drawn
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.dist.is_none()
    }

    /// All items, including zero-weight ones
    #[must_use]
    pub fn items(&self) -> &[T] {
        &self.items
    }

    /// Number of items, including zero-weight ones
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if there are no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Draw one item
    pub fn sample<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<&T> {
        let dist = self.dist.as_ref()?;
        self.items.get(dist.sample(rng))
    }
}
