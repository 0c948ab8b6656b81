//! Sampling several coverage items for one event.

use super::CoverItem;
use crate::result::CovResult;
use crate::value::Args;
use std::fmt;
use std::sync::Arc;

/// Ordered group of coverage items sampled together
///
/// Items are sampled in the order they were added, so a cross added after
/// its points sees the points' hits from the same event.
#[derive(Clone, Default)]
pub struct CoverageSection {
    items: Vec<Arc<dyn CoverItem>>,
}

impl fmt::Debug for CoverageSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.items.iter().map(|i| i.name()))
            .finish()
    }
}

impl CoverageSection {
    /// Create an empty section
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an item
    #[must_use]
    pub fn with(mut self, item: impl CoverItem + 'static) -> Self {
        self.items.push(Arc::new(item));
        self
    }

    /// Append an item in place
    pub fn push(&mut self, item: impl CoverItem + 'static) {
        self.items.push(Arc::new(item));
    }

    /// Number of items
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the section has no items
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Sample every item with the same arguments, stopping at the first error
    pub fn sample(&self, args: &Args) -> CovResult<()> {
        self.items.iter().try_for_each(|item| item.sample(args))
    }
}
