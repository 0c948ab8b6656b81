//! Additive merge of coverage documents.

use super::{depth, parent_of, BinRecord, CoverageDocument, DocumentFormat, NodeRecord};
use crate::coverage::{ItemKind, FAIL, PASS};
use crate::result::{CovError, CovResult};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

fn check_coverage(record: &NodeRecord) -> u64 {
    let pass = record.hits(PASS).unwrap_or(0);
    let fail = record.hits(FAIL).unwrap_or(0);
    if fail == 0 && pass >= record.at_least.unwrap_or(1) {
        record.weight.unwrap_or(1)
    } else {
        0
    }
}

/// Size and coverage change of one item after summing in `incoming` bins
fn merge_bins(acc: &mut NodeRecord, incoming: &[BinRecord]) -> (u64, i64) {
    let weight = acc.weight.unwrap_or(1);
    let at_least = acc.at_least.unwrap_or(1);
    let mut size_delta = 0;
    let mut coverage_delta = 0;

    for bin in incoming {
        match acc.bins.iter_mut().find(|b| b.bin == bin.bin) {
            Some(existing) => {
                let before = existing.hits;
                existing.hits += bin.hits;
                if before < at_least && existing.hits >= at_least {
                    coverage_delta += weight;
                }
            }
            None => {
                size_delta += weight;
                if bin.hits >= at_least {
                    coverage_delta += weight;
                }
                acc.bins.push(bin.clone());
            }
        }
    }

    if acc.kind == ItemKind::Check {
        // A check has one unit of size and no descendants.
        let delta = check_coverage(acc) as i64 - acc.coverage as i64;
        return (0, delta);
    }
    (size_delta, coverage_delta as i64)
}

fn under_inserted(name: &str, inserted: &HashSet<String>) -> bool {
    let mut cursor = parent_of(name);
    while let Some(parent) = cursor {
        if inserted.contains(parent) {
            return true;
        }
        cursor = parent_of(parent);
    }
    false
}

impl CoverageDocument {
    /// Add a delta to every recorded ancestor; missing groups are skipped
    fn propagate(&mut self, from: &str, size_delta: u64, coverage_delta: i64) {
        let mut cursor = parent_of(from).map(str::to_string);
        while let Some(name) = cursor {
            if let Some(record) = self.get_mut(&name) {
                record.size += size_delta;
                record.coverage = record.coverage.saturating_add_signed(coverage_delta);
            }
            cursor = parent_of(&name).map(str::to_string);
        }
    }

    /// Fold `other` into this document
    ///
    /// Nodes missing here are inserted with their totals. For shared items
    /// hit counts are summed and coverage only grows when a bin first reaches
    /// `at_least`, so bins covered in both inputs are counted once. Checks
    /// are re-evaluated from the summed PASS/FAIL counts.
    pub fn merge(&mut self, other: &Self) {
        self.ensure_top();
        let mut names: Vec<&str> = other.iter().map(|(name, _)| name).collect();
        names.sort_by_key(|name| depth(name));

        let mut inserted: HashSet<String> = HashSet::new();
        for name in names {
            let Some(incoming) = other.get(name) else {
                continue;
            };
            match self.get_mut(name) {
                None => {
                    debug!(node = name, "merge: new node");
                    self.insert(name, incoming.clone());
                    // A node inserted earlier in this merge already carries these totals
                    if !under_inserted(name, &inserted) {
                        self.propagate(name, incoming.size, incoming.coverage as i64);
                    }
                    let _ = inserted.insert(name.to_string());
                }
                Some(acc) if acc.kind == ItemKind::Group => {}
                Some(acc) => {
                    let (size_delta, coverage_delta) = merge_bins(acc, &incoming.bins);
                    acc.size += size_delta;
                    acc.coverage = acc.coverage.saturating_add_signed(coverage_delta);
                    self.propagate(name, size_delta, coverage_delta);
                }
            }
        }
        self.refresh();
    }

    /// Merge several documents left to right
    pub fn merge_all<'a>(docs: impl IntoIterator<Item = &'a Self>) -> Self {
        let mut acc = Self::new();
        for doc in docs {
            if acc.is_empty() {
                acc = doc.clone();
                acc.ensure_top();
            } else {
                acc.merge(doc);
            }
        }
        acc
    }
}

/// Merge two or more exported files into `output`
///
/// The output format follows the output extension (`.xml`, `.yml`,
/// `.yaml`, `.json`), falling back to the format of the first input.
pub fn merge_files(output: &Path, inputs: &[PathBuf]) -> CovResult<CoverageDocument> {
    if inputs.len() < 2 {
        return Err(CovError::configuration(format!(
            "merging needs at least two inputs, got {}",
            inputs.len()
        )));
    }

    let (mut merged, first_format) = CoverageDocument::load_with_format(&inputs[0])?;
    for input in &inputs[1..] {
        merged.merge(&CoverageDocument::load(input)?);
    }

    let format = DocumentFormat::from_path(output).unwrap_or(first_format);
    merged.save(output, format)?;
    if let Some(top) = merged.top() {
        info!(
            output = %output.display(),
            inputs = inputs.len(),
            coverage = top.coverage,
            size = top.size,
            "merged coverage"
        );
    }
    Ok(merged)
}
