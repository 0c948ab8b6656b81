//! Coverage export documents.
//!
//! A [`CoverageDocument`] is a detached copy of a coverage tree keyed by
//! dotted name. It is written as nested XML or as a flat YAML / JSON
//! mapping, and documents from several runs are merged additively.
//!
//! ## XML layout
//!
//! ```xml
//! <?xml version="1.0" encoding="UTF-8"?>
//! <top abs_name="top" kind="group" size="3" coverage="2" cover_percentage="66.67">
//!   <fifo abs_name="top.fifo" kind="group" size="3" coverage="2" cover_percentage="66.67">
//!     <level abs_name="top.fifo.level" kind="point" size="3" coverage="2" cover_percentage="66.67" weight="1" at_least="1">
//!       <bin bin="0" hits="4"/>
//!     </level>
//!   </fifo>
//! </top>
//! ```

mod merge;
mod xml;

pub use merge::merge_files;

use crate::coverage::{parent_name, percentage, CoverageDb, ItemKind};
use crate::coverage::report::{self, ReportRow};
use crate::result::{CovError, CovResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use tracing::debug;

/// Name of the document root
pub const TOP: &str = "top";

/// Hit count of one bin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinRecord {
    /// Bin key as text (label if the bin was labelled)
    pub bin: String,
    /// Number of hits
    pub hits: u64,
}

impl BinRecord {
    /// Create a bin record
    #[must_use]
    pub fn new(bin: impl Into<String>, hits: u64) -> Self {
        Self {
            bin: bin.into(),
            hits,
        }
    }
}

/// One exported coverage node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// What the node modelled
    #[serde(default)]
    pub kind: ItemKind,
    /// Weighted capacity including descendants
    pub size: u64,
    /// Weighted coverage including descendants
    pub coverage: u64,
    /// `100 * coverage / size`
    #[serde(default)]
    pub cover_percentage: f64,
    /// Per-bin weight of an item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<u64>,
    /// Hits needed per bin of an item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub at_least: Option<u64>,
    /// Bins of an item in declaration order
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub bins: Vec<BinRecord>,
}

impl NodeRecord {
    /// A group record with the given totals
    #[must_use]
    pub fn group(size: u64, coverage: u64) -> Self {
        Self {
            kind: ItemKind::Group,
            size,
            coverage,
            cover_percentage: percentage(coverage, size),
            weight: None,
            at_least: None,
            bins: Vec::new(),
        }
    }

    /// Hits of one bin
    #[must_use]
    pub fn hits(&self, bin: &str) -> Option<u64> {
        self.bins.iter().find(|b| b.bin == bin).map(|b| b.hits)
    }

    fn refresh(&mut self) {
        self.cover_percentage = percentage(self.coverage, self.size);
    }
}

/// On-disk representation of a document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    /// Nested markup tree
    Xml,
    /// Flat name to record mapping
    Yaml,
    /// Flat name to record mapping
    Json,
}

impl DocumentFormat {
    /// Format implied by a file extension
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "xml" => Some(Self::Xml),
            "yml" | "yaml" => Some(Self::Yaml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Xml => "xml",
            Self::Yaml => "yaml",
            Self::Json => "json",
        })
    }
}

/// Detached coverage tree keyed by dotted name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CoverageDocument {
    nodes: BTreeMap<String, NodeRecord>,
}

/// Parent of `name` in a document: the dotted prefix, or `top` for other roots
pub(crate) fn parent_of(name: &str) -> Option<&str> {
    match parent_name(name) {
        Some(parent) => Some(parent),
        None if name == TOP => None,
        None => Some(TOP),
    }
}

/// Distance from the document root
pub(crate) fn depth(name: &str) -> usize {
    let dots = name.matches('.').count();
    if name == TOP || name.starts_with("top.") {
        dots
    } else {
        dots + 1
    }
}

impl CoverageDocument {
    /// Create an empty document
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a record
    pub fn insert(&mut self, name: impl Into<String>, record: NodeRecord) {
        let _ = self.nodes.insert(name.into(), record);
    }

    /// Record by dotted name
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&NodeRecord> {
        self.nodes.get(name)
    }

    pub(crate) fn get_mut(&mut self, name: &str) -> Option<&mut NodeRecord> {
        self.nodes.get_mut(name)
    }

    /// Check whether a node exists
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.nodes.contains_key(name)
    }

    /// Records in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &NodeRecord)> {
        self.nodes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of records
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the document has no records
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The root record
    #[must_use]
    pub fn top(&self) -> Option<&NodeRecord> {
        self.nodes.get(TOP)
    }

    /// Snapshot a coverage database
    ///
    /// A `top` root is synthesised when the database has none; other roots
    /// are counted into `top`.
    #[must_use]
    pub fn from_db(db: &CoverageDb) -> Self {
        let mut doc = db.with_registry(|reg| {
            let nodes = reg
                .iter()
                .map(|node| {
                    let kind = node.kind.item_kind();
                    let item = kind != ItemKind::Group;
                    let record = NodeRecord {
                        kind,
                        size: node.size,
                        coverage: node.coverage,
                        cover_percentage: node.cover_percentage(),
                        weight: item.then_some(node.weight),
                        at_least: item.then_some(node.at_least),
                        bins: node
                            .detailed_coverage()
                            .into_iter()
                            .map(|(key, hits)| BinRecord::new(key.to_string(), hits))
                            .collect(),
                    };
                    (node.name.clone(), record)
                })
                .collect();
            Self { nodes }
        });
        doc.absorb_roots();
        doc
    }

    /// Make `top` account for every other root
    fn absorb_roots(&mut self) {
        let (size, coverage) = self
            .nodes
            .iter()
            .filter(|(name, _)| name.as_str() != TOP && !name.contains('.'))
            .fold((0, 0), |(s, c), (_, r)| (s + r.size, c + r.coverage));
        if self.nodes.is_empty() {
            return;
        }
        let top = self
            .nodes
            .entry(TOP.to_string())
            .or_insert_with(|| NodeRecord::group(0, 0));
        top.size += size;
        top.coverage += coverage;
        top.refresh();
    }

    /// Add a `top` root summing the other roots, if there is none
    pub(crate) fn ensure_top(&mut self) {
        if !self.nodes.contains_key(TOP) {
            self.absorb_roots();
        }
    }

    /// Recompute every percentage from size and coverage
    pub(crate) fn refresh(&mut self) {
        self.nodes.values_mut().for_each(NodeRecord::refresh);
    }

    /// Parse a document, detecting XML, then JSON, then YAML
    pub fn parse(text: &str) -> CovResult<(Self, DocumentFormat)> {
        if text.trim().is_empty() {
            return Err(CovError::merge_format("empty document"));
        }
        let (mut doc, format) = if text.trim_start().starts_with('<') {
            (xml::from_xml(text)?, DocumentFormat::Xml)
        } else if let Ok(doc) = serde_json::from_str::<Self>(text) {
            (doc, DocumentFormat::Json)
        } else {
            let doc = serde_yaml_ng::from_str::<Self>(text).map_err(|e| {
                CovError::merge_format(format!("neither XML, JSON nor YAML coverage: {e}"))
            })?;
            (doc, DocumentFormat::Yaml)
        };
        if doc.is_empty() {
            return Err(CovError::merge_format("document has no coverage nodes"));
        }
        doc.ensure_top();
        doc.refresh();
        Ok((doc, format))
    }

    /// Load a document from disk and report its format
    pub fn load_with_format(path: &Path) -> CovResult<(Self, DocumentFormat)> {
        let text = fs::read_to_string(path)?;
        let (doc, format) = Self::parse(&text).map_err(|e| match e {
            CovError::MergeFormat { message } => {
                CovError::merge_format(format!("{}: {message}", path.display()))
            }
            other => other,
        })?;
        debug!(path = %path.display(), %format, nodes = doc.len(), "loaded coverage document");
        Ok((doc, format))
    }

    /// Load a document from disk
    pub fn load(path: &Path) -> CovResult<Self> {
        Self::load_with_format(path).map(|(doc, _)| doc)
    }

    /// Render in the given format
    pub fn render(&self, format: DocumentFormat) -> CovResult<String> {
        Ok(match format {
            DocumentFormat::Xml => xml::to_xml(self),
            DocumentFormat::Yaml => serde_yaml_ng::to_string(self)?,
            DocumentFormat::Json => serde_json::to_string_pretty(self)?,
        })
    }

    /// Write the document, creating parent directories
    pub fn save(&self, path: &Path, format: DocumentFormat) -> CovResult<()> {
        let text = self.render(format)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text)?;
        debug!(path = %path.display(), %format, "wrote coverage document");
        Ok(())
    }

    /// Indented report of the document, same layout as the live registry
    pub fn report_coverage(&self, mut sink: impl FnMut(&str), bins: bool, node: Option<&str>) {
        let rows = self
            .nodes
            .iter()
            .map(|(name, r)| ReportRow {
                name: name.clone(),
                kind: r.kind,
                size: r.size,
                coverage: r.coverage,
                cover_percentage: r.cover_percentage,
                bins: r.bins.iter().map(|b| (b.bin.clone(), b.hits)).collect(),
            })
            .collect();
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
}

impl CoverageDb {
    /// Snapshot the database as a document
    #[must_use]
    pub fn export(&self) -> CoverageDocument {
        CoverageDocument::from_db(self)
    }

    /// Export to a nested XML file
    pub fn export_to_xml(&self, path: &Path) -> CovResult<()> {
        self.export().save(path, DocumentFormat::Xml)
    }

    /// Export to a flat YAML file
    pub fn export_to_yaml(&self, path: &Path) -> CovResult<()> {
        self.export().save(path, DocumentFormat::Yaml)
    }

    /// Export to a flat JSON file
    pub fn export_to_json(&self, path: &Path) -> CovResult<()> {
        self.export().save(path, DocumentFormat::Json)
    }
}
