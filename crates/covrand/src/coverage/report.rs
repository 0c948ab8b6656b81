//! Indented text reports of a coverage tree.
//!
//! Used both for the live registry and for loaded export documents, so a
//! merged result reads exactly like the run that produced it.

use super::ItemKind;

/// One node as it appears in a report
#[derive(Debug, Clone)]
pub(crate) struct ReportRow {
    pub(crate) name: String,
    pub(crate) kind: ItemKind,
    pub(crate) size: u64,
    pub(crate) coverage: u64,
    pub(crate) cover_percentage: f64,
    pub(crate) bins: Vec<(String, u64)>,
}

const INDENT: &str = "   ";

fn sort_key(name: &str) -> Vec<String> {
    name.split('.').map(str::to_lowercase).collect()
}

/// Render rows depth-first, siblings in case-insensitive alphabetical order
pub(crate) fn render(mut rows: Vec<ReportRow>, bins: bool, prefix: Option<&str>, sink: &mut dyn FnMut(&str)) {
    rows.retain(|r| prefix.map_or(true, |p| r.name.starts_with(p)));
    rows.sort_by(|a, b| {
        sort_key(&a.name)
            .cmp(&sort_key(&b.name))
            .then_with(|| a.name.cmp(&b.name))
    });

    for row in &rows {
        let indent = INDENT.repeat(row.name.matches('.').count());
        sink(&format!(
            "{indent}{} : {}, coverage={}, size={}, cover_percentage={:.2}",
            row.name, row.kind, row.coverage, row.size, row.cover_percentage
        ));
        if bins && row.kind != ItemKind::Group {
            for (bin, hits) in &row.bins {
                sink(&format!("{indent}{INDENT}BIN {bin} : {hits}"));
            }
        }
    }
}
