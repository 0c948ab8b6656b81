//! Nested XML rendering of coverage documents.
//!
//! Element nesting follows the dotted names; every node element carries its
//! full name in `abs_name`, so the tag itself is only a readable hint.

use super::{parent_of, BinRecord, CoverageDocument, NodeRecord};
use crate::coverage::ItemKind;
use crate::result::{CovError, CovResult};
use std::collections::BTreeMap;
use std::fmt::Write;

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

fn unescape(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Element name for the last segment of a dotted name
fn tag_name(name: &str) -> String {
    let segment = name.rsplit('.').next().unwrap_or(name);
    let mut tag: String = segment
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if !tag.starts_with(|c: char| c.is_ascii_alphabetic() || c == '_') {
        tag.insert(0, '_');
    }
    tag
}

pub(super) fn to_xml(doc: &CoverageDocument) -> String {
    let mut children: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut roots = Vec::new();
    for (name, _) in doc.iter() {
        match parent_of(name).filter(|p| doc.contains(p)) {
            Some(parent) => children.entry(parent).or_default().push(name),
            None => roots.push(name),
        }
    }

    let mut xml = String::from(r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    xml.push('\n');
    // A well-formed document has exactly one root; wrap anything else.
    let wrap = roots.len() != 1;
    if wrap {
        xml.push_str("<coverage>\n");
    }
    for root in roots {
        write_node(&mut xml, doc, &children, root, usize::from(wrap));
    }
    if wrap {
        xml.push_str("</coverage>\n");
    }
    xml
}

fn write_node(
    xml: &mut String,
    doc: &CoverageDocument,
    children: &BTreeMap<&str, Vec<&str>>,
    name: &str,
    level: usize,
) {
    let Some(record) = doc.get(name) else {
        return;
    };
    let indent = "  ".repeat(level);
    let tag = tag_name(name);
    let _ = write!(
        xml,
        r#"{indent}<{tag} abs_name="{}" kind="{}" size="{}" coverage="{}" cover_percentage="{:.2}""#,
        escape(name),
        record.kind,
        record.size,
        record.coverage,
        record.cover_percentage,
    );
    if let Some(weight) = record.weight {
        let _ = write!(xml, r#" weight="{weight}""#);
    }
    if let Some(at_least) = record.at_least {
        let _ = write!(xml, r#" at_least="{at_least}""#);
    }

    let kids = children.get(name).map_or(&[][..], Vec::as_slice);
    if record.bins.is_empty() && kids.is_empty() {
        xml.push_str("/>\n");
        return;
    }
    xml.push_str(">\n");
    for bin in &record.bins {
        let _ = writeln!(
            xml,
            r#"{indent}  <bin bin="{}" hits="{}"/>"#,
            escape(&bin.bin),
            bin.hits
        );
    }
    for child in kids {
        write_node(xml, doc, children, child, level + 1);
    }
    let _ = writeln!(xml, "{indent}</{tag}>");
}

/// One parsed element
#[derive(Debug, Default)]
struct Element {
    tag: String,
    attrs: Vec<(String, String)>,
    children: Vec<Element>,
}

impl Element {
    fn attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v.as_str()))
    }

    fn is_bin(&self) -> bool {
        self.tag == "bin" && self.attr("abs_name").is_none() && self.attr("hits").is_some()
    }
}

/// Minimal reader for the subset of XML this module writes
struct Reader<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Reader<'a> {
    fn rest(&self) -> &'a str {
        &self.text[self.pos..]
    }

    fn skip_until(&mut self, end: &str) -> CovResult<()> {
        match self.rest().find(end) {
            Some(i) => {
                self.pos += i + end.len();
                Ok(())
            }
            None => Err(CovError::merge_format(format!("unterminated markup, expected '{end}'"))),
        }
    }

    fn skip_whitespace(&mut self) {
        let trimmed = self.rest().trim_start();
        self.pos = self.text.len() - trimmed.len();
    }

    /// Skip text, declarations and comments up to the next tag
    fn next_tag(&mut self) -> CovResult<bool> {
        loop {
            match self.rest().find('<') {
                None => return Ok(false),
                Some(i) => self.pos += i,
            }
            let rest = self.rest();
            if rest.starts_with("<?") {
                self.skip_until("?>")?;
            } else if rest.starts_with("<!--") {
                self.skip_until("-->")?;
            } else if rest.starts_with("<!") {
                self.skip_until(">")?;
            } else {
                return Ok(true);
            }
        }
    }

    fn name(&mut self) -> String {
        let rest = self.rest();
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
            .unwrap_or(rest.len());
        self.pos += end;
        rest[..end].to_string()
    }

    fn element(&mut self) -> CovResult<Element> {
        // at '<'
        self.pos += 1;
        let tag = self.name();
        if tag.is_empty() {
            return Err(CovError::merge_format("element without a name"));
        }
        let mut element = Element {
            tag,
            ..Element::default()
        };
        loop {
            self.skip_whitespace();
            let rest = self.rest();
            if let Some(stripped) = rest.strip_prefix("/>") {
                self.pos = self.text.len() - stripped.len();
                return Ok(element);
            }
            if rest.starts_with('>') {
                self.pos += 1;
                break;
            }
            if rest.is_empty() {
                return Err(CovError::merge_format(format!("unterminated <{}>", element.tag)));
            }
            element.attrs.push(self.attribute()?);
        }

        loop {
            if !self.next_tag()? {
                return Err(CovError::merge_format(format!("missing </{}>", element.tag)));
            }
            if self.rest().starts_with("</") {
                self.pos += 2;
                let close = self.name();
                if close != element.tag {
                    return Err(CovError::merge_format(format!(
                        "<{}> closed by </{close}>",
                        element.tag
                    )));
                }
                self.skip_until(">")?;
                return Ok(element);
            }
            element.children.push(self.element()?);
        }
    }

    fn attribute(&mut self) -> CovResult<(String, String)> {
        let rest = self.rest();
        let Some(eq) = rest.find('=') else {
            return Err(CovError::merge_format("attribute without a value"));
        };
        let key = rest[..eq].trim().to_string();
        let after = rest[eq + 1..].trim_start();
        let Some(quote) = after.chars().next().filter(|c| *c == '"' || *c == '\'') else {
            return Err(CovError::merge_format(format!("unquoted attribute '{key}'")));
        };
        let body = &after[1..];
        let Some(close) = body.find(quote) else {
            return Err(CovError::merge_format(format!("unterminated attribute '{key}'")));
        };
        let value = unescape(&body[..close]);
        self.pos = self.text.len() - body[close + 1..].len();
        Ok((key, value))
    }
}

fn number(element: &Element, key: &str) -> CovResult<Option<u64>> {
    element
        .attr(key)
        .map(|v| {
            v.trim().parse::<u64>().map_err(|_| {
                CovError::merge_format(format!("<{}> has non-numeric {key}=\"{v}\"", element.tag))
            })
        })
        .transpose()
}

fn required(element: &Element, key: &str) -> CovResult<u64> {
    number(element, key)?
        .ok_or_else(|| CovError::merge_format(format!("<{}> is missing '{key}'", element.tag)))
}

fn collect(element: &Element, parent: Option<&str>, doc: &mut CoverageDocument) -> CovResult<()> {
    let name = match (element.attr("abs_name"), parent) {
        (Some(abs), _) => abs.to_string(),
        (None, Some(parent)) => format!("{parent}.{}", element.tag),
        (None, None) => element.tag.clone(),
    };

    let mut bins = Vec::new();
    for child in element.children.iter().filter(|c| c.is_bin()) {
        let bin = child.attr("bin").or_else(|| child.attr("bin_value")).unwrap_or_default();
        bins.push(BinRecord::new(bin, required(child, "hits")?));
    }
    let weight = number(element, "weight")?;
    let kind = match element.attr("kind") {
        Some(kind) => ItemKind::parse(kind)
            .ok_or_else(|| CovError::merge_format(format!("unknown node kind '{kind}'")))?,
        None if weight.is_some() || !bins.is_empty() => ItemKind::Point,
        None => ItemKind::Group,
    };
    let record = NodeRecord {
        kind,
        size: required(element, "size")?,
        coverage: required(element, "coverage")?,
        cover_percentage: 0.0,
        weight,
        at_least: number(element, "at_least")?,
        bins,
    };
    doc.insert(name.clone(), record);

    for child in element.children.iter().filter(|c| !c.is_bin()) {
        collect(child, Some(&name), doc)?;
    }
    Ok(())
}

pub(super) fn from_xml(text: &str) -> CovResult<CoverageDocument> {
    let mut reader = Reader { text, pos: 0 };
    if !reader.next_tag()? {
        return Err(CovError::merge_format("no XML root element"));
    }
    let root = reader.element()?;
    if reader.next_tag()? {
        return Err(CovError::merge_format("content after the XML root element"));
    }

    let mut doc = CoverageDocument::new();
    // The wrapper written for root-less documents is not a node.
    if root.tag == "coverage" && root.attr("size").is_none() {
        for child in &root.children {
            collect(child, None, &mut doc)?;
        }
    } else {
        collect(&root, None, &mut doc)?;
    }
    Ok(doc)
}
