//! Shared HTML helpers for the rule checks.
//!
//! Checks use two views of every HTML entry:
//!
//! - **Tree**: `tl` parses the text once; the result is converted into an
//!   owned [`Element`] tree so checks can walk ancestors and descendants
//!   without holding the parser's borrow. Each element remembers its byte
//!   offset in the source, which [`LineIndex`] maps back to a 1-based line.
//! - **Lines**: raw text lines, for the regex scans whose diagnostics must
//!   point at the exact line a user will see in their editor.
//!
//! `tl` is lenient: it never rejects markup and does not always treat void
//! elements as leaves. The conversion hoists children of void elements back
//! to siblings so `<img>` and `<br>` never "contain" what follows them.
//!
//! The owned tree is walked (and dropped) recursively, so conversion refuses
//! documents nested deeper than [`MAX_DEPTH`]. Checks report that as a parse
//! failure for the entry.

use regex::Regex;
use std::sync::LazyLock;

/// Elements that never have content or a closing tag.
pub const VOID_ELEMENTS: &[&str] = &[
    "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param", "source",
    "track", "wbr",
];

/// Deepest element nesting the tree conversion accepts.
pub const MAX_DEPTH: usize = 512;

pub fn is_void(name: &str) -> bool {
    VOID_ELEMENTS.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Node {
    Element(Element),
    Text(String),
    Comment(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Element {
    /// Lowercase tag name.
    pub name: String,
    /// Lowercase keys, values as written (entities untouched).
    pub attrs: Vec<(String, Option<String>)>,
    pub children: Vec<Node>,
    /// Byte offset of the opening `<` in the source, when known.
    pub offset: Option<usize>,
}

impl Element {
    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_deref().unwrap_or(""))
    }

    pub fn child_elements(&self) -> impl Iterator<Item = &Element> {
        self.children.iter().filter_map(|n| match n {
            Node::Element(e) => Some(e),
            _ => None,
        })
    }

    /// Any descendant (not self) with the given name.
    pub fn has_descendant(&self, name: &str) -> bool {
        self.child_elements()
            .any(|c| c.name == name || c.has_descendant(name))
    }

    /// True when the element holds no child elements and no visible text.
    pub fn is_empty(&self) -> bool {
        self.children.iter().all(|n| match n {
            Node::Element(_) => false,
            Node::Text(t) => t.trim().is_empty(),
            Node::Comment(_) => true,
        })
    }
}

/// Maps byte offsets to 1-based line numbers.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(text.match_indices('\n').map(|(i, _)| i + 1));
        Self { starts }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|&s| s <= offset)
    }
}

/// A parsed HTML entry.
#[derive(Debug, Clone)]
pub struct Document {
    pub roots: Vec<Node>,
    has_doctype: bool,
    lines: LineIndex,
}

impl Document {
    pub fn parse(source: &str) -> Result<Document, String> {
        let dom =
            tl::parse(source, tl::ParserOptions::default()).map_err(|e| format!("{e:?}"))?;
        let parser = dom.parser();
        let base = source.as_ptr() as usize;

        let mut roots = Vec::new();
        for handle in dom.children() {
            roots.extend(convert(*handle, parser, base, source.len(), 0)?);
        }

        let has_doctype = source
            .trim_start()
            .get(..9)
            .is_some_and(|s| s.eq_ignore_ascii_case("<!doctype"));

        Ok(Document {
            roots,
            has_doctype,
            lines: LineIndex::new(source),
        })
    }

    pub fn line_of(&self, element: &Element) -> Option<usize> {
        element.offset.map(|o| self.lines.line_of(o))
    }

    /// Depth-first, document-order walk. The callback receives each element
    /// and its ancestors (outermost first).
    pub fn visit<'a>(&'a self, f: &mut impl FnMut(&'a Element, &[&'a Element])) {
        fn go<'a>(
            nodes: &'a [Node],
            stack: &mut Vec<&'a Element>,
            f: &mut impl FnMut(&'a Element, &[&'a Element]),
        ) {
            for node in nodes {
                if let Node::Element(e) = node {
                    f(e, stack);
                    stack.push(e);
                    go(&e.children, stack, f);
                    stack.pop();
                }
            }
        }
        let mut stack = Vec::new();
        go(&self.roots, &mut stack, f);
    }

    /// Every element with the given name, in document order.
    pub fn elements_named(&self, name: &str) -> Vec<&Element> {
        let mut found = Vec::new();
        self.visit(&mut |e, _| {
            if e.name == name {
                found.push(e);
            }
        });
        found
    }

    /// Serialize the tree back to markup. Whatever `tl` closed implicitly is
    /// closed explicitly here.
    pub fn to_html(&self) -> String {
        let mut out = String::new();
        let leading_doctype = matches!(
            self.roots.first(),
            Some(Node::Comment(c)) if c.to_ascii_lowercase().starts_with("<!doctype")
        );
        if self.has_doctype && !leading_doctype {
            out.push_str("<!DOCTYPE html>\n");
        }
        serialize_nodes(&self.roots, &mut out);
        out
    }
}

fn convert(
    handle: tl::NodeHandle,
    parser: &tl::Parser,
    base: usize,
    len: usize,
    depth: usize,
) -> Result<Vec<Node>, String> {
    let Some(node) = handle.get(parser) else {
        return Ok(Vec::new());
    };

    match node {
        tl::Node::Tag(tag) => {
            let name = tag.name().as_utf8_str().to_lowercase();
            // Declarations such as <!DOCTYPE> are not elements
            if name.starts_with('!') {
                let mut out = Vec::new();
                for child in tag.children().top().iter() {
                    out.extend(convert(*child, parser, base, len, depth)?);
                }
                return Ok(out);
            }
            if depth >= MAX_DEPTH {
                return Err(format!("elements nested deeper than {MAX_DEPTH} levels"));
            }
            let attrs = tag
                .attributes()
                .iter()
                .map(|(k, v)| (k.to_lowercase(), v.map(|v| v.to_string())))
                .collect();

            let start = tag.raw().as_bytes().as_ptr() as usize;
            let offset = start.checked_sub(base).filter(|o| *o <= len);

            let mut children = Vec::new();
            for child in tag.children().top().iter() {
                children.extend(convert(*child, parser, base, len, depth + 1)?);
            }

            if is_void(&name) {
                let mut out = vec![Node::Element(Element {
                    name,
                    attrs,
                    children: Vec::new(),
                    offset,
                })];
                out.extend(children);
                Ok(out)
            } else {
                Ok(vec![Node::Element(Element {
                    name,
                    attrs,
                    children,
                    offset,
                })])
            }
        }
        tl::Node::Raw(bytes) => Ok(vec![Node::Text(bytes.as_utf8_str().to_string())]),
        tl::Node::Comment(bytes) => Ok(vec![Node::Comment(bytes.as_utf8_str().to_string())]),
    }
}

fn serialize_nodes(nodes: &[Node], out: &mut String) {
    for node in nodes {
        match node {
            Node::Text(t) => out.push_str(t),
            Node::Comment(c) if c.starts_with("<!") => out.push_str(c),
            Node::Comment(c) => {
                out.push_str("<!--");
                out.push_str(c);
                out.push_str("-->");
            }
            Node::Element(e) => {
                out.push('<');
                out.push_str(&e.name);
                for (key, value) in &e.attrs {
                    out.push(' ');
                    out.push_str(key);
                    if let Some(v) = value {
                        out.push_str("=\"");
                        out.push_str(&v.replace('"', "&quot;"));
                        out.push('"');
                    }
                }
                out.push('>');
                if !is_void(&e.name) {
                    serialize_nodes(&e.children, out);
                    out.push_str("</");
                    out.push_str(&e.name);
                    out.push('>');
                }
            }
        }
    }
}

/// Index just past the `>` closing the tag that opens at `start`, skipping
/// `>` inside quoted attribute values. Returns the text length if unterminated.
pub fn tag_end(source: &str, start: usize) -> usize {
    let bytes = source.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = start;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'"' || b == b'\'' => quote = Some(b),
            None if b == b'>' => return i + 1,
            None => {}
        }
        i += 1;
    }
    bytes.len()
}

static NON_MARKUP: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)(<!--.*?-->)|<(?:script|style)\b[^>]*>(.*?)</(?:script|style)\s*>").unwrap()
});

/// Blank out comments and `<script>`/`<style>` bodies, keeping newlines,
/// so tag scanners do not trip over `<` inside CSS, JS or commented markup.
/// The script/style tags themselves stay visible.
pub fn mask_non_markup(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for caps in NON_MARKUP.captures_iter(source) {
        let Some(m) = caps.get(1).or_else(|| caps.get(2)) else {
            continue;
        };
        out.push_str(&source[last..m.start()]);
        out.extend(
            m.as_str()
                .chars()
                .map(|c| if c == '\n' { '\n' } else { ' ' }),
        );
        last = m.end();
    }
    out.push_str(&source[last..]);
    out
}

/// Lines paired with their 1-based numbers.
pub fn numbered_lines(text: &str) -> impl Iterator<Item = (usize, &str)> {
    text.split('\n').enumerate().map(|(i, l)| (i + 1, l))
}
