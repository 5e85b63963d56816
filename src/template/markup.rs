use serde::Serialize;

// ============================================================================
// Markup tree
// ============================================================================

/// An element of a component template, attributes kept in source order and
/// with their original case (`*ngFor`, `[routerLink]`, `(click)`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkupElement {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub children: Vec<MarkupNode>,
    pub line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MarkupNode {
    Element(MarkupElement),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MarkupError {
    pub line: usize,
    pub reason: String,
}

impl MarkupElement {
    fn new(tag: String, attributes: Vec<(String, String)>, line: usize) -> Self {
        Self {
            tag,
            attributes,
            children: Vec::new(),
            line,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attr(&self, name: &str) -> bool {
        self.attributes.iter().any(|(n, _)| n == name)
    }

    /// Static CSS classes from the `class` attribute.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attr("class").unwrap_or("").split_whitespace()
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.classes().any(|c| c == class)
    }

    pub fn element_children(&self) -> impl Iterator<Item = &MarkupElement> {
        self.children.iter().filter_map(|c| match c {
            MarkupNode::Element(e) => Some(e),
            MarkupNode::Text(_) => None,
        })
    }

    pub fn has_element_children(&self) -> bool {
        self.element_children().next().is_some()
    }

    /// All descendant elements in document order.
    pub fn descendants(&self) -> Vec<&MarkupElement> {
        let mut out = Vec::new();
        for child in self.element_children() {
            out.push(child);
            out.extend(child.descendants());
        }
        out
    }

    /// Visible text of the subtree with whitespace collapsed.
    pub fn text_content(&self) -> String {
        let mut raw = String::new();
        collect_text(&self.children, &mut raw);
        normalize_whitespace(&raw)
    }
}

fn collect_text(nodes: &[MarkupNode], out: &mut String) {
    for node in nodes {
        match node {
            MarkupNode::Text(t) => {
                out.push_str(t);
                out.push(' ');
            }
            MarkupNode::Element(e) => collect_text(&e.children, out),
        }
    }
}

pub fn normalize_whitespace(raw: &str) -> String {
    raw.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Scanner
// ============================================================================

/// Parse a template into its top-level nodes.
///
/// Tolerant in the ways templates need: stray end tags are ignored, elements
/// left open at end of input are closed implicitly, and a mismatched end tag
/// closes up to the nearest open element with that name. Unterminated
/// comments, start tags and quoted values are errors.
pub fn parse_markup(source: &str) -> Result<Vec<MarkupNode>, MarkupError> {
    let bytes = source.as_bytes();
    let mut lines = LineCounter::default();
    let mut stack: Vec<MarkupElement> = vec![MarkupElement::new(String::new(), Vec::new(), 0)];
    let mut i = 0usize;

    while i < bytes.len() {
        if starts_with_at(bytes, i, b"<!--") {
            let line = lines.line_at(bytes, i);
            let end = find_subslice(bytes, i + 4, b"-->").ok_or_else(|| MarkupError {
                line,
                reason: "unclosed comment".into(),
            })?;
            i = end + 3;
            continue;
        }

        if starts_with_at(bytes, i, b"<!") || starts_with_at(bytes, i, b"<?") {
            // doctype / processing instruction
            i = find_byte(bytes, i, b'>').map(|e| e + 1).unwrap_or(bytes.len());
            continue;
        }

        if starts_with_at(bytes, i, b"</") && bytes.get(i + 2).is_some_and(u8::is_ascii_alphabetic) {
            let line = lines.line_at(bytes, i);
            let (tag, next) = parse_end_tag(source, i, line)?;
            i = next;
            close_element(&mut stack, &tag);
            continue;
        }

        if bytes[i] == b'<' && bytes.get(i + 1).is_some_and(u8::is_ascii_alphabetic) {
            let line = lines.line_at(bytes, i);
            let (tag, attributes, self_closing, next) = parse_start_tag(source, i, line)?;
            i = next;

            if is_raw_text_tag(&tag) {
                let close = find_end_tag(bytes, i, tag.as_bytes()).unwrap_or(bytes.len());
                i = find_byte(bytes, close, b'>').map(|e| e + 1).unwrap_or(bytes.len());
                continue;
            }

            let element = MarkupElement::new(tag.clone(), attributes, line);
            if self_closing || is_void_tag(&tag) {
                push_child(&mut stack, MarkupNode::Element(element));
            } else {
                stack.push(element);
            }
            continue;
        }

        let start = i;
        i += 1;
        while i < bytes.len() && bytes[i] != b'<' {
            i += 1;
        }
        let text = &source[start..i];
        if !text.trim().is_empty() {
            push_child(&mut stack, MarkupNode::Text(decode_entities(text)));
        }
    }

    while stack.len() > 1 {
        if let Some(open) = stack.pop() {
            push_child(&mut stack, MarkupNode::Element(open));
        }
    }

    Ok(stack.pop().map(|root| root.children).unwrap_or_default())
}

fn push_child(stack: &mut [MarkupElement], node: MarkupNode) {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(node);
    }
}

fn close_element(stack: &mut Vec<MarkupElement>, tag: &str) {
    let Some(pos) = stack.iter().rposition(|e| e.tag == tag) else {
        return; // stray end tag
    };
    if pos == 0 {
        return;
    }
    while stack.len() > pos {
        if let Some(open) = stack.pop() {
            push_child(stack, MarkupNode::Element(open));
        }
    }
}

fn parse_start_tag(
    source: &str,
    at: usize,
    line: usize,
) -> Result<(String, Vec<(String, String)>, bool, usize), MarkupError> {
    let bytes = source.as_bytes();
    let unclosed = || MarkupError {
        line,
        reason: "unclosed start tag".into(),
    };

    let mut i = at + 1;
    let tag_start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = source[tag_start..i].to_ascii_lowercase();

    let mut attributes = Vec::new();
    loop {
        skip_ws(bytes, &mut i);
        if i >= bytes.len() {
            return Err(unclosed());
        }
        if bytes[i] == b'>' {
            return Ok((tag, attributes, false, i + 1));
        }
        if bytes[i] == b'/' {
            if bytes.get(i + 1) == Some(&b'>') {
                return Ok((tag, attributes, true, i + 2));
            }
            i += 1;
            continue;
        }

        let name_start = i;
        while i < bytes.len() && is_attr_name_char(bytes[i]) {
            i += 1;
        }
        if i == name_start {
            return Err(MarkupError {
                line,
                reason: format!("unexpected character '{}' in <{}>", bytes[i] as char, tag),
            });
        }
        let name = source[name_start..i].to_string();

        skip_ws(bytes, &mut i);
        let value = if bytes.get(i) == Some(&b'=') {
            i += 1;
            skip_ws(bytes, &mut i);
            parse_attr_value(source, &mut i, line)?
        } else {
            String::new()
        };
        attributes.push((name, value));
    }
}

fn parse_attr_value(source: &str, i: &mut usize, line: usize) -> Result<String, MarkupError> {
    let bytes = source.as_bytes();
    if *i >= bytes.len() {
        return Err(MarkupError {
            line,
            reason: "missing attribute value".into(),
        });
    }

    if bytes[*i] == b'"' || bytes[*i] == b'\'' {
        let quote = bytes[*i];
        let start = *i + 1;
        let end = find_byte(bytes, start, quote).ok_or_else(|| MarkupError {
            line,
            reason: "unclosed quoted attribute value".into(),
        })?;
        *i = end + 1;
        return Ok(decode_entities(&source[start..end]));
    }

    let start = *i;
    while *i < bytes.len() && !bytes[*i].is_ascii_whitespace() && bytes[*i] != b'>' {
        *i += 1;
    }
    Ok(decode_entities(&source[start..*i]))
}

fn parse_end_tag(source: &str, at: usize, line: usize) -> Result<(String, usize), MarkupError> {
    let bytes = source.as_bytes();
    let mut i = at + 2;
    let start = i;
    while i < bytes.len() && is_tag_char(bytes[i]) {
        i += 1;
    }
    let tag = source[start..i].to_ascii_lowercase();
    let end = find_byte(bytes, i, b'>').ok_or_else(|| MarkupError {
        line,
        reason: format!("unclosed end tag </{}", tag),
    })?;
    Ok((tag, end + 1))
}

// ============================================================================
// Byte helpers
// ============================================================================

#[derive(Default)]
struct LineCounter {
    pos: usize,
    line: usize,
}

impl LineCounter {
    /// 1-based line of byte offset `at`; offsets must be non-decreasing.
    fn line_at(&mut self, bytes: &[u8], at: usize) -> usize {
        if self.line == 0 {
            self.line = 1;
        }
        let upto = at.min(bytes.len());
        if upto > self.pos {
            self.line += bytes[self.pos..upto].iter().filter(|b| **b == b'\n').count();
            self.pos = upto;
        }
        self.line
    }
}

fn skip_ws(bytes: &[u8], i: &mut usize) {
    while *i < bytes.len() && bytes[*i].is_ascii_whitespace() {
        *i += 1;
    }
}

fn starts_with_at(bytes: &[u8], at: usize, needle: &[u8]) -> bool {
    bytes.len() >= at + needle.len() && &bytes[at..at + needle.len()] == needle
}

fn find_subslice(bytes: &[u8], from: usize, needle: &[u8]) -> Option<usize> {
    (from..bytes.len()).find(|&i| starts_with_at(bytes, i, needle))
}

fn find_byte(bytes: &[u8], from: usize, needle: u8) -> Option<usize> {
    (from..bytes.len()).find(|&i| bytes[i] == needle)
}

fn find_end_tag(bytes: &[u8], from: usize, tag: &[u8]) -> Option<usize> {
    (from..bytes.len()).find(|&i| {
        starts_with_at(bytes, i, b"</")
            && bytes.len() >= i + 2 + tag.len()
            && bytes[i + 2..i + 2 + tag.len()].eq_ignore_ascii_case(tag)
    })
}

fn is_tag_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b':'
}

fn is_attr_name_char(b: u8) -> bool {
    !b.is_ascii_whitespace() && !matches!(b, b'=' | b'>' | b'/' | b'"' | b'\'' | b'<')
}

fn is_void_tag(tag: &str) -> bool {
    matches!(
        tag,
        "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
            | "param" | "source" | "track" | "wbr"
    )
}

fn is_raw_text_tag(tag: &str) -> bool {
    matches!(tag, "script" | "style")
}

fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }
    raw.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
