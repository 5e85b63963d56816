use std::collections::HashSet;

use crate::config::ParserConfig;
use crate::template::components::ComponentIndex;
use crate::template::markup::MarkupElement;
use crate::template::model::{AttrValue, LocatorSpec, NodeKind};

/// Everything the rules need besides the element itself.
pub struct ClassifyContext<'a> {
    pub parser: &'a ParserConfig,
    pub selector_prefix: &'a str,
    pub components: &'a ComponentIndex,
}

/// Outcome of classifying one template element.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// Transient UI; the element and its subtree are left out.
    Excluded,
    /// Anonymous wrapper; no node, children are classified in its place.
    Flatten,
    Node(NodeKind),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ClassifyError {
    DuplicateColumn { label: String },
}

type Rule = fn(&MarkupElement, &ClassifyContext) -> Result<Option<Classification>, ClassifyError>;

/// Classifier rules, evaluated in order; the first rule returning a
/// classification wins. Navigation precedes tables and lists.
pub const RULES: &[(&str, Rule)] = &[
    ("loader", loader_rule),
    ("component", component_rule),
    ("navigation", navigation_rule),
    ("table", table_rule),
    ("list", list_rule),
    ("interactive", interactive_rule),
    ("generic", generic_rule),
];

/// Classify an element, returning the outcome and the name of the rule
/// that produced it.
pub fn classify(
    el: &MarkupElement,
    ctx: &ClassifyContext,
) -> Result<(Classification, &'static str), ClassifyError> {
    for (name, rule) in RULES {
        if let Some(outcome) = rule(el, ctx)? {
            return Ok((outcome, name));
        }
    }
    Ok((Classification::Flatten, "fallthrough"))
}

// ============================================================================
// Rules
// ============================================================================

fn loader_rule(el: &MarkupElement, ctx: &ClassifyContext) -> Result<Option<Classification>, ClassifyError> {
    Ok(is_loader(el, ctx.parser).then_some(Classification::Excluded))
}

fn component_rule(el: &MarkupElement, ctx: &ClassifyContext) -> Result<Option<Classification>, ClassifyError> {
    if !el.tag.contains('-') {
        return Ok(None);
    }
    Ok(ctx
        .components
        .by_selector(&el.tag, ctx.selector_prefix)
        .map(|entry| {
            Classification::Node(NodeKind::ComponentRef {
                component_id: entry.component_id.clone(),
            })
        }))
}

fn navigation_rule(el: &MarkupElement, ctx: &ClassifyContext) -> Result<Option<Classification>, ClassifyError> {
    let p = ctx.parser;
    let by_class = el.classes().any(|c| p.nav_classes.iter().any(|n| n == c));
    let by_tag = p.nav_tags.iter().any(|t| *t == el.tag);
    let by_link = el.has_element_children() && router_link(el, p).is_some();

    Ok((by_class || by_tag || by_link).then_some(Classification::Node(NodeKind::NavContainer)))
}

fn table_rule(el: &MarkupElement, ctx: &ClassifyContext) -> Result<Option<Classification>, ClassifyError> {
    let p = ctx.parser;
    let tabular = p.table_tags.iter().any(|t| *t == el.tag) || el.has_attr(&p.table_attribute);
    if !tabular {
        return Ok(None);
    }
    let columns = table_columns(el)?;
    if columns.is_empty() {
        return Ok(None);
    }
    Ok(Some(Classification::Node(NodeKind::Table { columns })))
}

fn list_rule(el: &MarkupElement, ctx: &ClassifyContext) -> Result<Option<Classification>, ClassifyError> {
    let repeated = ctx.parser.repeat_directives.iter().any(|d| el.has_attr(d));
    Ok(repeated.then_some(Classification::Node(NodeKind::List)))
}

fn interactive_rule(el: &MarkupElement, ctx: &ClassifyContext) -> Result<Option<Classification>, ClassifyError> {
    let kind = match el.tag.as_str() {
        "button" => Some(NodeKind::Button),
        "input" => match el.attr("type") {
            Some("submit" | "button" | "reset" | "image") => Some(NodeKind::Button),
            Some("hidden") => None,
            _ => Some(NodeKind::Input),
        },
        "textarea" | "select" => Some(NodeKind::Input),
        "a" => Some(NodeKind::Link),
        _ if router_link(el, ctx.parser).is_some() => Some(NodeKind::Link),
        _ if el.has_attr("(click)") || el.attr("role") == Some("button") => Some(NodeKind::Button),
        _ => None,
    };
    Ok(kind.map(Classification::Node))
}

fn generic_rule(el: &MarkupElement, ctx: &ClassifyContext) -> Result<Option<Classification>, ClassifyError> {
    Ok(Some(match identifying_locator(el, ctx.parser) {
        Some(_) => Classification::Node(NodeKind::GenericElement),
        None => Classification::Flatten,
    }))
}

pub fn is_loader(el: &MarkupElement, parser: &ParserConfig) -> bool {
    el.classes().any(|c| parser.loader_classes.iter().any(|l| l == c))
}

/// Header labels of a table in header order. Only header rows count: rows
/// of `thead`, or rows without data cells when the table has no `thead`.
/// Group headers spanning several columns are skipped, as are empty header
/// cells and cells of nested tables.
pub fn table_columns(el: &MarkupElement) -> Result<Vec<String>, ClassifyError> {
    let mut rows = Vec::new();
    collect_rows(el, false, &mut rows);
    let has_head = rows.iter().any(|(_, in_head)| *in_head);

    let mut columns = Vec::new();
    let mut seen = HashSet::new();
    for (row, in_head) in rows {
        let mut cells = Vec::new();
        collect_cells(row, &mut cells);
        let header = if has_head {
            in_head
        } else {
            cells.iter().all(|c| c.tag == "th")
        };
        if !header {
            continue;
        }
        for th in cells.into_iter().filter(|c| c.tag == "th") {
            let span = th
                .attr("colspan")
                .and_then(|v| v.trim().parse::<u32>().ok())
                .unwrap_or(1);
            if span > 1 {
                continue;
            }
            let label = th.text_content();
            if label.is_empty() {
                continue;
            }
            if !seen.insert(label.clone()) {
                return Err(ClassifyError::DuplicateColumn { label });
            }
            columns.push(label);
        }
    }
    Ok(columns)
}

/// Rows of a table in document order, tagged with whether they sit in a
/// `thead`. Nested tables are not entered.
fn collect_rows<'a>(el: &'a MarkupElement, in_head: bool, rows: &mut Vec<(&'a MarkupElement, bool)>) {
    for child in el.element_children() {
        match child.tag.as_str() {
            "table" => {}
            "tr" => rows.push((child, in_head)),
            "thead" => collect_rows(child, true, rows),
            _ => collect_rows(child, in_head, rows),
        }
    }
}

/// `td`/`th` cells of a row, looking through structural wrappers such as
/// `ng-container`.
fn collect_cells<'a>(el: &'a MarkupElement, cells: &mut Vec<&'a MarkupElement>) {
    for child in el.element_children() {
        match child.tag.as_str() {
            "td" | "th" => cells.push(child),
            "table" => {}
            _ => collect_cells(child, cells),
        }
    }
}

// ============================================================================
// Locator selection
// ============================================================================

/// Stable identifying locator of an element, in priority order:
/// e2e attribute (exact or indexed), `id`, `name`, `formControlName`.
pub fn identifying_locator(el: &MarkupElement, parser: &ParserConfig) -> Option<LocatorSpec> {
    let e2e = &parser.e2e_attribute;
    if let Some(value) = el.attr(e2e) {
        return Some(attribute_locator(e2e, value));
    }
    if let Some(expr) = el.attr(&format!("[attr.{}]", e2e)) {
        return parse_bound_expression(expr).map(|value| LocatorSpec::Attribute {
            name: e2e.clone(),
            value,
        });
    }

    ["id", "name"]
        .iter()
        .find_map(|name| {
            el.attr(name)
                .filter(|v| is_static(v))
                .map(|v| LocatorSpec::attribute(name, v))
        })
        .or_else(|| {
            el.attr("formControlName")
                .filter(|v| is_static(v))
                .map(|v| LocatorSpec::attribute("formcontrolname", v))
        })
}

/// Full locator priority for nodes that may also be found by routing link
/// or, for containers, by CSS class.
pub fn preferred_locator(
    el: &MarkupElement,
    parser: &ParserConfig,
    allow_class: bool,
) -> Option<LocatorSpec> {
    identifying_locator(el, parser)
        .or_else(|| {
            router_link(el, parser).map(|target| {
                let name = if el.tag == "a" { "href" } else { "routerlink" };
                LocatorSpec::attribute(name, &target)
            })
        })
        .or_else(|| {
            if !allow_class {
                return None;
            }
            el.classes()
                .find(|c| !parser.loader_classes.iter().any(|l| l == c))
                .map(LocatorSpec::css_class)
        })
}

/// Static routing-link target of an element (`routerLink="/users"` or
/// `[routerLink]="'/users'"`).
pub fn router_link(el: &MarkupElement, parser: &ParserConfig) -> Option<String> {
    parser.router_link_attributes.iter().find_map(|name| {
        let raw = el.attr(name)?;
        if name.starts_with('[') {
            let trimmed = raw.trim();
            let inner = trimmed
                .strip_prefix('\'')
                .and_then(|s| s.strip_suffix('\''))
                .or_else(|| trimmed.strip_prefix('"').and_then(|s| s.strip_suffix('"')))?;
            Some(inner.to_string())
        } else if is_static(raw) {
            Some(raw.to_string())
        } else {
            None
        }
    })
}

fn is_static(value: &str) -> bool {
    !value.is_empty() && !value.contains("{{")
}

/// `row_{{i}}_foo` → indexed `["row_"]` + end `_foo`; plain values are exact.
/// Locator for `name=value`, indexed when the value interpolates.
pub fn attribute_locator(name: &str, value: &str) -> LocatorSpec {
    match parse_interpolated(value) {
        Some(indexed) => LocatorSpec::Attribute {
            name: name.to_string(),
            value: indexed,
        },
        None => LocatorSpec::attribute(name, value),
    }
}

fn parse_interpolated(value: &str) -> Option<AttrValue> {
    if !value.contains("{{") {
        return None;
    }
    let mut parts = Vec::new();
    let mut rest = value;
    while let Some(open) = rest.find("{{") {
        let close = rest[open..].find("}}")? + open;
        parts.push(rest[..open].to_string());
        rest = &rest[close + 2..];
    }
    Some(AttrValue::Indexed {
        parts,
        end: (!rest.is_empty()).then(|| rest.to_string()),
    })
}

/// `'item_row_' + i` → indexed `["item_row_"]`; `'static'` → exact.
fn parse_bound_expression(expr: &str) -> Option<AttrValue> {
    let mut parts = Vec::new();
    let mut literal = String::new();

    for token in expr.split('+').map(str::trim) {
        let quoted = token
            .strip_prefix('\'')
            .and_then(|t| t.strip_suffix('\''))
            .or_else(|| token.strip_prefix('"').and_then(|t| t.strip_suffix('"')));
        match quoted {
            Some(text) => literal.push_str(text),
            None if token.is_empty() => return None,
            None => parts.push(std::mem::take(&mut literal)),
        }
    }

    if parts.is_empty() {
        return (!literal.is_empty()).then_some(AttrValue::Exact(literal));
    }
    Some(AttrValue::Indexed {
        parts,
        end: (!literal.is_empty()).then_some(literal),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::markup::{parse_markup, MarkupNode};

    fn first_element(source: &str) -> MarkupElement {
        parse_markup(source)
            .unwrap()
            .into_iter()
            .find_map(|n| match n {
                MarkupNode::Element(e) => Some(e),
                MarkupNode::Text(_) => None,
            })
            .unwrap()
    }

    #[test]
    fn row_headers_in_the_body_are_not_columns() {
        let table = first_element(
            "<table><tr><th>#</th><th>Name</th></tr>\
             <tr><th>1</th><td>alice</td></tr>\
             <tr><th>2</th><td>bob</td></tr></table>",
        );
        assert_eq!(table_columns(&table).unwrap(), vec!["#", "Name"]);
    }

    #[test]
    fn only_thead_rows_count_when_present() {
        let table = first_element(
            "<table><thead><tr><th colspan=\"2\">Group</th></tr><tr><th>A</th><th>B</th></tr></thead>\
             <tbody><tr><th>Total</th></tr>\
             <tr><td><table><thead><tr><th>Inner</th></tr></thead></table></td><td>x</td></tr></tbody></table>",
        );
        assert_eq!(table_columns(&table).unwrap(), vec!["A", "B"]);
    }

    #[test]
    fn interpolated_values_become_indexed() {
        assert_eq!(
            parse_interpolated("row_{{ i }}_foo"),
            Some(AttrValue::Indexed {
                parts: vec!["row_".into()],
                end: Some("_foo".into()),
            })
        );
        assert_eq!(parse_interpolated("plain"), None);
    }

    #[test]
    fn bound_expressions_become_indexed() {
        assert_eq!(
            parse_bound_expression("'item_row_' + i"),
            Some(AttrValue::Indexed {
                parts: vec!["item_row_".into()],
                end: None,
            })
        );
        assert_eq!(
            parse_bound_expression("'save'"),
            Some(AttrValue::Exact("save".into()))
        );
    }
}
