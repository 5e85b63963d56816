use std::collections::BTreeSet;
use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::routes::route_table::Route;

// ============================================================================
// Locators
// ============================================================================

/// Value matched by an attribute locator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrValue {
    /// The attribute equals this value.
    Exact(String),

    /// The attribute is built from literal parts interleaved with numeric
    /// indexes, e.g. `item_row_{{i}}` → parts `["item_row_"]`, or
    /// `row_{{i}}_foo` → parts `["row_"]`, end `"_foo"`.
    Indexed {
        parts: Vec<String>,
        end: Option<String>,
    },
}

impl AttrValue {
    /// Whether a rendered attribute value belongs to this locator.
    pub fn matches(&self, value: &str) -> bool {
        match self {
            AttrValue::Exact(expected) => expected == value,
            AttrValue::Indexed { parts, end } => {
                let mut rest = value;
                for part in parts {
                    rest = match rest.strip_prefix(part.as_str()) {
                        Some(r) => r,
                        None => return false,
                    };
                    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
                    if digits == 0 {
                        return false;
                    }
                    rest = &rest[digits..];
                }
                rest == end.as_deref().unwrap_or("")
            }
        }
    }

    /// Fill the index slots of an indexed value. `None` when the number of
    /// indexes does not match the number of parts.
    pub fn format(&self, indexes: &[usize]) -> Option<String> {
        match self {
            AttrValue::Exact(v) if indexes.is_empty() => Some(v.clone()),
            AttrValue::Exact(_) => None,
            AttrValue::Indexed { parts, end } => {
                if parts.len() != indexes.len() {
                    return None;
                }
                let mut out = String::new();
                for (part, index) in parts.iter().zip(indexes) {
                    out.push_str(part);
                    out.push_str(&index.to_string());
                }
                if let Some(end) = end {
                    out.push_str(end);
                }
                Some(out)
            }
        }
    }
}

/// One step of a structural path: a tag name, optionally qualified by the
/// element's normalised visible text. Never a positional index.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PathStep {
    pub tag: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl PathStep {
    pub fn tag(tag: &str) -> Self {
        Self {
            tag: tag.to_string(),
            text: None,
        }
    }

    pub fn with_text(tag: &str, text: &str) -> Self {
        Self {
            tag: tag.to_string(),
            text: Some(text.to_string()),
        }
    }
}

/// A stable rule used to find an element in rendered markup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "by", rename_all = "snake_case")]
pub enum LocatorSpec {
    CssClass {
        class: String,
    },
    Attribute {
        name: String,
        value: AttrValue,
    },
    /// Descendant chain of steps, starting below `anchor` (or the document
    /// root when there is no anchored ancestor).
    StructuralPath {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        anchor: Option<Box<LocatorSpec>>,
        steps: Vec<PathStep>,
    },
    /// `locator` searched only below the first element matching `scope`,
    /// e.g. the host element of an embedded component.
    Within {
        scope: Box<LocatorSpec>,
        locator: Box<LocatorSpec>,
    },
}

impl LocatorSpec {
    pub fn css_class(class: &str) -> Self {
        LocatorSpec::CssClass {
            class: class.to_string(),
        }
    }

    pub fn attribute(name: &str, value: &str) -> Self {
        LocatorSpec::Attribute {
            name: name.to_string(),
            value: AttrValue::Exact(value.to_string()),
        }
    }

    pub fn indexed(name: &str, parts: &[&str], end: Option<&str>) -> Self {
        LocatorSpec::Attribute {
            name: name.to_string(),
            value: AttrValue::Indexed {
                parts: parts.iter().map(|p| p.to_string()).collect(),
                end: end.map(str::to_string),
            },
        }
    }

    pub fn path(anchor: Option<LocatorSpec>, steps: Vec<PathStep>) -> Self {
        LocatorSpec::StructuralPath {
            anchor: anchor.map(Box::new),
            steps,
        }
    }

    pub fn within(scope: LocatorSpec, locator: LocatorSpec) -> Self {
        LocatorSpec::Within {
            scope: Box::new(scope),
            locator: Box::new(locator),
        }
    }

    /// The locator with every `Within` scope peeled off.
    pub fn innermost(&self) -> &LocatorSpec {
        match self {
            LocatorSpec::Within { locator, .. } => locator.innermost(),
            other => other,
        }
    }

    /// Shorthand for a tag-only structural path without an anchor.
    pub fn tags(tags: &[&str]) -> Self {
        Self::path(None, tags.iter().map(|t| PathStep::tag(t)).collect())
    }

    pub fn is_indexed(&self) -> bool {
        matches!(
            self.innermost(),
            LocatorSpec::Attribute {
                value: AttrValue::Indexed { .. },
                ..
            }
        )
    }

    /// Number of index slots of an indexed attribute locator (0 otherwise).
    pub fn index_arity(&self) -> usize {
        match self.innermost() {
            LocatorSpec::Attribute {
                value: AttrValue::Indexed { parts, .. },
                ..
            } => parts.len(),
            _ => 0,
        }
    }

    /// Turn an indexed attribute locator into the exact locator for one
    /// concrete element.
    pub fn with_indexes(&self, indexes: &[usize]) -> Option<LocatorSpec> {
        match self {
            LocatorSpec::Attribute { name, value } => {
                value.format(indexes).map(|v| LocatorSpec::Attribute {
                    name: name.clone(),
                    value: AttrValue::Exact(v),
                })
            }
            LocatorSpec::Within { scope, locator } => locator
                .with_indexes(indexes)
                .map(|inner| LocatorSpec::within((**scope).clone(), inner)),
            _ => None,
        }
    }

    /// Relative XPath rendering, for drivers that speak XPath.
    pub fn to_xpath(&self) -> String {
        match self {
            LocatorSpec::CssClass { class } => format!(
                "//*[contains(concat(' ', normalize-space(@class), ' '), ' {} ')]",
                class
            ),
            LocatorSpec::Attribute { name, value } => match value {
                AttrValue::Exact(v) => format!("//*[@{}=\"{}\"]", name, v),
                AttrValue::Indexed { parts, .. } => format!(
                    "//*[starts-with(@{}, \"{}\")]",
                    name,
                    parts.first().map(String::as_str).unwrap_or("")
                ),
            },
            LocatorSpec::StructuralPath { anchor, steps } => {
                let mut out = anchor.as_ref().map(|a| a.to_xpath()).unwrap_or_default();
                for step in steps {
                    out.push_str("//");
                    out.push_str(&step.tag);
                    if let Some(text) = &step.text {
                        out.push_str(&format!("[normalize-space()=\"{}\"]", text));
                    }
                }
                out
            }
            LocatorSpec::Within { scope, locator } => {
                format!("({})[1]{}", scope.to_xpath(), locator.to_xpath())
            }
        }
    }
}

impl fmt::Display for LocatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_xpath())
    }
}

// ============================================================================
// Template tree
// ============================================================================

/// Semantic classification of a template element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeKind {
    /// Component boundary (tree root).
    Container,
    /// Header cells become column names, in header order.
    Table { columns: Vec<String> },
    List,
    Button,
    Input,
    Link,
    GenericElement,
    NavContainer,
    /// Nested component, recorded as an import and not inlined.
    ComponentRef { component_id: String },
}

impl NodeKind {
    pub fn label(&self) -> &'static str {
        match self {
            NodeKind::Container => "container",
            NodeKind::Table { .. } => "table",
            NodeKind::List => "list",
            NodeKind::Button => "button",
            NodeKind::Input => "input",
            NodeKind::Link => "link",
            NodeKind::GenericElement => "element",
            NodeKind::NavContainer => "nav",
            NodeKind::ComponentRef { .. } => "component",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateNode {
    #[serde(flatten)]
    pub kind: NodeKind,
    pub locator: LocatorSpec,
    pub name_hint: String,
    /// Source line in the template, for diagnostics.
    pub line: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TemplateNode>,
}

impl TemplateNode {
    /// Depth-first iterator over this node and all descendants.
    pub fn walk(&self) -> Vec<&TemplateNode> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.walk());
        }
        out
    }

    /// Count of descendants (excluding self) of the given kind label.
    pub fn count_kind(&self, label: &str) -> usize {
        self.walk()
            .iter()
            .skip(1)
            .filter(|n| n.kind.label() == label)
            .count()
    }
}

// ============================================================================
// Page model
// ============================================================================

/// Structural model of one page or component, consumed once by the generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageModel {
    pub page_id: String,
    pub route: Option<Route>,
    pub template_path: PathBuf,
    pub root: TemplateNode,
    pub imports: BTreeSet<String>,
}

impl PageModel {
    pub fn is_page(&self) -> bool {
        self.route.is_some()
    }
}
