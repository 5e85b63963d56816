use std::cell::RefCell;
use std::collections::HashMap;

use tracing::debug;

use crate::error::DriverError;
use crate::runtime::driver::{BrowserDriver, ElementHandle};
use crate::template::markup::{self, MarkupElement};
use crate::template::model::{LocatorSpec, PathStep};

/// In-memory `BrowserDriver` over a rendered markup snapshot.
///
/// Handles encode the document generation they were issued under; replacing
/// the document makes every earlier handle stale. Clicks can be scripted to
/// swap in a new document, which is enough to exercise page objects
/// offline against saved HTML.
pub struct MemoryDriver {
    state: RefCell<MemoryState>,
}

struct MemoryState {
    generation: u64,
    document: MarkupElement,
    url: String,
    ready: bool,
    pages: HashMap<String, String>,
    on_click: Vec<(LocatorSpec, String)>,
    clicks: Vec<String>,
}

fn parse_document(html: &str) -> Result<MarkupElement, DriverError> {
    let children = markup::parse_markup(html)
        .map_err(|e| DriverError::Other(format!("line {}: {}", e.line, e.reason)))?;
    Ok(MarkupElement {
        tag: "#document".to_string(),
        attributes: Vec::new(),
        children,
        line: 0,
    })
}

impl MemoryDriver {
    pub fn new(html: &str) -> Result<Self, DriverError> {
        Ok(Self {
            state: RefCell::new(MemoryState {
                generation: 1,
                document: parse_document(html)?,
                url: "about:blank".to_string(),
                ready: true,
                pages: HashMap::new(),
                on_click: Vec::new(),
                clicks: Vec::new(),
            }),
        })
    }

    /// Replace the whole document. Handles issued before are stale.
    pub fn set_html(&self, html: &str) -> Result<(), DriverError> {
        let document = parse_document(html)?;
        let mut state = self.state.borrow_mut();
        state.document = document;
        state.generation += 1;
        Ok(())
    }

    pub fn set_url(&self, url: &str) {
        self.state.borrow_mut().url = url.to_string();
    }

    pub fn set_page_ready(&self, ready: bool) {
        self.state.borrow_mut().ready = ready;
    }

    /// Document served when `navigate` is called with `url`.
    pub fn add_page(&self, url: &str, html: &str) {
        self.state
            .borrow_mut()
            .pages
            .insert(url.to_string(), html.to_string());
    }

    /// Replace the document with `html` when an element matching `locator`
    /// is clicked.
    pub fn on_click(&self, locator: LocatorSpec, html: &str) {
        self.state
            .borrow_mut()
            .on_click
            .push((locator, html.to_string()));
    }

    /// Descriptions (`tag:text`) of clicked elements, oldest first.
    pub fn clicks(&self) -> Vec<String> {
        self.state.borrow().clicks.clone()
    }

    pub fn generation(&self) -> u64 {
        self.state.borrow().generation
    }
}

// ============================================================================
// Handles
// ============================================================================

type NodePath = Vec<usize>;

fn encode(generation: u64, path: &[usize]) -> ElementHandle {
    let parts: Vec<String> = path.iter().map(|i| i.to_string()).collect();
    ElementHandle(format!("{}:{}", generation, parts.join("/")))
}

fn decode(handle: &ElementHandle) -> Option<(u64, NodePath)> {
    let (generation, path) = handle.0.split_once(':')?;
    let generation = generation.parse().ok()?;
    let path = if path.is_empty() {
        Vec::new()
    } else {
        path.split('/')
            .map(|p| p.parse().ok())
            .collect::<Option<Vec<usize>>>()?
    };
    Some((generation, path))
}

/// Path of element-child indexes from the document root.
fn element_at<'d>(root: &'d MarkupElement, path: &[usize]) -> Option<&'d MarkupElement> {
    let mut current = root;
    for index in path {
        current = current.element_children().nth(*index)?;
    }
    Some(current)
}

impl MemoryState {
    fn lookup(&self, handle: &ElementHandle) -> Result<(NodePath, &MarkupElement), DriverError> {
        let (generation, path) = decode(handle)
            .ok_or_else(|| DriverError::Other(format!("malformed handle {}", handle.0)))?;
        if generation != self.generation {
            return Err(DriverError::StaleElement);
        }
        let element = element_at(&self.document, &path).ok_or(DriverError::StaleElement)?;
        Ok((path, element))
    }

    fn find(&self, scope: &[usize], locator: &LocatorSpec) -> Vec<NodePath> {
        let Some(root) = element_at(&self.document, scope) else {
            return Vec::new();
        };
        match locator {
            LocatorSpec::CssClass { class } => {
                descendants_where(root, scope, &|el: &MarkupElement| el.has_class(class))
            }
            LocatorSpec::Attribute { name, value } => descendants_where(root, scope, &|el: &MarkupElement| {
                attribute_ci(el, name).is_some_and(|v| value.matches(v))
            }),
            LocatorSpec::StructuralPath { anchor, steps } => {
                let mut current: Vec<NodePath> = match anchor {
                    Some(anchor) => self.find(scope, anchor),
                    None => vec![scope.to_vec()],
                };
                for step in steps {
                    let mut next: Vec<NodePath> = Vec::new();
                    for base in &current {
                        if let Some(base_el) = element_at(&self.document, base) {
                            next.extend(descendants_where(base_el, base, &|el: &MarkupElement| {
                                step_matches(el, step)
                            }));
                        }
                    }
                    next.sort();
                    next.dedup();
                    current = next;
                }
                current
            }
            LocatorSpec::Within { scope: outer, locator } => match self.find(scope, outer).first() {
                Some(host) => self.find(host, locator),
                None => Vec::new(),
            },
        }
    }

    fn describe(element: &MarkupElement) -> String {
        format!("{}:{}", element.tag, element.text_content())
    }
}

fn step_matches(el: &MarkupElement, step: &PathStep) -> bool {
    (step.tag == "*" || el.tag == step.tag)
        && step
            .text
            .as_ref()
            .is_none_or(|text| el.text_content() == *text)
}

fn attribute_ci<'e>(el: &'e MarkupElement, name: &str) -> Option<&'e str> {
    el.attributes
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

/// Descendants of `root` (at `root_path`) satisfying `pred`, document order.
fn descendants_where(
    root: &MarkupElement,
    root_path: &[usize],
    pred: &dyn Fn(&MarkupElement) -> bool,
) -> Vec<NodePath> {
    let mut out = Vec::new();
    for (index, child) in root.element_children().enumerate() {
        let mut path = root_path.to_vec();
        path.push(index);
        if pred(child) {
            out.push(path.clone());
        }
        out.extend(descendants_where(child, &path, pred));
    }
    out
}

fn is_hidden(el: &MarkupElement) -> bool {
    if el.has_attr("hidden") {
        return true;
    }
    el.attr("style").is_some_and(|style| {
        style
            .split(';')
            .filter_map(|decl| decl.split_once(':'))
            .any(|(prop, value)| prop.trim() == "display" && value.trim() == "none")
    })
}

// ============================================================================
// Driver contract
// ============================================================================

impl BrowserDriver for MemoryDriver {
    fn find_elements(
        &self,
        scope: Option<&ElementHandle>,
        locator: &LocatorSpec,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let state = self.state.borrow();
        let scope_path = match scope {
            Some(handle) => state.lookup(handle)?.0,
            None => Vec::new(),
        };
        Ok(state
            .find(&scope_path, locator)
            .iter()
            .map(|path| encode(state.generation, path))
            .collect())
    }

    fn text(&self, element: &ElementHandle) -> Result<String, DriverError> {
        let state = self.state.borrow();
        Ok(state.lookup(element)?.1.text_content())
    }

    fn tag_name(&self, element: &ElementHandle) -> Result<String, DriverError> {
        let state = self.state.borrow();
        Ok(state.lookup(element)?.1.tag.to_ascii_lowercase())
    }

    fn attribute(&self, element: &ElementHandle, name: &str) -> Result<Option<String>, DriverError> {
        let state = self.state.borrow();
        let (_, el) = state.lookup(element)?;
        Ok(el
            .attr(name)
            .or_else(|| attribute_ci(el, name))
            .map(str::to_string))
    }

    fn click(&self, element: &ElementHandle) -> Result<(), DriverError> {
        let replacement = {
            let mut state = self.state.borrow_mut();
            let (path, el) = state.lookup(element)?;
            let description = MemoryState::describe(el);
            let replacement = state
                .on_click
                .iter()
                .find(|(locator, _)| state.find(&[], locator).contains(&path))
                .map(|(_, html)| html.clone());
            state.clicks.push(description);
            replacement
        };
        if let Some(html) = replacement {
            debug!("scripted click replaces the document");
            self.set_html(&html)?;
        }
        Ok(())
    }

    fn is_displayed(&self, element: &ElementHandle) -> Result<bool, DriverError> {
        let state = self.state.borrow();
        let (path, _) = state.lookup(element)?;
        for depth in 0..=path.len() {
            if let Some(el) = element_at(&state.document, &path[..depth]) {
                if is_hidden(el) {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.state.borrow().url.clone())
    }

    fn navigate(&self, url: &str) -> Result<(), DriverError> {
        let page = {
            let mut state = self.state.borrow_mut();
            state.url = url.to_string();
            state.pages.get(url).cloned()
        };
        match page {
            Some(html) => self.set_html(&html),
            None => {
                self.state.borrow_mut().generation += 1;
                Ok(())
            }
        }
    }

    fn page_ready(&self) -> Result<bool, DriverError> {
        Ok(self.state.borrow().ready)
    }
}
