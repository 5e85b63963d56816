use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config::{ParserConfig, ProjectConfig};
use crate::error::{GenerateError, ParseError};
use crate::naming;
use crate::routes::route_table::{Route, RouteTable};
use crate::template::classifier::{self, Classification, ClassifyContext, ClassifyError};
use crate::template::components::ComponentIndex;
use crate::template::markup::{self, MarkupElement};
use crate::template::model::{AttrValue, LocatorSpec, NodeKind, PageModel, PathStep, TemplateNode};

/// Tags the framework never renders into the DOM.
const VIRTUAL_TAGS: &[&str] = &["ng-container", "ng-template"];

// ============================================================================
// Single template
// ============================================================================

/// Parse one component template into a `PageModel`. Nested components are
/// recorded in `imports` and not inlined.
pub fn build_page_model(
    component_id: &str,
    template_path: &Path,
    route: Option<Route>,
    project: &ProjectConfig,
    parser: &ParserConfig,
    components: &ComponentIndex,
) -> Result<PageModel, ParseError> {
    let source = std::fs::read_to_string(template_path).map_err(|source| ParseError::Io {
        path: template_path.to_path_buf(),
        source,
    })?;
    let nodes = markup::parse_markup(&source).map_err(|e| ParseError::Markup {
        path: template_path.to_path_buf(),
        line: e.line,
        reason: e.reason,
    })?;

    let host = host_tag(template_path, project);
    let root_el = MarkupElement {
        tag: host.clone(),
        attributes: Vec::new(),
        children: nodes,
        line: 1,
    };

    let mut tree = TreeBuilder {
        ctx: ClassifyContext {
            parser,
            selector_prefix: &project.selector_prefix,
            components,
        },
        path: template_path,
        imports: BTreeSet::new(),
    };
    let mut children = Vec::new();
    tree.collect(&root_el, None, &[], &mut children)?;

    let root = TemplateNode {
        kind: NodeKind::Container,
        locator: LocatorSpec::tags(&[&host]),
        name_hint: naming::module_name(component_id),
        line: 1,
        children,
    };

    info!(
        "{}: {} tables, {} lists, {} navs, {} buttons, {} components",
        component_id,
        root.count_kind("table"),
        root.count_kind("list"),
        root.count_kind("nav"),
        root.count_kind("button"),
        tree.imports.len()
    );

    Ok(PageModel {
        page_id: component_id.to_string(),
        route,
        template_path: template_path.to_path_buf(),
        root,
        imports: tree.imports,
    })
}

/// Custom element a component renders as: `users-list.component.html`
/// with prefix `app-` → `app-users-list`.
fn host_tag(template_path: &Path, project: &ProjectConfig) -> String {
    let file_name = template_path
        .file_name()
        .map(|f| f.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = file_name
        .strip_suffix(&project.template_suffix)
        .unwrap_or(&file_name);
    format!("{}{}", project.selector_prefix, name)
}

struct TreeBuilder<'a> {
    ctx: ClassifyContext<'a>,
    path: &'a Path,
    imports: BTreeSet<String>,
}

impl TreeBuilder<'_> {
    /// Classify the element children of `parent` and append the resulting
    /// nodes to `out`. `steps` is the tag chain below `anchor` so far.
    fn collect(
        &mut self,
        parent: &MarkupElement,
        anchor: Option<&LocatorSpec>,
        steps: &[PathStep],
        out: &mut Vec<TemplateNode>,
    ) -> Result<(), ParseError> {
        for el in parent.element_children() {
            let mut chain = steps.to_vec();
            if !VIRTUAL_TAGS.contains(&el.tag.as_str()) {
                chain.push(PathStep::tag(&el.tag));
            }

            let (outcome, rule) = classifier::classify(el, &self.ctx).map_err(|e| match e {
                ClassifyError::DuplicateColumn { label } => ParseError::DuplicateColumn {
                    path: self.path.to_path_buf(),
                    table: table_hint(el, self.ctx.parser),
                    label,
                },
            })?;

            let kind = match outcome {
                Classification::Excluded => {
                    debug!("line {}: <{}> excluded by {} rule", el.line, el.tag, rule);
                    continue;
                }
                Classification::Flatten => {
                    self.collect(el, anchor, &chain, out)?;
                    continue;
                }
                Classification::Node(kind) => kind,
            };
            debug!("line {}: <{}> is {} ({} rule)", el.line, el.tag, kind.label(), rule);

            let locator = self.locator(el, &kind, anchor, &chain);
            let mut node = TemplateNode {
                name_hint: name_hint(el, &kind, self.ctx.parser, self.ctx.selector_prefix),
                locator,
                line: el.line,
                children: Vec::new(),
                kind,
            };

            match &node.kind {
                NodeKind::NavContainer => {
                    let nav_anchor = node.locator.clone();
                    let mut nav_children = Vec::new();
                    self.collect(el, Some(&nav_anchor), &[], &mut nav_children)?;
                    node.children = nav_children;
                    out.push(node);
                }
                NodeKind::GenericElement => {
                    let own_anchor = node.locator.clone();
                    out.push(node);
                    self.collect(el, Some(&own_anchor), &[], out)?;
                }
                NodeKind::ComponentRef { component_id } => {
                    self.imports.insert(component_id.clone());
                    out.push(node);
                }
                _ => out.push(node),
            }
        }
        Ok(())
    }

    fn locator(
        &self,
        el: &MarkupElement,
        kind: &NodeKind,
        anchor: Option<&LocatorSpec>,
        chain: &[PathStep],
    ) -> LocatorSpec {
        let parser = self.ctx.parser;
        let container = matches!(
            kind,
            NodeKind::Table { .. } | NodeKind::List | NodeKind::NavContainer
        );

        // A repeated virtual wrapper renders its first real child.
        let target = if VIRTUAL_TAGS.contains(&el.tag.as_str()) {
            el.element_children().next().unwrap_or(el)
        } else {
            el
        };

        if matches!(kind, NodeKind::Table { .. }) {
            if let Some(value) = el.attr(&parser.table_attribute) {
                return classifier::attribute_locator(&parser.table_attribute, value);
            }
        }
        if let Some(found) = classifier::preferred_locator(target, parser, container) {
            return found;
        }

        let mut steps = chain.to_vec();
        if target.tag != el.tag {
            steps.push(PathStep::tag(&target.tag));
        }
        let leaf = matches!(kind, NodeKind::Button | NodeKind::Link | NodeKind::Input);
        if leaf {
            let text = target.text_content();
            if !text.is_empty() && !text.contains("{{") {
                if let Some(last) = steps.last_mut() {
                    last.text = Some(text);
                }
            }
        }
        LocatorSpec::path(anchor.cloned(), steps)
    }
}

// ============================================================================
// Name hints
// ============================================================================

fn name_hint(el: &MarkupElement, kind: &NodeKind, parser: &ParserConfig, prefix: &str) -> String {
    match kind {
        NodeKind::Table { .. } => table_hint(el, parser),
        NodeKind::ComponentRef { .. } => el.tag.strip_prefix(prefix).unwrap_or(&el.tag).to_string(),
        NodeKind::List => {
            let target = if VIRTUAL_TAGS.contains(&el.tag.as_str()) {
                el.element_children().next().unwrap_or(el)
            } else {
                el
            };
            attribute_hint(target, parser)
                .or_else(|| target.classes().next().map(str::to_string))
                .unwrap_or_else(|| "items".to_string())
        }
        NodeKind::NavContainer => attribute_hint(el, parser)
            .or_else(|| {
                el.classes()
                    .find(|c| parser.nav_classes.iter().any(|n| n == c))
                    .or_else(|| el.classes().next())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| el.tag.clone()),
        _ => attribute_hint(el, parser).unwrap_or_else(|| {
            let text = el.text_content();
            let basis = if text.is_empty() || text.contains("{{") {
                el.attr("placeholder")
                    .or_else(|| el.attr("aria-label"))
                    .or_else(|| el.attr("type"))
                    .unwrap_or(&el.tag)
                    .to_string()
            } else {
                text
            };
            format!("{} {}", basis, kind.label())
        }),
    }
}

/// Hint from a stable attribute value; indexed values keep their literal
/// parts (`item_row_{{i}}` → `item_row_`).
fn attribute_hint(el: &MarkupElement, parser: &ParserConfig) -> Option<String> {
    let locator = classifier::preferred_locator(el, parser, false)?;
    match locator {
        LocatorSpec::Attribute { name, value } => {
            if name == "href" || name == "routerlink" {
                return None;
            }
            Some(match value {
                AttrValue::Exact(v) => v,
                AttrValue::Indexed { parts, end } => {
                    let mut joined = parts.join("_");
                    if let Some(end) = end {
                        joined.push_str(&end);
                    }
                    joined
                }
            })
        }
        _ => None,
    }
}

fn table_hint(el: &MarkupElement, parser: &ParserConfig) -> String {
    el.attr(&parser.table_attribute)
        .map(|value| value.split("{{").next().unwrap_or(value).to_string())
        .filter(|value| !value.is_empty())
        .or_else(|| attribute_hint(el, parser))
        .or_else(|| {
            el.classes()
                .find(|c| !parser.loader_classes.iter().any(|l| l == c))
                .map(str::to_string)
        })
        .unwrap_or_else(|| "table".to_string())
}

// ============================================================================
// Whole project
// ============================================================================

/// A generation target that could not be modelled.
#[derive(Debug)]
pub struct TargetFailure {
    pub target: String,
    pub error: ParseError,
}

/// Models of every routed page and every component they import.
#[derive(Debug, Default)]
pub struct BuildOutcome {
    pub models: BTreeMap<String, PageModel>,
    pub failures: Vec<TargetFailure>,
}

/// Builds and memoises the models of a project, starting from its routes.
pub struct ModelBuilder<'a> {
    project: &'a ProjectConfig,
    parser: &'a ParserConfig,
    components: &'a ComponentIndex,
}

impl<'a> ModelBuilder<'a> {
    pub fn new(project: &'a ProjectConfig, parser: &'a ParserConfig, components: &'a ComponentIndex) -> Self {
        Self {
            project,
            parser,
            components,
        }
    }

    /// Build every routed page, then every component reachable through
    /// imports. Per-target parse failures are collected; an import cycle
    /// fails the whole build before anything is returned.
    pub fn build_all(&self, routes: &RouteTable) -> Result<BuildOutcome, GenerateError> {
        let mut outcome = BuildOutcome::default();
        let mut pending: Vec<(String, Option<Route>)> = Vec::new();

        let mut routed = BTreeSet::new();
        for route in routes.iter() {
            if routed.insert(route.component_id.clone()) {
                pending.push((route.component_id.clone(), Some(route.clone())));
            }
        }
        pending.reverse();

        let mut attempted: BTreeSet<String> = BTreeSet::new();
        while let Some((component_id, route)) = pending.pop() {
            if !attempted.insert(component_id.clone()) {
                continue;
            }
            let built = self
                .template_for(&component_id, route.as_ref(), routes)
                .and_then(|template| {
                    build_page_model(
                        &component_id,
                        &template,
                        route,
                        self.project,
                        self.parser,
                        self.components,
                    )
                });
            match built {
                Ok(model) => {
                    for import in model.imports.iter().rev() {
                        if !attempted.contains(import) {
                            pending.push((import.clone(), None));
                        }
                    }
                    outcome.models.insert(component_id, model);
                }
                Err(error) => outcome.failures.push(TargetFailure {
                    target: component_id,
                    error,
                }),
            }
        }

        let graph: BTreeMap<String, Vec<String>> = outcome
            .models
            .iter()
            .map(|(id, m)| (id.clone(), m.imports.iter().cloned().collect()))
            .collect();
        if let Some(chain) = find_cycle(&graph) {
            return Err(GenerateError::CyclicImport { chain });
        }

        Ok(outcome)
    }

    /// Model of a single component, routed or not. Imports are listed but
    /// not built.
    pub fn build_one(&self, component_id: &str, routes: &RouteTable) -> Result<PageModel, ParseError> {
        let route = routes.route_for(component_id).cloned();
        let template = self.template_for(component_id, route.as_ref(), routes)?;
        build_page_model(
            component_id,
            &template,
            route,
            self.project,
            self.parser,
            self.components,
        )
    }

    /// Template of a component: next to its route import when that file
    /// exists, otherwise wherever discovery found it.
    fn template_for(
        &self,
        component_id: &str,
        route: Option<&Route>,
        routes: &RouteTable,
    ) -> Result<PathBuf, ParseError> {
        let expected = route.and_then(|r| routes.template_path(r, &self.project.template_suffix));
        if let Some(path) = &expected {
            if path.is_file() {
                return Ok(path.clone());
            }
        }
        if let Some(entry) = self.components.by_id(component_id) {
            return Ok(entry.template.clone());
        }
        Err(ParseError::MissingTemplate {
            component: component_id.to_string(),
            expected: expected.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "{}{}",
                    naming::words(component_id)
                        .iter()
                        .filter(|w| *w != "component")
                        .cloned()
                        .collect::<Vec<_>>()
                        .join("-"),
                    self.project.template_suffix
                ))
            }),
        })
    }
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

/// Depth-first search with an explicit stack. Returns the first cycle found
/// as a closed chain (`A -> B -> A`).
pub fn find_cycle(graph: &BTreeMap<String, Vec<String>>) -> Option<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();

    for start in graph.keys() {
        if marks.contains_key(start.as_str()) {
            continue;
        }
        marks.insert(start, Mark::Visiting);
        let mut stack: Vec<(&str, usize)> = vec![(start.as_str(), 0)];

        while let Some(&(node, next)) = stack.last() {
            let edges = graph.get(node).map(Vec::as_slice).unwrap_or(&[]);
            if next >= edges.len() {
                marks.insert(node, Mark::Done);
                stack.pop();
                continue;
            }
            if let Some(top) = stack.last_mut() {
                top.1 += 1;
            }

            let child = edges[next].as_str();
            match marks.get(child) {
                Some(Mark::Visiting) => {
                    let from = stack.iter().position(|(n, _)| *n == child).unwrap_or(0);
                    let mut chain: Vec<String> =
                        stack[from..].iter().map(|(n, _)| n.to_string()).collect();
                    chain.push(child.to_string());
                    return Some(chain);
                }
                Some(Mark::Done) => {}
                None => {
                    if graph.contains_key(child) {
                        marks.insert(child, Mark::Visiting);
                        stack.push((child, 0));
                    }
                }
            }
        }
    }
    None
}
