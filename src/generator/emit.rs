use std::collections::{BTreeSet, HashSet};
use std::fmt::Write;

use sha1::{Digest, Sha1};

use crate::error::GenerateError;
use crate::naming::{self, camel_ident, snake_ident};
use crate::template::model::{AttrValue, LocatorSpec, NodeKind, PageModel, TemplateNode};

pub const GENERATED_MARKER: &str = "// @generated by e2e-pages";
const CHECKSUM_PREFIX: &str = "// checksum: ";

/// Settings that shape every rendered file.
#[derive(Debug, Clone)]
pub struct EmitOptions {
    /// Crate path through which generated code reaches the runtime.
    pub runtime_crate: String,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            runtime_crate: "e2e_pages".to_string(),
        }
    }
}

pub fn raw_struct_name(page_id: &str) -> String {
    format!("{}Raw", camel_ident(page_id))
}

pub fn wrapper_struct_name(page_id: &str) -> String {
    camel_ident(page_id)
}

pub fn module_name(page_id: &str) -> String {
    naming::module_name(page_id)
}

// ============================================================================
// Checksummed headers
// ============================================================================

pub fn checksum(body: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn with_header(source: &str, body: &str) -> String {
    format!(
        "{} from {}\n// Regenerated on every run; put additions in the editable page module.\n{}{}\n\n{}",
        GENERATED_MARKER,
        source,
        CHECKSUM_PREFIX,
        checksum(body),
        body
    )
}

/// Split a generated file into its recorded checksum and its body.
/// `None` when the text does not carry a generated header.
pub fn split_generated(text: &str) -> Option<(&str, &str)> {
    if !text.starts_with(GENERATED_MARKER) {
        return None;
    }
    let (header, body) = text.split_once("\n\n")?;
    let recorded = header
        .lines()
        .find_map(|line| line.strip_prefix(CHECKSUM_PREFIX))?;
    Some((recorded.trim(), body))
}

/// Whether a generated file's body no longer matches its checksum.
pub fn is_hand_edited(text: &str) -> bool {
    match split_generated(text) {
        Some((recorded, body)) => recorded != checksum(body),
        None => true,
    }
}

// ============================================================================
// Field planning
// ============================================================================

enum FieldKind {
    Element,
    Elements,
    Table {
        struct_name: String,
        columns: Vec<(String, String)>,
        /// Indexed locator: one table per index, accessed through a
        /// `TableList`.
        repeated: bool,
    },
    Nav {
        struct_name: String,
        fields: Vec<Field>,
    },
    Component {
        struct_name: String,
        module: String,
    },
}

struct Field {
    name: String,
    locator: LocatorSpec,
    kind: FieldKind,
}

struct Planner<'a> {
    page: &'a str,
    struct_names: HashSet<String>,
}

impl Planner<'_> {
    fn unique_struct(&mut self, base: String) -> String {
        let mut name = base.clone();
        let mut n = 2;
        while !self.struct_names.insert(name.clone()) {
            name = format!("{}{}", base, n);
            n += 1;
        }
        name
    }

    fn duplicate(&self, scope: &[String], field: &str) -> GenerateError {
        let mut path = scope.to_vec();
        path.push(field.to_string());
        GenerateError::DuplicateField {
            page: self.page.to_string(),
            field: path.join("."),
        }
    }

    fn plan(&mut self, nodes: &[TemplateNode], prefix: &str, scope: &[String]) -> Result<Vec<Field>, GenerateError> {
        let mut names = HashSet::new();
        let mut fields = Vec::new();

        for node in nodes {
            let name = snake_ident(&node.name_hint).unwrap_or_else(|| node.kind.label().to_string());
            if !names.insert(name.clone()) {
                return Err(self.duplicate(scope, &name));
            }

            let kind = match &node.kind {
                NodeKind::Table { columns } => {
                    let struct_name = self.unique_struct(format!("{}{}Table", prefix, camel_ident(&name)));
                    let mut table_scope = scope.to_vec();
                    table_scope.push(name.clone());
                    let mut column_names: HashSet<String> = HashSet::from(["table".to_string()]);
                    let mut planned = Vec::new();
                    for (i, label) in columns.iter().enumerate() {
                        let field = snake_ident(label).unwrap_or_else(|| format!("column_{}", i + 1));
                        if !column_names.insert(field.clone()) {
                            return Err(self.duplicate(&table_scope, &field));
                        }
                        planned.push((field, label.clone()));
                    }
                    FieldKind::Table {
                        struct_name,
                        columns: planned,
                        repeated: node.locator.is_indexed(),
                    }
                }
                NodeKind::NavContainer => {
                    let nested_prefix = format!("{}{}", prefix, camel_ident(&name));
                    let struct_name = self.unique_struct(format!("{}Nav", nested_prefix));
                    let mut nav_scope = scope.to_vec();
                    nav_scope.push(name.clone());
                    FieldKind::Nav {
                        struct_name,
                        fields: self.plan(&node.children, &nested_prefix, &nav_scope)?,
                    }
                }
                NodeKind::ComponentRef { component_id } => FieldKind::Component {
                    struct_name: raw_struct_name(component_id),
                    module: module_name(component_id),
                },
                NodeKind::List => FieldKind::Elements,
                NodeKind::Container
                | NodeKind::Button
                | NodeKind::Input
                | NodeKind::Link
                | NodeKind::GenericElement => FieldKind::Element,
            };

            fields.push(Field {
                name,
                locator: node.locator.clone(),
                kind,
            });
        }
        Ok(fields)
    }
}

// ============================================================================
// Raw layer
// ============================================================================

/// Runtime items a file refers to.
#[derive(Default)]
struct Uses {
    runtime: BTreeSet<&'static str>,
    deref: bool,
    components: BTreeSet<(String, String)>,
}

/// Render the regenerable raw module of a page or component.
///
/// The output is a pure function of the model, the source label and the
/// options: fields appear in template declaration order.
pub fn render_raw(model: &PageModel, source_label: &str, options: &EmitOptions) -> Result<String, GenerateError> {
    let raw_name = raw_struct_name(&model.page_id);
    let mut planner = Planner {
        page: &model.page_id,
        struct_names: HashSet::from([raw_name.clone()]),
    };
    let fields = planner.plan(&model.root.children, &camel_ident(&model.page_id), &[])?;

    let mut uses = Uses::default();
    uses.runtime.insert("DescriptorRegistry");
    uses.runtime.insert("RuntimeError");

    let mut items = String::new();
    writeln!(items)?;
    writeln!(items, "/// Descriptors of `{}`.", model.page_id)?;
    let page_url = model.route.as_ref().map(|r| r.url_path.as_str());
    render_struct(&mut items, &mut uses, &raw_name, &fields, page_url)?;
    render_nested(&mut items, &mut uses, &fields)?;

    let mut body = String::new();
    if uses.deref {
        writeln!(body, "use std::ops::Deref;")?;
        writeln!(body)?;
    }
    let runtime: Vec<&str> = uses.runtime.iter().copied().collect();
    writeln!(body, "use {}::runtime::{{{}}};", options.runtime_crate, runtime.join(", "))?;
    if !uses.components.is_empty() {
        writeln!(body)?;
        for (module, struct_name) in &uses.components {
            writeln!(body, "use super::{}::{};", module, struct_name)?;
        }
    }
    body.push_str(&items);

    Ok(with_header(source_label, &body))
}

fn render_struct(
    out: &mut String,
    uses: &mut Uses,
    name: &str,
    fields: &[Field],
    page_url: Option<&str>,
) -> Result<(), GenerateError> {
    writeln!(out, "pub struct {} {{", name)?;
    for field in fields {
        writeln!(out, "    pub {}: {},", field.name, field_type(field, uses))?;
    }
    writeln!(out, "}}")?;
    writeln!(out)?;

    writeln!(out, "impl {} {{", name)?;
    if let Some(url) = page_url {
        writeln!(out, "    pub const PAGE_URL: &'static str = {:?};", url)?;
        writeln!(out)?;
    }
    writeln!(
        out,
        "    pub fn declare(reg: &mut DescriptorRegistry) -> Result<Self, RuntimeError> {{"
    )?;
    writeln!(out, "        Ok(Self {{")?;
    for field in fields {
        writeln!(out, "            {}: {},", field.name, declare_expr(field, uses))?;
    }
    writeln!(out, "        }})")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    Ok(())
}

/// Nav and table structs, depth first in declaration order.
fn render_nested(out: &mut String, uses: &mut Uses, fields: &[Field]) -> Result<(), GenerateError> {
    for field in fields {
        match &field.kind {
            FieldKind::Nav { struct_name, fields: children } => {
                writeln!(out)?;
                writeln!(out, "/// Navigation block `{}`.", field.name)?;
                render_struct(out, uses, struct_name, children, None)?;
                render_nested(out, uses, children)?;
            }
            FieldKind::Table { struct_name, columns, .. } => {
                write_table(out, uses, struct_name, columns)?;
            }
            _ => {}
        }
    }
    Ok(())
}

fn write_table(
    out: &mut String,
    uses: &mut Uses,
    name: &str,
    columns: &[(String, String)],
) -> Result<(), GenerateError> {
    uses.runtime.insert("Table");
    uses.runtime.insert("LocatorSpec");
    uses.deref = true;
    if !columns.is_empty() {
        uses.runtime.insert("Column");
    }

    writeln!(out)?;
    writeln!(out, "pub struct {} {{", name)?;
    for (field, _) in columns {
        writeln!(out, "    pub {}: Column,", field)?;
    }
    writeln!(out, "    pub table: Table,")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "impl {} {{", name)?;
    writeln!(
        out,
        "    pub fn declare(reg: &mut DescriptorRegistry, name: &str, locator: LocatorSpec) -> Result<Self, RuntimeError> {{"
    )?;
    writeln!(out, "        Ok(Self::from_table(reg.table(name, locator)?))")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    pub fn from_table(table: Table) -> Self {{")?;
    writeln!(out, "        Self {{")?;
    for (field, label) in columns {
        writeln!(out, "            {}: table.column({:?}),", field, label)?;
    }
    writeln!(out, "            table,")?;
    writeln!(out, "        }}")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "impl Deref for {} {{", name)?;
    writeln!(out, "    type Target = Table;")?;
    writeln!(out)?;
    writeln!(out, "    fn deref(&self) -> &Table {{")?;
    writeln!(out, "        &self.table")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    Ok(())
}

fn field_type(field: &Field, uses: &mut Uses) -> String {
    match &field.kind {
        FieldKind::Element => {
            uses.runtime.insert("Element");
            "Element".to_string()
        }
        FieldKind::Elements => {
            uses.runtime.insert("ElementList");
            "ElementList".to_string()
        }
        FieldKind::Table {
            struct_name,
            repeated: true,
            ..
        } => {
            uses.runtime.insert("TableList");
            format!("TableList<{}>", struct_name)
        }
        FieldKind::Table { struct_name, .. } | FieldKind::Nav { struct_name, .. } => struct_name.clone(),
        FieldKind::Component { struct_name, module } => {
            uses.components.insert((module.clone(), struct_name.clone()));
            struct_name.clone()
        }
    }
}

fn declare_expr(field: &Field, uses: &mut Uses) -> String {
    let name = &field.name;
    match &field.kind {
        FieldKind::Element => format!("reg.element({:?}, {})?", name, locator_expr(&field.locator, uses)),
        FieldKind::Elements => match &field.locator {
            LocatorSpec::Attribute {
                name: attribute,
                value: AttrValue::Indexed { parts, end },
            } => format!(
                "reg.list({:?}, {:?}, &[{}], {})?",
                name,
                attribute,
                parts.iter().map(|p| format!("{:?}", p)).collect::<Vec<_>>().join(", "),
                option_expr(end.as_deref())
            ),
            other => format!("reg.elements({:?}, {})?", name, locator_expr(other, uses)),
        },
        FieldKind::Table {
            struct_name,
            repeated: true,
            ..
        } => format!(
            "reg.tables({:?}, {}, {}::from_table)?",
            name,
            locator_expr(&field.locator, uses),
            struct_name
        ),
        FieldKind::Table { struct_name, .. } => format!(
            "{}::declare(reg, {:?}, {})?",
            struct_name,
            name,
            locator_expr(&field.locator, uses)
        ),
        FieldKind::Nav { struct_name, .. } => format!("reg.nested({:?}, {}::declare)?", name, struct_name),
        FieldKind::Component { struct_name, .. } => format!(
            "reg.component({:?}, {}, {}::declare)?",
            name,
            locator_expr(&field.locator, uses),
            struct_name
        ),
    }
}

fn option_expr(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("Some({:?})", v),
        None => "None".to_string(),
    }
}

/// Rust expression constructing `locator`.
fn locator_expr(locator: &LocatorSpec, uses: &mut Uses) -> String {
    uses.runtime.insert("LocatorSpec");
    match locator {
        LocatorSpec::CssClass { class } => format!("LocatorSpec::css_class({:?})", class),
        LocatorSpec::Attribute { name, value } => match value {
            AttrValue::Exact(v) => format!("LocatorSpec::attribute({:?}, {:?})", name, v),
            AttrValue::Indexed { parts, end } => format!(
                "LocatorSpec::indexed({:?}, &[{}], {})",
                name,
                parts.iter().map(|p| format!("{:?}", p)).collect::<Vec<_>>().join(", "),
                option_expr(end.as_deref())
            ),
        },
        LocatorSpec::StructuralPath { anchor, steps } => {
            uses.runtime.insert("PathStep");
            let anchor = match anchor {
                Some(a) => format!("Some({})", locator_expr(a, uses)),
                None => "None".to_string(),
            };
            let steps: Vec<String> = steps
                .iter()
                .map(|s| match &s.text {
                    Some(text) => format!("PathStep::with_text({:?}, {:?})", s.tag, text),
                    None => format!("PathStep::tag({:?})", s.tag),
                })
                .collect();
            format!("LocatorSpec::path({}, vec![{}])", anchor, steps.join(", "))
        }
        LocatorSpec::Within { scope, locator } => format!(
            "LocatorSpec::within({}, {})",
            locator_expr(scope, uses),
            locator_expr(locator, uses)
        ),
    }
}

// ============================================================================
// Editable layer and module files
// ============================================================================

/// Render the editable wrapper of a routed page. Written once, then owned
/// by the user.
pub fn render_editable(model: &PageModel, options: &EmitOptions) -> Result<String, GenerateError> {
    let name = wrapper_struct_name(&model.page_id);
    let raw = raw_struct_name(&model.page_id);
    let module = module_name(&model.page_id);
    let url = model.route.as_ref().map(|r| r.url_path.as_str()).unwrap_or("");

    let mut out = String::new();
    writeln!(out, "//! Page object for `/{}` ({}).", url, model.page_id)?;
    writeln!(out, "//!")?;
    writeln!(out, "//! Created once by e2e-pages and never overwritten: add page-specific")?;
    writeln!(out, "//! helpers to the `impl` block at the bottom.")?;
    writeln!(out)?;
    writeln!(out, "use std::ops::Deref;")?;
    writeln!(out, "use std::rc::Rc;")?;
    writeln!(out)?;
    writeln!(
        out,
        "use {}::runtime::{{AppSettings, BrowserDriver, DescriptorRegistry, PageContext, RuntimeError, WaitOptions}};",
        options.runtime_crate
    )?;
    writeln!(out)?;
    writeln!(out, "use super::super::raw::{}::{};", module, raw)?;
    writeln!(out)?;
    writeln!(out, "pub struct {} {{", name)?;
    writeln!(out, "    ctx: Rc<PageContext>,")?;
    writeln!(out, "    raw: {},", raw)?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "impl {} {{", name)?;
    writeln!(out, "    pub fn new(ctx: Rc<PageContext>) -> Result<Self, RuntimeError> {{")?;
    writeln!(out, "        let mut reg = DescriptorRegistry::new({:?});", model.page_id)?;
    writeln!(out, "        let raw = {}::declare(&mut reg)?;", raw)?;
    writeln!(out, "        reg.bind(&ctx)?;")?;
    writeln!(out, "        Ok(Self {{ ctx, raw }})")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    /// Navigate to the page, wait until it is ready and bind the page object.")?;
    writeln!(
        out,
        "    pub fn open(driver: Rc<dyn BrowserDriver>, app: AppSettings, wait: WaitOptions) -> Result<Self, RuntimeError> {{"
    )?;
    writeln!(out, "        Self::open_with(driver, app, wait, &[], &[])")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(
        out,
        "    /// Like `open`, filling route parameters (`:id`) from `params` and appending `query`."
    )?;
    writeln!(out, "    pub fn open_with(")?;
    writeln!(out, "        driver: Rc<dyn BrowserDriver>,")?;
    writeln!(out, "        app: AppSettings,")?;
    writeln!(out, "        wait: WaitOptions,")?;
    writeln!(out, "        params: &[(&str, &str)],")?;
    writeln!(out, "        query: &[(&str, &str)],")?;
    writeln!(out, "    ) -> Result<Self, RuntimeError> {{")?;
    writeln!(
        out,
        "        let ctx = Rc::new(PageContext::new(driver, app, wait).with_page_url({}::PAGE_URL));",
        raw
    )?;
    writeln!(out, "        ctx.open_with(params, query)?;")?;
    writeln!(out, "        Self::new(ctx)")?;
    writeln!(out, "    }}")?;
    writeln!(out)?;
    writeln!(out, "    pub fn context(&self) -> &Rc<PageContext> {{")?;
    writeln!(out, "        &self.ctx")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "impl Deref for {} {{", name)?;
    writeln!(out, "    type Target = {};", raw)?;
    writeln!(out)?;
    writeln!(out, "    fn deref(&self) -> &{} {{", raw)?;
    writeln!(out, "        &self.raw")?;
    writeln!(out, "    }}")?;
    writeln!(out, "}}")?;
    writeln!(out)?;
    writeln!(out, "impl {} {{}}", name)?;
    Ok(out)
}

/// `raw/mod.rs`: one `pub mod` per generated raw module, sorted.
pub fn render_raw_mod(modules: &BTreeSet<String>) -> Result<String, GenerateError> {
    let mut body = String::new();
    for module in modules {
        writeln!(body, "pub mod {};", module)?;
    }
    Ok(with_header("the project route table", &body))
}

pub fn render_root_mod() -> String {
    "pub mod pages;\npub mod raw;\n".to_string()
}

pub fn mod_line(module: &str) -> String {
    format!("pub mod {};", module)
}
