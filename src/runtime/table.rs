use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use tracing::debug;

use crate::error::RuntimeError;
use crate::runtime::context::PageContext;
use crate::runtime::descriptor::{DescriptorState, Element, Locate, Owner};
use crate::runtime::driver::{BrowserDriver, ElementHandle};
use crate::template::markup::normalize_whitespace;
use crate::template::model::{LocatorSpec, PathStep};

/// How a column is found in the header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKey {
    /// Visible header text.
    Label(String),
    /// Attribute of the header cell, for headers whose text is not unique.
    Attribute { name: String, value: String },
}

struct TableInner {
    name: String,
    locator: LocatorSpec,
    /// Which match of `locator` this table is (0 = first).
    position: usize,
    /// Column labels declared by the page object, in declaration order.
    declared: RefCell<Vec<String>>,
    owner: Owner,
}

/// Tabular container: header rows naming columns and one row per record.
/// Every access reads the live document; nothing is cached.
#[derive(Clone)]
pub struct Table {
    inner: Rc<TableInner>,
}

struct HeaderCell {
    label: String,
    handle: ElementHandle,
}

/// Header cells and body rows of one table read. Cells of tables nested
/// inside this one belong to neither.
struct Snapshot {
    headers: Vec<HeaderCell>,
    /// Cells (`td` and row-header `th`) of every body row, left to right.
    rows: Vec<Vec<ElementHandle>>,
}

fn any_element() -> LocatorSpec {
    LocatorSpec::tags(&["*"])
}

fn colspan(driver: &dyn BrowserDriver, cell: &ElementHandle) -> Result<u32, RuntimeError> {
    Ok(driver
        .attribute(cell, "colspan")?
        .and_then(|v| v.trim().parse::<u32>().ok())
        .unwrap_or(1))
}

/// Every element inside tables nested below `table`, nested tables included.
fn nested_content(
    driver: &dyn BrowserDriver,
    table: &ElementHandle,
) -> Result<HashSet<ElementHandle>, RuntimeError> {
    let mut inside = HashSet::new();
    for nested in driver.find_elements(Some(table), &LocatorSpec::tags(&["table"]))? {
        if inside.contains(&nested) {
            continue;
        }
        inside.extend(driver.find_elements(Some(&nested), &any_element())?);
        inside.insert(nested);
    }
    Ok(inside)
}

impl Table {
    pub fn new(name: &str, locator: LocatorSpec) -> Self {
        Self::nth(name, locator, 0)
    }

    pub(crate) fn nth(name: &str, locator: LocatorSpec, position: usize) -> Self {
        Self {
            inner: Rc::new(TableInner {
                name: name.to_string(),
                locator,
                position,
                declared: RefCell::new(Vec::new()),
                owner: Owner::default(),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn locator(&self) -> &LocatorSpec {
        &self.inner.locator
    }

    /// Declare a column by its header label.
    pub fn column(&self, label: &str) -> Column {
        self.declare(label, ColumnKey::Label(label.to_string()))
    }

    /// Declare a column found by an attribute of its header cell
    /// (`data-e2e="created"`), for headers whose text repeats.
    pub fn column_by_attribute(&self, label: &str, name: &str, value: &str) -> Column {
        self.declare(
            label,
            ColumnKey::Attribute {
                name: name.to_string(),
                value: value.to_string(),
            },
        )
    }

    fn declare(&self, label: &str, key: ColumnKey) -> Column {
        self.inner.declared.borrow_mut().push(label.to_string());
        Column {
            table: self.clone(),
            label: label.to_string(),
            key,
        }
    }

    pub fn declared_columns(&self) -> Vec<String> {
        self.inner.declared.borrow().clone()
    }

    pub fn bind(&self, ctx: &Rc<PageContext>) -> Result<(), RuntimeError> {
        self.inner.owner.bind(&self.inner.name, ctx)
    }

    pub fn state(&self) -> DescriptorState {
        if self.inner.owner.is_bound() {
            DescriptorState::Bound
        } else {
            DescriptorState::Unbound
        }
    }

    fn context(&self) -> Result<&Rc<PageContext>, RuntimeError> {
        self.inner.owner.get(&self.inner.name)
    }

    fn element(&self, driver: &dyn BrowserDriver) -> Result<ElementHandle, RuntimeError> {
        driver
            .find_elements(None, &self.inner.locator)?
            .into_iter()
            .nth(self.inner.position)
            .ok_or_else(|| RuntimeError::ElementNotFound {
                field: self.inner.name.clone(),
                locator: self.inner.locator.clone(),
            })
    }

    /// Read header and body rows. With a `thead`, only its rows are header
    /// rows; without one, rows holding no `td` are. Group headers spanning
    /// several columns are skipped.
    fn read(&self, driver: &dyn BrowserDriver) -> Result<Snapshot, RuntimeError> {
        let table = self.element(driver)?;
        let nested = nested_content(driver, &table)?;
        let own = |found: Vec<ElementHandle>| -> Vec<ElementHandle> {
            found.into_iter().filter(|h| !nested.contains(h)).collect()
        };

        let mut head_rows = HashSet::new();
        for thead in own(driver.find_elements(Some(&table), &LocatorSpec::tags(&["thead"]))?) {
            head_rows.extend(driver.find_elements(Some(&thead), &LocatorSpec::tags(&["tr"]))?);
        }
        let has_thead = !head_rows.is_empty();

        let mut snapshot = Snapshot {
            headers: Vec::new(),
            rows: Vec::new(),
        };
        for tr in own(driver.find_elements(Some(&table), &LocatorSpec::tags(&["tr"]))?) {
            let mut cells = Vec::new();
            let mut has_data = false;
            for candidate in own(driver.find_elements(Some(&tr), &any_element())?) {
                let tag = driver.tag_name(&candidate)?;
                match tag.as_str() {
                    "td" => has_data = true,
                    "th" => {}
                    _ => continue,
                }
                cells.push((candidate, tag));
            }

            let in_head = head_rows.contains(&tr);
            if in_head || (!has_thead && !has_data) {
                for (cell, tag) in cells {
                    if tag != "th" || colspan(driver, &cell)? > 1 {
                        continue;
                    }
                    snapshot.headers.push(HeaderCell {
                        label: normalize_whitespace(&driver.text(&cell)?),
                        handle: cell,
                    });
                }
            } else if has_data {
                snapshot.rows.push(cells.into_iter().map(|(cell, _)| cell).collect());
            }
        }

        debug!(
            "table '{}': {} columns, {} rows",
            self.inner.name,
            snapshot.headers.len(),
            snapshot.rows.len()
        );
        Ok(snapshot)
    }

    fn snapshot(&self) -> Result<Snapshot, RuntimeError> {
        let ctx = self.context()?;
        self.read(ctx.driver())
    }

    /// 0-based position of a column among the header cells.
    fn position(&self, snapshot: &Snapshot, column: &Column) -> Result<usize, RuntimeError> {
        let found = match &column.key {
            ColumnKey::Label(label) => snapshot.headers.iter().position(|h| h.label == *label),
            ColumnKey::Attribute { name, value } => {
                let driver = self.context()?.driver();
                let mut found = None;
                for (i, header) in snapshot.headers.iter().enumerate() {
                    if driver.attribute(&header.handle, name)?.as_deref() == Some(value.as_str()) {
                        found = Some(i);
                        break;
                    }
                }
                found
            }
        };
        found.ok_or_else(|| RuntimeError::ColumnNotFound {
            table: self.inner.name.clone(),
            label: column.label.clone(),
        })
    }

    fn row_at<'s>(&self, snapshot: &'s Snapshot, index: usize) -> Result<&'s [ElementHandle], RuntimeError> {
        if index == 0 || index > snapshot.rows.len() {
            return Err(RuntimeError::IndexOutOfRange {
                field: self.inner.name.clone(),
                index,
                len: snapshot.rows.len(),
            });
        }
        Ok(&snapshot.rows[index - 1])
    }

    pub fn header_values(&self) -> Result<Vec<String>, RuntimeError> {
        Ok(self.snapshot()?.headers.into_iter().map(|h| h.label).collect())
    }

    pub fn row_count(&self) -> Result<usize, RuntimeError> {
        Ok(self.snapshot()?.rows.len())
    }

    /// 1-based position of a column by header label.
    pub fn column_index(&self, label: &str) -> Result<usize, RuntimeError> {
        let column = Column {
            table: self.clone(),
            label: label.to_string(),
            key: ColumnKey::Label(label.to_string()),
        };
        column.index()
    }

    /// Cell texts of the `index`-th body row, counting from 1.
    pub fn row_values(&self, index: usize) -> Result<Vec<String>, RuntimeError> {
        let driver = self.context()?.driver();
        let snapshot = self.snapshot()?;
        self.row_at(&snapshot, index)?
            .iter()
            .map(|cell| Ok(normalize_whitespace(&driver.text(cell)?)))
            .collect()
    }
}

// ============================================================================
// Columns
// ============================================================================

/// One column of a table, addressed by header label or header attribute.
#[derive(Clone)]
pub struct Column {
    table: Table,
    label: String,
    key: ColumnKey,
}

impl Column {
    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn key(&self) -> &ColumnKey {
        &self.key
    }

    pub fn table(&self) -> &Table {
        &self.table
    }

    /// 1-based position of the column in the rendered header.
    pub fn index(&self) -> Result<usize, RuntimeError> {
        let snapshot = self.table.snapshot()?;
        Ok(self.table.position(&snapshot, self)? + 1)
    }

    fn field(&self, suffix: &str) -> String {
        format!("{}.{}{}", self.table.name(), self.label, suffix)
    }

    /// Header cell of the column, re-found on every navigation.
    pub fn header(&self) -> Result<Element, RuntimeError> {
        let snapshot = self.table.snapshot()?;
        self.table.position(&snapshot, self)?;

        let column = self.clone();
        let locate: Locate = Rc::new(move || {
            let snapshot = column.table.snapshot()?;
            let position = column.table.position(&snapshot, &column)?;
            Ok(snapshot.headers.into_iter().nth(position).map(|h| h.handle))
        });
        Element::located(
            &self.field("[header]"),
            self.cells_locator("th"),
            locate,
            self.table.context()?,
        )
    }

    /// Click the column header and wait for the table to settle, e.g. to
    /// sort by this column.
    pub fn click(&self) -> Result<(), RuntimeError> {
        self.header()?.click_and_wait()
    }

    fn cells_locator(&self, cell_tag: &str) -> LocatorSpec {
        LocatorSpec::within(
            self.table.locator().clone(),
            LocatorSpec::path(None, vec![PathStep::tag("tr"), PathStep::tag(cell_tag)]),
        )
    }

    /// Descriptor of the cell in body row `row` (from 1), without checking
    /// that the row exists.
    fn cell_element(&self, row: usize) -> Result<Element, RuntimeError> {
        let column = self.clone();
        let locate: Locate = Rc::new(move || {
            let snapshot = column.table.snapshot()?;
            let position = column.table.position(&snapshot, &column)?;
            Ok(row
                .checked_sub(1)
                .and_then(|r| snapshot.rows.get(r))
                .and_then(|cells| cells.get(position))
                .cloned())
        });
        Element::located(
            &self.field(&format!("[{}]", row)),
            self.cells_locator("td"),
            locate,
            self.table.context()?,
        )
    }

    /// The cell in body row `row`, counting from 1. The cell is an ordinary
    /// element descriptor: clickable, and re-found when it goes stale.
    pub fn cell(&self, row: usize) -> Result<Element, RuntimeError> {
        let snapshot = self.table.snapshot()?;
        self.table.position(&snapshot, self)?;
        self.table.row_at(&snapshot, row)?;
        self.cell_element(row)
    }

    /// Cells of this column whose text contains `text`, top to bottom.
    pub fn search(&self, text: &str) -> Result<Vec<Element>, RuntimeError> {
        let mut found = Vec::new();
        for (i, value) in self.values().enumerate() {
            if value?.contains(text) {
                found.push(self.cell_element(i + 1)?);
            }
        }
        Ok(found)
    }

    /// Lazy, finite cell texts top to bottom. Each call starts a fresh
    /// read of the live document.
    pub fn values(&self) -> ColumnValues {
        ColumnValues {
            column: self.clone(),
            resolved: None,
            next_row: 0,
            done: false,
        }
    }

    /// Row number (from 1) of the first cell with this text.
    pub fn index_of(&self, value: &str) -> Result<Option<usize>, RuntimeError> {
        for (i, text) in self.values().enumerate() {
            if text? == value {
                return Ok(Some(i + 1));
            }
        }
        Ok(None)
    }

    /// Whole row of the first cell with this text.
    pub fn row_of(&self, value: &str) -> Result<Option<Vec<String>>, RuntimeError> {
        match self.index_of(value)? {
            Some(row) => Ok(Some(self.table.row_values(row)?)),
            None => Ok(None),
        }
    }
}

/// Iterator behind `Column::values`. Rows are located on the first call to
/// `next`; each cell's text is read as it is yielded.
pub struct ColumnValues {
    column: Column,
    resolved: Option<(usize, Vec<Vec<ElementHandle>>)>,
    next_row: usize,
    done: bool,
}

impl ColumnValues {
    fn resolve(&self) -> Result<(usize, Vec<Vec<ElementHandle>>), RuntimeError> {
        let table = &self.column.table;
        let snapshot = table.snapshot()?;
        let position = table.position(&snapshot, &self.column)?;
        Ok((position, snapshot.rows))
    }

    fn read(&self, cell: Option<&ElementHandle>) -> Result<String, RuntimeError> {
        let driver = self.column.table.context()?.driver();
        match cell {
            Some(cell) => Ok(normalize_whitespace(&driver.text(cell)?)),
            None => Ok(String::new()),
        }
    }
}

impl Iterator for ColumnValues {
    type Item = Result<String, RuntimeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        if self.resolved.is_none() {
            match self.resolve() {
                Ok(r) => self.resolved = Some(r),
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            }
        }
        let (position, rows) = self.resolved.as_ref()?;
        let Some(row) = rows.get(self.next_row) else {
            self.done = true;
            return None;
        };
        let item = self.read(row.get(*position));
        self.next_row += 1;
        if item.is_err() {
            self.done = true;
        }
        Some(item)
    }
}

// ============================================================================
// Groups of tables
// ============================================================================

struct TableListInner {
    field: String,
    locator: LocatorSpec,
    owner: Owner,
}

/// Same-shaped tables told apart by an indexed attribute
/// (`orders_row_1`, `orders_row_2`) or by position. Each access builds a
/// fresh bound `Table` and wraps it with `build`, which declares columns.
pub struct TableList<T> {
    inner: Rc<TableListInner>,
    build: fn(Table) -> T,
}

impl<T> Clone for TableList<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
            build: self.build,
        }
    }
}

impl<T> TableList<T> {
    pub fn new(field: &str, locator: LocatorSpec, build: fn(Table) -> T) -> Self {
        Self {
            inner: Rc::new(TableListInner {
                field: field.to_string(),
                locator,
                owner: Owner::default(),
            }),
            build,
        }
    }

    pub fn field(&self) -> &str {
        &self.inner.field
    }

    pub fn locator(&self) -> &LocatorSpec {
        &self.inner.locator
    }

    pub fn bind(&self, ctx: &Rc<PageContext>) -> Result<(), RuntimeError> {
        self.inner.owner.bind(&self.inner.field, ctx)
    }

    fn context(&self) -> Result<&Rc<PageContext>, RuntimeError> {
        self.inner.owner.get(&self.inner.field)
    }

    /// Number of matching tables in the live document.
    pub fn len(&self) -> Result<usize, RuntimeError> {
        let ctx = self.context()?;
        Ok(ctx.driver().find_elements(None, &self.inner.locator)?.len())
    }

    pub fn is_empty(&self) -> Result<bool, RuntimeError> {
        Ok(self.len()? == 0)
    }

    /// The table whose attribute carries these index values, or with a
    /// non-indexed locator the `n`-th table (from 1).
    pub fn get(&self, indexes: &[usize]) -> Result<T, RuntimeError> {
        let ctx = self.context()?;
        let locator = &self.inner.locator;
        let label = indexes
            .iter()
            .map(|i| i.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let name = format!("{}[{}]", self.inner.field, label);

        let table = if locator.is_indexed() {
            let exact = locator
                .with_indexes(indexes)
                .ok_or_else(|| RuntimeError::InvalidListArgs {
                    field: self.inner.field.clone(),
                    expected: locator.index_arity(),
                    got: indexes.len(),
                })?;
            Table::new(&name, exact)
        } else {
            let [index] = indexes else {
                return Err(RuntimeError::InvalidListArgs {
                    field: self.inner.field.clone(),
                    expected: 1,
                    got: indexes.len(),
                });
            };
            let len = self.len()?;
            if *index == 0 || *index > len {
                return Err(RuntimeError::IndexOutOfRange {
                    field: self.inner.field.clone(),
                    index: *index,
                    len,
                });
            }
            Table::nth(&name, locator.clone(), index - 1)
        };
        table.bind(ctx)?;
        Ok((self.build)(table))
    }
}
