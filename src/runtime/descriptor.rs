use std::cell::{OnceCell, RefCell};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::{DriverError, RuntimeError};
use crate::runtime::context::PageContext;
use crate::runtime::driver::{BrowserDriver, ElementHandle};
use crate::runtime::list::ElementList;
use crate::runtime::table::{Table, TableList};
use crate::runtime::wait;
use crate::template::model::LocatorSpec;

// ============================================================================
// Descriptor state
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DescriptorState {
    /// Declared, no owning page yet.
    Unbound,
    /// Owned by a page; nothing resolved under the current navigation.
    Bound,
    /// A live handle is cached for the current navigation.
    Resolved,
}

/// Owner slot shared by every descriptor kind. Set exactly once.
#[derive(Default)]
pub(crate) struct Owner(OnceCell<Rc<PageContext>>);

impl Owner {
    pub(crate) fn bind(&self, field: &str, ctx: &Rc<PageContext>) -> Result<(), RuntimeError> {
        if let Some(existing) = self.0.get() {
            if Rc::ptr_eq(existing, ctx) {
                return Ok(());
            }
            return Err(RuntimeError::AlreadyBound {
                field: field.to_string(),
            });
        }
        let _ = self.0.set(Rc::clone(ctx));
        Ok(())
    }

    pub(crate) fn get(&self, field: &str) -> Result<&Rc<PageContext>, RuntimeError> {
        self.0.get().ok_or_else(|| RuntimeError::Unbound {
            field: field.to_string(),
        })
    }

    pub(crate) fn is_bound(&self) -> bool {
        self.0.get().is_some()
    }
}

// ============================================================================
// Element
// ============================================================================

/// Locate function supplied by a composite descriptor.
pub(crate) type Locate = Rc<dyn Fn() -> Result<Option<ElementHandle>, RuntimeError>>;

/// How an element is found under the current navigation.
enum Lookup {
    /// Which match of the locator this element is (0 = first), for members
    /// of collections without a per-item attribute.
    Nth(usize),
    /// Table cells and headers are found through their table.
    Custom(Locate),
}

struct ElementInner {
    field: String,
    locator: LocatorSpec,
    lookup: Lookup,
    owner: Owner,
    cache: RefCell<Option<(ElementHandle, u64)>>,
}

/// Lazily resolved single element. Cloning shares the descriptor.
#[derive(Clone)]
pub struct Element {
    inner: Rc<ElementInner>,
}

impl fmt::Debug for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Element")
            .field("field", &self.inner.field)
            .field("locator", &self.inner.locator)
            .field("state", &self.state())
            .finish()
    }
}

impl Element {
    pub fn new(field: &str, locator: LocatorSpec) -> Self {
        Self::nth(field, locator, 0)
    }

    pub(crate) fn nth(field: &str, locator: LocatorSpec, position: usize) -> Self {
        Self::with_lookup(field, locator, Lookup::Nth(position))
    }

    fn with_lookup(field: &str, locator: LocatorSpec, lookup: Lookup) -> Self {
        Self {
            inner: Rc::new(ElementInner {
                field: field.to_string(),
                locator,
                lookup,
                owner: Owner::default(),
                cache: RefCell::new(None),
            }),
        }
    }

    /// A bound element found by `locate` instead of by its locator, which
    /// then only describes it in errors.
    pub(crate) fn located(
        field: &str,
        locator: LocatorSpec,
        locate: Locate,
        ctx: &Rc<PageContext>,
    ) -> Result<Self, RuntimeError> {
        let element = Self::with_lookup(field, locator, Lookup::Custom(locate));
        element.bind(ctx)?;
        Ok(element)
    }

    /// An element created on demand from an already bound collection.
    pub(crate) fn bound(
        field: &str,
        locator: LocatorSpec,
        position: usize,
        ctx: &Rc<PageContext>,
    ) -> Result<Self, RuntimeError> {
        let element = Self::nth(field, locator, position);
        element.bind(ctx)?;
        Ok(element)
    }

    pub fn field(&self) -> &str {
        &self.inner.field
    }

    pub fn locator(&self) -> &LocatorSpec {
        &self.inner.locator
    }

    pub fn state(&self) -> DescriptorState {
        let Ok(ctx) = self.inner.owner.get(&self.inner.field) else {
            return DescriptorState::Unbound;
        };
        match &*self.inner.cache.borrow() {
            Some((_, epoch)) if *epoch == ctx.epoch() => DescriptorState::Resolved,
            _ => DescriptorState::Bound,
        }
    }

    pub fn bind(&self, ctx: &Rc<PageContext>) -> Result<(), RuntimeError> {
        self.inner.owner.bind(&self.inner.field, ctx)
    }

    pub fn context(&self) -> Result<&Rc<PageContext>, RuntimeError> {
        self.inner.owner.get(&self.inner.field)
    }

    /// Live handle for the current navigation, located on first use.
    pub fn resolve(&self) -> Result<ElementHandle, RuntimeError> {
        let ctx = self.context()?;
        if let Some((handle, epoch)) = &*self.inner.cache.borrow() {
            if *epoch == ctx.epoch() {
                return Ok(handle.clone());
            }
        }

        let handle = self
            .locate(ctx.driver())?
            .ok_or_else(|| RuntimeError::ElementNotFound {
                field: self.inner.field.clone(),
                locator: self.inner.locator.clone(),
            })?;
        trace!("resolved '{}' to {:?}", self.inner.field, handle);
        *self.inner.cache.borrow_mut() = Some((handle.clone(), ctx.epoch()));
        Ok(handle)
    }

    /// Look the element up in the live document, bypassing the cache.
    fn locate(&self, driver: &dyn BrowserDriver) -> Result<Option<ElementHandle>, RuntimeError> {
        match &self.inner.lookup {
            Lookup::Nth(position) => Ok(driver
                .find_elements(None, &self.inner.locator)?
                .into_iter()
                .nth(*position)),
            Lookup::Custom(locate) => locate(),
        }
    }

    /// Drop the cached handle; the next access re-resolves.
    pub fn invalidate(&self) {
        self.inner.cache.borrow_mut().take();
    }

    /// Run a driver operation on the resolved handle. A stale handle is
    /// re-resolved once; a second stale failure is returned to the caller.
    fn with_handle<T>(
        &self,
        op: impl Fn(&dyn BrowserDriver, &ElementHandle) -> Result<T, DriverError>,
    ) -> Result<T, RuntimeError> {
        let ctx = self.context()?;
        let handle = self.resolve()?;
        match op(ctx.driver(), &handle) {
            Err(DriverError::StaleElement) => {
                debug!("'{}' went stale, re-resolving", self.inner.field);
                self.invalidate();
                let handle = self.resolve()?;
                Ok(op(ctx.driver(), &handle)?)
            }
            other => Ok(other?),
        }
    }

    pub fn text(&self) -> Result<String, RuntimeError> {
        self.with_handle(|d, h| d.text(h))
    }

    pub fn attribute(&self, name: &str) -> Result<Option<String>, RuntimeError> {
        self.with_handle(|d, h| d.attribute(h, name))
    }

    pub fn click(&self) -> Result<(), RuntimeError> {
        debug!("click '{}'", self.inner.field);
        self.with_handle(|d, h| d.click(h))
    }

    /// Click, then block until the application is ready again (unless the
    /// application disables waiting after clicks).
    pub fn click_and_wait(&self) -> Result<(), RuntimeError> {
        self.click()?;
        let ctx = self.context()?;
        ctx.invalidate();
        if ctx.app().wait_after_click {
            ctx.wait_ready()?;
        }
        Ok(())
    }

    pub fn is_displayed(&self) -> Result<bool, RuntimeError> {
        self.with_handle(|d, h| d.is_displayed(h))
    }

    /// Whether the element is currently present, without caching it.
    pub fn exists(&self) -> Result<bool, RuntimeError> {
        let ctx = self.context()?;
        Ok(self.locate(ctx.driver())?.is_some())
    }

    pub fn wait_visible(&self) -> Result<(), RuntimeError> {
        self.wait_displayed(true)
    }

    pub fn wait_hidden(&self) -> Result<(), RuntimeError> {
        self.wait_displayed(false)
    }

    fn wait_displayed(&self, visible: bool) -> Result<(), RuntimeError> {
        let ctx = self.context()?;
        let driver = ctx.driver();
        let condition = format!(
            "'{}' to be {}",
            self.inner.field,
            if visible { "visible" } else { "hidden" }
        );
        wait::wait_for(driver, ctx.wait_options(), &condition, &mut || {
            let shown = match self.locate(driver)? {
                Some(handle) => driver.is_displayed(&handle)?,
                None => false,
            };
            Ok(shown == visible)
        })?;
        self.invalidate();
        Ok(())
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Descriptors a registry hands their owning page to.
pub trait Bindable {
    fn bind_owner(&self, ctx: &Rc<PageContext>) -> Result<(), RuntimeError>;
}

impl Bindable for Element {
    fn bind_owner(&self, ctx: &Rc<PageContext>) -> Result<(), RuntimeError> {
        self.bind(ctx)
    }
}

impl Bindable for ElementList {
    fn bind_owner(&self, ctx: &Rc<PageContext>) -> Result<(), RuntimeError> {
        self.bind(ctx)
    }
}

impl Bindable for Table {
    fn bind_owner(&self, ctx: &Rc<PageContext>) -> Result<(), RuntimeError> {
        self.bind(ctx)
    }
}

impl<T> Bindable for TableList<T> {
    fn bind_owner(&self, ctx: &Rc<PageContext>) -> Result<(), RuntimeError> {
        self.bind(ctx)
    }
}

/// Declaration-time registry of a page object's descriptors, keyed by
/// (scoped) field name. `bind` hands every descriptor its owner.
///
/// Descriptors declared inside `component` are searched only below that
/// component's host element.
pub struct DescriptorRegistry {
    owner: String,
    scope: Vec<String>,
    hosts: Vec<LocatorSpec>,
    names: HashSet<String>,
    entries: Vec<(String, Box<dyn Bindable>)>,
}

impl DescriptorRegistry {
    pub fn new(owner: &str) -> Self {
        Self {
            owner: owner.to_string(),
            scope: Vec::new(),
            hosts: Vec::new(),
            names: HashSet::new(),
            entries: Vec::new(),
        }
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    fn scoped(&self, name: &str) -> String {
        let mut parts = self.scope.clone();
        parts.push(name.to_string());
        parts.join(".")
    }

    /// `locator` confined to the enclosing component hosts, outermost first.
    fn scoped_locator(&self, locator: LocatorSpec) -> LocatorSpec {
        let mut hosts = self.hosts.iter().cloned();
        let Some(first) = hosts.next() else {
            return locator;
        };
        let host = hosts.fold(first, LocatorSpec::within);
        LocatorSpec::within(host, locator)
    }

    fn register(&mut self, name: &str, entry: Box<dyn Bindable>) -> Result<(), RuntimeError> {
        let key = self.scoped(name);
        if !self.names.insert(key.clone()) {
            return Err(RuntimeError::DuplicateField {
                owner: self.owner.clone(),
                field: key,
            });
        }
        self.entries.push((key, entry));
        Ok(())
    }

    pub fn element(&mut self, name: &str, locator: LocatorSpec) -> Result<Element, RuntimeError> {
        let element = Element::new(&self.scoped(name), self.scoped_locator(locator));
        self.register(name, Box::new(element.clone()))?;
        Ok(element)
    }

    /// Every element matching `locator`, addressed by position.
    pub fn elements(&mut self, name: &str, locator: LocatorSpec) -> Result<ElementList, RuntimeError> {
        let list = ElementList::new(&self.scoped(name), self.scoped_locator(locator));
        self.register(name, Box::new(list.clone()))?;
        Ok(list)
    }

    /// Elements whose `attribute` is built from `parts` interleaved with
    /// numeric indexes, plus an optional fixed `end`.
    pub fn list(
        &mut self,
        name: &str,
        attribute: &str,
        parts: &[&str],
        end: Option<&str>,
    ) -> Result<ElementList, RuntimeError> {
        self.elements(name, LocatorSpec::indexed(attribute, parts, end))
    }

    pub fn table(&mut self, name: &str, locator: LocatorSpec) -> Result<Table, RuntimeError> {
        let table = Table::new(&self.scoped(name), self.scoped_locator(locator));
        self.register(name, Box::new(table.clone()))?;
        Ok(table)
    }

    /// A group of same-shaped tables (`orders_row_1`, `orders_row_2`, ...),
    /// each wrapped by `build` when accessed.
    pub fn tables<T: 'static>(
        &mut self,
        name: &str,
        locator: LocatorSpec,
        build: fn(Table) -> T,
    ) -> Result<TableList<T>, RuntimeError> {
        let tables = TableList::new(&self.scoped(name), self.scoped_locator(locator), build);
        self.register(name, Box::new(tables.clone()))?;
        Ok(tables)
    }

    /// Declare a nested group (navigation block) whose fields are
    /// registered under `prefix`.
    pub fn nested<T>(
        &mut self,
        prefix: &str,
        declare: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        self.scope.push(prefix.to_string());
        let result = declare(self);
        self.scope.pop();
        result
    }

    /// Declare an embedded component: fields are registered under `prefix`
    /// and located below the first element matching `host`.
    pub fn component<T>(
        &mut self,
        prefix: &str,
        host: LocatorSpec,
        declare: impl FnOnce(&mut Self) -> Result<T, RuntimeError>,
    ) -> Result<T, RuntimeError> {
        self.hosts.push(host);
        let result = self.nested(prefix, declare);
        self.hosts.pop();
        result
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Scoped names in declaration order.
    pub fn field_names(&self) -> Vec<&str> {
        self.entries.iter().map(|(n, _)| n.as_str()).collect()
    }

    /// Bind every declared descriptor to `ctx`. Consumes the registry, so
    /// binding happens exactly once.
    pub fn bind(self, ctx: &Rc<PageContext>) -> Result<(), RuntimeError> {
        for (_, entry) in &self.entries {
            entry.bind_owner(ctx)?;
        }
        debug!("bound {} descriptors of {}", self.entries.len(), self.owner);
        Ok(())
    }
}
