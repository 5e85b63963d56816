//! Page object for `/` (DashboardComponent).
//!
//! Created once by e2e-pages and never overwritten: add page-specific
//! helpers to the `impl` block at the bottom.

use std::ops::Deref;
use std::rc::Rc;

use e2e_pages::runtime::{AppSettings, BrowserDriver, DescriptorRegistry, PageContext, RuntimeError, WaitOptions};

use super::super::raw::dashboard_component::DashboardComponentRaw;

pub struct DashboardComponent {
    ctx: Rc<PageContext>,
    raw: DashboardComponentRaw,
}

impl DashboardComponent {
    pub fn new(ctx: Rc<PageContext>) -> Result<Self, RuntimeError> {
        let mut reg = DescriptorRegistry::new("DashboardComponent");
        let raw = DashboardComponentRaw::declare(&mut reg)?;
        reg.bind(&ctx)?;
        Ok(Self { ctx, raw })
    }

    /// Navigate to the page, wait until it is ready and bind the page object.
    pub fn open(driver: Rc<dyn BrowserDriver>, app: AppSettings, wait: WaitOptions) -> Result<Self, RuntimeError> {
        Self::open_with(driver, app, wait, &[], &[])
    }

    /// Like `open`, filling route parameters (`:id`) from `params` and appending `query`.
    pub fn open_with(
        driver: Rc<dyn BrowserDriver>,
        app: AppSettings,
        wait: WaitOptions,
        params: &[(&str, &str)],
        query: &[(&str, &str)],
    ) -> Result<Self, RuntimeError> {
        let ctx = Rc::new(PageContext::new(driver, app, wait).with_page_url(DashboardComponentRaw::PAGE_URL));
        ctx.open_with(params, query)?;
        Self::new(ctx)
    }

    pub fn context(&self) -> &Rc<PageContext> {
        &self.ctx
    }
}

impl Deref for DashboardComponent {
    type Target = DashboardComponentRaw;

    fn deref(&self) -> &DashboardComponentRaw {
        &self.raw
    }
}

impl DashboardComponent {}
