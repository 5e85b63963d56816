// @generated by e2e-pages from src/app/dashboard/dashboard.component.html
// Regenerated on every run; put additions in the editable page module.
// checksum: 276705b43d82f7d81c7bb26d7d3646e6fce6ad85

use e2e_pages::runtime::{DescriptorRegistry, Element, LocatorSpec, RuntimeError};

/// Descriptors of `DashboardComponent`.
pub struct DashboardComponentRaw {
    pub welcome: Element,
}

impl DashboardComponentRaw {
    pub const PAGE_URL: &'static str = "";

    pub fn declare(reg: &mut DescriptorRegistry) -> Result<Self, RuntimeError> {
        Ok(Self {
            welcome: reg.element("welcome", LocatorSpec::attribute("id", "welcome"))?,
        })
    }
}
