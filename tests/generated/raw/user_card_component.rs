// @generated by e2e-pages from src/app/users/user-card.component.html
// Regenerated on every run; put additions in the editable page module.
// checksum: cbca592565a14e13d7dc756c4a9c22278e1b4697

use e2e_pages::runtime::{DescriptorRegistry, Element, LocatorSpec, RuntimeError};

/// Descriptors of `UserCardComponent`.
pub struct UserCardComponentRaw {
    pub card_name: Element,
}

impl UserCardComponentRaw {
    pub fn declare(reg: &mut DescriptorRegistry) -> Result<Self, RuntimeError> {
        Ok(Self {
            card_name: reg.element("card_name", LocatorSpec::attribute("data-e2e", "card_name"))?,
        })
    }
}
