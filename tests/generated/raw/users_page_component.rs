// @generated by e2e-pages from src/app/users/users-page.component.html
// Regenerated on every run; put additions in the editable page module.
// checksum: 7b84a304b16d91716bd021af38158d1e9735b9eb

use std::ops::Deref;

use e2e_pages::runtime::{Column, DescriptorRegistry, Element, ElementList, LocatorSpec, PathStep, RuntimeError, Table};

use super::user_card_component::UserCardComponentRaw;

/// Descriptors of `UsersPageComponent`.
pub struct UsersPageComponentRaw {
    pub sidebar: UsersPageComponentSidebarNav,
    pub title: Element,
    pub users: UsersPageComponentUsersTable,
    pub item_row: ElementList,
    pub save_button: Element,
    pub user_card: UserCardComponentRaw,
}

impl UsersPageComponentRaw {
    pub const PAGE_URL: &'static str = "users";

    pub fn declare(reg: &mut DescriptorRegistry) -> Result<Self, RuntimeError> {
        Ok(Self {
            sidebar: reg.nested("sidebar", UsersPageComponentSidebarNav::declare)?,
            title: reg.element("title", LocatorSpec::attribute("data-e2e", "title"))?,
            users: UsersPageComponentUsersTable::declare(reg, "users", LocatorSpec::attribute("data-e2e-table", "users"))?,
            item_row: reg.list("item_row", "data-e2e", &["item_row_"], None)?,
            save_button: reg.element("save_button", LocatorSpec::path(None, vec![PathStep::with_text("button", "Save")]))?,
            user_card: reg.component("user_card", LocatorSpec::path(None, vec![PathStep::tag("app-user-card")]), UserCardComponentRaw::declare)?,
        })
    }
}

/// Navigation block `sidebar`.
pub struct UsersPageComponentSidebarNav {
    pub users_link: Element,
    pub settings_link: Element,
}

impl UsersPageComponentSidebarNav {
    pub fn declare(reg: &mut DescriptorRegistry) -> Result<Self, RuntimeError> {
        Ok(Self {
            users_link: reg.element("users_link", LocatorSpec::attribute("href", "/users"))?,
            settings_link: reg.element("settings_link", LocatorSpec::attribute("href", "/settings"))?,
        })
    }
}

pub struct UsersPageComponentUsersTable {
    pub id_: Column,
    pub name: Column,
    pub table: Table,
}

impl UsersPageComponentUsersTable {
    pub fn declare(reg: &mut DescriptorRegistry, name: &str, locator: LocatorSpec) -> Result<Self, RuntimeError> {
        Ok(Self::from_table(reg.table(name, locator)?))
    }

    pub fn from_table(table: Table) -> Self {
        Self {
            id_: table.column("#"),
            name: table.column("Name"),
            table,
        }
    }
}

impl Deref for UsersPageComponentUsersTable {
    type Target = Table;

    fn deref(&self) -> &Table {
        &self.table
    }
}
